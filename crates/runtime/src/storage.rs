//! The storage interface consumed by the controller (spec §6), and its
//! in-process implementation.
//!
//! Spec §6 describes the interface in terms of raw scoped locks
//! (`lock_arec`, `lock_future`) over shared containers. A Rust trait can't
//! hand back a lock guard borrowed from behind a trait object without
//! leaking an associated lifetime, so this port expresses the same
//! contract as closure-scoped accessors (`with_arec_mut`, `with_future_mut`)
//! instead: the lock is acquired, the closure runs under it, and the guard
//! is released before the call returns. The observable contract — all
//! reads-then-writes of a given arec or future happen under one critical
//! section — is identical.
//!
//! A remote-transactional backend (spec §6 "Persisted state layout") would
//! implement the same trait by mapping each method to a transaction against
//! a session keyed by vmid/arec-ptr; it is sketched here, not implemented,
//! since wire-level persistence is an external collaborator (spec §1).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use stepwise_core::VmId;

use crate::arec::{ActivationRecord, ArecPtr};
use crate::future_entry::FutureEntry;
use crate::machine::MachineState;

/// Storage back-end capability set (spec §6).
pub trait Storage: Send + Sync {
    fn alloc_vmid(&self) -> VmId;
    fn alloc_arec_ptr(&self) -> ArecPtr;

    fn insert_arec(&self, ptr: ArecPtr, rec: ActivationRecord);
    fn with_arec_mut<R>(&self, ptr: ArecPtr, f: impl FnOnce(&mut ActivationRecord) -> R) -> Option<R>;
    fn get_arec(&self, ptr: ArecPtr) -> Option<ActivationRecord>;
    fn remove_arec(&self, ptr: ArecPtr) -> Option<ActivationRecord>;
    fn arec_count(&self) -> usize;

    fn insert_future(&self, vmid: VmId, entry: FutureEntry);
    fn with_future_mut<R>(&self, vmid: VmId, f: impl FnOnce(&mut FutureEntry) -> R) -> Option<R>;
    fn get_future(&self, vmid: VmId) -> Option<FutureEntry>;

    fn insert_state(&self, vmid: VmId, state: MachineState);
    fn with_state_mut<R>(&self, vmid: VmId, f: impl FnOnce(&mut MachineState) -> R) -> Option<R>;
    fn get_state(&self, vmid: VmId) -> Option<MachineState>;
    fn delete_state(&self, vmid: VmId);
    fn all_vmids(&self) -> Vec<VmId>;

    fn mark_top_level(&self, vmid: VmId);
    fn is_top_level(&self, vmid: VmId) -> bool;

    fn mark_stopped(&self, vmid: VmId);
    fn is_stopped(&self, vmid: VmId) -> bool;
    fn all_stopped(&self) -> bool;
}

/// Plain-container back-end: `parking_lot::Mutex`-guarded maps. Used by
/// both scheduling strategies (spec §4.4) — under cooperative scheduling
/// the locks are never contended, so they cost a cheap atomic swap rather
/// than a real no-op path.
#[derive(Default)]
pub struct InMemoryStorage {
    next_vmid: AtomicU64,
    next_arec_ptr: AtomicU64,
    arecs: Mutex<HashMap<ArecPtr, ActivationRecord>>,
    futures: Mutex<HashMap<VmId, FutureEntry>>,
    states: Mutex<HashMap<VmId, MachineState>>,
    top_level: Mutex<std::collections::HashSet<VmId>>,
    stopped: Mutex<std::collections::HashSet<VmId>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for InMemoryStorage {
    fn alloc_vmid(&self) -> VmId {
        VmId::from_raw(self.next_vmid.fetch_add(1, Ordering::Relaxed))
    }

    fn alloc_arec_ptr(&self) -> ArecPtr {
        ArecPtr::from_raw(self.next_arec_ptr.fetch_add(1, Ordering::Relaxed))
    }

    fn insert_arec(&self, ptr: ArecPtr, rec: ActivationRecord) {
        self.arecs.lock().insert(ptr, rec);
    }

    fn with_arec_mut<R>(&self, ptr: ArecPtr, f: impl FnOnce(&mut ActivationRecord) -> R) -> Option<R> {
        self.arecs.lock().get_mut(&ptr).map(f)
    }

    fn get_arec(&self, ptr: ArecPtr) -> Option<ActivationRecord> {
        self.arecs.lock().get(&ptr).cloned()
    }

    fn remove_arec(&self, ptr: ArecPtr) -> Option<ActivationRecord> {
        self.arecs.lock().remove(&ptr)
    }

    fn arec_count(&self) -> usize {
        self.arecs.lock().len()
    }

    fn insert_future(&self, vmid: VmId, entry: FutureEntry) {
        self.futures.lock().insert(vmid, entry);
    }

    fn with_future_mut<R>(&self, vmid: VmId, f: impl FnOnce(&mut FutureEntry) -> R) -> Option<R> {
        self.futures.lock().get_mut(&vmid).map(f)
    }

    fn get_future(&self, vmid: VmId) -> Option<FutureEntry> {
        self.futures.lock().get(&vmid).cloned()
    }

    fn insert_state(&self, vmid: VmId, state: MachineState) {
        self.states.lock().insert(vmid, state);
    }

    fn with_state_mut<R>(&self, vmid: VmId, f: impl FnOnce(&mut MachineState) -> R) -> Option<R> {
        self.states.lock().get_mut(&vmid).map(f)
    }

    fn get_state(&self, vmid: VmId) -> Option<MachineState> {
        self.states.lock().get(&vmid).cloned()
    }

    fn delete_state(&self, vmid: VmId) {
        self.states.lock().remove(&vmid);
    }

    fn all_vmids(&self) -> Vec<VmId> {
        self.states.lock().keys().copied().collect()
    }

    fn mark_top_level(&self, vmid: VmId) {
        self.top_level.lock().insert(vmid);
    }

    fn is_top_level(&self, vmid: VmId) -> bool {
        self.top_level.lock().contains(&vmid)
    }

    fn mark_stopped(&self, vmid: VmId) {
        self.stopped.lock().insert(vmid);
    }

    fn is_stopped(&self, vmid: VmId) -> bool {
        self.stopped.lock().contains(&vmid)
    }

    fn all_stopped(&self) -> bool {
        let states = self.states.lock();
        let stopped = self.stopped.lock();
        !states.is_empty() && states.keys().all(|v| stopped.contains(v))
    }
}
