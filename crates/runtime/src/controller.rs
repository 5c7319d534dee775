//! The central coordinator (spec §4.3 "Controller"): owns the arec arena,
//! the future table, the per-machine state table, probes, the executable,
//! and the session-wide `finished`/`broken`/`stopped` flags.
//!
//! Generic over [`Storage`] so the same logic drives both an in-process
//! arena and, eventually, a remote-transactional back-end (spec §6).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use stepwise_config::ExecutionLimits;
use stepwise_core::{Executable, Value, VmId};
use tracing::{debug, info, warn};

use crate::arec::{ActivationRecord, ArecPtr};
use crate::error::{RuntimeError, RuntimeResult};
use crate::future_entry::FutureEntry;
use crate::machine::MachineState;
use crate::probe::{Probe, ProbeEvent};
use crate::storage::Storage;

pub struct Controller<S: Storage> {
    storage: Arc<S>,
    executable: Arc<Executable>,
    probes: Mutex<HashMap<VmId, Arc<Probe>>>,
    limits: ExecutionLimits,
    total_steps: AtomicU64,
    finished: AtomicBool,
    broken: AtomicBool,
    stopped: AtomicBool,
    result: Mutex<Option<Value>>,
}

impl<S: Storage> Controller<S> {
    pub fn new(executable: Arc<Executable>, storage: Arc<S>, limits: ExecutionLimits) -> Self {
        Self {
            storage,
            executable,
            probes: Mutex::new(HashMap::new()),
            limits,
            total_steps: AtomicU64::new(0),
            finished: AtomicBool::new(false),
            broken: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            result: Mutex::new(None),
        }
    }

    pub fn executable(&self) -> &Executable {
        &self.executable
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn result(&self) -> Option<Value> {
        self.result.lock().clone()
    }

    pub fn probe(&self, vmid: VmId) -> Option<Arc<Probe>> {
        self.probes.lock().get(&vmid).cloned()
    }

    /// Counts one evaluator step against the session-wide step budget
    /// (spec §2 "Total implementation budget" doesn't cover this, but the
    /// invoker needs a non-termination backstop for arbitrary programs).
    pub fn record_step(&self, vmid: VmId, ip: usize) -> RuntimeResult<()> {
        let total = self.total_steps.fetch_add(1, Ordering::Relaxed) + 1;
        if total > self.limits.max_total_steps {
            return Err(RuntimeError::StepBudgetExceeded);
        }
        if let Some(probe) = self.probe(vmid) {
            probe.record(ProbeEvent::Step { ip });
        }
        Ok(())
    }

    /// Allocates a root machine at `fn_ptr` with `args` already on its
    /// operand stack (spec §4.3 `toplevel_machine`).
    pub fn toplevel_machine(&self, fn_ptr: &str, args: Vec<Value>) -> RuntimeResult<VmId> {
        let vmid = self.storage.alloc_vmid();
        let location = *self
            .executable
            .locations
            .get(fn_ptr)
            .ok_or_else(|| RuntimeError::UnknownFunction {
                vmid,
                name: fn_ptr.to_string(),
            })?;

        let arec_ptr = self.storage.alloc_arec_ptr();
        let rec = ActivationRecord::new(Arc::from(fn_ptr), None, vmid, None);
        self.storage.insert_arec(arec_ptr, rec);

        let mut state = MachineState::new(vmid, location, arec_ptr);
        state.stack = args;
        self.storage.insert_state(vmid, state);
        self.storage.insert_future(vmid, FutureEntry::new());
        self.storage.mark_top_level(vmid);
        self.probes.lock().insert(vmid, Arc::new(Probe::new()));

        if self.storage.all_vmids().len() > self.limits.max_machines {
            return Err(RuntimeError::MachineBudgetExceeded);
        }
        info!(%vmid, function = fn_ptr, "top-level machine created");
        Ok(vmid)
    }

    /// Spawns a child machine from an in-flight `call`/`spawn-async`
    /// instruction (spec §4.3 `thread_machine`).
    pub fn thread_machine(
        &self,
        caller_arec: ArecPtr,
        caller_ip: usize,
        fn_ptr: &str,
        args: Vec<Value>,
    ) -> RuntimeResult<VmId> {
        let vmid = self.storage.alloc_vmid();
        let location = *self
            .executable
            .locations
            .get(fn_ptr)
            .ok_or_else(|| RuntimeError::UnknownFunction {
                vmid,
                name: fn_ptr.to_string(),
            })?;

        let arec_ptr = self.storage.alloc_arec_ptr();
        let rec = ActivationRecord::new(
            Arc::from(fn_ptr),
            Some(caller_arec),
            vmid,
            Some(caller_ip.saturating_sub(1)),
        );
        self.storage.insert_arec(arec_ptr, rec);
        self.storage
            .with_arec_mut(caller_arec, |parent| parent.ref_count += 1)
            .ok_or(RuntimeError::DanglingArec {
                ptr: caller_arec.as_raw() as usize,
            })?;

        let mut state = MachineState::new(vmid, location, arec_ptr);
        state.stack = args;
        self.storage.insert_state(vmid, state);
        self.storage.insert_future(vmid, FutureEntry::new());
        self.probes.lock().insert(vmid, Arc::new(Probe::new()));

        if self.storage.all_vmids().len() > self.limits.max_machines {
            return Err(RuntimeError::MachineBudgetExceeded);
        }
        let parent_probe = self
            .storage
            .get_arec(caller_arec)
            .and_then(|rec| self.probe(rec.vmid));
        if let Some(parent_probe) = parent_probe {
            parent_probe.record(ProbeEvent::Spawn { child: vmid });
        }
        debug!(%vmid, function = fn_ptr, parent = %caller_arec, "machine spawned");
        Ok(vmid)
    }

    /// Inserts `rec` into the arena, bumping its parent's ref count if it
    /// has one (spec §4.3 `push_arec`).
    pub fn push_arec(&self, rec: ActivationRecord) -> RuntimeResult<ArecPtr> {
        let ptr = self.storage.alloc_arec_ptr();
        if let Some(parent) = rec.dynamic_chain {
            self.storage
                .with_arec_mut(parent, |p| p.ref_count += 1)
                .ok_or(RuntimeError::DanglingArec {
                    ptr: parent.as_raw() as usize,
                })?;
        }
        self.storage.insert_arec(ptr, rec);
        Ok(ptr)
    }

    /// Decrements `ptr`'s ref count; on reaching zero, removes it and walks
    /// `dynamic_chain` upward doing the same, stopping at the first
    /// ancestor whose count is still positive (spec §4.3 `pop_arec`, the
    /// "core memory-reclamation protocol").
    pub fn pop_arec(&self, ptr: ArecPtr) -> RuntimeResult<ActivationRecord> {
        let snapshot = self.storage.get_arec(ptr).ok_or(RuntimeError::DanglingArec {
            ptr: ptr.as_raw() as usize,
        })?;

        let mut current = ptr;
        loop {
            let new_count = self
                .storage
                .with_arec_mut(current, |rec| {
                    if rec.ref_count == 0 {
                        None
                    } else {
                        rec.ref_count -= 1;
                        Some(rec.ref_count)
                    }
                })
                .ok_or(RuntimeError::DanglingArec {
                    ptr: current.as_raw() as usize,
                })?
                .ok_or(RuntimeError::RefCountUnderflow {
                    ptr: current.as_raw() as usize,
                })?;

            if new_count != 0 {
                break;
            }
            let removed = self.storage.remove_arec(current);
            match removed.and_then(|rec| rec.dynamic_chain) {
                Some(parent) => current = parent,
                None => break,
            }
        }

        Ok(snapshot)
    }

    /// Resolves `vmid`'s future with a concrete (non-future) `value`,
    /// cascading through any chained future, and returns every vmid that
    /// should now be rescheduled (spec §4.3 `resolve_future`).
    pub fn resolve_future(&self, vmid: VmId, value: Value) -> RuntimeResult<Vec<VmId>> {
        if value.is_future() {
            return Err(RuntimeError::ResolveWithFuture { vmid });
        }

        let (already_resolved, chain) = self
            .storage
            .with_future_mut(vmid, |f| {
                let already = f.resolved;
                if !already {
                    f.resolved = true;
                    f.value = Some(value.clone());
                }
                (already, f.chain)
            })
            .ok_or(RuntimeError::MissingFuture { vmid })?;

        if already_resolved {
            return Err(RuntimeError::DoubleResolution { vmid });
        }

        if self.storage.is_top_level(vmid) {
            *self.result.lock() = Some(value.clone());
            self.finished.store(true, Ordering::SeqCst);
            info!(%vmid, result = %value, "top-level future resolved, session finished");
        } else {
            debug!(%vmid, value = %value, "future resolved");
        }

        let mut continuations = self
            .storage
            .with_future_mut(vmid, |f| std::mem::take(&mut f.continuations))
            .unwrap_or_default();

        if let Some(chained) = chain {
            debug!(%vmid, chained = %chained, "cascading resolution through chained future");
            let mut chained_continuations = self.resolve_future(chained, value)?;
            continuations.append(&mut chained_continuations);
        }

        if let Some(probe) = self.probe(vmid) {
            probe.record(ProbeEvent::Resolved);
        }

        Ok(continuations)
    }

    /// The terminal entry point from the evaluator's *finish* result (spec
    /// §4.3 `finish`): resolves directly for a concrete value, or chains
    /// onto an unresolved future pointer.
    pub fn finish(&self, vmid: VmId, value: Value) -> RuntimeResult<Vec<VmId>> {
        match value.as_future() {
            None => self.resolve_future(vmid, value),
            Some(target) => {
                let target_state = self
                    .storage
                    .with_future_mut(target, |f| (f.resolved, f.value.clone()))
                    .ok_or(RuntimeError::MissingFuture { vmid: target })?;

                match target_state {
                    (true, Some(resolved_value)) => self.resolve_future(vmid, resolved_value),
                    _ => {
                        self.storage
                            .with_future_mut(target, |f| f.chain = Some(vmid))
                            .ok_or(RuntimeError::MissingFuture { vmid: target })?;
                        Ok(Vec::new())
                    }
                }
            }
        }
    }

    /// Checks whether `future_vmid`'s future is resolved; if not, registers
    /// `vmid` as a continuation (spec §4.3 `get_or_wait`). `slot` is the
    /// `wait` instruction's operand, recorded on `vmid`'s probe when the
    /// machine actually suspends (spec §4.5 "waits").
    pub fn get_or_wait(
        &self,
        vmid: VmId,
        future_vmid: VmId,
        slot: usize,
    ) -> RuntimeResult<(bool, Option<Value>)> {
        let result = self
            .storage
            .with_future_mut(future_vmid, |f| {
                if f.resolved {
                    (true, f.value.clone())
                } else {
                    f.continuations.push(vmid);
                    (false, None)
                }
            })
            .ok_or(RuntimeError::MissingFuture { vmid: future_vmid })?;

        if !result.0 {
            if let Some(probe) = self.probe(vmid) {
                probe.record(ProbeEvent::Wait { slot });
            }
        }
        Ok(result)
    }

    /// Binds `name` to `value` in the given activation record (spec §4.2
    /// "bind").
    pub fn bind(&self, arec_ptr: ArecPtr, name: String, value: Value) -> RuntimeResult<()> {
        self.storage
            .with_arec_mut(arec_ptr, |rec| {
                rec.bindings.insert(name, value);
            })
            .ok_or(RuntimeError::DanglingArec {
                ptr: arec_ptr.as_raw() as usize,
            })
    }

    /// Walks `dynamic_chain` looking up `name` (spec §4.2 "lookup /
    /// environment lookup").
    pub fn lookup(&self, arec_ptr: ArecPtr, name: &str) -> RuntimeResult<Option<Value>> {
        let mut current = Some(arec_ptr);
        while let Some(ptr) = current {
            let rec = self.storage.get_arec(ptr).ok_or(RuntimeError::DanglingArec {
                ptr: ptr.as_raw() as usize,
            })?;
            if let Some(value) = rec.bindings.get(name) {
                return Ok(Some(value.clone()));
            }
            current = rec.dynamic_chain;
        }
        Ok(None)
    }

    /// Marks `vmid` stopped; an unsuccessful stop marks the whole session
    /// `broken` (spec §4.3 `stop`).
    pub fn stop(&self, vmid: VmId, finished_ok: bool) {
        self.storage.mark_stopped(vmid);
        if !finished_ok {
            self.broken.store(true, Ordering::SeqCst);
            warn!(%vmid, "machine stopped abnormally, controller marked broken");
        } else {
            debug!(%vmid, "machine stopped");
        }
        if let Some(probe) = self.probe(vmid) {
            probe.record(ProbeEvent::Stopped { finished_ok });
        }
        if self.storage.all_stopped() {
            self.stopped.store(true, Ordering::SeqCst);
            info!("all machines stopped, session complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use indexmap::IndexMap;
    use stepwise_core::Instruction;

    fn linked(entrypoint: &str, defs: IndexMap<String, Vec<Instruction>>) -> Arc<Executable> {
        Arc::new(Executable::link(defs, entrypoint, 0, None).unwrap())
    }

    fn fresh_controller(exe: Arc<Executable>) -> Controller<InMemoryStorage> {
        Controller::new(exe, Arc::new(InMemoryStorage::new()), ExecutionLimits::default())
    }

    #[test]
    fn resolving_a_top_level_future_sets_the_session_result() {
        let mut defs = IndexMap::new();
        defs.insert("F_main".to_string(), vec![Instruction::Return]);
        let controller = fresh_controller(linked("F_main", defs));

        let vmid = controller.toplevel_machine("F_main", vec![]).unwrap();
        let continuations = controller.resolve_future(vmid, Value::Int(42)).unwrap();

        assert!(continuations.is_empty());
        assert_eq!(controller.result(), Some(Value::Int(42)));
        assert!(controller.is_finished());
    }

    #[test]
    fn waiting_before_resolution_registers_a_continuation() {
        let mut defs = IndexMap::new();
        defs.insert("F_main".to_string(), vec![Instruction::Return]);
        let controller = fresh_controller(linked("F_main", defs));

        let producer = controller.toplevel_machine("F_main", vec![]).unwrap();
        let waiter = VmId::from_raw(999);

        let (resolved, value) = controller.get_or_wait(waiter, producer, 0).unwrap();
        assert!(!resolved);
        assert_eq!(value, None);

        let rescheduled = controller.resolve_future(producer, Value::Int(7)).unwrap();
        assert_eq!(rescheduled, vec![waiter]);
    }

    #[test]
    fn chained_future_resolves_with_the_same_value() {
        let mut defs = IndexMap::new();
        defs.insert("F_main".to_string(), vec![Instruction::Return]);
        let controller = fresh_controller(linked("F_main", defs));

        let a = controller.toplevel_machine("F_main", vec![]).unwrap();
        let b = controller.toplevel_machine("F_main", vec![]).unwrap();

        // b's evaluator returned a future pointing at a, which is not yet resolved.
        let continuations = controller.finish(b, Value::Future(a)).unwrap();
        assert!(continuations.is_empty());

        let rescheduled = controller.resolve_future(a, Value::string("ok")).unwrap();
        assert!(rescheduled.is_empty());
        assert_eq!(
            controller.storage().get_future(b).unwrap().value,
            Some(Value::string("ok"))
        );
    }

    #[test]
    fn double_resolution_is_rejected() {
        let mut defs = IndexMap::new();
        defs.insert("F_main".to_string(), vec![Instruction::Return]);
        let controller = fresh_controller(linked("F_main", defs));
        let vmid = controller.toplevel_machine("F_main", vec![]).unwrap();

        controller.resolve_future(vmid, Value::Int(1)).unwrap();
        let err = controller.resolve_future(vmid, Value::Int(2)).unwrap_err();
        assert_eq!(err, RuntimeError::DoubleResolution { vmid });
    }

    #[test]
    fn resolving_with_a_future_value_directly_is_rejected() {
        let mut defs = IndexMap::new();
        defs.insert("F_main".to_string(), vec![Instruction::Return]);
        let controller = fresh_controller(linked("F_main", defs));
        let a = controller.toplevel_machine("F_main", vec![]).unwrap();
        let b = controller.toplevel_machine("F_main", vec![]).unwrap();

        let err = controller.resolve_future(a, Value::Future(b)).unwrap_err();
        assert_eq!(err, RuntimeError::ResolveWithFuture { vmid: a });
    }

    #[test]
    fn four_deep_call_chain_frees_every_arec_on_unwind() {
        let mut defs = IndexMap::new();
        defs.insert("F_main".to_string(), vec![Instruction::Return]);
        let controller = fresh_controller(linked("F_main", defs));
        let vmid = controller.toplevel_machine("F_main", vec![]).unwrap();

        let root = controller.storage().get_state(vmid).unwrap().current_arec;
        let mut frames = vec![root];
        for depth in 1..4 {
            let rec = ActivationRecord::new(
                Arc::from("F_main"),
                Some(*frames.last().unwrap()),
                vmid,
                Some(depth),
            );
            frames.push(controller.push_arec(rec).unwrap());
        }

        assert_eq!(controller.storage().arec_count(), 4);

        for ptr in frames.into_iter().rev() {
            controller.pop_arec(ptr).unwrap();
        }

        assert_eq!(controller.storage().arec_count(), 0);
    }

    #[test]
    fn spawned_child_increments_the_callers_ref_count() {
        let mut defs = IndexMap::new();
        defs.insert("F_main".to_string(), vec![Instruction::Return]);
        defs.insert("F_child".to_string(), vec![Instruction::Return]);
        let controller = fresh_controller(linked("F_main", defs));

        let parent = controller.toplevel_machine("F_main", vec![]).unwrap();
        let parent_arec = controller.storage().get_state(parent).unwrap().current_arec;
        assert_eq!(controller.storage().get_arec(parent_arec).unwrap().ref_count, 1);

        controller
            .thread_machine(parent_arec, 3, "F_child", vec![])
            .unwrap();
        assert_eq!(controller.storage().get_arec(parent_arec).unwrap().ref_count, 2);
    }

    #[test]
    fn thread_machine_records_a_spawn_event_on_the_parents_probe() {
        let mut defs = IndexMap::new();
        defs.insert("F_main".to_string(), vec![Instruction::Return]);
        defs.insert("F_child".to_string(), vec![Instruction::Return]);
        let controller = fresh_controller(linked("F_main", defs));

        let parent = controller.toplevel_machine("F_main", vec![]).unwrap();
        let parent_arec = controller.storage().get_state(parent).unwrap().current_arec;

        let child = controller
            .thread_machine(parent_arec, 3, "F_child", vec![])
            .unwrap();

        let events = controller.probe(parent).unwrap().snapshot();
        assert!(events
            .iter()
            .any(|e| matches!(e.event, ProbeEvent::Spawn { child: c } if c == child)));
    }

    #[test]
    fn get_or_wait_records_a_wait_event_when_the_future_is_unresolved() {
        let mut defs = IndexMap::new();
        defs.insert("F_main".to_string(), vec![Instruction::Return]);
        let controller = fresh_controller(linked("F_main", defs));

        let producer = controller.toplevel_machine("F_main", vec![]).unwrap();
        let waiter = controller.toplevel_machine("F_main", vec![]).unwrap();

        let (resolved, _) = controller.get_or_wait(waiter, producer, 2).unwrap();
        assert!(!resolved);

        let events = controller.probe(waiter).unwrap().snapshot();
        assert!(events
            .iter()
            .any(|e| matches!(e.event, ProbeEvent::Wait { slot: 2 })));
    }

    #[test]
    fn get_or_wait_records_no_wait_event_when_already_resolved() {
        let mut defs = IndexMap::new();
        defs.insert("F_main".to_string(), vec![Instruction::Return]);
        let controller = fresh_controller(linked("F_main", defs));

        let producer = controller.toplevel_machine("F_main", vec![]).unwrap();
        let waiter = controller.toplevel_machine("F_main", vec![]).unwrap();
        controller.resolve_future(producer, Value::Int(1)).unwrap();

        let (resolved, _) = controller.get_or_wait(waiter, producer, 0).unwrap();
        assert!(resolved);

        let events = controller.probe(waiter).unwrap().snapshot();
        assert!(!events.iter().any(|e| matches!(e.event, ProbeEvent::Wait { .. })));
    }
}
