//! Activation records and the arena that owns them (spec §3 "Activation
//! Record", §4.3 `push_arec`/`pop_arec`).

use std::collections::HashMap;
use std::sync::Arc;

use stepwise_core::Value;
use stepwise_core::VmId;

/// A stable opaque pointer into the controller-owned arec arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArecPtr(u64);

impl ArecPtr {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ArecPtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "arec{}", self.0)
    }
}

/// One activation record (spec §3 "Activation Record"). `ref_count` is the
/// number of references currently reaching this record: the owning
/// machine's current-arec pointer, plus one per descendant whose
/// `dynamic_chain` points here.
#[derive(Debug, Clone)]
pub struct ActivationRecord {
    pub function: Arc<str>,
    pub dynamic_chain: Option<ArecPtr>,
    pub vmid: VmId,
    pub call_site: Option<usize>,
    pub bindings: HashMap<String, Value>,
    pub ref_count: usize,
}

impl ActivationRecord {
    pub fn new(
        function: Arc<str>,
        dynamic_chain: Option<ArecPtr>,
        vmid: VmId,
        call_site: Option<usize>,
    ) -> Self {
        Self {
            function,
            dynamic_chain,
            vmid,
            call_site,
            bindings: HashMap::new(),
            ref_count: 1,
        }
    }
}
