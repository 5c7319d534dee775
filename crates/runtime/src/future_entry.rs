//! The per-machine future record (spec §3 "Future").

use stepwise_core::{Value, VmId};

/// A single-assignment cell keyed by vmid. A machine's future pointer is
/// its own vmid (spec §3: "Futures are created 1:1 with machines").
#[derive(Debug, Clone, Default)]
pub struct FutureEntry {
    pub resolved: bool,
    pub value: Option<Value>,
    /// Machines registered to be rescheduled once this future resolves, in
    /// registration order (spec §4.3 "Continuations are resolved in
    /// insertion order").
    pub continuations: Vec<VmId>,
    /// Set at most once: once chained, this future is never directly
    /// resolved through the normal path again (spec §3 invariants).
    pub chain: Option<VmId>,
}

impl FutureEntry {
    pub fn new() -> Self {
        Self::default()
    }
}
