//! Per-machine observation stream (spec §4.5 "Probe"): append-only, opaque
//! to the evaluator, consumed only by diagnostics.

use std::time::Instant;

use parking_lot::Mutex;
use stepwise_core::VmId;

/// One entry in a machine's probe log.
#[derive(Debug, Clone)]
pub enum ProbeEvent {
    Step { ip: usize },
    Spawn { child: VmId },
    Wait { slot: usize },
    Resolved,
    Stopped { finished_ok: bool },
}

#[derive(Debug, Clone)]
pub struct ProbeEntry {
    pub at: Instant,
    pub event: ProbeEvent,
}

/// Append-only log for a single machine.
#[derive(Default)]
pub struct Probe {
    entries: Mutex<Vec<ProbeEntry>>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: ProbeEvent) {
        self.entries.lock().push(ProbeEntry {
            at: Instant::now(),
            event,
        });
    }

    pub fn step_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| matches!(e.event, ProbeEvent::Step { .. }))
            .count()
    }

    /// Snapshot of the log, used to build a diagnostic trace (spec §7
    /// "User-visible behavior").
    pub fn snapshot(&self) -> Vec<ProbeEntry> {
        self.entries.lock().clone()
    }
}
