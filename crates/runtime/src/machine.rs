//! Per-machine mutable state (spec §3 "Machine State") and the result of
//! stepping it once (spec §4.2).

use stepwise_core::{Value, VmId};

use crate::arec::ArecPtr;

/// Mutable state for a single machine: its operand stack, instruction
/// pointer, and current activation record pointer. Created at thread init,
/// destroyed when the machine stops (spec §3).
#[derive(Debug, Clone)]
pub struct MachineState {
    pub vmid: VmId,
    pub stack: Vec<Value>,
    pub ip: usize,
    pub current_arec: ArecPtr,
    /// This machine's own root activation record. `dynamic_chain` doubles
    /// as both the lexical-environment link *and* the intra-machine call
    /// stack: for a record pushed by this machine's own `call`, it points
    /// at the caller's arec in the *same* machine; for the root record of
    /// a spawned machine, it points cross-machine at the spawner's arec
    /// purely for lexical lookup. `return` must therefore finish the
    /// machine when it unwinds back to `root_arec`, not merely when
    /// `dynamic_chain` is absent.
    pub root_arec: ArecPtr,
    pub stopped: bool,
    /// Number of `call` frames currently nested below `root_arec` on this
    /// machine's own intra-machine call chain. Does not count the root
    /// frame itself, and is unaffected by `spawn-async` (a spawned machine
    /// starts its own chain at zero). Used only to enforce
    /// `ExecutionLimits::max_call_depth` (spec §2 config, a runaway-
    /// recursion backstop; not part of the core's own invariants).
    pub call_depth: usize,
}

impl MachineState {
    pub fn new(vmid: VmId, ip: usize, root_arec: ArecPtr) -> Self {
        Self {
            vmid,
            stack: Vec::new(),
            ip,
            current_arec: root_arec,
            root_arec,
            stopped: false,
            call_depth: 0,
        }
    }
}

/// What happened when the evaluator consumed one instruction (spec §4.2).
#[derive(Debug, Clone)]
pub enum StepResult {
    /// `ip` advanced (or branched); the machine remains runnable.
    Continue,
    /// The machine suspended awaiting an unresolved future; the controller
    /// has already registered the continuation.
    Wait,
    /// A child machine was spawned with the given vmid; the parent remains
    /// runnable (its future pointer has already been pushed).
    Spawn { child: VmId },
    /// The machine terminated with a value, which may itself be a future
    /// pointer requiring chaining.
    Finish { value: Value },
}
