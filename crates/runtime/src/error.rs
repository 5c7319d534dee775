//! Runtime error taxonomy (spec §7): type errors, runtime errors, and
//! controller invariant violations. Link errors belong to `stepwise-core`
//! since they are raised before the controller ever starts.

use stepwise_core::VmId;
use thiserror::Error;

/// Result alias for operations inside the runtime.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors the evaluator or controller can raise while a session is running.
///
/// Type errors and ordinary runtime errors abort only the offending
/// machine (the invoker calls `stop(vmid, false)`); controller invariant
/// violations are fatal to the whole session (spec §7 "Propagation").
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// `finish`/`resolve_future` was asked to resolve a future with a value
    /// that is itself a future pointer, via the direct (non-chaining) path.
    #[error("vm {vmid}: cannot resolve a future directly with a future value")]
    ResolveWithFuture { vmid: VmId },

    #[error("vm {vmid}: operand stack underflow at ip {ip}")]
    StackUnderflow { vmid: VmId, ip: usize },

    #[error("vm {vmid}: unknown function pointer `{name}`")]
    UnknownFunction { vmid: VmId, name: String },

    #[error("vm {vmid}: unbound identifier `{name}`")]
    UnboundIdentifier { vmid: VmId, name: String },

    #[error("vm {vmid}: type error: {message}")]
    TypeError { vmid: VmId, message: String },

    #[error("vm {vmid}: division by zero")]
    DivisionByZero { vmid: VmId },

    /// Attempted to resolve a future that was already resolved. Fatal per
    /// spec §4.3 "Resolving an already-resolved future is a programmer
    /// error and must fail loudly."
    #[error("controller invariant violated: future for vm {vmid} was already resolved")]
    DoubleResolution { vmid: VmId },

    #[error("controller invariant violated: dangling activation record pointer {ptr}")]
    DanglingArec { ptr: usize },

    #[error("controller invariant violated: ref_count underflow on activation record {ptr}")]
    RefCountUnderflow { ptr: usize },

    #[error("controller invariant violated: no future registered for vm {vmid}")]
    MissingFuture { vmid: VmId },

    #[error("session exceeded its configured step budget")]
    StepBudgetExceeded,

    #[error("session exceeded its configured machine budget")]
    MachineBudgetExceeded,

    #[error("vm {vmid}: operand stack exceeded its configured depth limit")]
    StackOverflow { vmid: VmId },

    #[error("vm {vmid}: call depth exceeded its configured limit (runaway recursion?)")]
    CallDepthExceeded { vmid: VmId },
}

impl RuntimeError {
    /// Whether this error is a controller invariant violation, i.e. fatal
    /// to the whole session rather than just the offending machine.
    pub fn is_controller_invariant(&self) -> bool {
        matches!(
            self,
            RuntimeError::DoubleResolution { .. }
                | RuntimeError::DanglingArec { .. }
                | RuntimeError::RefCountUnderflow { .. }
                | RuntimeError::MissingFuture { .. }
        )
    }
}
