//! # Stepwise Runtime
//!
//! The dynamic side of the Stepwise virtual machine: activation records and
//! their ref-counted dynamic chain, per-machine state, the future table
//! with continuations and chaining, the evaluator's `step` function, the
//! controller that coordinates them all, and the two interchangeable
//! scheduling strategies that drive a session to completion.
//!
//! ## Architecture
//!
//! - [`arec`]: activation records and their stable opaque pointers.
//! - [`future_entry`]: the per-machine single-assignment future cell.
//! - [`machine`]: per-machine mutable state and the evaluator's step result.
//! - [`storage`]: the capability set the controller is generic over, plus
//!   an in-process implementation.
//! - [`probe`]: the append-only per-machine observation log.
//! - [`evaluator`]: the pure `step` function.
//! - [`controller`]: [`Controller`], the central coordinator.
//! - [`invoker`]: cooperative and threaded scheduling strategies.
//! - [`error`]: the runtime error taxonomy.
//!
//! A session's lifecycle (spec §9 "Global controller state"): construct a
//! [`Controller`] from a linked [`stepwise_core::Executable`], seed it with
//! a top-level machine, run an invoker until the controller reports
//! stopped, then read back [`Controller::result`] or [`Controller::is_broken`].

pub mod arec;
pub mod controller;
pub mod error;
pub mod evaluator;
pub mod future_entry;
pub mod invoker;
pub mod machine;
pub mod probe;
pub mod storage;

pub use arec::{ActivationRecord, ArecPtr};
pub use controller::Controller;
pub use error::{RuntimeError, RuntimeResult};
pub use future_entry::FutureEntry;
pub use invoker::{run_cooperative, run_threaded};
pub use machine::{MachineState, StepResult};
pub use probe::{Probe, ProbeEntry, ProbeEvent};
pub use storage::{InMemoryStorage, Storage};
