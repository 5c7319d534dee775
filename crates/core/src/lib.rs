//! # Stepwise Core
//!
//! The instruction set, value model, and linker for the Stepwise virtual
//! machine: a stack-based bytecode VM with first-class asynchronous
//! evaluation (futures, continuations, and machines) at its core.
//!
//! This crate defines the *static* side of the system — the shapes that
//! survive linking and never change once a program starts running. The
//! dynamic side (activation records, the future table, the controller, and
//! the evaluator's `step` function) lives in `stepwise-runtime`, which
//! consumes the [`Executable`] this crate produces.
//!
//! ## Architecture
//!
//! - [`OpCode`]: the tag identifying each instruction kind, used for
//!   disassembly and categorization.
//! - [`Instruction`]: a single data-carrying enum for the full instruction
//!   set — pushes, calls, returns, control flow, arithmetic, async spawn,
//!   and environment binding.
//! - [`Value`]: the tagged runtime value, including first-class function
//!   and future pointers.
//! - [`Executable`]: the linked, immutable program image produced by
//!   [`Executable::link`].
//! - [`LinkError`]: the error taxonomy for link-time failures.
//!
//! ## Example
//!
//! ```
//! use indexmap::IndexMap;
//! use stepwise_core::{Executable, Instruction, Value};
//!
//! let mut defs = IndexMap::new();
//! defs.insert(
//!     "F_main".to_string(),
//!     vec![Instruction::PushValue(Value::Int(1)), Instruction::Return],
//! );
//!
//! let exe = Executable::link(defs, "F_main", 0, Some("demo".into())).unwrap();
//! assert!(exe.code.len() > 0);
//! ```

pub mod error;
pub mod executable;
pub mod instruction;
pub mod op_code;
pub mod value;

pub use error::{LinkError, LinkResult};
pub use executable::Executable;
pub use instruction::Instruction;
pub use op_code::OpCode;
pub use value::{Value, VmId};
