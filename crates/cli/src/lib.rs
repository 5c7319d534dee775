//! Library half of the `stepwise` driver: the textual assembly parser and
//! its error type, split out of the binary so integration tests can drive
//! the same parsing/linking path the CLI itself uses (spec §6 "CLI
//! surface").

pub mod assembly;
pub mod error;
