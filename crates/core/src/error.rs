//! Error types for the instruction/executable model.
//!
//! Mirrors the taxonomy in spec §7: link errors are their own type because
//! they are raised synchronously by the linker and prevent controller start,
//! distinct from the runtime errors raised while a machine is stepping
//! (those live in `stepwise-runtime`).

use thiserror::Error;

/// Errors that can occur while linking function bodies into an [`crate::Executable`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// The configured entrypoint name was not present among the supplied
    /// function definitions.
    #[error("missing entrypoint: function `{name}` was not found among the linked definitions")]
    MissingEntrypoint { name: String },

    /// Defensive check: the preamble produced by the linker was not exactly
    /// one instruction long. This indicates a bug in the linker itself.
    #[error("preamble length mismatch: expected {expected}, got {actual}")]
    PreambleLength { expected: usize, actual: usize },
}

impl LinkError {
    pub fn missing_entrypoint<S: Into<String>>(name: S) -> Self {
        Self::MissingEntrypoint { name: name.into() }
    }

    pub fn preamble_length(expected: usize, actual: usize) -> Self {
        Self::PreambleLength { expected, actual }
    }
}

/// Result alias for linker operations.
pub type LinkResult<T> = Result<T, LinkError>;
