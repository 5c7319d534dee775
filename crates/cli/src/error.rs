//! Errors raised while parsing a textual assembly listing, before the
//! linker ever sees it.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("line {line}: expected `fn NAME:` to open a function body, found `{text}`")]
    ExpectedFunctionHeader { line: usize, text: String },

    #[error("line {line}: unknown mnemonic `{mnemonic}`")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("line {line}: `{mnemonic}` expects {expected} operand(s), got {got}")]
    WrongOperandCount {
        line: usize,
        mnemonic: String,
        expected: usize,
        got: usize,
    },

    #[error("line {line}: invalid operand `{text}` for `{mnemonic}`")]
    InvalidOperand {
        line: usize,
        mnemonic: String,
        text: String,
    },

    #[error("line {line}: instruction found outside of any `fn` block")]
    InstructionOutsideFunction { line: usize },
}
