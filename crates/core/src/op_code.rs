//! Opcode tags for the Stepwise instruction set.
//!
//! `OpCode` carries no operand data — it exists purely for disassembly,
//! logging, and categorization, the way the teacher corpus separates its
//! `OpCode` enum from the operand-carrying `Instruction` struct. The actual
//! operands live on [`crate::Instruction`] itself.

use std::fmt;

/// One tag per [`crate::Instruction`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    PushValue = 0x00,
    Call = 0x01,
    Return = 0x02,
    Wait = 0x03,
    Jump = 0x04,
    JumpIfFalse = 0x05,
    Add = 0x10,
    Sub = 0x11,
    Mul = 0x12,
    Div = 0x13,
    SpawnAsync = 0x20,
    Bind = 0x30,
    Lookup = 0x31,
    Pop = 0x32,
}

impl OpCode {
    /// Short mnemonic used by the disassembly listing (spec §6).
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::PushValue => "PUSHV",
            OpCode::Call => "CALL",
            OpCode::Return => "RETURN",
            OpCode::Wait => "WAIT",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMPIFFALSE",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::SpawnAsync => "SPAWNASYNC",
            OpCode::Bind => "BIND",
            OpCode::Lookup => "LOOKUP",
            OpCode::Pop => "POP",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
