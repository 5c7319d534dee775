//! The linker and its output, the [`Executable`] image (spec §4.1).

use indexmap::IndexMap;

use crate::error::{LinkError, LinkResult};
use crate::instruction::Instruction;
use crate::value::Value;

/// An immutable, linked executable image (spec §3, "Executable").
///
/// `locations` maps a function identifier to the absolute instruction index
/// of its body. `code` is the flattened instruction vector: a one-
/// instruction preamble, every function body back to back, and finally the
/// trampoline that bootstraps the entrypoint call.
#[derive(Debug, Clone, PartialEq)]
pub struct Executable {
    pub locations: IndexMap<String, usize>,
    pub code: Vec<Instruction>,
    pub name: Option<String>,
    /// Optional instruction-index -> human label bindings, for debugging
    /// and the disassembly listing. Never consulted by the evaluator.
    pub debug_bindings: IndexMap<usize, String>,
}

/// Length, in instructions, of the fixed preamble at the head of every
/// linked image (spec §4.1: "Reserve a preamble of length one").
const PREAMBLE_LENGTH: usize = 1;

impl Executable {
    /// Links an ordered mapping of function name -> instruction list into a
    /// single executable image (spec §4.1).
    ///
    /// `defs` must be in the iteration order the caller wants reflected in
    /// the final `code` vector — the linker is deterministic given equal
    /// inputs including that order (spec §4.1).
    pub fn link(
        defs: IndexMap<String, Vec<Instruction>>,
        entrypoint_fn: &str,
        entrypoint_arity: usize,
        name: Option<String>,
    ) -> LinkResult<Self> {
        if !defs.contains_key(entrypoint_fn) {
            return Err(LinkError::missing_entrypoint(entrypoint_fn));
        }

        let mut locations = IndexMap::with_capacity(defs.len());
        let mut defs_code = Vec::new();
        for (fn_name, body) in &defs {
            locations.insert(fn_name.clone(), PREAMBLE_LENGTH + defs_code.len());
            defs_code.extend(body.iter().cloned());
        }

        // Relative target used conceptually by the preamble jump; resolved
        // to an absolute index below since the preamble sits at index 0.
        let entrypoint_relative = defs_code.len();
        let entrypoint_absolute = PREAMBLE_LENGTH + entrypoint_relative;

        let preamble = vec![Instruction::Jump {
            target: entrypoint_absolute,
        }];
        if preamble.len() != PREAMBLE_LENGTH {
            return Err(LinkError::preamble_length(PREAMBLE_LENGTH, preamble.len()));
        }

        let trampoline = vec![
            Instruction::PushValue(Value::function_pointer(entrypoint_fn)),
            Instruction::Call {
                arity: entrypoint_arity,
            },
            Instruction::Wait { slot: 0 },
            Instruction::Return,
        ];

        let mut code = Vec::with_capacity(preamble.len() + defs_code.len() + trampoline.len());
        code.extend(preamble);
        code.extend(defs_code);
        code.extend(trampoline);

        Ok(Executable {
            locations,
            code,
            name,
            debug_bindings: IndexMap::new(),
        })
    }

    /// Absolute index of the first instruction after all bodies (the
    /// trampoline's `PushValue` for the entrypoint function pointer).
    pub fn entrypoint_trampoline(&self) -> usize {
        self.code.len() - 4
    }

    /// Human-readable disassembly: `(index, opcode, operands)` per
    /// instruction, plus the locations table (spec §6).
    pub fn disassemble(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        let _ = writeln!(out, "; executable {}", self.name.as_deref().unwrap_or("<unnamed>"));
        let _ = writeln!(out, "; locations:");
        for (name, loc) in &self.locations {
            let _ = writeln!(out, ";   {name} -> {loc}");
        }
        for (idx, instr) in self.code.iter().enumerate() {
            let label = self
                .locations
                .iter()
                .find(|(_, &loc)| loc == idx)
                .map(|(name, _)| format!(" ; {name}"))
                .unwrap_or_default();
            let _ = writeln!(out, "{idx:>5}  {instr}{label}");
        }
        out
    }
}
