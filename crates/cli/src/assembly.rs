//! A line-oriented textual assembly format standing in for the
//! out-of-scope source-language frontend: one `fn NAME:` header per
//! function, one instruction per line underneath it.
//!
//! ```text
//! fn F_main:
//!   push_value fnptr F_child
//!   spawn_async 0
//!   wait 0
//!   return
//!
//! fn F_child:
//!   push_value int 7
//!   return
//! ```

use indexmap::IndexMap;
use stepwise_core::{Instruction, Value};

use crate::error::AssemblyError;

/// Parses `source` into the `{function name -> instructions}` map the
/// linker expects.
pub fn parse(source: &str) -> Result<IndexMap<String, Vec<Instruction>>, AssemblyError> {
    let mut functions = IndexMap::new();
    let mut current: Option<(String, Vec<Instruction>)> = None;

    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = line.strip_prefix("fn ") {
            let name = name
                .trim()
                .strip_suffix(':')
                .ok_or_else(|| AssemblyError::ExpectedFunctionHeader {
                    line: line_no,
                    text: line.to_string(),
                })?
                .trim()
                .to_string();
            if let Some((prev_name, prev_body)) = current.take() {
                functions.insert(prev_name, prev_body);
            }
            current = Some((name, Vec::new()));
            continue;
        }

        let (_, body) = current.as_mut().ok_or(AssemblyError::InstructionOutsideFunction { line: line_no })?;
        body.push(parse_instruction(line_no, line)?);
    }

    if let Some((name, body)) = current.take() {
        functions.insert(name, body);
    }

    Ok(functions)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_instruction(line_no: usize, line: &str) -> Result<Instruction, AssemblyError> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let mnemonic = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or("").trim();
    let operands: Vec<&str> = if rest.is_empty() { Vec::new() } else { rest.split_whitespace().collect() };

    let expect_count = |expected: usize| -> Result<(), AssemblyError> {
        if operands.len() == expected {
            Ok(())
        } else {
            Err(AssemblyError::WrongOperandCount {
                line: line_no,
                mnemonic: mnemonic.to_string(),
                expected,
                got: operands.len(),
            })
        }
    };

    let parse_usize = |text: &str| -> Result<usize, AssemblyError> {
        text.parse().map_err(|_| AssemblyError::InvalidOperand {
            line: line_no,
            mnemonic: mnemonic.to_string(),
            text: text.to_string(),
        })
    };

    match mnemonic {
        "push_value" => {
            if operands.is_empty() {
                return Err(AssemblyError::WrongOperandCount {
                    line: line_no,
                    mnemonic: mnemonic.to_string(),
                    expected: 2,
                    got: 0,
                });
            }
            let value = parse_value(line_no, mnemonic, operands[0], rest)?;
            Ok(Instruction::PushValue(value))
        }
        "call" => {
            expect_count(1)?;
            Ok(Instruction::Call { arity: parse_usize(operands[0])? })
        }
        "return" => {
            expect_count(0)?;
            Ok(Instruction::Return)
        }
        "wait" => {
            expect_count(1)?;
            Ok(Instruction::Wait { slot: parse_usize(operands[0])? })
        }
        "jump" => {
            expect_count(1)?;
            Ok(Instruction::Jump { target: parse_usize(operands[0])? })
        }
        "jump_if_false" => {
            expect_count(1)?;
            Ok(Instruction::JumpIfFalse { target: parse_usize(operands[0])? })
        }
        "add" => {
            expect_count(0)?;
            Ok(Instruction::Add)
        }
        "sub" => {
            expect_count(0)?;
            Ok(Instruction::Sub)
        }
        "mul" => {
            expect_count(0)?;
            Ok(Instruction::Mul)
        }
        "div" => {
            expect_count(0)?;
            Ok(Instruction::Div)
        }
        "spawn_async" => {
            expect_count(1)?;
            Ok(Instruction::SpawnAsync { arity: parse_usize(operands[0])? })
        }
        "bind" => {
            expect_count(1)?;
            Ok(Instruction::Bind { name: operands[0].to_string() })
        }
        "lookup" => {
            expect_count(1)?;
            Ok(Instruction::Lookup { name: operands[0].to_string() })
        }
        "pop" => {
            expect_count(0)?;
            Ok(Instruction::Pop)
        }
        other => Err(AssemblyError::UnknownMnemonic { line: line_no, mnemonic: other.to_string() }),
    }
}

fn parse_value(line_no: usize, mnemonic: &str, tag: &str, rest: &str) -> Result<Value, AssemblyError> {
    let invalid = |text: &str| AssemblyError::InvalidOperand {
        line: line_no,
        mnemonic: mnemonic.to_string(),
        text: text.to_string(),
    };

    match tag {
        "null" => Ok(Value::Null),
        "int" => {
            let text = rest.splitn(2, char::is_whitespace).nth(1).ok_or_else(|| invalid(rest))?;
            text.trim().parse().map(Value::Int).map_err(|_| invalid(text))
        }
        "float" => {
            let text = rest.splitn(2, char::is_whitespace).nth(1).ok_or_else(|| invalid(rest))?;
            text.trim().parse().map(Value::Float).map_err(|_| invalid(text))
        }
        "fnptr" => {
            let text = rest.splitn(2, char::is_whitespace).nth(1).ok_or_else(|| invalid(rest))?;
            Ok(Value::function_pointer(text.trim()))
        }
        "symbol" => {
            let text = rest.splitn(2, char::is_whitespace).nth(1).ok_or_else(|| invalid(rest))?;
            Ok(Value::symbol(text.trim()))
        }
        "str" => {
            let start = rest.find('"').ok_or_else(|| invalid(rest))?;
            let end = rest.rfind('"').filter(|&e| e > start).ok_or_else(|| invalid(rest))?;
            Ok(Value::string(&rest[start + 1..end]))
        }
        other => Err(invalid(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_functions_with_a_blank_line_and_a_comment_between() {
        let source = "\
fn F_main:
  push_value fnptr F_child # spawn it
  spawn_async 0
  wait 0
  return

fn F_child:
  push_value int 7
  return
";
        let functions = parse(source).unwrap();
        assert_eq!(functions.len(), 2);
        assert_eq!(
            functions["F_main"],
            vec![
                Instruction::PushValue(Value::function_pointer("F_child")),
                Instruction::SpawnAsync { arity: 0 },
                Instruction::Wait { slot: 0 },
                Instruction::Return,
            ]
        );
        assert_eq!(
            functions["F_child"],
            vec![Instruction::PushValue(Value::Int(7)), Instruction::Return]
        );
    }

    #[test]
    fn parses_quoted_strings_with_internal_spaces() {
        let source = "fn F_main:\n  push_value str \"hello world\"\n  return\n";
        let functions = parse(source).unwrap();
        assert_eq!(
            functions["F_main"][0],
            Instruction::PushValue(Value::string("hello world"))
        );
    }

    #[test]
    fn rejects_an_instruction_before_any_fn_header() {
        let err = parse("return\n").unwrap_err();
        assert_eq!(err, AssemblyError::InstructionOutsideFunction { line: 1 });
    }

    #[test]
    fn rejects_an_unknown_mnemonic() {
        let err = parse("fn F_main:\n  frobnicate\n").unwrap_err();
        assert_eq!(
            err,
            AssemblyError::UnknownMnemonic { line: 2, mnemonic: "frobnicate".to_string() }
        );
    }

    #[test]
    fn rejects_wrong_operand_count() {
        let err = parse("fn F_main:\n  call\n").unwrap_err();
        assert_eq!(
            err,
            AssemblyError::WrongOperandCount {
                line: 2,
                mnemonic: "call".to_string(),
                expected: 1,
                got: 0,
            }
        );
    }
}
