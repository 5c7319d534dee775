//! Integration tests for the `stepwise` driver's file-loading path: write a
//! `.stasm` listing to disk, parse it exactly the way `main` does, link it,
//! and run it to completion (spec §6 "CLI surface").

use std::fs;
use std::sync::Arc;

use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use stepwise_cli::assembly;
use stepwise_config::ExecutionLimits;
use stepwise_core::{Executable, Value};
use stepwise_runtime::{run_cooperative, Controller, InMemoryStorage};

#[test]
fn loads_links_and_runs_a_program_from_disk() {
    let dir = TempDir::new().unwrap();
    let program_path = dir.path().join("spawn_await.stasm");
    fs::write(
        &program_path,
        "\
fn F_main:
  push_value fnptr F_child
  spawn_async 0
  wait 0
  return

fn F_child:
  push_value int 7
  return
",
    )
    .unwrap();

    let source = fs::read_to_string(&program_path).unwrap();
    let defs = assembly::parse(&source).expect("valid assembly listing");

    let executable = Executable::link(defs, "F_main", 0, Some("spawn_await".into()))
        .expect("linking should succeed");
    let controller = Controller::new(
        Arc::new(executable),
        Arc::new(InMemoryStorage::new()),
        ExecutionLimits::default(),
    );
    let main = controller.toplevel_machine("F_main", vec![]).unwrap();
    run_cooperative(&controller, main).unwrap();

    assert_eq!(controller.result(), Some(Value::Int(7)));
    assert!(!controller.is_broken());
}

#[test]
fn a_malformed_listing_on_disk_is_rejected_before_linking() {
    let dir = TempDir::new().unwrap();
    let program_path = dir.path().join("broken.stasm");
    fs::write(&program_path, "fn F_main:\n  frobnicate\n").unwrap();

    let source = fs::read_to_string(&program_path).unwrap();
    let err = assembly::parse(&source).unwrap_err();

    assert_eq!(
        err,
        stepwise_cli::error::AssemblyError::UnknownMnemonic {
            line: 2,
            mnemonic: "frobnicate".to_string(),
        }
    );
}

#[test]
fn an_empty_definition_set_still_links_deterministically() {
    let mut defs = IndexMap::new();
    defs.insert(
        "F_main".to_string(),
        vec![
            stepwise_core::Instruction::PushValue(Value::Int(1)),
            stepwise_core::Instruction::Return,
        ],
    );
    let a = Executable::link(defs.clone(), "F_main", 0, None).unwrap();
    let b = Executable::link(defs, "F_main", 0, None).unwrap();
    assert_eq!(a, b);
}
