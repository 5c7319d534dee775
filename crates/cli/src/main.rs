//! Command-line driver for the Stepwise VM: loads a textual assembly
//! listing and an optional TOML config, links the listing, runs it to
//! completion with the configured scheduler, and reports the top-level
//! result or a structured failure (spec §7).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use stepwise_cli::assembly;
use stepwise_config::{SchedulerKind, VmConfig};
use stepwise_core::Executable;
use stepwise_runtime::{run_cooperative, run_threaded, Controller, InMemoryStorage};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stepwise", about = "Stepwise VM: links and runs a textual bytecode listing")]
struct Cli {
    /// Path to a `.stasm` assembly listing (see `stepwise_cli::assembly`).
    program: PathBuf,

    /// Path to a TOML configuration file; falls back to `VmConfig::default()`.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Overrides the configured entrypoint function name.
    #[arg(long, value_name = "NAME")]
    entrypoint: Option<String>,

    /// Overrides the configured scheduler (threaded or cooperative).
    #[arg(long, value_name = "KIND")]
    scheduler: Option<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            VmConfig::from_toml_str(&text).with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => VmConfig::default(),
    };
    if let Some(entrypoint) = cli.entrypoint {
        config.entrypoint = entrypoint;
    }
    if let Some(scheduler) = cli.scheduler.as_deref() {
        config.scheduler = match scheduler {
            "threaded" => SchedulerKind::Threaded,
            "cooperative" => SchedulerKind::Cooperative,
            other => anyhow::bail!("unknown scheduler `{other}`, expected `threaded` or `cooperative`"),
        };
    }

    let source = std::fs::read_to_string(&cli.program)
        .with_context(|| format!("reading program {}", cli.program.display()))?;
    let defs = assembly::parse(&source).context("parsing assembly listing")?;
    let executable = Executable::link(
        defs,
        &config.entrypoint,
        config.entrypoint_arity,
        cli.program.file_stem().map(|s| s.to_string_lossy().into_owned()),
    )
    .context("linking assembly listing")?;

    let controller = Controller::new(
        Arc::new(executable),
        Arc::new(InMemoryStorage::new()),
        config.limits,
    );
    let entrypoint_args = (0..config.entrypoint_arity)
        .map(|_| stepwise_core::Value::Null)
        .collect();
    let main_vmid = controller
        .toplevel_machine(&config.entrypoint, entrypoint_args)
        .context("seeding the top-level machine")?;

    let run_result = match config.scheduler {
        SchedulerKind::Threaded => run_threaded(&controller, main_vmid),
        SchedulerKind::Cooperative => run_cooperative(&controller, main_vmid),
    };

    if let Err(err) = run_result {
        anyhow::bail!("controller invariant violated: {err}");
    }

    if controller.is_broken() {
        let probe = controller.probe(main_vmid);
        let trace = probe
            .map(|p| format!("{:?}", p.snapshot()))
            .unwrap_or_else(|| "<no probe recorded>".to_string());
        anyhow::bail!("program failed in vmid {main_vmid}: {trace}");
    }

    match controller.result() {
        Some(value) => {
            println!("{value}");
            Ok(())
        }
        None => anyhow::bail!("program finished without ever resolving the top-level future"),
    }
}
