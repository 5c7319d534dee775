//! Configuration types for the Stepwise VM runtime.
//!
//! This crate has no behavior of its own: it is a set of serde-derived
//! structs with sensible `Default` impls, loaded by `stepwise-cli` from a
//! TOML file and threaded down into `stepwise-runtime`'s `Controller`.

use serde::{Deserialize, Serialize};

/// Maximum operand stack depth for a single machine before it faults with
/// a stack-overflow runtime error.
pub const DEFAULT_MAX_STACK_DEPTH: usize = 4096;

/// Maximum number of activation records a single dynamic chain may hold
/// before a call is refused as a runaway recursion.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 2048;

/// Maximum number of machines (including the top-level one) a controller
/// will allow to be live at once.
pub const DEFAULT_MAX_MACHINES: usize = 10_000;

/// Maximum number of evaluator steps a single invoker run will execute in
/// total before aborting, as a backstop against non-terminating programs.
pub const DEFAULT_MAX_TOTAL_STEPS: u64 = 50_000_000;

/// Which scheduling strategy the invoker uses to drive machines to
/// completion. Both satisfy the same observable contract (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    /// Each runnable vmid is bound to an OS thread; the controller's
    /// storage uses real locks.
    Threaded,
    /// A single execution unit dequeues vmids from a FIFO ready-queue;
    /// deterministic given queue order.
    #[default]
    Cooperative,
}

/// Resource limits enforced by the controller and evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    pub max_stack_depth: usize,
    pub max_call_depth: usize,
    pub max_machines: usize,
    pub max_total_steps: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_machines: DEFAULT_MAX_MACHINES,
            max_total_steps: DEFAULT_MAX_TOTAL_STEPS,
        }
    }
}

/// Top-level configuration for a single run of the VM, as loaded by
/// `stepwise-cli` from a TOML file and/or overridden by CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmConfig {
    pub scheduler: SchedulerKind,
    pub limits: ExecutionLimits,
    /// Name of the function the linker should treat as the entrypoint.
    pub entrypoint: String,
    /// Number of arguments the entrypoint is called with.
    pub entrypoint_arity: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerKind::default(),
            limits: ExecutionLimits::default(),
            entrypoint: "main".to_string(),
            entrypoint_arity: 0,
        }
    }
}

impl VmConfig {
    /// Parses a `VmConfig` from TOML text, filling in defaults for any
    /// field the document omits.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Partial {
            scheduler: Option<SchedulerKind>,
            limits: Option<ExecutionLimits>,
            entrypoint: Option<String>,
            entrypoint_arity: Option<usize>,
        }

        let partial: Partial = toml::from_str(text)?;
        let defaults = VmConfig::default();
        Ok(VmConfig {
            scheduler: partial.scheduler.unwrap_or(defaults.scheduler),
            limits: partial.limits.unwrap_or(defaults.limits),
            entrypoint: partial.entrypoint.unwrap_or(defaults.entrypoint),
            entrypoint_arity: partial.entrypoint_arity.unwrap_or(defaults.entrypoint_arity),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_are_permissive_but_finite() {
        let limits = ExecutionLimits::default();
        assert!(limits.max_stack_depth > 0);
        assert!(limits.max_machines > 0);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg = VmConfig::from_toml_str("entrypoint = \"F_main\"\nentrypoint_arity = 2\n")
            .expect("valid toml");
        assert_eq!(cfg.entrypoint, "F_main");
        assert_eq!(cfg.entrypoint_arity, 2);
        assert_eq!(cfg.scheduler, SchedulerKind::Cooperative);
        assert_eq!(cfg.limits, ExecutionLimits::default());
    }

    #[test]
    fn scheduler_kind_serializes_snake_case() {
        let json = serde_json::to_string(&SchedulerKind::Threaded).unwrap();
        assert_eq!(json, "\"threaded\"");
    }
}
