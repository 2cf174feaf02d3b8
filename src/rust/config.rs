// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prover configuration
//!
//! Plain values passed per call. Nothing here is persisted.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

use crate::core::RATE_CONSTANT;

/// Time and work-unit budget for one check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Solver time budget in milliseconds (`:tlimit-per`)
    pub time_limit_ms: u64,

    /// Abstract resource units (`:rlimit-per`)
    pub resource_limit: u64,

    /// Extra wall-clock time before the child process is killed
    pub grace_ms: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        ResourceLimits {
            time_limit_ms: 10_000,
            resource_limit: 200_000,
            grace_ms: 2_000,
        }
    }
}

impl ResourceLimits {
    pub fn wall_clock_ms(&self) -> u64 {
        self.time_limit_ms.saturating_add(self.grace_ms)
    }
}

/// How user-supplied instantiation patterns are treated by the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerStrategy {
    /// Use the given patterns alongside automatic trigger selection
    #[default]
    Use,
    /// Trust the given patterns and select all candidate triggers
    Trust,
    /// Ignore the given patterns
    Ignore,
}

impl TriggerStrategy {
    /// `(option, value)` pairs emitted before `set-logic`
    pub fn solver_options(&self) -> Vec<(&'static str, &'static str)> {
        match self {
            TriggerStrategy::Use => vec![("user-pat", "use")],
            TriggerStrategy::Trust => vec![
                ("user-pat", "trust"),
                ("trigger-sel", "all"),
                ("trigger-active-sel", "all"),
            ],
            TriggerStrategy::Ignore => vec![("user-pat", "ignore")],
        }
    }
}

impl FromStr for TriggerStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "use" => Ok(TriggerStrategy::Use),
            "trust" => Ok(TriggerStrategy::Trust),
            "ignore" => Ok(TriggerStrategy::Ignore),
            _ => Err(format!("Unknown trigger strategy: {}. Use 'use', 'trust', or 'ignore'", s)),
        }
    }
}

impl std::fmt::Display for TriggerStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerStrategy::Use => write!(f, "use"),
            TriggerStrategy::Trust => write!(f, "trust"),
            TriggerStrategy::Ignore => write!(f, "ignore"),
        }
    }
}

/// Decision procedure executable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Path to the cvc5 executable
    pub executable: PathBuf,

    /// Additional arguments
    pub args: Vec<String>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            executable: PathBuf::from("cvc5"),
            args: vec!["--lang=smt2".to_string()],
        }
    }
}

/// Options for one [`crate::driver::Prover`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProverOptions {
    pub limits: ResourceLimits,
    pub triggers: TriggerStrategy,

    /// Substitute supplied witnesses before building the formula
    pub witness_substitution: bool,

    /// Existential that receives an automatic `> 0` constraint
    pub rate_constant: String,

    pub solver: SolverConfig,
}

impl Default for ProverOptions {
    fn default() -> Self {
        ProverOptions {
            limits: ResourceLimits::default(),
            triggers: TriggerStrategy::default(),
            witness_substitution: true,
            rate_constant: RATE_CONSTANT.to_string(),
            solver: SolverConfig::default(),
        }
    }
}

impl ProverOptions {
    /// Defaults overlaid with `BIGO_CVC5`, `BIGO_TLIMIT_MS`, `BIGO_RLIMIT`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = ProverOptions::default();
        if let Some(path) = lookup("BIGO_CVC5") {
            options.solver.executable = PathBuf::from(path);
        }
        if let Some(value) = lookup("BIGO_TLIMIT_MS") {
            match value.parse() {
                Ok(ms) => options.limits.time_limit_ms = ms,
                Err(_) => warn!("Ignoring BIGO_TLIMIT_MS={:?}: not a number", value),
            }
        }
        if let Some(value) = lookup("BIGO_RLIMIT") {
            match value.parse() {
                Ok(units) => options.limits.resource_limit = units,
                Err(_) => warn!("Ignoring BIGO_RLIMIT={:?}: not a number", value),
            }
        }
        options
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_triggers(mut self, triggers: TriggerStrategy) -> Self {
        self.triggers = triggers;
        self
    }
}
