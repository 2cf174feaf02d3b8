// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Decision procedure backends
//!
//! The script is written to the solver's stdin and its stdout is scanned
//! for the `check-sat` answer and the `:reason-unknown` info line.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::{ResourceLimits, SolverConfig};
use crate::core::Verdict;
use crate::error::{ProverError, ProverResult};

/// Raw answer to `(check-sat)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverOutcome {
    Unsat,
    Sat,
    Unknown(String),
}

impl SolverOutcome {
    /// Refutation reading: the negated statement was checked
    pub fn into_verdict(self) -> Verdict {
        match self {
            SolverOutcome::Unsat => Verdict::Proved,
            SolverOutcome::Sat => Verdict::Disproved,
            SolverOutcome::Unknown(reason) => Verdict::Unknown { reason },
        }
    }
}

/// Anything that can decide an SMT-LIB script
#[async_trait]
pub trait DecisionProcedure: Send + Sync {
    fn name(&self) -> &str;

    /// Run `script`; exhausting `limits` yields `Unknown`, not an error
    async fn run(&self, script: &str, limits: &ResourceLimits) -> ProverResult<SolverOutcome>;
}

/// cvc5 driven as a child process
pub struct Cvc5Solver {
    config: SolverConfig,
}

impl Cvc5Solver {
    pub fn new(config: SolverConfig) -> Self {
        Cvc5Solver { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// `cvc5 --version`, first line
    pub async fn version(&self) -> ProverResult<String> {
        let output = Command::new(&self.config.executable)
            .arg("--version")
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or("").trim().to_string())
    }

    fn spawn_error(&self, e: std::io::Error) -> ProverError {
        ProverError::Solver(format!("failed to start {}: {}", self.config.executable.display(), e))
    }
}

impl Default for Cvc5Solver {
    fn default() -> Self {
        Cvc5Solver::new(SolverConfig::default())
    }
}

#[async_trait]
impl DecisionProcedure for Cvc5Solver {
    fn name(&self) -> &str {
        "cvc5"
    }

    async fn run(&self, script: &str, limits: &ResourceLimits) -> ProverResult<SolverOutcome> {
        let mut child = Command::new(&self.config.executable)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProverError::Solver("failed to open solver stdin".to_string()))?;

        // stdout is drained while the script is still being written
        let feed = async move {
            stdin.write_all(script.as_bytes()).await?;
            stdin.flush().await
        };
        let exchange = async {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            match fed {
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("{} closed its stdin early", self.name());
                }
                other => other?,
            }
            output
        };

        let wall_clock = Duration::from_millis(limits.wall_clock_ms());
        debug!("Waiting up to {:?} for {}", wall_clock, self.name());

        tokio::select! {
            output = exchange => {
                let output = output?;
                let stdout = String::from_utf8_lossy(&output.stdout);
                match parse_output(&stdout) {
                    Ok(outcome) => Ok(outcome),
                    Err(e) if !output.status.success() => {
                        let stderr = String::from_utf8_lossy(&output.stderr);
                        let detail = if stderr.trim().is_empty() { stdout.trim().to_string() } else { stderr.trim().to_string() };
                        Err(ProverError::Solver(format!("{} ({}): {}", e, output.status, detail)))
                    }
                    Err(e) => Err(e),
                }
            }
            _ = tokio::time::sleep(wall_clock) => {
                // dropping the exchange future kills the child
                warn!("{} exceeded the wall-clock limit of {:?}", self.name(), wall_clock);
                Ok(SolverOutcome::Unknown(format!("wall-clock timeout after {} ms", limits.wall_clock_ms())))
            }
        }
    }
}

/// Scan solver output for the `check-sat` answer
///
/// An `(error ...)` line before the answer is a solver error. Errors after
/// the answer come from `get-info` following `sat`/`unsat` and are ignored.
pub fn parse_output(stdout: &str) -> ProverResult<SolverOutcome> {
    let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
    let answer = loop {
        match lines.next() {
            Some("unsat") => return Ok(SolverOutcome::Unsat),
            Some("sat") => return Ok(SolverOutcome::Sat),
            Some("unknown") => break "unknown",
            Some(line) if line.starts_with("(error") => {
                return Err(ProverError::Solver(line.to_string()));
            }
            Some(_) => continue,
            None => {
                return Err(ProverError::Solver(format!(
                    "no check-sat answer in solver output: {:?}",
                    stdout.trim()
                )))
            }
        }
    };

    let reason = lines
        .find_map(|line| line.strip_prefix("(:reason-unknown"))
        .map(|rest| rest.trim_end_matches(')').trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| answer.to_string());
    Ok(SolverOutcome::Unknown(reason))
}
