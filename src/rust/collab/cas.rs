// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Computer-algebra collaborator
//!
//! Text protocol: send Wolfram Language code, receive its rendering.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::core::{BoundQuestion, Expr, Verdict};
use crate::driver::{SubdomainReport, SubdomainVerdict};
use crate::error::ProverError;

/// Rendering requested from the CAS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputForm {
    #[default]
    Input,
    Full,
    Output,
}

impl OutputForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputForm::Input => "InputForm",
            OutputForm::Full => "FullForm",
            OutputForm::Output => "OutputForm",
        }
    }
}

#[async_trait]
pub trait ComputerAlgebra: Send + Sync {
    /// Evaluate `expr` and render the result in `form`
    async fn eval(&self, expr: &str, form: OutputForm) -> Result<String>;

    /// Evaluate `expr` and decode its JSON export
    async fn eval_json(&self, expr: &str) -> Result<serde_json::Value>;

    /// Evaluate a predicate; only the literals `True` and `False` are accepted
    async fn eval_bool(&self, expr: &str) -> Result<bool> {
        let out = self.eval(expr, OutputForm::Input).await?;
        match out.as_str() {
            "True" => Ok(true),
            "False" => Ok(false),
            _ => Err(ProverError::UnexpectedOutput(out).into()),
        }
    }
}

const COMMON_LOCATIONS: &[&str] = &["/usr/local/bin/wolframscript", "/opt/homebrew/bin/wolframscript"];

/// `wolframscript -code ...` runner
pub struct WolframScript {
    executable: PathBuf,
    timeout: Duration,
}

impl WolframScript {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        WolframScript {
            executable: executable.into(),
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Locate via `$WOLFRAMSCRIPT`, then `PATH`, then common install paths
    pub fn locate() -> Result<Self> {
        if let Some(path) = std::env::var_os("WOLFRAMSCRIPT").map(PathBuf::from) {
            if path.is_file() {
                return Ok(Self::new(path));
            }
        }
        if let Ok(path) = which::which("wolframscript") {
            return Ok(Self::new(path));
        }
        COMMON_LOCATIONS
            .iter()
            .map(Path::new)
            .find(|p| p.is_file())
            .map(Self::new)
            .ok_or_else(|| anyhow!("wolframscript not found. Set $WOLFRAMSCRIPT or ensure it's on PATH"))
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    async fn run(&self, code: &str) -> Result<String> {
        debug!("wolframscript -code {}", code);
        // DYLD* variables from the parent break the Wolfram kernel launch
        let env: Vec<(String, String)> = std::env::vars().filter(|(k, _)| !k.starts_with("DYLD")).collect();
        let child = Command::new(&self.executable)
            .arg("-code")
            .arg(code)
            .env_clear()
            .envs(env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.executable.display()))?;

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| anyhow!("wolframscript timeout after {:?}", self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("wolframscript failed ({}): {}", output.status, stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl ComputerAlgebra for WolframScript {
    async fn eval(&self, expr: &str, form: OutputForm) -> Result<String> {
        self.run(&format!("ToString[({}), {}]", expr, form.as_str())).await
    }

    async fn eval_json(&self, expr: &str) -> Result<serde_json::Value> {
        let text = self.run(&format!("ExportString[({}), \"JSON\"]", expr)).await?;
        serde_json::from_str(&text).with_context(|| format!("wolframscript returned non-JSON: {:?}", text))
    }
}

/// `Resolve[ForAll[vars, Implies[domain, lhs <= 10^c*(rhs)]], Reals]`
pub fn bound_query(question: &BoundQuestion, c: i32) -> String {
    let vars: Vec<String> = question.variables().into_iter().collect();
    let domain = if question.domain.is_empty() {
        "True".to_string()
    } else {
        let parts: Vec<String> = question.domain.iter().map(|d| d.to_wolfram()).collect();
        parts.join(" && ")
    };
    let body = format!(
        "Implies[{}, {} <= 10^({})*({})]",
        domain,
        question.lhs.to_wolfram(),
        c,
        question.rhs.to_wolfram()
    );
    if vars.is_empty() {
        format!("Resolve[{}, Reals]", body)
    } else {
        format!("Resolve[ForAll[{{{}}}, {}], Reals]", vars.join(", "), body)
    }
}

/// Decide the bound with the fixed constant `10^c`
///
/// `Disproved` only rules out that constant. A CAS answer other than
/// `True`/`False` is reported as `Unknown`.
pub async fn check_bound_with_cas<A: ComputerAlgebra + ?Sized>(
    cas: &A,
    question: &BoundQuestion,
    c: i32,
) -> Result<Verdict> {
    let query = bound_query(question, c);
    info!("Asking the CAS: {}", question);
    match cas.eval_bool(&query).await {
        Ok(true) => Ok(Verdict::Proved),
        Ok(false) => Ok(Verdict::Disproved),
        Err(e) => match e.downcast::<ProverError>() {
            Ok(ProverError::UnexpectedOutput(out)) => Ok(Verdict::Unknown {
                reason: format!("CAS returned {:?}", out),
            }),
            Ok(other) => Err(other.into()),
            Err(e) => Err(e),
        },
    }
}

/// [`check_bound_with_cas`] on `domain and subdomain` for each subdomain
pub async fn check_bound_with_cas_on_subdomains<A: ComputerAlgebra + ?Sized>(
    cas: &A,
    question: &BoundQuestion,
    subdomains: &[Vec<Expr>],
    c: i32,
) -> Result<SubdomainReport> {
    let mut results = Vec::with_capacity(subdomains.len());
    for subdomain in subdomains {
        let verdict = check_bound_with_cas(cas, &question.restricted(subdomain), c).await?;
        results.push(SubdomainVerdict {
            subdomain: subdomain.iter().map(|e| e.to_string()).collect(),
            verdict,
        });
    }
    Ok(SubdomainReport::new(results))
}
