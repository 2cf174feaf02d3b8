// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! bigo CLI - Main binary entry point
//!
//! Proves asymptotic inequalities with cvc5, optionally asking a language
//! model for a domain split or a computer-algebra system for a direct answer

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;

use bigo::collab::{
    check_bound_with_cas, check_bound_with_cas_on_subdomains, suggest_subdomains, ConsensusPolicy, GeminiClient,
    WolframScript,
};
use bigo::parser::{parse_conjunction, parse_expression, parse_statement};
use bigo::{BoundQuestion, Expr, ProofObligation, Prover, ProverOptions, TriggerStrategy, Verdict};

mod output;

use output::{OutputFormat, OutputFormatter};

/// bigo - discharge asymptotic inequalities f << g to cvc5
#[derive(Parser)]
#[command(name = "bigo")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Decision procedure settings shared by the subcommands
#[derive(Args)]
struct SolverArgs {
    /// Solver time budget in milliseconds
    #[arg(long)]
    tlimit: Option<u64>,

    /// Solver resource-unit budget
    #[arg(long)]
    rlimit: Option<u64>,

    /// Trigger strategy (use, trust, ignore)
    #[arg(long, default_value = "use")]
    triggers: TriggerStrategy,

    /// cvc5 executable path (override default)
    #[arg(long)]
    cvc5: Option<PathBuf>,
}

impl SolverArgs {
    fn options(&self) -> ProverOptions {
        let mut options = ProverOptions::from_env().with_triggers(self.triggers);
        if let Some(ms) = self.tlimit {
            options.limits.time_limit_ms = ms;
        }
        if let Some(units) = self.rlimit {
            options.limits.resource_limit = units;
        }
        if let Some(path) = &self.cvc5 {
            options.solver.executable = path.clone();
        }
        options
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Prove `conditions => exists C > 0. goal` for all other variables
    Prove {
        /// Goal, e.g. "a <= C*b"
        goal: String,

        /// Condition (repeatable), e.g. -c "a > 0"
        #[arg(short, long = "condition")]
        conditions: Vec<String>,

        /// Existential names
        #[arg(short, long = "exists", default_value = "C")]
        exists: Vec<String>,

        /// Witness NAME=VALUE for an existential (repeatable)
        #[arg(short, long = "witness")]
        witnesses: Vec<String>,

        /// Validate witnesses but do not substitute them
        #[arg(long)]
        no_witness_substitution: bool,

        /// Check with free constants and local log side conditions
        #[arg(long)]
        ground: bool,

        /// Print the SMT-LIB script instead of running it
        #[arg(long)]
        emit_smt: bool,

        #[command(flatten)]
        solver: SolverArgs,
    },

    /// Prove lhs << rhs on a domain
    Bound {
        lhs: String,
        rhs: String,

        /// Domain condition (repeatable)
        #[arg(short, long = "domain")]
        domain: Vec<String>,

        /// Prove separately on each subdomain (repeatable, conditions joined by &&)
        #[arg(short, long = "subdomain")]
        subdomains: Vec<String>,

        /// Ask the language model for subdomains
        #[arg(long)]
        ask_llm: bool,

        /// Consensus polling attempts for --ask-llm
        #[arg(long, default_value = "15")]
        max_attempts: usize,

        /// Ask wolframscript instead of cvc5, on each subdomain if any
        #[arg(long)]
        cas: bool,

        /// The CAS checks the constant 10^EXPONENT
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        cas_exponent: i32,

        #[command(flatten)]
        solver: SolverArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Disable colors if requested
    if cli.no_color {
        colored::control::set_override(false);
    }

    // Create output formatter
    let formatter = OutputFormatter::new(cli.format);

    let verdict = match cli.command {
        Commands::Prove {
            goal,
            conditions,
            exists,
            witnesses,
            no_witness_substitution,
            ground,
            emit_smt,
            solver,
        } => {
            let mut options = solver.options();
            options.witness_substitution = !no_witness_substitution;
            let request = ProveRequest {
                goal,
                conditions,
                exists,
                witnesses,
                ground,
                emit_smt,
            };
            prove_command(request, options, &formatter).await?
        }

        Commands::Bound {
            lhs,
            rhs,
            domain,
            subdomains,
            ask_llm,
            max_attempts,
            cas,
            cas_exponent,
            solver,
        } => {
            let question = BoundQuestion::parse(&domain, &lhs, &rhs)?;
            let policy = ConsensusPolicy { max_attempts };
            let pieces = collect_subdomains(&question, &subdomains, ask_llm, &policy, &formatter).await?;
            if cas {
                cas_command(&question, &pieces, cas_exponent, &formatter).await?
            } else {
                bound_command(&question, &pieces, solver.options(), &formatter).await?
            }
        }
    };

    std::process::exit(exit_code(verdict.as_ref()));
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::{fmt, prelude::*};

    let filter = if verbose {
        EnvFilter::new("bigo=debug,warn")
    } else {
        EnvFilter::new("bigo=info,warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// 0 proved (or nothing checked), 1 not proved, 2 unknown
fn exit_code(verdict: Option<&Verdict>) -> i32 {
    match verdict {
        None | Some(Verdict::Proved) => 0,
        Some(Verdict::Disproved) => 1,
        Some(Verdict::Unknown { .. }) => 2,
    }
}

struct ProveRequest {
    goal: String,
    conditions: Vec<String>,
    exists: Vec<String>,
    witnesses: Vec<String>,
    ground: bool,
    emit_smt: bool,
}

/// Prove command implementation
async fn prove_command(
    request: ProveRequest,
    options: ProverOptions,
    formatter: &OutputFormatter,
) -> Result<Option<Verdict>> {
    let prover = Prover::cvc5(options);

    if request.ground {
        let assumptions = request
            .conditions
            .iter()
            .map(|c| parse_statement(c))
            .collect::<Result<Vec<_>, _>>()?;
        let goal = parse_statement(&request.goal)?;
        let pb = create_progress_bar(formatter, "Checking ground statement...");
        let verdict = prover.check_ground(&assumptions, &goal).await;
        pb.finish_and_clear();
        let verdict = verdict.context("Ground check failed")?;
        formatter.verdict(&goal.to_string(), &verdict)?;
        return Ok(Some(verdict));
    }

    let mut obligation =
        ProofObligation::parse(&request.conditions, &request.goal)?.with_existentials(request.exists);
    for witness in &request.witnesses {
        let (name, value) = witness
            .split_once('=')
            .ok_or_else(|| anyhow!("Witness must look like NAME=VALUE, got {:?}", witness))?;
        obligation = obligation.with_witness(name.trim(), parse_expression(value)?)?;
    }
    let subject = obligation.goal.to_string();

    if request.emit_smt {
        formatter.script(&prover.render_script(obligation)?)?;
        return Ok(None);
    }

    info!("Proving {}", subject);
    let pb = create_progress_bar(formatter, "Waiting for cvc5...");
    let verdict = prover.prove(obligation).await;
    pb.finish_and_clear();
    let verdict = verdict.context("Proof attempt failed")?;
    formatter.verdict(&subject, &verdict)?;
    Ok(Some(verdict))
}

/// Subdomains from `--subdomain` plus, with `--ask-llm`, the model's split
async fn collect_subdomains(
    question: &BoundQuestion,
    subdomains: &[String],
    ask_llm: bool,
    policy: &ConsensusPolicy,
    formatter: &OutputFormatter,
) -> Result<Vec<Vec<Expr>>> {
    let mut pieces = subdomains
        .iter()
        .map(|s| parse_conjunction(s))
        .collect::<Result<Vec<_>, _>>()?;

    if ask_llm {
        let model = GeminiClient::from_env()?;
        let pb = create_progress_bar(formatter, "Polling the language model for subdomains...");
        let suggested = suggest_subdomains(&model, question, policy).await;
        pb.finish_and_clear();
        match suggested? {
            Some(found) => pieces.extend(found),
            None => bail!("Language model gave no consistent subdomains in {} attempts", policy.max_attempts),
        }
    }
    Ok(pieces)
}

/// Bound command implementation
async fn bound_command(
    question: &BoundQuestion,
    pieces: &[Vec<Expr>],
    options: ProverOptions,
    formatter: &OutputFormatter,
) -> Result<Option<Verdict>> {
    let prover = Prover::cvc5(options);
    let subject = question.to_string();

    if pieces.is_empty() {
        let pb = create_progress_bar(formatter, "Waiting for cvc5...");
        let verdict = prover.prove_bound(question).await;
        pb.finish_and_clear();
        let verdict = verdict.context("Proof attempt failed")?;
        formatter.verdict(&subject, &verdict)?;
        return Ok(Some(verdict));
    }

    formatter.section(&format!("Proving on {} subdomains", pieces.len()))?;
    let pb = create_progress_bar(formatter, "Waiting for cvc5...");
    let report = prover.prove_bound_on_subdomains(question, pieces).await;
    pb.finish_and_clear();
    let report = report.context("Proof attempt failed")?;
    formatter.subdomain_report(&subject, &report)?;
    Ok(Some(report.verdict()))
}

/// CAS command implementation
async fn cas_command(
    question: &BoundQuestion,
    pieces: &[Vec<Expr>],
    exponent: i32,
    formatter: &OutputFormatter,
) -> Result<Option<Verdict>> {
    let cas = WolframScript::locate()?;
    info!("Using {}", cas.executable().display());
    let subject = question.to_string();

    let verdict = if pieces.is_empty() {
        let pb = create_progress_bar(formatter, "Waiting for wolframscript...");
        let verdict = check_bound_with_cas(&cas, question, exponent).await;
        pb.finish_and_clear();
        let verdict = verdict?;
        formatter.verdict(&subject, &verdict)?;
        verdict
    } else {
        formatter.section(&format!("Checking {} subdomains with the CAS", pieces.len()))?;
        let pb = create_progress_bar(formatter, "Waiting for wolframscript...");
        let report = check_bound_with_cas_on_subdomains(&cas, question, pieces, exponent).await;
        pb.finish_and_clear();
        let report = report?;
        formatter.subdomain_report(&subject, &report)?;
        report.verdict()
    };
    if verdict == Verdict::Disproved {
        formatter.warning(&format!("The bound fails for C = 10^{}; other constants were not tried", exponent))?;
    }
    Ok(Some(verdict))
}

fn create_progress_bar(formatter: &OutputFormatter, message: &str) -> ProgressBar {
    if formatter.format() == OutputFormat::Json {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
