// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! One proof attempt against the decision procedure
//!
//! A [`ProofSession`] moves through `Built -> Negated -> Checked` and is
//! consumed by [`ProofSession::check`]. Every session gets a fresh id; the
//! `LOG` handle and all variable handles carry that id and are rejected by
//! any other session.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use super::axioms::{self, Axiom};
use super::compiler::{compile, VariableEnv};
use super::quantifier::{self, Partition};
use super::solver::DecisionProcedure;
use super::term::{quote_symbol, user_symbol, SmtTerm};
use crate::config::{ResourceLimits, TriggerStrategy};
use crate::core::{Expr, ProofObligation, Verdict};
use crate::error::{ProverError, ProverResult};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Name of the uninterpreted logarithm
pub const LOG_NAME: &str = "LOG";

/// Handle for the session's uninterpreted `LOG: Real -> Real`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninterpretedFn {
    name: &'static str,
    session: u64,
}

impl UninterpretedFn {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn apply(&self, arg: SmtTerm) -> SmtTerm {
        SmtTerm::Apply {
            func: self.name.to_string(),
            args: vec![arg],
        }
    }
}

/// Session-owned state the compiler reads and extends
#[derive(Debug)]
pub struct SessionContext {
    id: u64,
    log_fn: Option<UninterpretedFn>,
    constants: Vec<String>,
    side_conditions: Vec<SmtTerm>,
    /// Script spelling to user name, for every compiled variable
    symbols: BTreeMap<String, String>,
}

impl SessionContext {
    pub(crate) fn new() -> Self {
        SessionContext {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            log_fn: None,
            constants: Vec::new(),
            side_conditions: Vec::new(),
            symbols: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The `LOG` handle, declared on first use
    pub fn log_function(&mut self) -> &UninterpretedFn {
        let id = self.id;
        self.log_fn.get_or_insert_with(|| {
            debug!("Session {}: declaring {}", id, LOG_NAME);
            UninterpretedFn {
                name: LOG_NAME,
                session: id,
            }
        })
    }

    /// Declare a free real constant once
    pub fn declare_constant(&mut self, name: &str) {
        if !self.constants.iter().any(|c| c == name) {
            self.constants.push(name.to_string());
        }
    }

    pub fn constants(&self) -> &[String] {
        &self.constants
    }

    pub fn push_side_condition(&mut self, term: SmtTerm) {
        self.side_conditions.push(term);
    }

    pub fn side_conditions(&self) -> &[SmtTerm] {
        &self.side_conditions
    }

    /// Remember how user variable `name` is spelled in the script
    pub fn register_symbol(&mut self, name: &str) {
        let raw = user_symbol(name);
        self.symbols.insert(quote_symbol(&raw), name.to_string());
        self.symbols.insert(raw, name.to_string());
    }

    /// User name behind a script spelling such as `v_x` or `|v_α|`
    pub fn user_name(&self, spelling: &str) -> Option<&str> {
        self.symbols.get(spelling).map(String::as_str)
    }

    /// Rewrite script spellings in solver text back to user names
    pub fn to_user_text(&self, text: &str) -> String {
        let mut spellings: Vec<(&String, &String)> = self.symbols.iter().collect();
        spellings.sort_by_key(|(spelling, _)| std::cmp::Reverse(spelling.len()));
        spellings
            .into_iter()
            .fold(text.to_string(), |acc, (spelling, name)| acc.replace(spelling.as_str(), name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Built,
    Negated,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Open => "open",
            Phase::Built => "built",
            Phase::Negated => "negated",
        }
    }
}

pub struct ProofSession {
    ctx: SessionContext,
    phase: Phase,
    limits: ResourceLimits,
    triggers: TriggerStrategy,
    axioms: Vec<Axiom>,
    assumptions: Vec<SmtTerm>,
    formula: Option<SmtTerm>,
    partition: Option<Partition>,
}

impl ProofSession {
    pub fn new(limits: ResourceLimits, triggers: TriggerStrategy) -> Self {
        let ctx = SessionContext::new();
        info!("Opening proof session {}", ctx.id);
        ProofSession {
            ctx,
            phase: Phase::Open,
            limits,
            triggers,
            axioms: Vec::new(),
            assumptions: Vec::new(),
            formula: None,
            partition: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.ctx.id
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn partition(&self) -> Option<&Partition> {
        self.partition.as_ref()
    }

    pub fn formula(&self) -> Option<&SmtTerm> {
        self.formula.as_ref()
    }

    fn expect_phase(&self, expected: Phase) -> ProverResult<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(ProverError::SessionState {
                expected: expected.name(),
                actual: self.phase.name(),
            })
        }
    }

    fn assert_axioms(&mut self) {
        let log = self.ctx.log_function().clone();
        self.axioms = axioms::library(&log);
        debug!("Session {}: asserted {} axioms", self.ctx.id, self.axioms.len());
    }

    /// Assert the axioms and build the quantified formula for `obligation`
    pub fn build(&mut self, obligation: &ProofObligation, rate_constant: &str) -> ProverResult<()> {
        self.expect_phase(Phase::Open)?;
        self.assert_axioms();
        let (formula, partition) = quantifier::build_formula(obligation, &mut self.ctx, rate_constant)?;
        info!(
            "Session {}: forall {:?} exists {:?}",
            self.ctx.id, partition.universals, partition.existentials
        );
        self.formula = Some(formula);
        self.partition = Some(partition);
        self.phase = Phase::Built;
        Ok(())
    }

    /// Ground mode: free constants, local `LOG` side conditions,
    /// assumptions asserted directly
    pub fn build_ground(&mut self, assumptions: &[Expr], goal: &Expr) -> ProverResult<()> {
        self.expect_phase(Phase::Open)?;
        self.assert_axioms();
        let mut env = VariableEnv::new(self.ctx.id);
        for assumption in assumptions {
            quantifier::require_relation(assumption)?;
            let term = compile(assumption, &mut env, &mut self.ctx, true)?;
            self.assumptions.push(term);
        }
        quantifier::require_relation(goal)?;
        self.formula = Some(compile(goal, &mut env, &mut self.ctx, true)?);
        self.phase = Phase::Built;
        Ok(())
    }

    /// Replace the formula by its negation as the sole proof goal
    pub fn negate(&mut self) -> ProverResult<()> {
        self.expect_phase(Phase::Built)?;
        self.formula = self.formula.take().map(SmtTerm::not);
        self.phase = Phase::Negated;
        Ok(())
    }

    /// The complete script for the negated obligation
    pub fn to_smtlib(&self) -> ProverResult<String> {
        self.expect_phase(Phase::Negated)?;
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = self.write_script(&mut out);
        Ok(out)
    }

    fn write_script(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "(set-option :tlimit-per {})", self.limits.time_limit_ms)?;
        writeln!(out, "(set-option :rlimit-per {})", self.limits.resource_limit)?;
        for (option, value) in self.triggers.solver_options() {
            writeln!(out, "(set-option :{} {})", option, value)?;
        }
        writeln!(out, "(set-logic ALL)")?;
        if let Some(log) = &self.ctx.log_fn {
            writeln!(out, "(declare-fun {} (Real) Real)", log.name)?;
        }
        for name in &self.ctx.constants {
            writeln!(out, "(declare-const {} Real)", quote_symbol(&user_symbol(name)))?;
        }
        for axiom in &self.axioms {
            writeln!(out, "; {}", axiom.name)?;
            writeln!(out, "(assert {})", axiom.formula)?;
        }
        for term in self.ctx.side_conditions.iter().chain(self.assumptions.iter()) {
            writeln!(out, "(assert {})", term)?;
        }
        if let Some(formula) = &self.formula {
            writeln!(out, "(assert {})", formula)?;
        }
        writeln!(out, "(check-sat)")?;
        writeln!(out, "(get-info :reason-unknown)")?;
        writeln!(out, "(exit)")
    }

    /// Run the decision procedure; the session is torn down afterwards
    pub async fn check<S: DecisionProcedure + ?Sized>(self, solver: &S) -> ProverResult<Verdict> {
        let script = self.to_smtlib()?;
        info!("Session {}: checking with {}", self.ctx.id, solver.name());
        let outcome = solver.run(&script, &self.limits).await.map_err(|e| match e {
            ProverError::Solver(message) => ProverError::Solver(self.ctx.to_user_text(&message)),
            other => other,
        })?;
        let verdict = outcome.into_verdict();
        info!("Session {}: {}", self.ctx.id, verdict);
        Ok(verdict)
    }
}

impl Drop for ProofSession {
    fn drop(&mut self) {
        debug!("Closing proof session {}", self.ctx.id);
    }
}
