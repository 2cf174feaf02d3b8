// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Proof driver
//!
//! Each call opens its own [`ProofSession`], runs it to a verdict and drops
//! it. Nothing is cached between calls.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ProverOptions;
use crate::core::{BoundQuestion, Expr, ProofObligation, Verdict};
use crate::error::ProverResult;
use crate::smt::{Cvc5Solver, DecisionProcedure, ProofSession};

/// Verdict for one piece of a split domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubdomainVerdict {
    /// The subdomain's conditions, rendered
    pub subdomain: Vec<String>,
    pub verdict: Verdict,
}

/// Result of proving a bound piecewise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubdomainReport {
    pub results: Vec<SubdomainVerdict>,
    /// Every subdomain proved; `false` when there were none
    pub proved_everywhere: bool,
}

impl SubdomainReport {
    pub fn new(results: Vec<SubdomainVerdict>) -> Self {
        let proved_everywhere = !results.is_empty() && results.iter().all(|r| r.verdict.is_proved());
        SubdomainReport {
            results,
            proved_everywhere,
        }
    }

    /// Overall verdict: proved everywhere, disproved on some piece, or unknown
    pub fn verdict(&self) -> Verdict {
        if self.proved_everywhere {
            Verdict::Proved
        } else if self.results.iter().any(|r| r.verdict == Verdict::Disproved) {
            Verdict::Disproved
        } else {
            Verdict::Unknown {
                reason: "some subdomains undecided".to_string(),
            }
        }
    }
}

pub struct Prover<S: DecisionProcedure = Cvc5Solver> {
    solver: S,
    options: ProverOptions,
}

impl Prover<Cvc5Solver> {
    /// Prover backed by the cvc5 executable named in `options`
    pub fn cvc5(options: ProverOptions) -> Self {
        Prover::new(Cvc5Solver::new(options.solver.clone()), options)
    }
}

impl<S: DecisionProcedure> Prover<S> {
    pub fn new(solver: S, options: ProverOptions) -> Self {
        Prover { solver, options }
    }

    pub fn options(&self) -> &ProverOptions {
        &self.options
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Witness pass; runs before any session exists
    fn prepare(&self, obligation: ProofObligation) -> ProverResult<ProofObligation> {
        if obligation.witness.is_empty() {
            return Ok(obligation);
        }
        if !self.options.witness_substitution {
            obligation.validate_witnesses()?;
            warn!(
                "Witness substitution is disabled; ignoring witnesses for {:?}",
                obligation.witness.keys().collect::<Vec<_>>()
            );
            return Ok(ProofObligation {
                witness: Default::default(),
                ..obligation
            });
        }
        for (name, value) in &obligation.witness {
            info!("Substituting witness {} = {}", name, value);
        }
        obligation.apply_witnesses()
    }

    fn negated_session(&self, obligation: &ProofObligation) -> ProverResult<ProofSession> {
        let mut session = ProofSession::new(self.options.limits, self.options.triggers);
        session.build(obligation, &self.options.rate_constant)?;
        session.negate()?;
        Ok(session)
    }

    /// Decide `forall U. conditions => exists E. goal`
    pub async fn prove(&self, obligation: ProofObligation) -> ProverResult<Verdict> {
        let obligation = self.prepare(obligation)?;
        let session = self.negated_session(&obligation)?;
        session.check(&self.solver).await
    }

    /// Parse an obligation whose existential set is the configured rate
    /// constant
    pub fn obligation<T: AsRef<str>>(&self, conditions: &[T], goal: &str) -> ProverResult<ProofObligation> {
        Ok(ProofObligation::parse(conditions, goal)?.with_existentials([self.options.rate_constant.clone()]))
    }

    /// Text front end: parse, attach an optional witness for the rate
    /// constant, and prove
    pub async fn prove_statements<T: AsRef<str>>(
        &self,
        conditions: &[T],
        goal: &str,
        existentials: &[&str],
        witness: Option<Expr>,
    ) -> ProverResult<Verdict> {
        let mut obligation = ProofObligation::parse(conditions, goal)?.with_existentials(existentials.iter().copied());
        if let Some(value) = witness {
            obligation = obligation.with_witness(&self.options.rate_constant, value)?;
        }
        self.prove(obligation).await
    }

    /// Ground check: `assumptions => goal` over free constants, with local
    /// `LOG` side conditions
    pub async fn check_ground(&self, assumptions: &[Expr], goal: &Expr) -> ProverResult<Verdict> {
        let mut session = ProofSession::new(self.options.limits, self.options.triggers);
        session.build_ground(assumptions, goal)?;
        session.negate()?;
        session.check(&self.solver).await
    }

    /// The script `prove` would send, without running it
    pub fn render_script(&self, obligation: ProofObligation) -> ProverResult<String> {
        let obligation = self.prepare(obligation)?;
        self.negated_session(&obligation)?.to_smtlib()
    }

    /// `domain => exists C > 0. lhs <= C*rhs`
    pub async fn prove_bound(&self, question: &BoundQuestion) -> ProverResult<Verdict> {
        info!("Proving {}", question);
        self.prove(question.obligation(&self.options.rate_constant)?).await
    }

    /// Prove the bound separately on `domain and subdomain` for each
    /// subdomain, one session per piece
    pub async fn prove_bound_on_subdomains(
        &self,
        question: &BoundQuestion,
        subdomains: &[Vec<Expr>],
    ) -> ProverResult<SubdomainReport> {
        let mut results = Vec::with_capacity(subdomains.len());
        for subdomain in subdomains {
            let verdict = self.prove_bound(&question.restricted(subdomain)).await?;
            results.push(SubdomainVerdict {
                subdomain: subdomain.iter().map(|e| e.to_string()).collect(),
                verdict,
            });
        }
        Ok(SubdomainReport::new(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceLimits;
    use crate::error::ProverError;
    use crate::parser::{parse_conjunction, parse_statement};
    use crate::smt::SolverOutcome;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned outcomes and records every script it is given
    struct ScriptedSolver {
        outcomes: Mutex<Vec<SolverOutcome>>,
        scripts: Mutex<Vec<String>>,
    }

    impl ScriptedSolver {
        fn new(outcomes: Vec<SolverOutcome>) -> Self {
            ScriptedSolver {
                outcomes: Mutex::new(outcomes.into_iter().rev().collect()),
                scripts: Mutex::new(Vec::new()),
            }
        }

        fn scripts(&self) -> Vec<String> {
            self.scripts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DecisionProcedure for ScriptedSolver {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn run(&self, script: &str, _limits: &ResourceLimits) -> ProverResult<SolverOutcome> {
            self.scripts.lock().unwrap().push(script.to_string());
            Ok(self
                .outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| SolverOutcome::Unknown("exhausted".to_string())))
        }
    }

    fn prover(outcomes: Vec<SolverOutcome>) -> Prover<ScriptedSolver> {
        Prover::new(ScriptedSolver::new(outcomes), ProverOptions::default())
    }

    #[tokio::test]
    async fn test_unsat_means_proved() {
        let p = prover(vec![SolverOutcome::Unsat]);
        let verdict = p
            .prove_statements(&["a > 0", "b > 0", "a <= b"], "exp(a) <= exp(b)", &["C"], None)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Proved);
        let scripts = p.solver().scripts();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].contains("(assert (not (forall ((v_a Real) (v_b Real))"));
    }

    #[tokio::test]
    async fn test_sat_means_disproved_and_unknown_is_not_an_error() {
        let p = prover(vec![SolverOutcome::Sat, SolverOutcome::Unknown("timeout".into())]);
        let first = p.prove_statements(&["a > 0"], "a < a", &["C"], None).await.unwrap();
        assert_eq!(first, Verdict::Disproved);
        let second = p.prove_statements(&["a > 0"], "a < a", &["C"], None).await.unwrap();
        assert_eq!(second, Verdict::Unknown { reason: "timeout".into() });
    }

    #[tokio::test]
    async fn test_witness_is_substituted_before_building() {
        let p = prover(vec![SolverOutcome::Unsat]);
        p.prove_statements(&["a > 0", "b > 0", "a <= 2*b"], "a <= C*b", &["C"], Some(Expr::integer(2)))
            .await
            .unwrap();
        let script = &p.solver().scripts()[0];
        assert!(!script.contains("exists"));
        assert!(script.contains("(<= v_a (* 2.0 v_b))"));
    }

    #[tokio::test]
    async fn test_invalid_witness_fails_before_any_session() {
        let p = prover(vec![]);
        let err = p
            .prove_statements(&["a > 0"], "a <= C*a", &["C"], Some(Expr::integer(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, ProverError::InvalidWitness { .. }));
        assert!(p.solver().scripts().is_empty());
    }

    #[tokio::test]
    async fn test_witness_ignored_when_substitution_disabled() {
        let options = ProverOptions {
            witness_substitution: false,
            ..ProverOptions::default()
        };
        let p = Prover::new(ScriptedSolver::new(vec![SolverOutcome::Unsat]), options);
        p.prove_statements(&["a > 0", "b > 0"], "a <= C*b", &["C"], Some(Expr::integer(2)))
            .await
            .unwrap();
        assert!(p.solver().scripts()[0].contains("(exists ((v_C Real))"));
    }

    #[tokio::test]
    async fn test_malformed_input_reaches_no_solver() {
        let p = prover(vec![]);
        let err = p.prove_statements(&["a > (0"], "a <= C", &["C"], None).await.unwrap_err();
        assert!(matches!(err, ProverError::MalformedExpression { .. }));
        assert!(p.solver().scripts().is_empty());
    }

    #[tokio::test]
    async fn test_check_ground_uses_free_constants() {
        let p = prover(vec![SolverOutcome::Unsat]);
        let verdict = p
            .check_ground(
                &[parse_statement("x > 0").unwrap()],
                &parse_statement("exp(log(x)) = x").unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Proved);
        let script = &p.solver().scripts()[0];
        assert!(script.contains("(declare-const v_x Real)"));
        assert!(script.contains("(assert (= (exp (LOG v_x)) v_x))"));
    }

    #[test]
    fn test_render_script_does_not_run() {
        let p = prover(vec![]);
        let obligation = ProofObligation::parse(&["x > 0"], "x <= C*exp(x)").unwrap();
        let script = p.render_script(obligation).unwrap();
        assert!(script.starts_with("(set-option :tlimit-per"));
        assert!(script.trim_end().ends_with("(exit)"));
        assert!(p.solver().scripts().is_empty());
    }

    #[tokio::test]
    async fn test_subdomain_report() {
        let p = prover(vec![SolverOutcome::Unsat, SolverOutcome::Unknown("incomplete".into())]);
        let question = BoundQuestion::parse(&["x > 0"], "x", "exp(x)").unwrap();
        let pieces = vec![
            parse_conjunction("x <= 1").unwrap(),
            parse_conjunction("x >= 1").unwrap(),
        ];
        let report = p.prove_bound_on_subdomains(&question, &pieces).await.unwrap();
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].verdict, Verdict::Proved);
        assert!(!report.proved_everywhere);
        let scripts = p.solver().scripts();
        assert!(scripts[0].contains("(<= v_x 1.0)"));
        assert!(scripts[1].contains("(>= v_x 1.0)"));

        let empty = p.prove_bound_on_subdomains(&question, &[]).await.unwrap();
        assert!(!empty.proved_everywhere);
        assert!(matches!(report.verdict(), Verdict::Unknown { .. }));
        assert!(matches!(empty.verdict(), Verdict::Unknown { .. }));
    }

    #[tokio::test]
    async fn test_configured_rate_constant_names_the_existential() {
        let options = ProverOptions {
            rate_constant: "K".to_string(),
            ..ProverOptions::default()
        };
        let p = Prover::new(ScriptedSolver::new(vec![SolverOutcome::Unsat]), options);
        let obligation = p.obligation(&["x > 0"], "x <= K*x").unwrap();
        assert_eq!(obligation.existentials, vec!["K"]);
        assert_eq!(p.prove(obligation).await.unwrap(), Verdict::Proved);
        let scripts = p.solver().scripts();
        assert!(scripts[0].contains("(exists ((v_K Real)) (and (> v_K 0.0) (<= v_x (* v_K v_x))))"));
        assert!(!scripts[0].contains("v_C"));
    }

    #[tokio::test]
    async fn test_sessions_are_not_reused() {
        let p = prover(vec![SolverOutcome::Unsat, SolverOutcome::Unsat]);
        let ob = || ProofObligation::parse(&["x > 0"], "log(x) <= x").unwrap();
        p.prove(ob()).await.unwrap();
        p.prove(ob()).await.unwrap();
        let scripts = p.solver().scripts();
        assert_eq!(scripts[0], scripts[1]);
        assert_eq!(scripts[0].matches("(declare-fun LOG (Real) Real)").count(), 1);
    }
}
