// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Integration tests against the cvc5 executable
//!
//! Every test skips itself when cvc5 is not on PATH.

#[macro_use]
mod common;

use bigo::parser::parse_statement;
use bigo::{BoundQuestion, Expr, ProofObligation, Prover, ProverOptions, ResourceLimits, TriggerStrategy, Verdict};

#[cfg(test)]
mod solver_tests {
    use super::*;

    #[tokio::test]
    async fn test_cvc5_reports_version() {
        require_cvc5!();
        let prover = common::cvc5_prover();
        let version = prover.solver().version().await.unwrap();
        assert!(version.to_lowercase().contains("cvc5"), "unexpected version: {}", version);
    }

    #[tokio::test]
    async fn test_exp_is_monotone() {
        require_cvc5!();
        let verdict = common::cvc5_prover()
            .prove_statements(&["a > 0", "b > 0", "a <= b"], "exp(a) <= exp(b)", &["C"], None)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Proved);
    }

    #[tokio::test]
    async fn test_log_left_inverse() {
        require_cvc5!();
        let verdict = common::cvc5_prover()
            .prove_statements(&["x > 0"], "exp(LOG(x)) = x", &["C"], None)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Proved);
    }

    #[tokio::test]
    async fn test_witness_discharges_rate_constant() {
        require_cvc5!();
        let verdict = common::cvc5_prover()
            .prove_statements(&["a > 0", "b > 0", "a <= 2*b"], "a <= C*b", &["C"], Some(Expr::integer(2)))
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Proved);
    }

    #[tokio::test]
    async fn test_existential_rate_constant_without_witness() {
        require_cvc5!();
        let verdict = common::patient_prover()
            .prove_statements(&["a > 0", "b > 0", "a <= 2*b"], "a <= C*b", &["C"], None)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Proved);
    }

    #[tokio::test]
    async fn test_strict_inequality_has_counterexample() {
        require_cvc5!();
        let verdict = common::patient_prover()
            .prove_statements(&["a > 0", "b > 0", "a <= b"], "a < b", &["C"], None)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Disproved);
    }

    #[tokio::test]
    async fn test_tiny_budget_gives_unknown() {
        require_cvc5!();
        let options = ProverOptions::default().with_limits(ResourceLimits {
            time_limit_ms: 50,
            resource_limit: 1,
            grace_ms: 2_000,
        });
        let prover = Prover::cvc5(options);
        let obligation =
            ProofObligation::parse(&["x > 1", "y > 1"], "x*y*exp(x)*log(y) <= C*exp(2*x)*y^2").unwrap();
        let verdict = prover.prove(obligation).await.unwrap();
        match verdict {
            Verdict::Unknown { reason } => assert!(!reason.is_empty()),
            other => assert_ne!(other, Verdict::Proved),
        }
    }

    #[tokio::test]
    async fn test_ground_check_with_side_conditions() {
        require_cvc5!();
        let verdict = common::cvc5_prover()
            .check_ground(&[parse_statement("x > 0").unwrap()], &parse_statement("exp(log(x)) = x").unwrap())
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Proved);
    }

    #[tokio::test]
    async fn test_every_trigger_strategy_runs() {
        require_cvc5!();
        for triggers in [TriggerStrategy::Use, TriggerStrategy::Trust, TriggerStrategy::Ignore] {
            let prover = Prover::cvc5(ProverOptions::default().with_triggers(triggers));
            let verdict = prover
                .prove_statements(&["a > 0", "b > 0", "a <= b"], "exp(a) <= exp(b)", &["C"], None)
                .await
                .unwrap();
            assert_ne!(verdict, Verdict::Disproved, "strategy {}", triggers);
        }
    }
}

#[cfg(test)]
mod bound_tests {
    use super::*;

    #[tokio::test]
    async fn test_bound_with_explicit_constant_inside_domain() {
        require_cvc5!();
        let question = BoundQuestion::parse(&["a > 0", "b > 0", "a <= 2*b"], "a", "b").unwrap();
        let verdict = common::cvc5_prover().prove_bound(&question).await.unwrap();
        assert_ne!(verdict, Verdict::Disproved);
    }

    #[tokio::test]
    async fn test_subdomain_report_covers_every_piece() {
        require_cvc5!();
        let question = BoundQuestion::parse(&["a > 0", "b > 0"], "exp(a)", "exp(b)").unwrap();
        let pieces = vec![
            vec![parse_statement("a <= b").unwrap()],
            vec![parse_statement("a <= b").unwrap(), parse_statement("b <= 1").unwrap()],
        ];
        let report = common::cvc5_prover()
            .prove_bound_on_subdomains(&question, &pieces)
            .await
            .unwrap();
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].subdomain, vec!["a <= b".to_string()]);
        assert!(report.results.iter().all(|r| r.verdict != Verdict::Disproved));
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;
    use bigo::ProverError;

    #[tokio::test]
    async fn test_missing_executable_is_an_error() {
        let mut options = ProverOptions::default();
        options.solver.executable = "/nonexistent/cvc5".into();
        let err = Prover::cvc5(options)
            .prove_statements(&["a > 0"], "a <= C*a", &["C"], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProverError::Io(_) | ProverError::Solver(_)), "got {:?}", err);
    }

    #[test]
    fn test_rate_constant_collision_is_rejected() {
        let question = BoundQuestion::parse(&["C > 0"], "C", "1").unwrap();
        assert!(matches!(
            question.obligation("C"),
            Err(ProverError::UnsupportedExpression(_))
        ));
    }
}
