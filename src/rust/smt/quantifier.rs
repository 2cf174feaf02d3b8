// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Quantifier builder
//!
//! `forall U. conditions => exists E. (C > 0 and goal)`, where `E` is the
//! declared existentials that occur and `U` is every other occurring name
//! in lexicographic order.

use num_traits::Zero;
use serde::Serialize;

use super::compiler::{compile, VariableEnv};
use super::session::SessionContext;
use super::term::{user_symbol, Op, SmtTerm};
use crate::core::{Expr, ProofObligation};
use crate::error::{ProverError, ProverResult};

/// Roles assigned to the free symbols of an obligation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub universals: Vec<String>,
    /// Declaration order
    pub existentials: Vec<String>,
}

pub fn partition(obligation: &ProofObligation) -> Partition {
    let occurring = obligation.free_symbols();
    let existentials: Vec<String> = obligation
        .existentials
        .iter()
        .filter(|name| occurring.contains(*name))
        .fold(Vec::new(), |mut acc, name| {
            if !acc.contains(name) {
                acc.push(name.clone());
            }
            acc
        });
    let universals = occurring
        .into_iter()
        .filter(|name| !existentials.contains(name))
        .collect();
    Partition {
        universals,
        existentials,
    }
}

pub(crate) fn require_relation(expr: &Expr) -> ProverResult<()> {
    if expr.is_relation() {
        Ok(())
    } else {
        Err(ProverError::UnsupportedExpression(format!(
            "{} where a comparison is required: {}",
            expr.kind_name(),
            expr
        )))
    }
}

/// Compile conditions and goal under one environment and assemble the
/// quantified formula
pub fn build_formula(
    obligation: &ProofObligation,
    ctx: &mut SessionContext,
    rate_constant: &str,
) -> ProverResult<(SmtTerm, Partition)> {
    for condition in &obligation.conditions {
        require_relation(condition)?;
    }
    require_relation(&obligation.goal)?;

    let roles = partition(obligation);

    let mut universal_env = VariableEnv::new(ctx.id());
    for name in &roles.universals {
        universal_env.bind(name);
    }
    let mut goal_env = universal_env.clone();
    for name in &roles.existentials {
        goal_env.bind(name);
    }

    let conditions = obligation
        .conditions
        .iter()
        .map(|c| compile(c, &mut universal_env, ctx, false))
        .collect::<ProverResult<Vec<_>>>()?;
    let goal = compile(&obligation.goal, &mut goal_env, ctx, false)?;

    let inner = if roles.existentials.is_empty() {
        goal
    } else {
        let mut conjuncts = Vec::new();
        if roles.existentials.iter().any(|e| e == rate_constant) {
            conjuncts.push(SmtTerm::binary(
                Op::Gt,
                SmtTerm::symbol(&user_symbol(rate_constant)),
                SmtTerm::Real(Zero::zero()),
            ));
        }
        conjuncts.push(goal);
        SmtTerm::exists(bindings(&roles.existentials), SmtTerm::and(conjuncts))
    };

    let body = if conditions.is_empty() {
        inner
    } else {
        SmtTerm::implies(SmtTerm::and(conditions), inner)
    };

    Ok((SmtTerm::forall(bindings(&roles.universals), body), roles))
}

fn bindings(names: &[String]) -> Vec<String> {
    names.iter().map(|n| user_symbol(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn build(conditions: &[&str], goal: &str) -> (String, Partition) {
        let obligation = ProofObligation::parse(conditions, goal).unwrap();
        let mut ctx = SessionContext::new();
        let (formula, roles) = build_formula(&obligation, &mut ctx, "C").unwrap();
        (formula.to_string(), roles)
    }

    #[test]
    fn test_partition_is_lexicographic() {
        let obligation = ProofObligation::parse(&["z > 0", "a > 0"], "a <= C*z + m").unwrap();
        let roles = partition(&obligation);
        assert_eq!(roles.universals, vec!["a", "m", "z"]);
        assert_eq!(roles.existentials, vec!["C"]);
    }

    #[test]
    fn test_declared_but_absent_existential_is_dropped() {
        let obligation = ProofObligation::parse(&["a > 0"], "a <= 2*a")
            .unwrap()
            .with_existentials(["C", "K"]);
        assert!(partition(&obligation).existentials.is_empty());
    }

    #[test]
    fn test_full_formula_shape() {
        let (formula, _) = build(&["a > 0", "b > 0", "a <= 2*b"], "a <= C*b");
        assert_eq!(
            formula,
            "(forall ((v_a Real) (v_b Real)) (=> (and (> v_a 0.0) (> v_b 0.0) (<= v_a (* 2.0 v_b))) \
             (exists ((v_C Real)) (and (> v_C 0.0) (<= v_a (* v_C v_b))))))"
        );
    }

    #[test]
    fn test_no_universals_degenerates_to_implication() {
        let (formula, roles) = build(&[], "1 <= C");
        assert!(roles.universals.is_empty());
        assert_eq!(formula, "(exists ((v_C Real)) (and (> v_C 0.0) (<= 1.0 v_C)))");
    }

    #[test]
    fn test_no_existentials_degenerates_to_goal() {
        let (formula, _) = build(&["x > 0"], "exp(log(x)) = x");
        assert_eq!(formula, "(forall ((v_x Real)) (=> (> v_x 0.0) (= (exp (LOG v_x)) v_x)))");
    }

    #[test]
    fn test_other_existentials_get_no_positivity() {
        let obligation = ProofObligation::parse(&["x > 0"], "x <= K*x")
            .unwrap()
            .with_existentials(["K"]);
        let mut ctx = SessionContext::new();
        let (formula, _) = build_formula(&obligation, &mut ctx, "C").unwrap();
        assert_eq!(
            formula.to_string(),
            "(forall ((v_x Real)) (=> (> v_x 0.0) (exists ((v_K Real)) (<= v_x (* v_K v_x)))))"
        );
    }

    #[test]
    fn test_non_relational_goal_is_unsupported() {
        let obligation = ProofObligation::parse(&["x > 0"], "x + 1").unwrap();
        let mut ctx = SessionContext::new();
        assert!(matches!(
            build_formula(&obligation, &mut ctx, "C"),
            Err(ProverError::UnsupportedExpression(_))
        ));
    }
}
