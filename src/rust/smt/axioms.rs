// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Exp/LOG lemmas asserted once per session
//!
//! These five formulas are the only meaning `LOG` has. Each carries an
//! explicit trigger so instantiation stays bounded.

use num_traits::Zero;

use super::session::UninterpretedFn;
use super::term::{Op, SmtTerm};

/// A closed, trigger-annotated lemma
#[derive(Debug, Clone, PartialEq)]
pub struct Axiom {
    pub name: &'static str,
    pub formula: SmtTerm,
}

fn var(name: &str) -> SmtTerm {
    SmtTerm::symbol(name)
}

fn exp(t: SmtTerm) -> SmtTerm {
    SmtTerm::unary(Op::Exp, t)
}

fn zero() -> SmtTerm {
    SmtTerm::Real(Zero::zero())
}

fn forall(names: &[&str], body: SmtTerm, pattern: Vec<SmtTerm>) -> SmtTerm {
    SmtTerm::forall(names.iter().map(|n| n.to_string()).collect(), body).with_pattern(pattern)
}

/// The axiom library for the session owning `log`
pub fn library(log: &UninterpretedFn) -> Vec<Axiom> {
    let (u, v) = (var("u"), var("v"));
    let exp_u_le_exp_v = SmtTerm::binary(Op::Le, exp(u.clone()), exp(v.clone()));

    let exp_monotone = forall(
        &["u", "v"],
        SmtTerm::implies(SmtTerm::binary(Op::Le, u.clone(), v.clone()), exp_u_le_exp_v.clone()),
        vec![exp(u.clone()), exp(v.clone())],
    );

    let exp_reflects_order = forall(
        &["u", "v"],
        SmtTerm::implies(exp_u_le_exp_v.clone(), SmtTerm::binary(Op::Le, u, v)),
        vec![exp_u_le_exp_v],
    );

    let y = var("y");
    let log_exp_y = log.apply(exp(y.clone()));
    let log_right_inverse = forall(
        &["y"],
        SmtTerm::binary(Op::Eq, log_exp_y.clone(), y),
        vec![log_exp_y],
    );

    let x = var("x");
    let exp_log_x = exp(log.apply(x.clone()));
    let log_left_inverse = forall(
        &["x"],
        SmtTerm::implies(
            SmtTerm::binary(Op::Gt, x.clone(), zero()),
            SmtTerm::binary(Op::Eq, exp_log_x.clone(), x),
        ),
        vec![exp_log_x],
    );

    let (p, q) = (var("p"), var("q"));
    let (log_p, log_q) = (log.apply(p.clone()), log.apply(q.clone()));
    let log_monotone = forall(
        &["p", "q"],
        SmtTerm::implies(
            SmtTerm::and(vec![
                SmtTerm::binary(Op::Gt, p.clone(), zero()),
                SmtTerm::binary(Op::Gt, q.clone(), zero()),
                SmtTerm::binary(Op::Le, p, q),
            ]),
            SmtTerm::binary(Op::Le, log_p.clone(), log_q.clone()),
        ),
        vec![log_p, log_q],
    );

    vec![
        Axiom {
            name: "exp is monotone",
            formula: exp_monotone,
        },
        Axiom {
            name: "exp reflects order",
            formula: exp_reflects_order,
        },
        Axiom {
            name: "LOG(exp(y)) = y",
            formula: log_right_inverse,
        },
        Axiom {
            name: "exp(LOG(x)) = x for x > 0",
            formula: log_left_inverse,
        },
        Axiom {
            name: "LOG is monotone on positives",
            formula: log_monotone,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smt::session::SessionContext;

    fn rendered() -> Vec<String> {
        let mut ctx = SessionContext::new();
        let log = ctx.log_function().clone();
        library(&log).into_iter().map(|a| a.formula.to_string()).collect()
    }

    #[test]
    fn test_axioms_render_with_triggers() {
        let axioms = rendered();
        assert_eq!(axioms.len(), 5);
        assert_eq!(
            axioms[0],
            "(forall ((u Real) (v Real)) (! (=> (<= u v) (<= (exp u) (exp v))) :pattern ((exp u) (exp v))))"
        );
        assert_eq!(
            axioms[1],
            "(forall ((u Real) (v Real)) (! (=> (<= (exp u) (exp v)) (<= u v)) :pattern ((<= (exp u) (exp v)))))"
        );
        assert_eq!(
            axioms[2],
            "(forall ((y Real)) (! (= (LOG (exp y)) y) :pattern ((LOG (exp y)))))"
        );
        assert_eq!(
            axioms[3],
            "(forall ((x Real)) (! (=> (> x 0.0) (= (exp (LOG x)) x)) :pattern ((exp (LOG x)))))"
        );
        assert_eq!(
            axioms[4],
            "(forall ((p Real) (q Real)) (! (=> (and (> p 0.0) (> q 0.0) (<= p q)) (<= (LOG p) (LOG q))) :pattern ((LOG p) (LOG q))))"
        );
    }

    #[test]
    fn test_axioms_are_closed() {
        for axiom in library(&SessionContext::new().log_function().clone()) {
            assert!(matches!(axiom.formula, SmtTerm::Quantified { .. }), "{}", axiom.name);
        }
    }
}
