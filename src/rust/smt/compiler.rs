// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Term compiler: canonical expressions to SMT-LIB terms

use std::collections::BTreeMap;
use tracing::trace;

use super::session::SessionContext;
use super::term::{user_symbol, Op, SmtTerm};
use crate::core::{Expr, RelationKind, Transcendental};
use crate::error::{ProverError, ProverResult};

/// Variable handle, valid only inside the session that created it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handle {
    /// Quantifier-bound variable
    Bound { name: String, session: u64 },
    /// Top-level free constant
    Free { name: String, session: u64 },
}

impl Handle {
    pub fn name(&self) -> &str {
        match self {
            Handle::Bound { name, .. } | Handle::Free { name, .. } => name,
        }
    }

    pub fn session(&self) -> u64 {
        match self {
            Handle::Bound { session, .. } | Handle::Free { session, .. } => *session,
        }
    }

    fn term(&self) -> SmtTerm {
        SmtTerm::symbol(&user_symbol(self.name()))
    }
}

/// Name to handle mapping, one handle per name
#[derive(Debug, Clone)]
pub struct VariableEnv {
    session: u64,
    handles: BTreeMap<String, Handle>,
}

impl VariableEnv {
    pub fn new(session: u64) -> Self {
        VariableEnv {
            session,
            handles: BTreeMap::new(),
        }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Bind `name` as a quantified variable of this session
    pub fn bind(&mut self, name: &str) -> Handle {
        let handle = Handle::Bound {
            name: name.to_string(),
            session: self.session,
        };
        self.handles.insert(name.to_string(), handle.clone());
        handle
    }

    /// Insert an existing handle; handles from other sessions are refused
    pub fn insert(&mut self, handle: Handle) -> ProverResult<()> {
        if handle.session() != self.session {
            return Err(ProverError::StaleHandle {
                name: handle.name().to_string(),
                owner: handle.session(),
                current: self.session,
            });
        }
        self.handles.insert(handle.name().to_string(), handle);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Handle> {
        self.handles.get(name)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Lower `expr` to a term.
///
/// Names missing from `env` become free constants declared in `ctx`.
/// With `inject_side_axioms`, every `log(x)` also asserts `x > 0` and
/// `exp(LOG(x)) = x` in the session; quantifier bodies must pass `false`.
pub fn compile(
    expr: &Expr,
    env: &mut VariableEnv,
    ctx: &mut SessionContext,
    inject_side_axioms: bool,
) -> ProverResult<SmtTerm> {
    if env.session() != ctx.id() {
        return Err(ProverError::StaleHandle {
            name: "<environment>".to_string(),
            owner: env.session(),
            current: ctx.id(),
        });
    }
    match expr {
        Expr::Relation { kind, lhs, rhs } => {
            let op = match kind {
                RelationKind::Le => Op::Le,
                RelationKind::Lt => Op::Lt,
                RelationKind::Ge => Op::Ge,
                RelationKind::Gt => Op::Gt,
                RelationKind::Eq => Op::Eq,
            };
            let mut compiler = Compiler {
                env,
                ctx,
                inject: inject_side_axioms,
            };
            let lhs = compiler.arith(lhs)?;
            let rhs = compiler.arith(rhs)?;
            Ok(SmtTerm::binary(op, lhs, rhs))
        }
        other => Compiler {
            env,
            ctx,
            inject: inject_side_axioms,
        }
        .arith(other),
    }
}

struct Compiler<'a> {
    env: &'a mut VariableEnv,
    ctx: &'a mut SessionContext,
    inject: bool,
}

impl Compiler<'_> {
    fn arith(&mut self, expr: &Expr) -> ProverResult<SmtTerm> {
        match expr {
            Expr::Symbol(name) => self.symbol(name),
            Expr::Number(value) => Ok(SmtTerm::Real(value.clone())),
            Expr::Sum(terms) => {
                let mut args = terms.iter().map(|t| self.arith(t)).collect::<ProverResult<Vec<_>>>()?;
                Ok(match args.len() {
                    0 => SmtTerm::Real(num_traits::Zero::zero()),
                    1 => args.remove(0),
                    _ => SmtTerm::app(Op::Add, args),
                })
            }
            Expr::Product {
                numerator,
                denominator,
            } => self.product(numerator, denominator),
            Expr::Power(base, exponent) => {
                let base = self.arith(base)?;
                let exponent = self.arith(exponent)?;
                Ok(SmtTerm::binary(Op::Pow, base, exponent))
            }
            Expr::Transcendental { func, arg } => self.transcendental(*func, arg),
            Expr::Relation { .. } => Err(ProverError::UnsupportedExpression(format!(
                "{} inside arithmetic: {}",
                expr.kind_name(),
                expr
            ))),
        }
    }

    fn symbol(&mut self, name: &str) -> ProverResult<SmtTerm> {
        self.ctx.register_symbol(name);
        if let Some(handle) = self.env.get(name) {
            return Ok(handle.term());
        }
        trace!("Session {}: free constant {}", self.ctx.id(), name);
        self.ctx.declare_constant(name);
        let handle = Handle::Free {
            name: name.to_string(),
            session: self.ctx.id(),
        };
        let term = handle.term();
        self.env.insert(handle)?;
        Ok(term)
    }

    fn product(&mut self, numerator: &[Expr], denominator: &[Expr]) -> ProverResult<SmtTerm> {
        let mut num_factors = Vec::with_capacity(numerator.len());
        let mut den_factors: Vec<Expr> = denominator.to_vec();

        for factor in numerator {
            match split_negative_power(factor) {
                Some(den) => den_factors.push(den),
                None => num_factors.push(factor.clone()),
            }
        }

        let num = self.flat_product(&num_factors)?;
        if den_factors.is_empty() {
            return Ok(num);
        }
        let den = self.flat_product(&den_factors)?;
        Ok(SmtTerm::binary(Op::Div, num, den))
    }

    fn flat_product(&mut self, factors: &[Expr]) -> ProverResult<SmtTerm> {
        let mut args = factors.iter().map(|f| self.arith(f)).collect::<ProverResult<Vec<_>>>()?;
        Ok(match args.len() {
            0 => SmtTerm::Real(num_traits::One::one()),
            1 => args.remove(0),
            _ => SmtTerm::app(Op::Mul, args),
        })
    }

    fn transcendental(&mut self, func: Transcendental, arg: &Expr) -> ProverResult<SmtTerm> {
        let x = self.arith(arg)?;
        let op = match func {
            Transcendental::Log => return Ok(self.log(x)),
            Transcendental::Exp => Op::Exp,
            Transcendental::Sin => Op::Sin,
            Transcendental::Cos => Op::Cos,
            Transcendental::Tan => Op::Tan,
            Transcendental::Asin => Op::Arcsin,
            Transcendental::Acos => Op::Arccos,
            Transcendental::Atan => Op::Arctan,
        };
        Ok(SmtTerm::unary(op, x))
    }

    fn log(&mut self, x: SmtTerm) -> SmtTerm {
        let log_x = self.ctx.log_function().apply(x.clone());
        if self.inject {
            self.ctx
                .push_side_condition(SmtTerm::binary(Op::Gt, x.clone(), SmtTerm::Real(num_traits::Zero::zero())));
            self.ctx
                .push_side_condition(SmtTerm::binary(Op::Eq, SmtTerm::unary(Op::Exp, log_x.clone()), x));
        }
        log_x
    }
}

/// `Power(b, -k)` with integer `k > 0` becomes the denominator entry
/// `b^k` (or `b` for `k = 1`)
fn split_negative_power(factor: &Expr) -> Option<Expr> {
    let Expr::Power(base, exponent) = factor else {
        return None;
    };
    let Expr::Number(e) = exponent.as_ref() else {
        return None;
    };
    if !e.is_integer() || !num_traits::Signed::is_negative(e) {
        return None;
    }
    let k = -e.clone();
    if num_traits::One::is_one(&k) {
        Some(base.as_ref().clone())
    } else {
        Some(Expr::Power(base.clone(), Box::new(Expr::Number(k))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_expression, parse_statement};
    use pretty_assertions::assert_eq;

    fn compile_text(text: &str) -> SmtTerm {
        let mut ctx = SessionContext::new();
        let mut env = VariableEnv::new(ctx.id());
        compile(&parse_statement(text).unwrap(), &mut env, &mut ctx, false).unwrap()
    }

    #[test]
    fn test_division_is_explicit() {
        assert_eq!(compile_text("a/(b*c^2)").to_string(), "(/ v_a (* v_b (^ v_c 2.0)))");
        assert_eq!(compile_text("1/x").to_string(), "(/ 1.0 v_x)");
        assert_eq!(compile_text("a*b").to_string(), "(* v_a v_b)");
    }

    #[test]
    fn test_unsplit_numerator_power_is_repartitioned() {
        let mut ctx = SessionContext::new();
        let mut env = VariableEnv::new(ctx.id());
        let raw = Expr::Product {
            numerator: vec![
                Expr::symbol("a"),
                Expr::Power(Box::new(Expr::symbol("x")), Box::new(Expr::integer(-3))),
            ],
            denominator: vec![],
        };
        let term = compile(&raw, &mut env, &mut ctx, false).unwrap();
        assert_eq!(term.to_string(), "(/ v_a (^ v_x 3.0))");
    }

    #[test]
    fn test_fractional_power_keeps_generic_operator() {
        assert_eq!(compile_text("x^(1/2)").to_string(), "(^ v_x (/ 1.0 2.0))");
        assert_eq!(compile_text("x^y").to_string(), "(^ v_x v_y)");
    }

    #[test]
    fn test_transcendentals() {
        assert_eq!(compile_text("atan(x) < sin(y)").to_string(), "(< (arctan v_x) (sin v_y))");
        assert_eq!(compile_text("log(x) <= x").to_string(), "(<= (LOG v_x) v_x)");
    }

    #[test]
    fn test_log_side_conditions_only_when_injected() {
        let mut ctx = SessionContext::new();
        let mut env = VariableEnv::new(ctx.id());
        let e = parse_expression("log(x)").unwrap();
        compile(&e, &mut env, &mut ctx, false).unwrap();
        assert!(ctx.side_conditions().is_empty());
        compile(&e, &mut env, &mut ctx, true).unwrap();
        let rendered: Vec<String> = ctx.side_conditions().iter().map(|t| t.to_string()).collect();
        assert_eq!(rendered, vec!["(> v_x 0.0)", "(= (exp (LOG v_x)) v_x)"]);
    }

    #[test]
    fn test_absent_symbols_become_free_constants() {
        let mut ctx = SessionContext::new();
        let mut env = VariableEnv::new(ctx.id());
        env.bind("x");
        let e = parse_statement("x <= y + y").unwrap();
        compile(&e, &mut env, &mut ctx, false).unwrap();
        assert_eq!(ctx.constants(), &["y".to_string()]);
        assert!(matches!(env.get("y"), Some(Handle::Free { .. })));
        assert!(matches!(env.get("x"), Some(Handle::Bound { .. })));
    }

    #[test]
    fn test_handles_from_another_session_are_stale() {
        let mut old = SessionContext::new();
        let mut current = SessionContext::new();
        let mut old_env = VariableEnv::new(old.id());
        let handle = old_env.bind("x");

        let mut env = VariableEnv::new(current.id());
        assert!(matches!(env.insert(handle), Err(ProverError::StaleHandle { .. })));

        let e = parse_expression("x").unwrap();
        assert!(matches!(
            compile(&e, &mut old_env, &mut current, false),
            Err(ProverError::StaleHandle { .. })
        ));
        assert!(compile(&e, &mut old_env, &mut old, false).is_ok());
    }

    #[test]
    fn test_nested_relation_is_unsupported() {
        let mut ctx = SessionContext::new();
        let mut env = VariableEnv::new(ctx.id());
        let nested = Expr::apply(
            Transcendental::Exp,
            Expr::relation(RelationKind::Lt, Expr::symbol("a"), Expr::symbol("b")),
        );
        assert!(matches!(
            compile(&nested, &mut env, &mut ctx, false),
            Err(ProverError::UnsupportedExpression(_))
        ));
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let text = "x*exp(x)/(y^2) <= C*exp(2*x) + log(y)";
        assert_eq!(compile_text(text), compile_text(text));
    }
}
