// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: MIT OR Palimpsest-0.6

//! Core types: the canonical expression tree, proof obligations, verdicts
//!
//! Expressions are immutable once built. The smart constructors
//! ([`Expr::sum`], [`Expr::product`], [`Expr::power`]) keep every tree in
//! canonical form: sums and products are flat, numeric factors are folded
//! into one exact coefficient, and factors raised to a negative integer
//! power live in the denominator group of a product.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{ProverError, ProverResult};
use crate::parser::Normalize;

/// Name conventionally used for the rate constant of an asymptotic bound
pub const RATE_CONSTANT: &str = "C";

/// Order and equality relations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    Le,
    Lt,
    Ge,
    Gt,
    Eq,
}

impl RelationKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            RelationKind::Le => "<=",
            RelationKind::Lt => "<",
            RelationKind::Ge => ">=",
            RelationKind::Gt => ">",
            RelationKind::Eq => "=",
        }
    }
}

/// Unary transcendental functions understood by the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transcendental {
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
}

impl Transcendental {
    pub fn name(&self) -> &'static str {
        match self {
            Transcendental::Exp => "exp",
            Transcendental::Log => "log",
            Transcendental::Sin => "sin",
            Transcendental::Cos => "cos",
            Transcendental::Tan => "tan",
            Transcendental::Asin => "asin",
            Transcendental::Acos => "acos",
            Transcendental::Atan => "atan",
        }
    }

    /// Wolfram Language head
    pub fn wolfram_name(&self) -> &'static str {
        match self {
            Transcendental::Exp => "Exp",
            Transcendental::Log => "Log",
            Transcendental::Sin => "Sin",
            Transcendental::Cos => "Cos",
            Transcendental::Tan => "Tan",
            Transcendental::Asin => "ArcSin",
            Transcendental::Acos => "ArcCos",
            Transcendental::Atan => "ArcTan",
        }
    }

    fn eval(&self, x: f64) -> f64 {
        match self {
            Transcendental::Exp => x.exp(),
            Transcendental::Log => x.ln(),
            Transcendental::Sin => x.sin(),
            Transcendental::Cos => x.cos(),
            Transcendental::Tan => x.tan(),
            Transcendental::Asin => x.asin(),
            Transcendental::Acos => x.acos(),
            Transcendental::Atan => x.atan(),
        }
    }
}

/// Canonical expression tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Symbol(String),
    Number(BigRational),
    Sum(Vec<Expr>),
    /// Numerator and denominator factor groups; a denominator entry `d`
    /// stands for `d^-1` in the flat product
    Product {
        numerator: Vec<Expr>,
        denominator: Vec<Expr>,
    },
    Power(Box<Expr>, Box<Expr>),
    Relation {
        kind: RelationKind,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Transcendental {
        func: Transcendental,
        arg: Box<Expr>,
    },
}

impl Expr {
    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    pub fn integer(n: i64) -> Self {
        Expr::Number(BigRational::from_integer(BigInt::from(n)))
    }

    pub fn rational(numer: i64, denom: i64) -> Self {
        Expr::Number(BigRational::new(BigInt::from(numer), BigInt::from(denom)))
    }

    pub fn apply(func: Transcendental, arg: Expr) -> Self {
        Expr::Transcendental {
            func,
            arg: Box::new(arg),
        }
    }

    pub fn relation(kind: RelationKind, lhs: Expr, rhs: Expr) -> Self {
        Expr::Relation {
            kind,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Flat sum with numeric terms folded
    pub fn sum(terms: Vec<Expr>) -> Self {
        let mut constant = BigRational::zero();
        let mut rest = Vec::new();
        for term in terms {
            match term {
                Expr::Sum(inner) => {
                    for t in inner {
                        match t {
                            Expr::Number(n) => constant += n,
                            other => rest.push(other),
                        }
                    }
                }
                Expr::Number(n) => constant += n,
                other => rest.push(other),
            }
        }
        if !constant.is_zero() || rest.is_empty() {
            rest.insert(0, Expr::Number(constant));
        }
        if rest.len() == 1 {
            rest.remove(0)
        } else {
            Expr::Sum(rest)
        }
    }

    /// Flat product: folds the numeric coefficient and moves every factor
    /// raised to a negative integer power into the denominator group
    pub fn product(factors: Vec<Expr>) -> Self {
        let mut coefficient = BigRational::one();
        let mut numerator = Vec::new();
        let mut denominator = Vec::new();

        let mut pending = factors;
        pending.reverse();
        while let Some(factor) = pending.pop() {
            match factor {
                Expr::Number(n) => coefficient *= n,
                Expr::Product {
                    numerator: inner_num,
                    denominator: inner_den,
                } => {
                    denominator.extend(inner_den);
                    for f in inner_num.into_iter().rev() {
                        pending.push(f);
                    }
                }
                Expr::Power(base, exponent) => match negative_integer(&exponent) {
                    Some(k) => denominator.push(Expr::power_raw(*base, Expr::Number(k))),
                    None => numerator.push(Expr::Power(base, exponent)),
                },
                other => numerator.push(other),
            }
        }

        if coefficient.is_zero() {
            return Expr::Number(coefficient);
        }
        if !coefficient.is_one() || (numerator.is_empty() && denominator.is_empty()) {
            numerator.insert(0, Expr::Number(coefficient));
        }
        if denominator.is_empty() && numerator.len() == 1 {
            return numerator.remove(0);
        }
        Expr::Product {
            numerator,
            denominator,
        }
    }

    /// Power with exact folding of small integer powers of literals
    pub fn power(base: Expr, exponent: Expr) -> Self {
        if let Expr::Number(e) = &exponent {
            if e.is_one() {
                return base;
            }
            if let (Expr::Number(b), true) = (&base, e.is_integer()) {
                if let Some(k) = e.to_integer().to_i32() {
                    if k.unsigned_abs() <= 64 && !(b.is_zero() && k < 0) {
                        return Expr::Number(rational_pow(b, k));
                    }
                }
            }
        }
        Expr::Power(Box::new(base), Box::new(exponent))
    }

    /// `base^k` without folding, collapsing `k = 1` to the base
    fn power_raw(base: Expr, exponent: Expr) -> Self {
        match &exponent {
            Expr::Number(k) if k.is_one() => base,
            _ => Expr::Power(Box::new(base), Box::new(exponent)),
        }
    }

    /// `-self`, folding into literals
    pub fn negate(self) -> Self {
        match self {
            Expr::Number(n) => Expr::Number(-n),
            other => Expr::product(vec![Expr::integer(-1), other]),
        }
    }

    /// `1 / self`; `None` for a literal zero
    pub fn reciprocal(self) -> Option<Self> {
        match self {
            Expr::Number(n) if n.is_zero() => None,
            Expr::Number(n) => Some(Expr::Number(n.recip())),
            Expr::Power(base, exponent) => match *exponent {
                Expr::Number(e) => Some(Expr::power(*base, Expr::Number(-e))),
                exponent => Some(Expr::Power(
                    Box::new(Expr::Power(base, Box::new(exponent))),
                    Box::new(Expr::integer(-1)),
                )),
            },
            Expr::Product {
                numerator,
                denominator,
            } => {
                let mut factors = denominator;
                for f in numerator {
                    factors.push(f.reciprocal()?);
                }
                Some(Expr::product(factors))
            }
            other => Some(Expr::Power(Box::new(other), Box::new(Expr::integer(-1)))),
        }
    }

    pub fn is_relation(&self) -> bool {
        matches!(self, Expr::Relation { .. })
    }

    /// Node kind name used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Symbol(_) => "Symbol",
            Expr::Number(_) => "NumericLiteral",
            Expr::Sum(_) => "Sum",
            Expr::Product { .. } => "Product",
            Expr::Power(..) => "Power",
            Expr::Relation { .. } => "Relation",
            Expr::Transcendental { .. } => "UnaryTranscendental",
        }
    }

    /// Free symbol names in lexicographic order
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Symbol(name) => {
                out.insert(name.clone());
            }
            Expr::Number(_) => {}
            Expr::Sum(terms) => terms.iter().for_each(|t| t.collect_symbols(out)),
            Expr::Product {
                numerator,
                denominator,
            } => numerator
                .iter()
                .chain(denominator.iter())
                .for_each(|f| f.collect_symbols(out)),
            Expr::Power(base, exponent) => {
                base.collect_symbols(out);
                exponent.collect_symbols(out);
            }
            Expr::Relation { lhs, rhs, .. } => {
                lhs.collect_symbols(out);
                rhs.collect_symbols(out);
            }
            Expr::Transcendental { arg, .. } => arg.collect_symbols(out),
        }
    }

    /// Replace every occurrence of `name` and re-canonicalize
    pub fn substitute(&self, name: &str, value: &Expr) -> Expr {
        match self {
            Expr::Symbol(s) if s == name => value.clone(),
            Expr::Symbol(_) | Expr::Number(_) => self.clone(),
            Expr::Sum(terms) => Expr::sum(terms.iter().map(|t| t.substitute(name, value)).collect()),
            Expr::Product {
                numerator,
                denominator,
            } => {
                let mut factors: Vec<Expr> =
                    numerator.iter().map(|f| f.substitute(name, value)).collect();
                for d in denominator {
                    let d = d.substitute(name, value);
                    // a literal zero denominator stays symbolic
                    factors.push(
                        d.clone()
                            .reciprocal()
                            .unwrap_or_else(|| Expr::Power(Box::new(d), Box::new(Expr::integer(-1)))),
                    );
                }
                Expr::product(factors)
            }
            Expr::Power(base, exponent) => {
                Expr::power(base.substitute(name, value), exponent.substitute(name, value))
            }
            Expr::Relation { kind, lhs, rhs } => {
                Expr::relation(*kind, lhs.substitute(name, value), rhs.substitute(name, value))
            }
            Expr::Transcendental { func, arg } => Expr::apply(*func, arg.substitute(name, value)),
        }
    }

    /// Numeric value of a closed arithmetic expression
    pub fn evaluate(&self) -> Option<f64> {
        let value = match self {
            Expr::Symbol(_) | Expr::Relation { .. } => return None,
            Expr::Number(n) => rational_to_f64(n),
            Expr::Sum(terms) => terms.iter().map(Expr::evaluate).sum::<Option<f64>>()?,
            Expr::Product {
                numerator,
                denominator,
            } => {
                let num = numerator.iter().map(Expr::evaluate).product::<Option<f64>>()?;
                let den = denominator.iter().map(Expr::evaluate).product::<Option<f64>>()?;
                num / den
            }
            Expr::Power(base, exponent) => base.evaluate()?.powf(exponent.evaluate()?),
            Expr::Transcendental { func, arg } => func.eval(arg.evaluate()?),
        };
        value.is_finite().then_some(value)
    }

    /// Render in Wolfram Language input form
    pub fn to_wolfram(&self) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = self.render(&mut out, Notation::Wolfram);
        out
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Relation { .. } => 0,
            Expr::Sum(_) => 1,
            Expr::Product { .. } => 2,
            Expr::Number(n) if !n.is_integer() => 2,
            Expr::Number(n) if n.is_negative() => 3,
            Expr::Power(..) => 4,
            _ => 5,
        }
    }

    fn render_child<W: fmt::Write>(&self, out: &mut W, notation: Notation, min: u8) -> fmt::Result {
        if self.precedence() < min {
            out.write_char('(')?;
            self.render(out, notation)?;
            out.write_char(')')
        } else {
            self.render(out, notation)
        }
    }

    fn render<W: fmt::Write>(&self, out: &mut W, notation: Notation) -> fmt::Result {
        match self {
            Expr::Symbol(name) => out.write_str(name),
            Expr::Number(n) => write!(out, "{}", n),
            Expr::Sum(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        out.write_str(" + ")?;
                    }
                    term.render_child(out, notation, 2)?;
                }
                Ok(())
            }
            Expr::Product {
                numerator,
                denominator,
            } => {
                if numerator.is_empty() {
                    out.write_char('1')?;
                }
                for (i, factor) in numerator.iter().enumerate() {
                    if i > 0 {
                        out.write_str("*")?;
                    }
                    factor.render_child(out, notation, 3)?;
                }
                match denominator.as_slice() {
                    [] => Ok(()),
                    [single] => {
                        out.write_str("/")?;
                        single.render_child(out, notation, 4)
                    }
                    many => {
                        out.write_str("/(")?;
                        for (i, factor) in many.iter().enumerate() {
                            if i > 0 {
                                out.write_str("*")?;
                            }
                            factor.render_child(out, notation, 3)?;
                        }
                        out.write_char(')')
                    }
                }
            }
            Expr::Power(base, exponent) => {
                base.render_child(out, notation, 5)?;
                out.write_char('^')?;
                exponent.render_child(out, notation, 3)
            }
            Expr::Relation { kind, lhs, rhs } => {
                lhs.render(out, notation)?;
                let symbol = match (notation, kind) {
                    (Notation::Wolfram, RelationKind::Eq) => "==",
                    _ => kind.symbol(),
                };
                write!(out, " {} ", symbol)?;
                rhs.render(out, notation)
            }
            Expr::Transcendental { func, arg } => match notation {
                Notation::Infix => {
                    write!(out, "{}(", func.name())?;
                    arg.render(out, notation)?;
                    out.write_char(')')
                }
                Notation::Wolfram => {
                    write!(out, "{}[", func.wolfram_name())?;
                    arg.render(out, notation)?;
                    out.write_char(']')
                }
            },
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, Notation::Infix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notation {
    Infix,
    Wolfram,
}

/// `Some(-e)` when `e` is a negative integer literal
fn negative_integer(exponent: &Expr) -> Option<BigRational> {
    match exponent {
        Expr::Number(e) if e.is_integer() && e.is_negative() => Some(-e.clone()),
        _ => None,
    }
}

fn rational_pow(base: &BigRational, k: i32) -> BigRational {
    let mut acc = BigRational::one();
    for _ in 0..k.unsigned_abs() {
        acc *= base.clone();
    }
    if k < 0 {
        acc.recip()
    } else {
        acc
    }
}

pub(crate) fn rational_to_f64(n: &BigRational) -> f64 {
    match (n.numer().to_f64(), n.denom().to_f64()) {
        (Some(p), Some(q)) => p / q,
        _ => f64::NAN,
    }
}

/// `{conditions, goal, existential_names, witness}`
///
/// Built by the caller, consumed once by [`crate::driver::Prover`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProofObligation {
    pub conditions: Vec<Expr>,
    pub goal: Expr,
    /// Existential names in declaration order
    pub existentials: Vec<String>,
    pub witness: BTreeMap<String, Expr>,
}

impl ProofObligation {
    /// Obligation with the default existential set `[RATE_CONSTANT]`
    ///
    /// A prover configured with another rate constant builds its
    /// obligations through [`crate::driver::Prover::obligation`] instead.
    pub fn new(conditions: Vec<Expr>, goal: Expr) -> Self {
        ProofObligation {
            conditions,
            goal,
            existentials: vec![RATE_CONSTANT.to_string()],
            witness: BTreeMap::new(),
        }
    }

    pub fn parse<S: AsRef<str>>(conditions: &[S], goal: &str) -> ProverResult<Self> {
        let conditions = conditions
            .iter()
            .map(|c| crate::parser::parse_statement(c.as_ref()))
            .collect::<ProverResult<Vec<_>>>()?;
        Ok(Self::new(conditions, crate::parser::parse_statement(goal)?))
    }

    pub fn with_existentials<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.existentials = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_witness(mut self, name: &str, value: impl Normalize) -> ProverResult<Self> {
        self.witness.insert(name.to_string(), value.normalize()?);
        Ok(self)
    }

    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = self.goal.free_symbols();
        for c in &self.conditions {
            out.extend(c.free_symbols());
        }
        out
    }

    /// Check that every witness is a positive number naming an existential
    pub fn validate_witnesses(&self) -> ProverResult<()> {
        for (name, value) in &self.witness {
            if !self.existentials.iter().any(|e| e == name) {
                return Err(ProverError::invalid_witness(name, "not an existential name"));
            }
            if !value.free_symbols().is_empty() {
                return Err(ProverError::invalid_witness(name, format!("'{}' is not a number", value)));
            }
            let positive = match value {
                Expr::Number(n) => n.is_positive(),
                other => other.evaluate().map(|v| v > 0.0).ok_or_else(|| {
                    ProverError::invalid_witness(name, format!("'{}' does not evaluate to a real number", other))
                })?,
            };
            if !positive {
                return Err(ProverError::invalid_witness(name, format!("'{}' must be > 0", value)));
            }
        }
        Ok(())
    }

    /// Substitute every witness into conditions and goal and drop the
    /// witnessed names from the existential set
    pub fn apply_witnesses(self) -> ProverResult<Self> {
        self.validate_witnesses()?;
        let ProofObligation {
            mut conditions,
            mut goal,
            mut existentials,
            witness,
        } = self;
        for (name, value) in &witness {
            conditions = conditions.iter().map(|c| c.substitute(name, value)).collect();
            goal = goal.substitute(name, value);
            existentials.retain(|e| e != name);
        }
        Ok(ProofObligation {
            conditions,
            goal,
            existentials,
            witness: BTreeMap::new(),
        })
    }
}

/// Three-valued outcome of a proof attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// The negated statement is unsatisfiable
    Proved,
    /// A counterexample exists (not inspected)
    Disproved,
    /// Undecided within budget
    Unknown { reason: String },
}

impl Verdict {
    pub fn is_proved(&self) -> bool {
        matches!(self, Verdict::Proved)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Proved => write!(f, "proved"),
            Verdict::Disproved => write!(f, "not proved"),
            Verdict::Unknown { reason } => write!(f, "unknown {}", reason),
        }
    }
}

/// `lhs << rhs` on a domain: some `C > 0` has `lhs <= C*rhs` throughout
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuestion {
    pub domain: Vec<Expr>,
    pub lhs: Expr,
    pub rhs: Expr,
}

impl BoundQuestion {
    pub fn parse<S: AsRef<str>>(domain: &[S], lhs: &str, rhs: &str) -> ProverResult<Self> {
        let domain = domain
            .iter()
            .map(|d| crate::parser::parse_conjunction(d.as_ref()))
            .collect::<ProverResult<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();
        Ok(BoundQuestion {
            domain,
            lhs: crate::parser::parse_expression(lhs)?,
            rhs: crate::parser::parse_expression(rhs)?,
        })
    }

    /// Variables of the question, lexicographically
    pub fn variables(&self) -> BTreeSet<String> {
        let mut out = self.lhs.free_symbols();
        out.extend(self.rhs.free_symbols());
        for d in &self.domain {
            out.extend(d.free_symbols());
        }
        out
    }

    /// The question narrowed to `domain ∧ extra`
    pub fn restricted(&self, extra: &[Expr]) -> BoundQuestion {
        let mut narrowed = self.clone();
        narrowed.domain.extend(extra.iter().cloned());
        narrowed
    }

    /// `domain ⇒ ∃C>0. lhs <= C*rhs`
    pub fn obligation(&self, rate_constant: &str) -> ProverResult<ProofObligation> {
        if self.variables().contains(rate_constant) {
            return Err(ProverError::UnsupportedExpression(format!(
                "rate constant '{}' also appears as a variable",
                rate_constant
            )));
        }
        let bound = Expr::product(vec![Expr::symbol(rate_constant), self.rhs.clone()]);
        let goal = Expr::relation(RelationKind::Le, self.lhs.clone(), bound);
        Ok(ProofObligation::new(self.domain.clone(), goal).with_existentials([rate_constant]))
    }
}

impl fmt::Display for BoundQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} << {}", self.lhs, self.rhs)?;
        if !self.domain.is_empty() {
            let parts: Vec<String> = self.domain.iter().map(|d| d.to_string()).collect();
            write!(f, " on {}", parts.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::symbol("x")
    }

    #[test]
    fn test_product_moves_negative_powers_to_denominator() {
        let e = Expr::product(vec![
            Expr::symbol("a"),
            Expr::power(x(), Expr::integer(-2)),
            Expr::power(Expr::symbol("y"), Expr::integer(-1)),
        ]);
        match e {
            Expr::Product {
                numerator,
                denominator,
            } => {
                assert_eq!(numerator, vec![Expr::symbol("a")]);
                assert_eq!(
                    denominator,
                    vec![Expr::Power(Box::new(x()), Box::new(Expr::integer(2))), Expr::symbol("y")]
                );
            }
            other => panic!("expected product, got {:?}", other),
        }
    }

    #[test]
    fn test_reciprocal_of_powers() {
        assert_eq!(
            Expr::power(x(), Expr::integer(3)).reciprocal(),
            Some(Expr::Power(Box::new(x()), Box::new(Expr::integer(-3))))
        );
        let symbolic = Expr::Power(Box::new(x()), Box::new(Expr::symbol("k")));
        assert_eq!(
            symbolic.clone().reciprocal(),
            Some(Expr::Power(Box::new(symbolic), Box::new(Expr::integer(-1))))
        );
        assert_eq!(Expr::integer(0).reciprocal(), None);
        assert_eq!(Expr::integer(4).reciprocal(), Some(Expr::rational(1, 4)));
    }

    #[test]
    fn test_fractional_negative_power_stays_in_numerator() {
        let e = Expr::product(vec![Expr::symbol("a"), Expr::power(x(), Expr::rational(-1, 2))]);
        match e {
            Expr::Product { denominator, .. } => assert!(denominator.is_empty()),
            other => panic!("expected product, got {:?}", other),
        }
    }

    #[test]
    fn test_product_folds_coefficients() {
        let e = Expr::product(vec![Expr::integer(2), x(), Expr::rational(1, 2)]);
        assert_eq!(e, x());
        assert_eq!(Expr::product(vec![Expr::integer(0), x()]), Expr::integer(0));
    }

    #[test]
    fn test_sum_flattens_and_folds() {
        let inner = Expr::sum(vec![x(), Expr::integer(1)]);
        let e = Expr::sum(vec![inner, Expr::integer(-1), Expr::symbol("y")]);
        assert_eq!(e, Expr::Sum(vec![x(), Expr::symbol("y")]));
    }

    #[test]
    fn test_power_folds_literals() {
        assert_eq!(Expr::power(Expr::integer(2), Expr::integer(3)), Expr::integer(8));
        assert_eq!(Expr::power(Expr::integer(2), Expr::integer(-1)), Expr::rational(1, 2));
        assert_eq!(Expr::power(x(), Expr::integer(1)), x());
    }

    #[test]
    fn test_free_symbols_are_sorted() {
        let e = Expr::relation(
            RelationKind::Le,
            Expr::symbol("b"),
            Expr::product(vec![Expr::symbol("C"), Expr::symbol("a")]),
        );
        let names: Vec<String> = e.free_symbols().into_iter().collect();
        assert_eq!(names, vec!["C", "a", "b"]);
    }

    #[test]
    fn test_substitute_refolds() {
        let e = Expr::product(vec![Expr::symbol("C"), Expr::symbol("b")]);
        let s = e.substitute("C", &Expr::integer(2));
        assert_eq!(
            s,
            Expr::Product {
                numerator: vec![Expr::integer(2), Expr::symbol("b")],
                denominator: vec![],
            }
        );
    }

    #[test]
    fn test_evaluate_closed_expression() {
        let sqrt2 = Expr::power(Expr::integer(2), Expr::rational(1, 2));
        let v = sqrt2.evaluate().unwrap();
        assert!((v - std::f64::consts::SQRT_2).abs() < 1e-12);
        assert_eq!(x().evaluate(), None);
        assert_eq!(Expr::apply(Transcendental::Log, Expr::integer(-1)).evaluate(), None);
    }

    #[test]
    fn test_display_renders_canonical_form() {
        let e = Expr::product(vec![Expr::symbol("a"), Expr::power(x(), Expr::integer(-2))]);
        assert_eq!(e.to_string(), "a/x^2");
        let g = Expr::relation(
            RelationKind::Eq,
            Expr::apply(Transcendental::Exp, Expr::apply(Transcendental::Log, x())),
            x(),
        );
        assert_eq!(g.to_string(), "exp(log(x)) = x");
        assert_eq!(g.to_wolfram(), "Exp[Log[x]] == x");
    }

    #[test]
    fn test_witness_validation() {
        let goal = Expr::relation(RelationKind::Le, Expr::symbol("a"), Expr::symbol("C"));
        let ok = ProofObligation::new(vec![], goal.clone()).with_witness("C", Expr::integer(2)).unwrap();
        assert!(ok.validate_witnesses().is_ok());

        let neg = ProofObligation::new(vec![], goal.clone()).with_witness("C", Expr::integer(-1)).unwrap();
        assert!(matches!(neg.validate_witnesses(), Err(ProverError::InvalidWitness { .. })));

        let symbolic = ProofObligation::new(vec![], goal.clone()).with_witness("C", Expr::symbol("k")).unwrap();
        assert!(matches!(symbolic.validate_witnesses(), Err(ProverError::InvalidWitness { .. })));

        let foreign = ProofObligation::new(vec![], goal).with_witness("a", Expr::integer(1)).unwrap();
        assert!(matches!(foreign.validate_witnesses(), Err(ProverError::InvalidWitness { .. })));
    }

    #[test]
    fn test_apply_witnesses_removes_existential() {
        let goal = Expr::relation(
            RelationKind::Le,
            Expr::symbol("a"),
            Expr::product(vec![Expr::symbol("C"), Expr::symbol("b")]),
        );
        let ob = ProofObligation::new(vec![], goal)
            .with_witness("C", Expr::integer(2))
            .unwrap()
            .apply_witnesses()
            .unwrap();
        assert!(ob.existentials.is_empty());
        assert!(ob.witness.is_empty());
        assert!(!ob.goal.free_symbols().contains("C"));
    }

    #[test]
    fn test_bound_question_obligation() {
        let q = BoundQuestion {
            domain: vec![Expr::relation(RelationKind::Gt, x(), Expr::integer(0))],
            lhs: x(),
            rhs: Expr::apply(Transcendental::Exp, x()),
        };
        let ob = q.obligation(RATE_CONSTANT).unwrap();
        assert_eq!(ob.existentials, vec!["C"]);
        assert_eq!(ob.goal.to_string(), "x <= C*exp(x)");
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::Proved.to_string(), "proved");
        assert_eq!(Verdict::Disproved.to_string(), "not proved");
        assert_eq!(
            Verdict::Unknown { reason: "timeout".into() }.to_string(),
            "unknown timeout"
        );
    }
}
