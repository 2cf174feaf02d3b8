// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! SMT-LIB 2 term representation for the cvc5 dialect

use num_rational::BigRational;
use num_traits::{Signed, Zero};
use std::fmt;

/// Built-in operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Add,
    Mul,
    Div,
    Pow,
    Le,
    Lt,
    Ge,
    Gt,
    Eq,
    And,
    Implies,
    Not,
    Exp,
    Sin,
    Cos,
    Tan,
    Arcsin,
    Arccos,
    Arctan,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Add => "+",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Pow => "^",
            Op::Le => "<=",
            Op::Lt => "<",
            Op::Ge => ">=",
            Op::Gt => ">",
            Op::Eq => "=",
            Op::And => "and",
            Op::Implies => "=>",
            Op::Not => "not",
            Op::Exp => "exp",
            Op::Sin => "sin",
            Op::Cos => "cos",
            Op::Tan => "tan",
            Op::Arcsin => "arcsin",
            Op::Arccos => "arccos",
            Op::Arctan => "arctan",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantifier {
    Forall,
    Exists,
}

/// SMT-LIB term
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SmtTerm {
    Symbol(String),
    Real(BigRational),
    Bool(bool),
    App {
        op: Op,
        args: Vec<SmtTerm>,
    },
    /// Application of a declared (uninterpreted) function
    Apply {
        func: String,
        args: Vec<SmtTerm>,
    },
    Quantified {
        quantifier: Quantifier,
        bindings: Vec<String>,
        body: Box<SmtTerm>,
        /// One multi-pattern per entry
        patterns: Vec<Vec<SmtTerm>>,
    },
}

impl SmtTerm {
    pub fn symbol(name: &str) -> Self {
        SmtTerm::Symbol(name.to_string())
    }

    pub fn app(op: Op, args: Vec<SmtTerm>) -> Self {
        SmtTerm::App { op, args }
    }

    pub fn unary(op: Op, arg: SmtTerm) -> Self {
        SmtTerm::App { op, args: vec![arg] }
    }

    pub fn binary(op: Op, lhs: SmtTerm, rhs: SmtTerm) -> Self {
        SmtTerm::App {
            op,
            args: vec![lhs, rhs],
        }
    }

    /// Conjunction; empty is `true`, a single conjunct is returned as is
    pub fn and(mut terms: Vec<SmtTerm>) -> Self {
        match terms.len() {
            0 => SmtTerm::Bool(true),
            1 => terms.remove(0),
            _ => SmtTerm::app(Op::And, terms),
        }
    }

    pub fn implies(antecedent: SmtTerm, consequent: SmtTerm) -> Self {
        SmtTerm::binary(Op::Implies, antecedent, consequent)
    }

    pub fn not(term: SmtTerm) -> Self {
        SmtTerm::unary(Op::Not, term)
    }

    /// Quantify over `bindings`; no bindings returns the body unchanged
    pub fn quantify(quantifier: Quantifier, bindings: Vec<String>, body: SmtTerm) -> Self {
        if bindings.is_empty() {
            return body;
        }
        SmtTerm::Quantified {
            quantifier,
            bindings,
            body: Box::new(body),
            patterns: Vec::new(),
        }
    }

    pub fn forall(bindings: Vec<String>, body: SmtTerm) -> Self {
        Self::quantify(Quantifier::Forall, bindings, body)
    }

    pub fn exists(bindings: Vec<String>, body: SmtTerm) -> Self {
        Self::quantify(Quantifier::Exists, bindings, body)
    }

    /// Attach an instantiation pattern to a quantified term
    pub fn with_pattern(mut self, pattern: Vec<SmtTerm>) -> Self {
        if let SmtTerm::Quantified { patterns, .. } = &mut self {
            patterns.push(pattern);
        }
        self
    }

    /// Operator-tree shape with leaves erased
    pub fn shape(&self) -> String {
        match self {
            SmtTerm::Symbol(_) => "sym".to_string(),
            SmtTerm::Real(_) => "real".to_string(),
            SmtTerm::Bool(_) => "bool".to_string(),
            SmtTerm::App { op, args } => {
                let inner: Vec<String> = args.iter().map(SmtTerm::shape).collect();
                format!("({} {})", op, inner.join(" "))
            }
            SmtTerm::Apply { func, args } => {
                let inner: Vec<String> = args.iter().map(SmtTerm::shape).collect();
                format!("({} {})", func, inner.join(" "))
            }
            SmtTerm::Quantified {
                quantifier, bindings, body, ..
            } => format!("({:?}/{} {})", quantifier, bindings.len(), body.shape()),
        }
    }
}

/// Exact decimal rendering: `2.0`, `(/ 1.0 3.0)`, `(- 5.0)`
fn write_real(f: &mut fmt::Formatter<'_>, value: &BigRational) -> fmt::Result {
    let magnitude = value.abs();
    let body = if magnitude.is_integer() {
        format!("{}.0", magnitude.numer())
    } else {
        format!("(/ {}.0 {}.0)", magnitude.numer(), magnitude.denom())
    };
    if value.is_negative() && !value.is_zero() {
        write!(f, "(- {})", body)
    } else {
        f.write_str(&body)
    }
}

impl fmt::Display for SmtTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtTerm::Symbol(name) => f.write_str(&quote_symbol(name)),
            SmtTerm::Real(value) => write_real(f, value),
            SmtTerm::Bool(b) => write!(f, "{}", b),
            SmtTerm::App { op, args } => {
                write!(f, "({}", op)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                f.write_str(")")
            }
            SmtTerm::Apply { func, args } => {
                write!(f, "({}", quote_symbol(func))?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                f.write_str(")")
            }
            SmtTerm::Quantified {
                quantifier,
                bindings,
                body,
                patterns,
            } => {
                let q = match quantifier {
                    Quantifier::Forall => "forall",
                    Quantifier::Exists => "exists",
                };
                write!(f, "({} (", q)?;
                for (i, name) in bindings.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "({} Real)", quote_symbol(name))?;
                }
                f.write_str(") ")?;
                if patterns.is_empty() {
                    write!(f, "{}", body)?;
                } else {
                    write!(f, "(! {}", body)?;
                    for pattern in patterns {
                        f.write_str(" :pattern (")?;
                        for (i, t) in pattern.iter().enumerate() {
                            if i > 0 {
                                f.write_str(" ")?;
                            }
                            write!(f, "{}", t)?;
                        }
                        f.write_str(")")?;
                    }
                    f.write_str(")")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Prefix that keeps user variables apart from solver built-ins
/// (`abs`, `sec`, `select`, ...) and from the axioms' own variables
pub const USER_PREFIX: &str = "v_";

/// Script spelling of a user variable, before quoting
pub fn user_symbol(name: &str) -> String {
    format!("{}{}", USER_PREFIX, name)
}

fn is_simple_symbol(name: &str) -> bool {
    const EXTRA: &str = "~!@$%^&*_-+=<>.?/";
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || EXTRA.contains(c) => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || EXTRA.contains(c))
}

/// Anything that is not an ASCII simple symbol is written as `|name|`
pub fn quote_symbol(name: &str) -> String {
    if is_simple_symbol(name) {
        name.to_string()
    } else {
        format!("|{}|", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn real(p: i64, q: i64) -> SmtTerm {
        SmtTerm::Real(BigRational::new(BigInt::from(p), BigInt::from(q)))
    }

    #[test]
    fn test_real_rendering() {
        assert_eq!(real(2, 1).to_string(), "2.0");
        assert_eq!(real(1, 3).to_string(), "(/ 1.0 3.0)");
        assert_eq!(real(-5, 1).to_string(), "(- 5.0)");
        assert_eq!(real(-1, 2).to_string(), "(- (/ 1.0 2.0))");
        assert_eq!(real(0, 1).to_string(), "0.0");
    }

    #[test]
    fn test_quantifier_with_pattern() {
        let u = SmtTerm::symbol("u");
        let body = SmtTerm::binary(Op::Eq, SmtTerm::unary(Op::Exp, u.clone()), u.clone());
        let q = SmtTerm::forall(vec!["u".into()], body).with_pattern(vec![SmtTerm::unary(Op::Exp, u)]);
        assert_eq!(q.to_string(), "(forall ((u Real)) (! (= (exp u) u) :pattern ((exp u))))");
    }

    #[test]
    fn test_empty_quantifier_degenerates() {
        let body = SmtTerm::Bool(true);
        assert_eq!(SmtTerm::exists(vec![], body.clone()), body);
        assert_eq!(SmtTerm::and(vec![]), SmtTerm::Bool(true));
    }

    #[test]
    fn test_non_simple_symbols_are_quoted() {
        assert_eq!(SmtTerm::symbol("x1").to_string(), "x1");
        assert_eq!(SmtTerm::symbol(&user_symbol("abs")).to_string(), "v_abs");
        assert_eq!(SmtTerm::symbol(&user_symbol("α")).to_string(), "|v_α|");
        assert_eq!(quote_symbol("1x"), "|1x|");
        assert_eq!(quote_symbol(""), "||");
    }
}
