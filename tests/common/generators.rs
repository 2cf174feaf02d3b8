// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: MIT OR Palimpsest-0.6

//! Property-based testing generators for bigo expressions

use bigo::Expr;
use proptest::prelude::*;

/// Single-letter variable names; none collide with function names
pub fn var_name() -> impl Strategy<Value = String> {
    "[a-z]".prop_map(|s| s.to_string())
}

/// `k*v^e*f(w)` with every part optional except the variable
pub fn monomial_text() -> impl Strategy<Value = String> {
    (
        prop::option::of(2u32..10),
        var_name(),
        1u32..5,
        prop::option::of((prop_oneof![Just("exp"), Just("log"), Just("sin")], var_name())),
    )
        .prop_map(|(coefficient, var, exponent, func)| {
            let mut parts = Vec::new();
            if let Some(k) = coefficient {
                parts.push(k.to_string());
            }
            if exponent == 1 {
                parts.push(var);
            } else {
                parts.push(format!("{}^{}", var, exponent));
            }
            if let Some((f, arg)) = func {
                parts.push(format!("{}({})", f, arg));
            }
            parts.join("*")
        })
}

/// Sums of one to four monomials
pub fn polynomial_text() -> impl Strategy<Value = String> {
    prop::collection::vec(monomial_text(), 1..5).prop_map(|terms| terms.join(" + "))
}

/// `lhs <= rhs` between two generated sums
pub fn inequality_text() -> impl Strategy<Value = String> {
    (polynomial_text(), polynomial_text()).prop_map(|(lhs, rhs)| format!("{} <= {}", lhs, rhs))
}

/// `numerator * x^(-k)` built directly, with `k` in `1..=6`
pub fn product_with_negative_power() -> impl Strategy<Value = (Expr, String, i64)> {
    (var_name(), 1i64..=6).prop_filter_map("numerator and base must differ", |(num, k)| {
        if num == "x" {
            return None;
        }
        let expr = Expr::product(vec![
            Expr::symbol(num.as_str()),
            Expr::power(Expr::symbol("x"), Expr::integer(-k)),
        ]);
        Some((expr, num, k))
    })
}
