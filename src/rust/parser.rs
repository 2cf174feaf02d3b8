// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Expression normalizer
//!
//! Turns user text such as `"x*exp(x) <= C*exp(2*x)"` into a canonical
//! [`Expr`]. Grammar, loosest binding first:
//!
//! ```text
//! statement := expr [relop expr]
//! expr      := term (("+" | "-") term)*
//! term      := unary (("*" | "/") unary)*
//! unary     := ("-" | "+") unary | power
//! power     := atom [("^" | "**") unary]
//! atom      := number | ident "(" expr ")" | ident "[" expr "]" | ident | "(" expr ")"
//! ```
//!
//! Relations are only recognized at the top level of a statement.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, multispace0, one_of, satisfy},
    combinator::{map, opt, recognize},
    error::{ErrorKind, FromExternalError, ParseError},
    multi::separated_list1,
    sequence::{pair, tuple},
    IResult,
};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::One;

use crate::core::{Expr, RelationKind, Transcendental};
use crate::error::{ProverError, ProverResult};

/// Anything that can be turned into a canonical expression
pub trait Normalize {
    fn normalize(self) -> ProverResult<Expr>;
}

impl Normalize for &str {
    fn normalize(self) -> ProverResult<Expr> {
        parse_statement(self)
    }
}

impl Normalize for String {
    fn normalize(self) -> ProverResult<Expr> {
        parse_statement(&self)
    }
}

impl Normalize for &String {
    fn normalize(self) -> ProverResult<Expr> {
        parse_statement(self)
    }
}

impl Normalize for Expr {
    fn normalize(self) -> ProverResult<Expr> {
        Ok(self)
    }
}

impl Normalize for &Expr {
    fn normalize(self) -> ProverResult<Expr> {
        Ok(self.clone())
    }
}

impl Normalize for i64 {
    fn normalize(self) -> ProverResult<Expr> {
        Ok(Expr::integer(self))
    }
}

/// Parse a statement: an expression, optionally compared with another
pub fn parse_statement(text: &str) -> ProverResult<Expr> {
    run(text, statement)
}

/// Parse an arithmetic expression; relations are rejected
pub fn parse_expression(text: &str) -> ProverResult<Expr> {
    run(text, expr)
}

/// Parse a conjunction of statements separated by `&&`, `∧`, or `,`,
/// optionally wrapped in `{...}` or `[...]`
pub fn parse_conjunction(text: &str) -> ProverResult<Vec<Expr>> {
    let trimmed = text.trim();
    let inner = strip_brackets(trimmed, '{', '}')
        .or_else(|| strip_brackets(trimmed, '[', ']'))
        .unwrap_or(trimmed);
    // offsets reported against the unwrapped text
    run(inner, |input| separated_list1(conjunction_separator, statement)(input))
}

fn strip_brackets(text: &str, open: char, close: char) -> Option<&str> {
    text.strip_prefix(open)?.strip_suffix(close)
}

fn run<'a, O, F>(text: &'a str, mut parser: F) -> ProverResult<O>
where
    F: FnMut(&'a str) -> PResult<'a, O>,
{
    let offset = |rest: &str| text.len() - rest.len();
    match parser(text) {
        Ok((rest, value)) => {
            let (rest, _) = multispace0::<_, SyntaxError<'_>>(rest).unwrap_or((rest, ""));
            if rest.is_empty() {
                Ok(value)
            } else {
                Err(ProverError::malformed(text, offset(rest), trailing_message(rest)))
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(ProverError::malformed(text, offset(e.input), e.message))
        }
        Err(nom::Err::Incomplete(_)) => Err(ProverError::malformed(text, text.len(), "incomplete input")),
    }
}

fn trailing_message(rest: &str) -> &'static str {
    if rest.starts_with(')') || rest.starts_with(']') {
        "unbalanced closing bracket"
    } else if rest.starts_with(['<', '>', '=', '≤', '≥']) {
        "comparison is only allowed at the top level"
    } else {
        "unexpected trailing input"
    }
}

/// Parse error that carries a readable message
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SyntaxError<'a> {
    input: &'a str,
    message: String,
}

impl<'a> SyntaxError<'a> {
    fn new(input: &'a str, message: impl Into<String>) -> Self {
        SyntaxError {
            input,
            message: message.into(),
        }
    }
}

impl<'a> ParseError<&'a str> for SyntaxError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        SyntaxError::new(input, format!("unexpected input ({:?})", kind))
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    // keep whichever branch got further
    fn or(self, other: Self) -> Self {
        if other.input.len() <= self.input.len() {
            other
        } else {
            self
        }
    }
}

impl<'a> FromExternalError<&'a str, String> for SyntaxError<'a> {
    fn from_external_error(input: &'a str, _kind: ErrorKind, e: String) -> Self {
        SyntaxError::new(input, e)
    }
}

type PResult<'a, O> = IResult<&'a str, O, SyntaxError<'a>>;

fn failure<O>(input: &str, message: impl Into<String>) -> PResult<'_, O> {
    Err(nom::Err::Failure(SyntaxError::new(input, message)))
}

/// Skip whitespace, then require `c`
fn expect_char<'a>(c: char) -> impl FnMut(&'a str) -> PResult<'a, char> {
    move |input: &'a str| {
        let (input, _) = multispace0(input)?;
        match input.chars().next() {
            Some(found) if found == c => Ok((&input[c.len_utf8()..], c)),
            _ => failure(input, format!("expected '{}'", c)),
        }
    }
}

fn conjunction_separator(input: &str) -> PResult<'_, &str> {
    let (input, _) = multispace0(input)?;
    let (input, sep) = alt((tag("&&"), tag("∧"), tag(",")))(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, sep))
}

fn statement(input: &str) -> PResult<'_, Expr> {
    let (input, lhs) = expr(input)?;
    let (input, _) = multispace0(input)?;
    let (input, kind) = opt(relation_op)(input)?;
    match kind {
        None => Ok((input, lhs)),
        Some(kind) => {
            let (input, rhs) = expr(input).map_err(into_failure)?;
            Ok((input, Expr::relation(kind, lhs, rhs)))
        }
    }
}

fn relation_op(input: &str) -> PResult<'_, RelationKind> {
    alt((
        map(alt((tag("<="), tag("≤"))), |_| RelationKind::Le),
        map(alt((tag(">="), tag("≥"))), |_| RelationKind::Ge),
        map(tag("=="), |_| RelationKind::Eq),
        map(char('<'), |_| RelationKind::Lt),
        map(char('>'), |_| RelationKind::Gt),
        map(char('='), |_| RelationKind::Eq),
    ))(input)
}

fn expr(input: &str) -> PResult<'_, Expr> {
    let (mut input, first) = term(input)?;
    let mut terms = vec![first];
    loop {
        let (rest, _) = multispace0(input)?;
        let Ok((rest, op)) = one_of::<_, _, SyntaxError<'_>>("+-")(rest) else {
            break;
        };
        let (rest, rhs) = term(rest).map_err(into_failure)?;
        terms.push(if op == '-' { rhs.negate() } else { rhs });
        input = rest;
    }
    Ok((input, Expr::sum(terms)))
}

fn term(input: &str) -> PResult<'_, Expr> {
    let (mut input, first) = unary(input)?;
    let mut factors = vec![first];
    loop {
        let (rest, _) = multispace0(input)?;
        let Ok((rest, op)) = one_of::<_, _, SyntaxError<'_>>("*/")(rest) else {
            break;
        };
        let operand_start = rest;
        let (rest, rhs) = unary(rest).map_err(into_failure)?;
        if op == '/' {
            match rhs.reciprocal() {
                Some(r) => factors.push(r),
                None => return failure(operand_start, "division by zero"),
            }
        } else {
            factors.push(rhs);
        }
        input = rest;
    }
    Ok((input, Expr::product(factors)))
}

fn unary(input: &str) -> PResult<'_, Expr> {
    let (input, _) = multispace0(input)?;
    if let Ok((rest, sign)) = one_of::<_, _, SyntaxError<'_>>("+-")(input) {
        let (rest, operand) = unary(rest).map_err(into_failure)?;
        let value = if sign == '-' { operand.negate() } else { operand };
        return Ok((rest, value));
    }
    power(input)
}

fn power(input: &str) -> PResult<'_, Expr> {
    let (input, base) = atom(input)?;
    let (after_ws, _) = multispace0(input)?;
    let (rest, op) = opt(alt((tag("**"), tag("^"))))(after_ws)?;
    if op.is_none() {
        return Ok((input, base));
    }
    let (rest, exponent) = unary(rest).map_err(into_failure)?;
    Ok((rest, Expr::power(base, exponent)))
}

fn atom(input: &str) -> PResult<'_, Expr> {
    let (input, _) = multispace0(input)?;
    alt((number, call_or_symbol, parenthesized))(input).map_err(|e| match e {
        nom::Err::Error(_) => nom::Err::Error(SyntaxError::new(
            input,
            "expected a number, symbol, function call, or '('",
        )),
        other => other,
    })
}

fn parenthesized(input: &str) -> PResult<'_, Expr> {
    let (input, _) = char('(')(input)?;
    let (input, inner) = expr(input).map_err(into_failure)?;
    let (input, _) = expect_char(')')(input)?;
    Ok((input, inner))
}

fn number(input: &str) -> PResult<'_, Expr> {
    let (rest, text) = recognize(tuple((
        digit1,
        opt(pair(char('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;
    match parse_decimal(text) {
        Ok(value) => Ok((rest, Expr::Number(value))),
        Err(message) => Err(nom::Err::Failure(SyntaxError::from_external_error(
            input,
            ErrorKind::MapRes,
            message,
        ))),
    }
}

/// Exact value of a decimal literal such as `12.5e-3`
fn parse_decimal(text: &str) -> Result<BigRational, String> {
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(pos) => (&text[..pos], &text[pos + 1..]),
        None => (text, "0"),
    };
    let exponent: i64 = exponent
        .parse()
        .map_err(|_| format!("invalid exponent in '{}'", text))?;
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits: BigInt = format!("{}{}", whole, fraction)
        .parse()
        .map_err(|_| format!("invalid number '{}'", text))?;
    let scale = exponent - fraction.len() as i64;
    if scale.abs() > 4096 {
        return Err(format!("exponent out of range in '{}'", text));
    }
    let ten = BigInt::from(10u8);
    let mut factor = BigInt::one();
    for _ in 0..scale.unsigned_abs() {
        factor *= &ten;
    }
    Ok(if scale >= 0 {
        BigRational::from_integer(digits * factor)
    } else {
        BigRational::new(digits, factor)
    })
}

fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

enum Function {
    Transcendental(Transcendental),
    Sqrt,
}

fn lookup_function(name: &str) -> Option<Function> {
    let func = match name.to_ascii_lowercase().as_str() {
        "exp" => Transcendental::Exp,
        "log" | "ln" => Transcendental::Log,
        "sin" => Transcendental::Sin,
        "cos" => Transcendental::Cos,
        "tan" => Transcendental::Tan,
        "asin" | "arcsin" => Transcendental::Asin,
        "acos" | "arccos" => Transcendental::Acos,
        "atan" | "arctan" => Transcendental::Atan,
        "sqrt" => return Some(Function::Sqrt),
        _ => return None,
    };
    Some(Function::Transcendental(func))
}

fn call_or_symbol(input: &str) -> PResult<'_, Expr> {
    let (rest, name) = identifier(input)?;
    let (after_ws, _) = multispace0(rest)?;
    let open = after_ws.chars().next().filter(|c| *c == '(' || *c == '[');

    let Some(open) = open else {
        if lookup_function(name).is_some() {
            return failure(input, format!("function '{}' needs an argument", name));
        }
        return Ok((rest, Expr::Symbol(name.to_string())));
    };

    let Some(function) = lookup_function(name) else {
        return failure(input, format!("unknown function '{}'", name));
    };
    let close = if open == '(' { ')' } else { ']' };
    let (rest, arg) = expr(&after_ws[1..]).map_err(into_failure)?;
    let (rest, _) = expect_char(close)(rest)?;
    let value = match function {
        Function::Transcendental(func) => Expr::apply(func, arg),
        Function::Sqrt => Expr::power(arg, Expr::rational(1, 2)),
    };
    Ok((rest, value))
}

fn into_failure(e: nom::Err<SyntaxError<'_>>) -> nom::Err<SyntaxError<'_>> {
    match e {
        nom::Err::Error(inner) => nom::Err::Failure(inner),
        other => other,
    }
}
