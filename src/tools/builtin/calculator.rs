//! Arithmetic calculator tool
//!
//! Evaluates a restricted expression language: integer and decimal literals,
//! `+ - * / // % **`, unary signs and parentheses. Integers are 64-bit and
//! checked; `/` always produces a float, `//` floors, `%` takes the sign of
//! the divisor and `**` is right-associative.

use crate::tools::{Outcome, ToolInvoker, ToolKind};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Nesting limit for parentheses and unary operators
const MAX_DEPTH: usize = 64;

/// Evaluation errors, rendered into `Error: <message>` outcomes
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unexpected '{token}' at position {pos}")]
    UnexpectedToken { token: String, pos: usize },
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("zero cannot be raised to a negative power")]
    ZeroToNegativePower,
    #[error("negative number cannot be raised to a fractional power")]
    ComplexResult,
    #[error("expression nested too deeply")]
    TooDeep,
}

/// Calculator value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(x) if x.is_nan() => f.write_str("nan"),
            Number::Float(x) if x.is_infinite() => {
                f.write_str(if *x > 0.0 { "inf" } else { "-inf" })
            }
            Number::Float(x) if *x != 0.0 && (x.abs() >= 1e16 || x.abs() < 1e-4) => {
                f.write_str(&scientific(*x))
            }
            // Whole floats keep a trailing `.0` so they read as floats
            Number::Float(x) if x.fract() == 0.0 => write!(f, "{x:.1}"),
            Number::Float(x) => write!(f, "{x}"),
        }
    }
}

/// Exponent notation with a signed, at least two-digit exponent (`1e+20`, `2.5e-05`)
fn scientific(x: f64) -> String {
    let formatted = format!("{x:e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => formatted,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Number),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    DoubleStar,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{n}"),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::DoubleSlash => f.write_str("//"),
            Token::Percent => f.write_str("%"),
            Token::DoubleStar => f.write_str("**"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

/// Split an expression into positioned tokens (pure function)
fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, EvalError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let start = i;
        match ch {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '0'..='9' | '.' => {
                let (number, next) = scan_number(&chars, i)?;
                tokens.push((Token::Num(number), start));
                i = next;
                continue;
            }
            '+' => tokens.push((Token::Plus, start)),
            '-' => tokens.push((Token::Minus, start)),
            '%' => tokens.push((Token::Percent, start)),
            '(' => tokens.push((Token::LParen, start)),
            ')' => tokens.push((Token::RParen, start)),
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push((Token::DoubleStar, start));
                i += 1;
            }
            '*' => tokens.push((Token::Star, start)),
            '/' if chars.get(i + 1) == Some(&'/') => {
                tokens.push((Token::DoubleSlash, start));
                i += 1;
            }
            '/' => tokens.push((Token::Slash, start)),
            other => return Err(EvalError::UnexpectedChar { ch: other, pos: start }),
        }
        i += 1;
    }

    Ok(tokens)
}

/// Scan a numeric literal starting at `start`, returning it and the next index
fn scan_number(chars: &[char], start: usize) -> Result<(Number, usize), EvalError> {
    let mut i = start;
    let mut literal = String::new();
    let mut is_float = false;

    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == '_') {
        if chars[i] == '.' {
            is_float = true;
        }
        if chars[i] != '_' {
            literal.push(chars[i]);
        }
        i += 1;
    }

    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        is_float = true;
        literal.push('e');
        i += 1;
        if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
            literal.push(chars[i]);
            i += 1;
        }
        while i < chars.len() && chars[i].is_ascii_digit() {
            literal.push(chars[i]);
            i += 1;
        }
    }

    let number = if is_float {
        literal
            .parse::<f64>()
            .map(Number::Float)
            .map_err(|_| EvalError::InvalidNumber(literal.clone()))?
    } else {
        literal.parse::<i64>().map(Number::Int).map_err(|e| {
            if matches!(e.kind(), std::num::IntErrorKind::PosOverflow) {
                EvalError::Overflow
            } else {
                EvalError::InvalidNumber(literal.clone())
            }
        })?
    };

    Ok((number, i))
}

/// Recursive-descent parser that evaluates as it goes
struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        self.pos += 1;
        token
    }

    fn unexpected(&self) -> EvalError {
        match self.tokens.get(self.pos) {
            Some((token, pos)) => EvalError::UnexpectedToken {
                token: token.to_string(),
                pos: *pos,
            },
            None => EvalError::UnexpectedEnd,
        }
    }

    fn descend(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(EvalError::TooDeep);
        }
        Ok(())
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<Number, EvalError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    value = add(value, self.term()?)?;
                }
                Some(Token::Minus) => {
                    self.advance();
                    value = sub(value, self.term()?)?;
                }
                _ => return Ok(value),
            }
        }
    }

    // term := factor (('*' | '/' | '//' | '%') factor)*
    fn term(&mut self) -> Result<Number, EvalError> {
        let mut value = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => Token::Star,
                Some(Token::Slash) => Token::Slash,
                Some(Token::DoubleSlash) => Token::DoubleSlash,
                Some(Token::Percent) => Token::Percent,
                _ => return Ok(value),
            };
            self.advance();
            let rhs = self.factor()?;
            value = match op {
                Token::Star => mul(value, rhs)?,
                Token::Slash => true_div(value, rhs)?,
                Token::DoubleSlash => floor_div(value, rhs)?,
                _ => modulo(value, rhs)?,
            };
        }
    }

    // factor := ('+' | '-') factor | power
    fn factor(&mut self) -> Result<Number, EvalError> {
        match self.peek() {
            Some(Token::Plus) => {
                self.advance();
                self.descend()?;
                let value = self.factor();
                self.depth -= 1;
                value
            }
            Some(Token::Minus) => {
                self.advance();
                self.descend()?;
                let value = self.factor().and_then(negate);
                self.depth -= 1;
                value
            }
            _ => self.power(),
        }
    }

    // power := atom ['**' factor]
    fn power(&mut self) -> Result<Number, EvalError> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::DoubleStar) {
            self.advance();
            self.descend()?;
            let exponent = self.factor();
            self.depth -= 1;
            return pow(base, exponent?);
        }
        Ok(base)
    }

    // atom := NUMBER | '(' expr ')'
    fn atom(&mut self) -> Result<Number, EvalError> {
        match self.peek() {
            Some(Token::Num(n)) => {
                let n = *n;
                self.advance();
                Ok(n)
            }
            Some(Token::LParen) => {
                self.advance();
                self.descend()?;
                let value = self.expr()?;
                self.depth -= 1;
                if self.peek() != Some(&Token::RParen) {
                    return Err(self.unexpected());
                }
                self.advance();
                Ok(value)
            }
            _ => Err(self.unexpected()),
        }
    }
}

fn add(a: Number, b: Number) -> Result<Number, EvalError> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            x.checked_add(y).map(Number::Int).ok_or(EvalError::Overflow)
        }
        _ => Ok(Number::Float(a.as_f64() + b.as_f64())),
    }
}

fn sub(a: Number, b: Number) -> Result<Number, EvalError> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            x.checked_sub(y).map(Number::Int).ok_or(EvalError::Overflow)
        }
        _ => Ok(Number::Float(a.as_f64() - b.as_f64())),
    }
}

fn mul(a: Number, b: Number) -> Result<Number, EvalError> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            x.checked_mul(y).map(Number::Int).ok_or(EvalError::Overflow)
        }
        _ => Ok(Number::Float(a.as_f64() * b.as_f64())),
    }
}

fn true_div(a: Number, b: Number) -> Result<Number, EvalError> {
    if b.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    Ok(Number::Float(a.as_f64() / b.as_f64()))
}

fn floor_div(a: Number, b: Number) -> Result<Number, EvalError> {
    if b.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            let q = x.checked_div(y).ok_or(EvalError::Overflow)?;
            if x % y != 0 && ((x < 0) != (y < 0)) {
                Ok(Number::Int(q - 1))
            } else {
                Ok(Number::Int(q))
            }
        }
        _ => Ok(Number::Float((a.as_f64() / b.as_f64()).floor())),
    }
}

fn modulo(a: Number, b: Number) -> Result<Number, EvalError> {
    if b.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            let r = x.checked_rem(y).ok_or(EvalError::Overflow)?;
            if r != 0 && ((r < 0) != (y < 0)) {
                Ok(Number::Int(r + y))
            } else {
                Ok(Number::Int(r))
            }
        }
        _ => {
            let (x, y) = (a.as_f64(), b.as_f64());
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                Ok(Number::Float(r + y))
            } else {
                Ok(Number::Float(r))
            }
        }
    }
}

fn pow(base: Number, exponent: Number) -> Result<Number, EvalError> {
    if base.is_zero() && exponent.as_f64() < 0.0 {
        return Err(EvalError::ZeroToNegativePower);
    }
    match (base, exponent) {
        (Number::Int(b), Number::Int(e)) if e >= 0 => {
            let e = u32::try_from(e).map_err(|_| EvalError::Overflow)?;
            b.checked_pow(e).map(Number::Int).ok_or(EvalError::Overflow)
        }
        _ => {
            let (b, e) = (base.as_f64(), exponent.as_f64());
            if b < 0.0 && e.fract() != 0.0 {
                return Err(EvalError::ComplexResult);
            }
            Ok(Number::Float(b.powf(e)))
        }
    }
}

fn negate(value: Number) -> Result<Number, EvalError> {
    match value {
        Number::Int(i) => i.checked_neg().map(Number::Int).ok_or(EvalError::Overflow),
        Number::Float(f) => Ok(Number::Float(-f)),
    }
}

/// Calculator tool - builtin implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct Calculator;

impl Calculator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate an expression (pure function)
    pub fn evaluate(expression: &str) -> Result<Number, EvalError> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err(EvalError::Empty);
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let value = parser.expr()?;
        if parser.pos < parser.tokens.len() {
            return Err(parser.unexpected());
        }
        Ok(value)
    }

    /// Map an evaluation into the tool's textual outcome (pure function)
    fn format_outcome(result: Result<Number, EvalError>) -> Outcome {
        match result {
            Ok(value) => Outcome::Success(format!("Result: {value}")),
            Err(e) => Outcome::Failure(format!("Error: {e}")),
        }
    }
}

#[async_trait]
impl ToolInvoker for Calculator {
    fn kind(&self) -> ToolKind {
        ToolKind::Calculator
    }

    async fn invoke(&self, input: &str) -> Outcome {
        let outcome = Self::format_outcome(Self::evaluate(input));
        tracing::debug!(expression = %input, outcome = %outcome, "Calculator evaluated expression");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn eval(expr: &str) -> Result<Number, EvalError> {
        Calculator::evaluate(expr)
    }

    #[test]
    fn test_simple_addition() {
        assert_eq!(eval("2+2"), Ok(Number::Int(4)));
        assert_eq!(eval(" 2 +  2 "), Ok(Number::Int(4)));
    }

    #[test]
    fn test_precedence_and_parentheses() {
        assert_eq!(eval("2+3*4"), Ok(Number::Int(14)));
        assert_eq!(eval("(2+3)*4"), Ok(Number::Int(20)));
        assert_eq!(eval("10-4-3"), Ok(Number::Int(3)));
    }

    #[test]
    fn test_true_division_is_float() {
        assert_eq!(eval("7/2"), Ok(Number::Float(3.5)));
        assert_eq!(eval("4/2"), Ok(Number::Float(2.0)));
    }

    #[test]
    fn test_floor_division_and_modulo_follow_divisor_sign() {
        assert_eq!(eval("7//2"), Ok(Number::Int(3)));
        assert_eq!(eval("-7//2"), Ok(Number::Int(-4)));
        assert_eq!(eval("-7%3"), Ok(Number::Int(2)));
        assert_eq!(eval("7%-3"), Ok(Number::Int(-2)));
        assert_eq!(eval("7.5//2"), Ok(Number::Float(3.0)));
    }

    #[test]
    fn test_power_is_right_associative_and_binds_tighter_than_unary_minus() {
        assert_eq!(eval("2**3**2"), Ok(Number::Int(512)));
        assert_eq!(eval("-2**2"), Ok(Number::Int(-4)));
        assert_eq!(eval("2**-1"), Ok(Number::Float(0.5)));
    }

    #[test]
    fn test_unary_signs() {
        assert_eq!(eval("-3+5"), Ok(Number::Int(2)));
        assert_eq!(eval("+-+3"), Ok(Number::Int(-3)));
    }

    #[test]
    fn test_float_literals() {
        assert_eq!(eval("0.1+0.2").map(|n| n.to_string()), Ok("0.30000000000000004".to_string()));
        assert_eq!(eval(".5*4"), Ok(Number::Float(2.0)));
        assert_eq!(eval("1e3"), Ok(Number::Float(1000.0)));
    }

    #[test]
    fn test_incomplete_expression() {
        assert_eq!(eval("2+"), Err(EvalError::UnexpectedEnd));
        assert_eq!(eval("(2+3"), Err(EvalError::UnexpectedEnd));
    }

    #[test]
    fn test_unexpected_tokens_report_position() {
        assert_eq!(
            eval("2+)"),
            Err(EvalError::UnexpectedToken {
                token: ")".to_string(),
                pos: 2
            })
        );
        assert_eq!(
            eval("2 3"),
            Err(EvalError::UnexpectedToken {
                token: "3".to_string(),
                pos: 2
            })
        );
    }

    #[test]
    fn test_rejects_non_arithmetic_input() {
        assert_eq!(
            eval("__import__('os')"),
            Err(EvalError::UnexpectedChar { ch: '_', pos: 0 })
        );
        assert_eq!(eval("Alan_Turing"), Err(EvalError::UnexpectedChar { ch: 'A', pos: 0 }));
        assert_eq!(eval(""), Err(EvalError::Empty));
        assert_eq!(eval("   "), Err(EvalError::Empty));
    }

    #[test]
    fn test_arithmetic_errors() {
        assert_eq!(eval("1/0"), Err(EvalError::DivisionByZero));
        assert_eq!(eval("1//0"), Err(EvalError::DivisionByZero));
        assert_eq!(eval("1%0"), Err(EvalError::DivisionByZero));
        assert_eq!(eval("0**-1"), Err(EvalError::ZeroToNegativePower));
        assert_eq!(eval("(-8)**0.5"), Err(EvalError::ComplexResult));
        assert_eq!(eval("9223372036854775807+1"), Err(EvalError::Overflow));
        assert_eq!(eval("99999999999999999999"), Err(EvalError::Overflow));
        assert_eq!(eval("1.2.3"), Err(EvalError::InvalidNumber("1.2.3".to_string())));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(eval(&deep), Err(EvalError::TooDeep));

        let shallow = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert_eq!(eval(&shallow), Ok(Number::Int(1)));
    }

    #[test]
    fn test_power_chain_nesting_limit() {
        let chain = format!("{}1", "1**".repeat(20_000));
        assert_eq!(eval(&chain), Err(EvalError::TooDeep));

        let unary_chain = format!("{}1", "2**-".repeat(20_000));
        assert_eq!(eval(&unary_chain), Err(EvalError::TooDeep));

        assert_eq!(eval("2**2**2**2"), Ok(Number::Int(65536)));
    }

    #[tokio::test]
    async fn test_invoke_power_chain_is_a_failure_outcome() {
        let outcome = Calculator::new()
            .invoke(&format!("{}1", "1**".repeat(20_000)))
            .await;
        assert_eq!(
            outcome,
            Outcome::Failure("Error: expression nested too deeply".to_string())
        );
    }

    #[test]
    fn test_number_display() {
        assert_eq!(Number::Int(4).to_string(), "4");
        assert_eq!(Number::Float(4.0).to_string(), "4.0");
        assert_eq!(Number::Float(-0.5).to_string(), "-0.5");
        assert_eq!(Number::Float(f64::INFINITY).to_string(), "inf");
        assert_eq!(Number::Float(0.0).to_string(), "0.0");
        assert_eq!(Number::Float(1e15).to_string(), "1000000000000000.0");
        assert_eq!(Number::Float(1e16).to_string(), "1e+16");
        assert_eq!(Number::Float(-2.5e20).to_string(), "-2.5e+20");
        assert_eq!(Number::Float(0.0001).to_string(), "0.0001");
        assert_eq!(Number::Float(0.00001).to_string(), "1e-05");
        assert_eq!(Number::Float(1.5e-123).to_string(), "1.5e-123");
        assert_eq!(eval("10.0**20").map(|n| n.to_string()), Ok("1e+20".to_string()));
    }

    #[tokio::test]
    async fn test_invoke_formats_success() {
        let outcome = Calculator::new().invoke("2+2").await;
        assert_eq!(outcome, Outcome::Success("Result: 4".to_string()));
    }

    #[tokio::test]
    async fn test_invoke_formats_failure() {
        let outcome = Calculator::new().invoke("2+").await;
        assert_eq!(
            outcome,
            Outcome::Failure("Error: unexpected end of expression".to_string())
        );
    }

    #[test]
    fn test_kind() {
        assert_eq!(Calculator::new().kind(), ToolKind::Calculator);
    }

    proptest! {
        #[test]
        fn prop_integer_addition_matches_native(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
            let expr = format!("{a} + ({b})");
            prop_assert_eq!(eval(&expr), Ok(Number::Int(a + b)));
        }

        #[test]
        fn prop_evaluation_never_panics(input in "[0-9+\\-*/%(). ]{0,40}") {
            let _ = eval(&input);
        }

        #[test]
        fn prop_floor_div_and_modulo_recombine(a in -10_000i64..10_000, b in -100i64..100) {
            prop_assume!(b != 0);
            let q = eval(&format!("{a}//({b})"));
            let r = eval(&format!("{a}%({b})"));
            match (q, r) {
                (Ok(Number::Int(q)), Ok(Number::Int(r))) => prop_assert_eq!(q * b + r, a),
                other => prop_assert!(false, "unexpected result {:?}", other),
            }
        }
    }
}
