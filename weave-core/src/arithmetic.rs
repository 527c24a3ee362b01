//! Minimal arithmetic used by numeric constants
//!
//! Grammar: `term (op term)*` where `op` is one of `+ - * /` and a term is a
//! decimal literal with an optional leading minus. Operators are applied from
//! left to right without precedence, so `2 + 5 * 1 - 3 / 2 * 5` yields `10`.

use crate::error::{ContainerError, ContainerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermState {
    Begin,
    Zero,
    Digit,
    Float,
}

fn is_operator(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | '/')
}

struct Cursor<'a> {
    input: &'a str,
    at: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, at: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.at..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.at += rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_whitespace()).len();
    }

    fn at_end(&self) -> bool {
        self.at >= self.input.len()
    }

    fn term(&mut self) -> ContainerResult<f64> {
        self.skip_whitespace();

        let begin = self.at;
        let mut state = TermState::Begin;
        let mut signed = false;

        for c in self.rest().chars() {
            let next = match state {
                TermState::Begin => match c {
                    '0' => TermState::Zero,
                    '1'..='9' => TermState::Digit,
                    '.' => TermState::Float,
                    '-' if !signed => {
                        signed = true;
                        self.at += 1;
                        continue;
                    }
                    _ => {
                        return Err(ContainerError::syntax(format!(
                            "unexpected character {} for <term>",
                            c
                        )))
                    }
                },
                TermState::Zero => match c {
                    '0' => TermState::Zero,
                    '.' => TermState::Float,
                    c if c.is_ascii_whitespace() || is_operator(c) => break,
                    _ => return Err(Self::trailing(c)),
                },
                TermState::Digit => match c {
                    '0'..='9' => TermState::Digit,
                    '.' => TermState::Float,
                    c if c.is_ascii_whitespace() || is_operator(c) => break,
                    _ => return Err(Self::trailing(c)),
                },
                TermState::Float => match c {
                    '0'..='9' => TermState::Float,
                    c if c.is_ascii_whitespace() || is_operator(c) => break,
                    _ => return Err(Self::trailing(c)),
                },
            };

            state = next;
            self.at += c.len_utf8();
        }

        if state == TermState::Begin {
            return Err(ContainerError::syntax("expected <term> but found nothing"));
        }

        let literal = &self.input[begin..self.at];
        literal
            .parse::<f64>()
            .map_err(|_| ContainerError::syntax(format!("malformed <term>: '{}'", literal)))
    }

    fn trailing(c: char) -> ContainerError {
        ContainerError::syntax(format!("unexpected content after <term>: {}", c))
    }

    /// Next operator, or `None` at the end of input
    fn operator(&mut self) -> ContainerResult<Option<char>> {
        self.skip_whitespace();

        match self.rest().chars().next() {
            None => Ok(None),
            Some(c) if is_operator(c) => {
                self.at += 1;
                Ok(Some(c))
            }
            Some(c) => Err(ContainerError::syntax(format!(
                "unexpected character: {} for <op>",
                c
            ))),
        }
    }
}

fn apply(result: f64, op: char, operand: f64) -> ContainerResult<f64> {
    match op {
        '+' => Ok(result + operand),
        '-' => Ok(result - operand),
        '*' => Ok(result * operand),
        '/' if operand == 0.0 => Err(ContainerError::illegal_state("division by zero detected")),
        '/' => Ok(result / operand),
        _ => Err(ContainerError::illegal_state(format!("invalid operation: {}", op))),
    }
}

/// Evaluate `expression` from left to right
pub fn evaluate(expression: &str) -> ContainerResult<f64> {
    let trimmed = expression.trim_matches(|c: char| c.is_ascii_whitespace());
    if trimmed.is_empty() {
        return Err(ContainerError::syntax("expected <term> but got nothing"));
    }

    let mut cursor = Cursor::new(trimmed);
    let mut result = cursor.term()?;

    while let Some(op) = cursor.operator()? {
        cursor.skip_whitespace();
        if cursor.at_end() {
            return Err(ContainerError::syntax(format!(
                "missing <term> after <op>: {}",
                op
            )));
        }

        let operand = cursor.term()?;
        result = apply(result, op, operand)?;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn eval(expression: &str) -> f64 {
        evaluate(expression).unwrap()
    }

    fn kind(expression: &str) -> ErrorKind {
        evaluate(expression).unwrap_err().kind()
    }

    #[test]
    fn test_constant() {
        assert_eq!(eval("0"), 0.0);
        assert_eq!(eval("0.0"), 0.0);
        assert_eq!(eval(".0"), 0.0);
        assert_eq!(eval("1"), 1.0);
        assert_eq!(eval("1234567890"), 1234567890.0);
        assert_eq!(eval("12345678.90"), 12345678.9);
        assert_eq!(eval(".1234567890"), 0.123456789);
        assert_eq!(eval("-0"), 0.0);
        assert_eq!(eval("-1"), -1.0);
    }

    #[test]
    fn test_term_op_term() {
        assert_eq!(eval("0 + 0"), 0.0);
        assert_eq!(eval("1 - 1"), 0.0);
        assert_eq!(eval("1 * 1"), 1.0);
        assert_eq!(eval("1 / 1"), 1.0);
        assert_eq!(eval("-1 - 1"), -2.0);
        assert_eq!(eval("1 - -1"), 2.0);
        assert_eq!(eval("1 * -1"), -1.0);
        assert_eq!(eval("1.5 + 1"), 2.5);
        assert_eq!(eval("-1.5 - 1"), -2.5);
        assert_eq!(eval("1.5 / -1"), -1.5);
        assert_eq!(kind("0 / 0"), ErrorKind::IllegalState);
        assert_eq!(kind("1 / 0"), ErrorKind::IllegalState);
    }

    #[test]
    fn test_whitespace() {
        assert_eq!(eval("     .0"), 0.0);
        assert_eq!(eval(" \t  1243"), 1243.0);
        assert_eq!(eval("123.4    "), 123.4);
        assert_eq!(eval("1243  \t  "), 1243.0);
    }

    #[test]
    fn test_only_ascii_whitespace_separates_terms() {
        assert_eq!(kind("1\u{3000}+\u{a0}2"), ErrorKind::Syntax);
        assert_eq!(kind("\u{a0}1"), ErrorKind::Syntax);
    }

    #[test]
    fn test_long_expression_is_left_associative() {
        assert_eq!(eval("2 + 5 * 1 - 3 / 2 * 5"), 10.0);
        assert_eq!(eval(" 2  + \t5    *\t\t 1  - 3   /  2  * 5  "), 10.0);
        assert_eq!(eval("2+5*1-3/2*5"), 10.0);
        assert_eq!(eval("1000 / 10 / 10 / 10"), 1.0);
        assert_eq!(eval("10 * 10 * 10"), 1000.0);
    }

    #[test]
    fn test_missing_term() {
        assert_eq!(kind(""), ErrorKind::Syntax);
        assert_eq!(kind("   "), ErrorKind::Syntax);
        assert_eq!(kind("   ."), ErrorKind::Syntax);
        assert_eq!(kind("5 +"), ErrorKind::Syntax);
        assert_eq!(kind("5 + "), ErrorKind::Syntax);
    }

    #[test]
    fn test_double_sign_and_garbage() {
        assert_eq!(kind("--"), ErrorKind::Syntax);
        assert_eq!(kind("--1"), ErrorKind::Syntax);
        assert_eq!(kind("5 + --1"), ErrorKind::Syntax);
        assert_eq!(kind("125q"), ErrorKind::Syntax);
        assert_eq!(kind("01"), ErrorKind::Syntax);
        assert_eq!(kind("1.2.3"), ErrorKind::Syntax);
        assert_eq!(kind("5 % 2"), ErrorKind::Syntax);
    }
}
