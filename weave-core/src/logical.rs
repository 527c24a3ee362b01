//! `left == right` / `left != right` over bare words

use crate::error::{ContainerError, ContainerResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

static EXPRESSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?-u)^(\w+)\s*(==|!=)\s*(\w+)$").expect("logical expression pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Equal => write!(f, "=="),
            Operator::NotEqual => write!(f, "!="),
        }
    }
}

/// Parsed comparison of two literal words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalExpression {
    left: String,
    right: String,
    op: Operator,
}

impl LogicalExpression {
    pub fn new(left: impl Into<String>, right: impl Into<String>, op: Operator) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            op,
        }
    }

    pub fn parse(input: &str) -> ContainerResult<Self> {
        let captures = EXPRESSION.captures(input).ok_or_else(|| {
            ContainerError::syntax(format!("unrecognized logical expression: '{}'", input))
        })?;

        let op = match &captures[2] {
            "==" => Operator::Equal,
            "!=" => Operator::NotEqual,
            other => {
                return Err(ContainerError::illegal_state(format!(
                    "unrecognized op: {}",
                    other
                )))
            }
        };

        Ok(Self::new(&captures[1], &captures[3], op))
    }

    pub fn result(&self) -> bool {
        match self.op {
            Operator::Equal => self.left == self.right,
            Operator::NotEqual => self.left != self.right,
        }
    }

    pub fn left(&self) -> &str {
        &self.left
    }

    pub fn right(&self) -> &str {
        &self.right
    }

    pub fn op(&self) -> Operator {
        self.op
    }
}

impl FromStr for LogicalExpression {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LogicalExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.op, self.right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_equal() {
        let expression = LogicalExpression::parse("a == a").unwrap();
        assert_eq!(expression.op(), Operator::Equal);
        assert!(expression.result());

        assert!(!LogicalExpression::parse("a == b").unwrap().result());
        assert!(LogicalExpression::parse("43==43").unwrap().result());
    }

    #[test]
    fn test_not_equal() {
        assert!(LogicalExpression::parse("a != b").unwrap().result());
        assert!(!LogicalExpression::parse("a != a").unwrap().result());
    }

    #[test]
    fn test_parts() {
        let expression: LogicalExpression = "left != right".parse().unwrap();
        assert_eq!(expression.left(), "left");
        assert_eq!(expression.right(), "right");
        assert_eq!(expression.to_string(), "left != right");
    }

    #[test]
    fn test_malformed() {
        for input in ["a === b", "a = b", "a ==", "== b", "a b == c", "a == b c", ""] {
            let error = LogicalExpression::parse(input).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Syntax, "input: {:?}", input);
        }
    }

    #[test]
    fn test_words_are_ascii() {
        for input in ["\u{e9} == \u{e9}", "a\u{3000}== a", "a ==\u{a0}a"] {
            let error = LogicalExpression::parse(input).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Syntax, "input: {:?}", input);
        }
    }
}
