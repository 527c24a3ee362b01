//! Timespan parser
//!
//! Accepts `<integer>` or `<integer> <unit>` with unit one of `d`, `h`, `m`,
//! `s`, `ms` and `us`. A bare integer is a number of microseconds.

use crate::error::{ContainerError, ContainerResult};
use std::time::Duration;

const MICROS_PER_MILLI: i64 = 1_000;
const MICROS_PER_SECOND: i64 = 1_000 * MICROS_PER_MILLI;
const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;
const MICROS_PER_DAY: i64 = 24 * MICROS_PER_HOUR;

fn unit_multiplier(unit: &str) -> Option<i64> {
    match unit {
        "d" => Some(MICROS_PER_DAY),
        "h" => Some(MICROS_PER_HOUR),
        "m" => Some(MICROS_PER_MINUTE),
        "s" => Some(MICROS_PER_SECOND),
        "ms" => Some(MICROS_PER_MILLI),
        "us" | "" => Some(1),
        _ => None,
    }
}

/// Parse into a signed number of microseconds
pub fn parse_micros(input: &str) -> ContainerResult<i64> {
    let tokens: Vec<&str> = input.split_whitespace().collect();

    let (number, unit) = match tokens.as_slice() {
        [number] => (*number, ""),
        [number, unit] => (*number, *unit),
        _ => {
            return Err(ContainerError::syntax(format!(
                "unexpected timespan input: '{}'",
                input
            )))
        }
    };

    let multiplier = unit_multiplier(unit).ok_or_else(|| {
        let shown: String = unit.chars().take(5).collect();
        ContainerError::syntax(format!("invalid timespan unit: {}", shown))
    })?;

    let span: i64 = number
        .parse()
        .map_err(|_| ContainerError::syntax(format!("invalid timespan value: '{}'", number)))?;

    span.checked_mul(multiplier)
        .ok_or_else(|| ContainerError::syntax(format!("timespan out of range: '{}'", input)))
}

/// Parse into a [`Duration`], rejecting negative spans
pub fn parse(input: &str) -> ContainerResult<Duration> {
    let micros = parse_micros(input)?;
    let micros = u64::try_from(micros)
        .map_err(|_| ContainerError::syntax(format!("negative timespan: '{}'", input)))?;

    Ok(Duration::from_micros(micros))
}

pub fn try_parse(input: &str) -> Option<Duration> {
    parse(input).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_units() {
        assert_eq!(parse("441 d").unwrap(), Duration::from_secs(441 * 24 * 3600));
        assert_eq!(parse("15 h").unwrap(), Duration::from_secs(15 * 3600));
        assert_eq!(parse("90 m").unwrap(), Duration::from_secs(90 * 60));
        assert_eq!(parse("10 s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse("4332 ms").unwrap(), Duration::from_millis(4332));
        assert_eq!(parse("12190 us").unwrap(), Duration::from_micros(12190));
        assert_eq!(parse("0").unwrap(), Duration::ZERO);
        assert_eq!(parse("0015").unwrap(), Duration::from_micros(15));
        assert_eq!(parse(" \t5  s ").unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn test_negative_micros() {
        assert_eq!(parse_micros("-56 d").unwrap(), -56 * MICROS_PER_DAY);
        assert_eq!(parse_micros("-1 s").unwrap(), -1_000_000);
        assert_eq!(parse_micros("-9").unwrap(), -9);

        assert_eq!(parse("-1 s").unwrap_err().kind(), ErrorKind::Syntax);
    }

    #[test]
    fn test_malformed() {
        for input in ["", "foeiere", "---", "0x10", "16d", "16ms", "1 2 s", "5 weeks", "1.5 s"] {
            assert!(try_parse(input).is_none(), "input: {:?}", input);
            assert_eq!(parse_micros(input).unwrap_err().kind(), ErrorKind::Syntax);
        }
    }

    #[test]
    fn test_overflow() {
        assert!(parse_micros("9223372036854775807 d").is_err());
    }
}
