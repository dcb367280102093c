//! Formatting query output and comparing it with expected literals.

use crate::error::{Error, Result};
use pretty_assertions::StrComparison;
use std::fmt::{Display, Write as _};

/// Concatenate items in iteration order with `separator` between them.
pub fn join<I>(items: I, separator: &str) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    let mut out = String::new();
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        let _ = write!(out, "{item}");
    }
    out
}

/// Byte-for-byte comparison; a mismatch carries a line diff of the two strings.
pub fn check_eq(actual: &str, expected: &str) -> Result<()> {
    if actual == expected {
        return Ok(());
    }

    Err(Error::AssertionMismatch {
        expected: expected.to_string(),
        actual: actual.to_string(),
        diff: StrComparison::new(expected, actual).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_has_no_trailing_separator() {
        assert_eq!(join(["a", "b", "c"], ";"), "a;b;c");
        assert_eq!(join(["only"], ";"), "only");
        assert_eq!(join(Vec::<String>::new(), ";"), "");
    }

    #[test]
    fn test_join_is_lazy_over_iterators() {
        let joined = join((1..=3).map(|n| format!("{n},x")), "\n");
        assert_eq!(joined, "1,x\n2,x\n3,x");
    }

    #[test]
    fn test_check_eq_is_case_and_whitespace_sensitive() {
        assert!(check_eq("Hulk;Thor", "Hulk;Thor").is_ok());
        assert!(check_eq("hulk", "Hulk").is_err());
        assert!(check_eq("Hulk ", "Hulk").is_err());

        match check_eq("Thor;Hulk", "Hulk;Thor") {
            Err(Error::AssertionMismatch { expected, actual, .. }) => {
                assert_eq!(expected, "Hulk;Thor");
                assert_eq!(actual, "Thor;Hulk");
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }
}
