use anyhow::Result;

use super::{CheckFiles, Checker, read_pair};
use crate::verdict::Verdict;

/// Token comparison that ignores layout, letter case and number formatting.
/// Never answers PE.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoosyChecker;

impl Checker for LoosyChecker {
    fn check(&self, files: &CheckFiles) -> Result<Verdict> {
        let (output, expected) = read_pair(files)?;
        Ok(compare_loosely(&output, &expected))
    }
}

fn compare_loosely(output: &str, expected: &str) -> Verdict {
    let mut produced = output.split_whitespace();
    let mut wanted = expected.split_whitespace();
    loop {
        match (produced.next(), wanted.next()) {
            (None, None) => return Verdict::AC,
            (Some(a), Some(b)) if same_token(a, b) => continue,
            _ => return Verdict::WA,
        }
    }
}

fn same_token(a: &str, b: &str) -> bool {
    if a == b || a.eq_ignore_ascii_case(b) {
        return true;
    }
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.is_finite() && x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_and_case_are_ignored() {
        assert_eq!(compare_loosely("YES\n  no", "yes no\n"), Verdict::AC);
    }

    #[test]
    fn test_number_formatting_is_ignored() {
        assert_eq!(compare_loosely("1.50 007", "1.5 7"), Verdict::AC);
        assert_eq!(compare_loosely("1.51", "1.5"), Verdict::WA);
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(compare_loosely("a b", "a b c"), Verdict::WA);
        assert_eq!(compare_loosely("a b c", "a b"), Verdict::WA);
    }
}
