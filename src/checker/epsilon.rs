use anyhow::Result;

use super::{CheckFiles, Checker, read_pair};
use crate::verdict::Verdict;

/// Token comparison where numbers may differ by up to `epsilon`.
#[derive(Debug, Clone, Copy)]
pub struct EpsilonChecker {
    epsilon: f64,
    relative: bool,
}

impl EpsilonChecker {
    pub fn new(epsilon: f64, relative: bool) -> Self {
        Self { epsilon, relative }
    }

    fn close(&self, x: f64, y: f64) -> bool {
        let diff = (x - y).abs();
        if diff <= self.epsilon {
            return true;
        }
        if !self.relative {
            return false;
        }
        let scale = x.abs().max(y.abs());
        scale > 0.0 && diff / scale <= self.epsilon
    }

    fn same_token(&self, a: &str, b: &str) -> bool {
        match (number(a), number(b)) {
            (Some(x), Some(y)) => self.close(x, y),
            _ => a == b,
        }
    }

    fn compare(&self, output: &str, expected: &str) -> Verdict {
        let mut produced = output.split_whitespace();
        let mut wanted = expected.split_whitespace();
        loop {
            match (produced.next(), wanted.next()) {
                (None, None) => return Verdict::AC,
                (Some(a), Some(b)) if self.same_token(a, b) => continue,
                _ => return Verdict::WA,
            }
        }
    }
}

fn number(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|x| x.is_finite())
}

impl Checker for EpsilonChecker {
    fn check(&self, files: &CheckFiles) -> Result<Verdict> {
        let (output, expected) = read_pair(files)?;
        Ok(self.compare(&output, &expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_tolerance() {
        let checker = EpsilonChecker::new(1e-3, false);
        assert_eq!(checker.compare("3.1416 x", "3.14159 x\n"), Verdict::AC);
        assert_eq!(checker.compare("3.15", "3.14159"), Verdict::WA);
    }

    #[test]
    fn test_relative_tolerance() {
        let checker = EpsilonChecker::new(1e-3, true);
        assert_eq!(checker.compare("1000000.5", "1000000"), Verdict::AC);
        assert_eq!(checker.compare("0 0.0", "0.0 0"), Verdict::AC);
        let absolute = EpsilonChecker::new(1e-3, false);
        assert_eq!(absolute.compare("1000000.5", "1000000"), Verdict::WA);
    }

    #[test]
    fn test_words_must_match_exactly() {
        let checker = EpsilonChecker::new(0.5, false);
        assert_eq!(checker.compare("Case 1: 2.0", "case 1: 2.1"), Verdict::WA);
        assert_eq!(checker.compare("nan", "nan"), Verdict::AC);
        assert_eq!(checker.compare("1 2", "1"), Verdict::WA);
    }
}
