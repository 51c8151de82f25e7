use anyhow::Result;

use super::{CheckFiles, Checker, read_pair};
use crate::verdict::Verdict;

/// Exact comparison, lenient on whitespace layout only when PE is enabled.
#[derive(Debug, Clone, Copy)]
pub struct StandardChecker {
    presentation_error: bool,
}

impl StandardChecker {
    pub fn new(presentation_error: bool) -> Self {
        Self { presentation_error }
    }
}

impl Checker for StandardChecker {
    fn check(&self, files: &CheckFiles) -> Result<Verdict> {
        let (output, expected) = read_pair(files)?;
        Ok(compare_text(&output, &expected, self.presentation_error))
    }
}

/// Compares two texts byte for byte, then token by token.
///
/// Texts that only differ in whitespace are PE when `presentation_error`
/// is set and WA otherwise.
pub fn compare_text(output: &str, expected: &str, presentation_error: bool) -> Verdict {
    if output == expected {
        return Verdict::AC;
    }

    let same_tokens = output.split_whitespace().eq(expected.split_whitespace());

    if same_tokens && presentation_error {
        Verdict::PE
    } else {
        Verdict::WA
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_identical_is_accepted() {
        assert_eq!(compare_text("1 2\n3\n", "1 2\n3\n", false), Verdict::AC);
        assert_eq!(compare_text("", "", true), Verdict::AC);
    }

    #[test]
    fn test_whitespace_difference() {
        assert_eq!(compare_text("1  2\n3", "1 2\n3\n", true), Verdict::PE);
        assert_eq!(compare_text("1  2\n3", "1 2\n3\n", false), Verdict::WA);
        assert_eq!(compare_text("1\n2\n", "1 2\n", true), Verdict::PE);
    }

    #[test]
    fn test_different_tokens() {
        assert_eq!(compare_text("1 2\n", "1 3\n", true), Verdict::WA);
        assert_eq!(compare_text("1 2\n", "1 2 3\n", true), Verdict::WA);
    }

    #[test]
    fn test_file_against_itself() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.cor");
        fs::write(&path, "hello   world\n\n  42\n").unwrap();
        let files = CheckFiles {
            input: &path,
            output: &path,
            expected: &path,
        };
        let verdict = StandardChecker::new(false).check(&files).unwrap();
        assert_eq!(verdict, Verdict::AC);
    }
}
