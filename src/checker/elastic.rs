use anyhow::{Result, bail};

use super::{CheckFiles, Checker, compare_text, read_pair, worst};
use crate::verdict::Verdict;

/// Splits on a separator and compares the corresponding segments.
#[derive(Debug, Clone)]
pub struct ElasticChecker {
    separator: String,
    presentation_error: bool,
}

impl ElasticChecker {
    pub fn new(separator: String, presentation_error: bool) -> Self {
        Self {
            separator,
            presentation_error,
        }
    }
}

impl Checker for ElasticChecker {
    fn check(&self, files: &CheckFiles) -> Result<Verdict> {
        let (output, expected) = read_pair(files)?;
        Ok(compare_segments(
            &output,
            &expected,
            &self.separator,
            self.presentation_error,
        ))
    }
}

/// Non-blank segments of `text`, trimmed
fn segments<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return vec![text.trim()];
    }
    text.split(separator)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn compare_segments(
    output: &str,
    expected: &str,
    separator: &str,
    presentation_error: bool,
) -> Verdict {
    let produced = segments(output, separator);
    let wanted = segments(expected, separator);
    if produced.len() != wanted.len() {
        return Verdict::IC;
    }
    worst(
        produced
            .iter()
            .zip(&wanted)
            .map(|(a, b)| compare_text(a, b, presentation_error)),
    )
}

/// Elastic comparison inside a `starting`..`ending` region, standard
/// comparison outside of it. Inside the region segments are split on
/// `separator1` and each segment again on `separator2`.
#[derive(Debug, Clone)]
pub struct DoubleElasticChecker {
    pub separator1: String,
    pub separator2: String,
    pub starting: String,
    pub ending: String,
    pub presentation_error: bool,
}

/// Text before, inside and after the marked region
fn split_region<'a>(
    text: &'a str,
    starting: &str,
    ending: &str,
) -> Option<(&'a str, &'a str, &'a str)> {
    let begin = text.find(starting)?;
    let inner_begin = begin + starting.len();
    let inner_end = inner_begin + text[inner_begin..].find(ending)?;
    Some((
        &text[..begin],
        &text[inner_begin..inner_end],
        &text[inner_end + ending.len()..],
    ))
}

impl DoubleElasticChecker {
    fn compare(&self, output: &str, expected: &str) -> Result<Verdict> {
        let Some((want_head, want_region, want_tail)) =
            split_region(expected, &self.starting, &self.ending)
        else {
            bail!("expected output lacks the elastic region markers");
        };
        let Some((head, region, tail)) = split_region(output, &self.starting, &self.ending) else {
            return Ok(Verdict::IC);
        };

        let produced = segments(region, &self.separator1);
        let wanted = segments(want_region, &self.separator1);
        if produced.len() != wanted.len() {
            return Ok(Verdict::IC);
        }

        let region_verdict = worst(produced.iter().zip(&wanted).map(|(a, b)| {
            compare_segments(a, b, &self.separator2, self.presentation_error)
        }));

        Ok(worst([
            compare_text(head, want_head, self.presentation_error),
            region_verdict,
            compare_text(tail, want_tail, self.presentation_error),
        ]))
    }
}

impl Checker for DoubleElasticChecker {
    fn check(&self, files: &CheckFiles) -> Result<Verdict> {
        let (output, expected) = read_pair(files)?;
        self.compare(&output, &expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_compared_in_order() {
        assert_eq!(compare_segments("a\n#\nb\n", "a\n#\nb\n", "#", true), Verdict::AC);
        assert_eq!(compare_segments("a #\n b", "a\n#\nb\n", "#", false), Verdict::AC);
        assert_eq!(compare_segments("b#a", "a#b", "#", true), Verdict::WA);
    }

    #[test]
    fn test_segment_count_mismatch_is_ic() {
        assert_eq!(compare_segments("a#b#c", "a#b", "#", true), Verdict::IC);
    }

    #[test]
    fn test_segment_whitespace_is_pe() {
        assert_eq!(compare_segments("1  2#3", "1 2#3", "#", true), Verdict::PE);
        assert_eq!(compare_segments("1  2#3", "1 2#3", "#", false), Verdict::WA);
    }

    fn double() -> DoubleElasticChecker {
        DoubleElasticChecker {
            separator1: ";".into(),
            separator2: ",".into(),
            starting: "[".into(),
            ending: "]".into(),
            presentation_error: true,
        }
    }

    #[test]
    fn test_double_elastic_region() {
        let checker = double();
        let expected = "total 2\n[a,b;c]\nend\n";
        assert_eq!(checker.compare(expected, expected).unwrap(), Verdict::AC);
        assert_eq!(checker.compare("total 2\n[a,b;c,d]\nend\n", expected).unwrap(), Verdict::IC);
        assert_eq!(checker.compare("total 3\n[a,b;c]\nend\n", expected).unwrap(), Verdict::WA);
        assert_eq!(checker.compare("total 2\n[a, b ; c]\nend\n", expected).unwrap(), Verdict::AC);
    }

    #[test]
    fn test_double_elastic_missing_markers() {
        let checker = double();
        assert_eq!(checker.compare("total 2 a,b;c", "[a,b;c]").unwrap(), Verdict::IC);
        assert!(checker.compare("[a]", "no markers").is_err());
    }
}
