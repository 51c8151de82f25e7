use anyhow::Result;

use crate::config::AllowedCompilers;
use crate::error::JudgeError;

/// How fast programs written in a language usually run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedTier {
    Fast,
    Medium,
    Slow,
}

impl SpeedTier {
    pub fn of(extension: &str) -> Option<Self> {
        match extension {
            "ada" | "c" | "cc" | "d" | "f" | "go" | "hs" | "pas" => Some(SpeedTier::Fast),
            "bas" | "cs" | "java" | "scm" => Some(SpeedTier::Medium),
            "bf" | "erl" | "js" | "lisp" | "lua" | "php" | "pl" | "py" | "R" | "rb" | "ws" => {
                Some(SpeedTier::Slow)
            }
            _ => None,
        }
    }

    /// Position in tier-indexed coefficient lists; unknown languages count as slow
    pub fn index(tier: Option<Self>) -> usize {
        match tier {
            Some(SpeedTier::Fast) => 0,
            Some(SpeedTier::Medium) => 1,
            Some(SpeedTier::Slow) | None => 2,
        }
    }
}

/// Backend chosen for the reference solution and the rule that picked it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched {
    pub id: String,
    pub how: &'static str,
}

impl Matched {
    fn new(id: &str, how: &'static str) -> Self {
        Self {
            id: id.to_string(),
            how,
        }
    }
}

/// Picks the backend that builds the reference solution for a candidate
/// using `requested`, whose sources have extension `extension`.
///
/// `has_solution(ext)` tells whether the problem ships `solution.<ext>`.
pub fn match_solution_compiler(
    requested: &str,
    extension: &str,
    allowed: &AllowedCompilers,
    has_solution: impl Fn(&str) -> bool,
) -> Result<Matched> {
    if let Some(only) = allowed.single() {
        return Ok(Matched::new(only, "only one possible"));
    }
    if has_solution(extension) {
        return Ok(Matched::new(requested, "exact"));
    }

    let tier = SpeedTier::of(extension);
    let fast = tier == Some(SpeedTier::Fast);
    let medium = tier == Some(SpeedTier::Medium);
    let slow = tier == Some(SpeedTier::Slow);

    let rules: [(bool, &str, &str, &'static str); 6] = [
        (fast, "cc", "GXX11", "fast"),
        (fast || medium, "java", "JDK", "medium"),
        (slow, "R", "R", "slow"),
        (true, "cc", "GXX11", "c++ fallback"),
        (true, "java", "JDK", "java fallback"),
        (true, "py", "Python3", "py fallback"),
    ];
    rules
        .into_iter()
        .find(|(applies, ext, _, _)| *applies && has_solution(ext))
        .map(|(_, _, id, how)| Matched::new(id, how))
        .ok_or_else(|| JudgeError::NoSuitableCompiler.into())
}
