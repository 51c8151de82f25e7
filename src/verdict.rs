use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome token of a test or a whole phase.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Accepted
    AC,
    /// Wrong answer
    WA,
    /// Presentation error
    PE,
    /// Incomparable output structure
    IC,
    /// Execution error
    EE,
    /// Compilation error
    CE,
    /// Setter error: the reference solution failed
    SE,
    /// Integrity violation detected while executing
    UE,
    /// Partial score
    SC,
    /// Internal error
    IE,
    /// Test never executed
    #[serde(rename = "??")]
    Unknown,
}

impl Verdict {
    /// Rank used to aggregate test verdicts; higher is more severe.
    ///
    /// Only verdicts a single test can carry are ranked.
    pub fn severity(self) -> Option<u8> {
        match self {
            Verdict::IE => Some(6),
            Verdict::SE => Some(5),
            Verdict::EE => Some(4),
            Verdict::WA => Some(3),
            Verdict::IC => Some(2),
            Verdict::PE => Some(1),
            Verdict::AC => Some(0),
            Verdict::CE | Verdict::UE | Verdict::SC | Verdict::Unknown => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::AC => "AC",
            Verdict::WA => "WA",
            Verdict::PE => "PE",
            Verdict::IC => "IC",
            Verdict::EE => "EE",
            Verdict::CE => "CE",
            Verdict::SE => "SE",
            Verdict::UE => "UE",
            Verdict::SC => "SC",
            Verdict::IE => "IE",
            Verdict::Unknown => "??",
        }
    }

    /// Parses the verdict tokens an external checker may print.
    pub fn from_checker_token(token: &str) -> Option<Self> {
        match token {
            "AC" => Some(Verdict::AC),
            "WA" => Some(Verdict::WA),
            "PE" => Some(Verdict::PE),
            "IC" => Some(Verdict::IC),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduces test verdicts to the most severe one.
///
/// When the winner is EE the diagnostic of the first EE test is surfaced.
/// Unranked verdicts (never-executed tests) do not take part.
pub fn aggregate<'a, I>(verdicts: I) -> (Verdict, Option<String>)
where
    I: IntoIterator<Item = (Verdict, Option<&'a str>)>,
{
    let mut worst = Verdict::AC;
    let mut info: Option<String> = None;

    for (verdict, diagnostic) in verdicts {
        let Some(rank) = verdict.severity() else {
            continue;
        };
        // severity() is Some for AC, so the running worst always has a rank
        let worst_rank = worst.severity().unwrap_or(0);
        if rank > worst_rank {
            worst = verdict;
            info = if verdict == Verdict::EE {
                diagnostic.map(str::to_string)
            } else {
                None
            };
        }
    }

    (worst, info)
}
