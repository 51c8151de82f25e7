//! Output comparison strategies.
//!
//! Every checker compares a produced output file against the expected one,
//! optionally looking at the original input, and answers AC, WA, PE or IC.

mod elastic;
mod epsilon;
mod external;
mod loosy;
mod standard;

pub use elastic::{DoubleElasticChecker, ElasticChecker};
pub use epsilon::EpsilonChecker;
pub use external::ExternalChecker;
pub use loosy::LoosyChecker;
pub use standard::{StandardChecker, compare_text};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::Options;
use crate::error::JudgeError;
use crate::verdict::Verdict;

/// Files a checker looks at
#[derive(Debug, Clone, Copy)]
pub struct CheckFiles<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub expected: &'a Path,
}

pub trait Checker {
    fn check(&self, files: &CheckFiles) -> Result<Verdict>;
}

/// Checker selection and parameters, as recorded in the report
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "name")]
pub enum CheckerConfig {
    #[serde(rename = "std")]
    Standard { presentation_error: bool },
    #[serde(rename = "loosy")]
    Loosy,
    #[serde(rename = "epsilon")]
    Epsilon { epsilon: f64, relative: bool },
    #[serde(rename = "elastic")]
    Elastic {
        separator: String,
        presentation_error: bool,
    },
    #[serde(rename = "elastic2")]
    DoubleElastic {
        separator1: String,
        separator2: String,
        starting: String,
        ending: String,
        presentation_error: bool,
    },
    #[serde(rename = "external")]
    External {
        external_program: String,
        external_timeout: f64,
    },
}

impl CheckerConfig {
    /// Reads the checker selection and the parameters it needs
    pub fn from_options(options: &Options) -> Result<Self> {
        let name: String = options.get_or("checker", "std".to_string())?;
        let presentation_error: bool = options.get_or("presentation_error", true)?;

        let config = match name.as_str() {
            "std" => CheckerConfig::Standard { presentation_error },
            "loosy" => CheckerConfig::Loosy,
            "epsilon" => CheckerConfig::Epsilon {
                epsilon: options.require("epsilon")?,
                relative: options.get_or("relative", false)?,
            },
            "elastic" | "elastic1" => CheckerConfig::Elastic {
                separator: options.require("separator")?,
                presentation_error,
            },
            "elastic2" => CheckerConfig::DoubleElastic {
                separator1: options.require("separator1")?,
                separator2: options.require("separator2")?,
                starting: options.require("starting")?,
                ending: options.require("ending")?,
                presentation_error,
            },
            "external" => CheckerConfig::External {
                external_program: options.require("external_program")?,
                external_timeout: options.get_or("external_timeout", 5.0)?,
            },
            other => return Err(JudgeError::UnknownChecker(other.to_string()).into()),
        };
        Ok(config)
    }

    /// Instantiates the checker; external programs are looked up in `dir`
    pub fn build(&self, dir: &Path) -> Box<dyn Checker> {
        match self {
            CheckerConfig::Standard { presentation_error } => {
                Box::new(StandardChecker::new(*presentation_error))
            }
            CheckerConfig::Loosy => Box::new(LoosyChecker),
            CheckerConfig::Epsilon { epsilon, relative } => {
                Box::new(EpsilonChecker::new(*epsilon, *relative))
            }
            CheckerConfig::Elastic {
                separator,
                presentation_error,
            } => Box::new(ElasticChecker::new(separator.clone(), *presentation_error)),
            CheckerConfig::DoubleElastic {
                separator1,
                separator2,
                starting,
                ending,
                presentation_error,
            } => Box::new(DoubleElasticChecker {
                separator1: separator1.clone(),
                separator2: separator2.clone(),
                starting: starting.clone(),
                ending: ending.clone(),
                presentation_error: *presentation_error,
            }),
            CheckerConfig::External {
                external_program,
                external_timeout,
            } => Box::new(ExternalChecker::new(
                PathBuf::from(dir).join(external_program),
                Duration::from_secs_f64(external_timeout.max(0.0)),
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CheckerConfig::Standard { .. } => "std",
            CheckerConfig::Loosy => "loosy",
            CheckerConfig::Epsilon { .. } => "epsilon",
            CheckerConfig::Elastic { .. } => "elastic",
            CheckerConfig::DoubleElastic { .. } => "elastic2",
            CheckerConfig::External { .. } => "external",
        }
    }
}

/// Loads both sides of a comparison
pub(crate) fn read_pair(files: &CheckFiles) -> Result<(String, String)> {
    let output = fs::read(files.output)
        .with_context(|| format!("Failed to read output {}", files.output.display()))?;
    let expected = fs::read(files.expected)
        .with_context(|| format!("Failed to read expected output {}", files.expected.display()))?;
    Ok((
        String::from_utf8_lossy(&output).into_owned(),
        String::from_utf8_lossy(&expected).into_owned(),
    ))
}

/// Combines partial verdicts of one comparison, keeping the worst
pub(crate) fn worst(verdicts: impl IntoIterator<Item = Verdict>) -> Verdict {
    crate::verdict::aggregate(verdicts.into_iter().map(|v| (v, None))).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Documents;

    fn options(handler: &str) -> Options {
        Options::new(&Documents {
            handler: serde_yaml::from_str(handler).unwrap(),
            ..Default::default()
        })
    }

    #[test]
    fn test_default_is_standard() {
        let config = CheckerConfig::from_options(&options("{}")).unwrap();
        assert_eq!(
            config,
            CheckerConfig::Standard {
                presentation_error: true
            }
        );
    }

    #[test]
    fn test_parameters_are_required() {
        let err = CheckerConfig::from_options(&options("checker: epsilon")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JudgeError>(),
            Some(JudgeError::MissingOption(_))
        ));

        let config =
            CheckerConfig::from_options(&options("checker: elastic1\nseparator: '#'")).unwrap();
        assert_eq!(config.name(), "elastic");
    }

    #[test]
    fn test_unknown_checker() {
        let err = CheckerConfig::from_options(&options("checker: fuzzy")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JudgeError>(),
            Some(JudgeError::UnknownChecker(name)) if name == "fuzzy"
        ));
    }
}
