use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::JudgeError;

pub const DEFAULT_MONITOR: &str = "/usr/local/bin/vinga";
pub const DEFAULT_LIBS_DIR: &str = "/opt/pylibs";
pub const DEFAULT_MAX_COMPILATION_TIME: u64 = 30;

#[derive(Parser, Debug)]
#[command(name = "grader", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Identifier of the worker invoking the judge
    pub slave_id: String,

    /// Run directory holding problem/, submission/, solution/ and correction/
    #[arg(long = "dir", short = 'd')]
    pub dir: Option<PathBuf>,

    /// Path to the sandbox monitor executable
    #[arg(long = "monitor", env = "GRADER_MONITOR", default_value = DEFAULT_MONITOR)]
    pub monitor: PathBuf,

    /// Do not require the monitor to be setuid root
    #[arg(long = "skip-setuid-check", default_value_t = false)]
    pub skip_setuid_check: bool,

    /// Root for scratch directories used by relocated executions
    #[arg(long = "scratch-dir")]
    pub scratch_dir: Option<PathBuf>,

    /// Root of the installed auxiliary libraries
    #[arg(long = "libs-dir", default_value = DEFAULT_LIBS_DIR)]
    pub libs_dir: PathBuf,

    /// Compilation ceiling in seconds
    #[arg(long = "max-compilation-time", default_value_t = DEFAULT_MAX_COMPILATION_TIME)]
    pub max_compilation_time: u64,
}

impl CliArgs {
    /// Resolve the settings of this run
    pub fn to_settings(&self) -> std::io::Result<RunSettings> {
        let dir = match &self.dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        Ok(RunSettings {
            dir,
            slave_id: self.slave_id.clone(),
            monitor: self.monitor.clone(),
            require_setuid: !self.skip_setuid_check,
            scratch_dir: self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir),
            libs_dir: self.libs_dir.clone(),
            max_compilation_time: Duration::from_secs(self.max_compilation_time),
        })
    }
}

/// Process-level settings of one judging run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub dir: PathBuf,
    pub slave_id: String,
    pub monitor: PathBuf,
    pub require_setuid: bool,
    pub scratch_dir: PathBuf,
    pub libs_dir: PathBuf,
    pub max_compilation_time: Duration,
}

impl RunSettings {
    pub fn new(dir: impl Into<PathBuf>, slave_id: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            slave_id: slave_id.into(),
            monitor: PathBuf::from(DEFAULT_MONITOR),
            require_setuid: true,
            scratch_dir: std::env::temp_dir(),
            libs_dir: PathBuf::from(DEFAULT_LIBS_DIR),
            max_compilation_time: Duration::from_secs(DEFAULT_MAX_COMPILATION_TIME),
        }
    }
}

/// One weighted part of a scoring plan
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScorePart {
    pub part: String,
    pub prefix: String,
    pub points: u32,
}

/// The read-only documents of a run, as found on disk.
#[derive(Debug, Clone, Default)]
pub struct Documents {
    pub submission: Mapping,
    pub problem: Mapping,
    pub driver: Mapping,
    pub handler: Mapping,
    pub scores: Option<Vec<ScorePart>>,
}

impl Documents {
    pub fn load(dir: &Path) -> Result<Self> {
        let scores_path = dir.join("problem/scores.yml");
        let scores = if scores_path.exists() {
            let text = fs::read_to_string(&scores_path)
                .with_context(|| format!("Failed to read {}", scores_path.display()))?;
            Some(serde_yaml::from_str(&text).context("Invalid scoring plan")?)
        } else {
            None
        };

        Ok(Self {
            submission: read_mapping(&dir.join("submission/submission.yml"))?,
            problem: read_mapping(&dir.join("problem/problem.yml"))?,
            driver: read_optional_mapping(&dir.join("driver/driver.yml"))?,
            handler: read_mapping(&dir.join("problem/handler.yml"))?,
            scores,
        })
    }
}

fn read_mapping(path: &Path) -> Result<Mapping> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    match serde_yaml::from_str::<Value>(&text)
        .with_context(|| format!("Invalid YAML in {}", path.display()))?
    {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping),
        _ => bail!("{} is not a key-value document", path.display()),
    }
}

fn read_optional_mapping(path: &Path) -> Result<Mapping> {
    if path.exists() {
        read_mapping(path)
    } else {
        Ok(Mapping::new())
    }
}

/// Document an option value was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionSource {
    Submission,
    Problem,
    Driver,
    Handler,
    Default,
}

impl fmt::Display for OptionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionSource::Submission => "submission",
            OptionSource::Problem => "problem",
            OptionSource::Driver => "driver",
            OptionSource::Handler => "handler",
            OptionSource::Default => "default",
        };
        f.write_str(name)
    }
}

/// Layered view over the documents: submission, problem, driver, handler.
#[derive(Debug, Clone)]
pub struct Options {
    layers: Vec<(OptionSource, Mapping)>,
}

impl Options {
    pub fn new(docs: &Documents) -> Self {
        Self {
            layers: vec![
                (OptionSource::Submission, docs.submission.clone()),
                (OptionSource::Problem, docs.problem.clone()),
                (OptionSource::Driver, docs.driver.clone()),
                (OptionSource::Handler, docs.handler.clone()),
            ],
        }
    }

    fn lookup<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        for (source, mapping) in &self.layers {
            let Some(value) = mapping.get(key) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let parsed = serde_yaml::from_value(value.clone())
                .with_context(|| format!("Invalid value for option {key} in {source}"))?;
            log::info!("   > using {} for {key} from {source}", render(value));
            return Ok(Some(parsed));
        }
        Ok(None)
    }

    /// Optional option, `None` when no document sets it
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.lookup(key)
    }

    pub fn get_or<T: DeserializeOwned + fmt::Debug>(&self, key: &str, default: T) -> Result<T> {
        match self.lookup(key)? {
            Some(value) => Ok(value),
            None => {
                log::info!("   > using {default:?} for {key} from {}", OptionSource::Default);
                Ok(default)
            }
        }
    }

    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.lookup(key)?
            .ok_or_else(|| JudgeError::MissingOption(key.to_string()).into())
    }
}

fn render(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| format!("{value:?}"))
}

/// A list given either as a whitespace separated string or a sequence
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum WordList {
    Words(String),
    List(Vec<String>),
}

impl WordList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            WordList::Words(words) => words.split_whitespace().map(str::to_string).collect(),
            WordList::List(list) => list,
        }
    }
}

/// The compilers a problem accepts
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AllowedCompilers {
    Any,
    Only(Vec<String>),
}

impl AllowedCompilers {
    pub fn from_words(words: WordList) -> Self {
        let ids = words.into_vec();
        if ids.is_empty() || (ids.len() == 1 && ids[0] == "any") {
            AllowedCompilers::Any
        } else {
            AllowedCompilers::Only(ids)
        }
    }

    pub fn allows(&self, id: &str) -> bool {
        match self {
            AllowedCompilers::Any => true,
            AllowedCompilers::Only(ids) => ids.iter().any(|allowed| allowed == id),
        }
    }

    /// The single allowed compiler, if there is exactly one
    pub fn single(&self) -> Option<&str> {
        match self {
            AllowedCompilers::Only(ids) if ids.len() == 1 => Some(&ids[0]),
            _ => None,
        }
    }
}

/// A number or a list of numbers
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum OneOrMany {
    One(f64),
    Many(Vec<f64>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<f64> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// How driver code is merged with the submitted source
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceModifier {
    #[default]
    Normal,
    NoMain,
    Structs,
}

impl fmt::Display for SourceModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceModifier::Normal => "normal",
            SourceModifier::NoMain => "no_main",
            SourceModifier::Structs => "structs",
        };
        f.write_str(name)
    }
}
