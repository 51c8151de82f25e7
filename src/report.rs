//! Typed phase records and the report documents they become.

use std::collections::BTreeMap;
use std::ffi::CStr;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_yaml::Mapping;

use crate::checker::CheckerConfig;
use crate::compiler::CompilerKind;
use crate::config::{Documents, ScorePart};
use crate::monitor::MonitorResult;
use crate::verdict::Verdict;

/// Written before anything else so that a crash still leaves a report
pub const PLACEHOLDER: &str = "veredict: IE\ninternal_error: very severe\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Solution,
    Correction,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Solution => "solution",
            Phase::Correction => "correction",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct Environment {
    pub hostname: String,
    pub username: String,
    pub slave_id: String,
    pub time_beg: String,
    pub time_end: Option<String>,
    pub uname: String,
    pub loadavg: String,
    pub cwd: String,
}

impl Environment {
    pub fn collect(slave_id: &str, cwd: &Path) -> Self {
        Self {
            hostname: hostname().unwrap_or_default(),
            username: std::env::var("USER")
                .or_else(|_| std::env::var("LOGNAME"))
                // SAFETY: getuid has no failure mode
                .unwrap_or_else(|_| unsafe { libc::getuid() }.to_string()),
            slave_id: slave_id.to_string(),
            time_beg: crate::create_timestamp(),
            time_end: None,
            uname: uname().unwrap_or_default(),
            loadavg: loadavg().unwrap_or_default(),
            cwd: cwd.display().to_string(),
        }
    }
}

fn hostname() -> Option<String> {
    let mut buf = [0 as libc::c_char; 256];
    // SAFETY: the buffer outlives the call and its length is passed along
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr(), buf.len()) };
    if rc != 0 {
        return None;
    }
    buf[buf.len() - 1] = 0;
    // SAFETY: NUL terminated above
    let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Some(name.to_string_lossy().into_owned())
}

fn uname() -> Option<String> {
    // SAFETY: utsname is plain old data and uname fills it completely
    let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&mut uts) } != 0 {
        return None;
    }
    let fields = [
        &uts.sysname[..],
        &uts.nodename[..],
        &uts.release[..],
        &uts.version[..],
        &uts.machine[..],
    ];
    let parts: Vec<String> = fields
        .iter()
        // SAFETY: uname NUL terminates every field
        .map(|field| unsafe { CStr::from_ptr(field.as_ptr()) }.to_string_lossy().into_owned())
        .collect();
    Some(parts.join(" "))
}

fn loadavg() -> Option<String> {
    let mut avg = [0f64; 3];
    // SAFETY: room for the three samples requested
    let n = unsafe { libc::getloadavg(avg.as_mut_ptr(), 3) };
    (n == 3).then(|| format!("{:.2} {:.2} {:.2}", avg[0], avg[1], avg[2]))
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PreprocessInfo {
    pub monitor_setuid: Option<bool>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct CompilationInfo {
    pub compilers: String,
    pub compiler: String,
    pub choosen_compiler: Option<String>,
    pub versus_compiler: Option<String>,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub matching: Option<String>,
    pub language: Option<String>,
    pub version: Option<String>,
    pub kind: Option<CompilerKind>,
    pub flags1: Option<String>,
    pub flags2: Option<String>,
    pub extension: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ExecutionInfo {
    pub continue_on_ee: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CheckingInfo {
    pub checker: String,
    pub presentation_error: bool,
    pub parameters: CheckerConfig,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PostprocessInfo {
    pub del_files: bool,
}

/// Outcome of one test in one phase
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TestResult {
    #[serde(flatten)]
    pub monitor: Option<MonitorResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor_options: Option<String>,
    #[serde(rename = "veredict")]
    pub verdict: Verdict,
    #[serde(rename = "veredict_info", skip_serializing_if = "Option::is_none")]
    pub verdict_info: Option<String>,
}

impl TestResult {
    pub fn executed(monitor: MonitorResult, monitor_options: String) -> Self {
        Self {
            monitor: Some(monitor),
            monitor_options: Some(monitor_options),
            verdict: Verdict::Unknown,
            verdict_info: None,
        }
    }

    pub fn not_executed() -> Self {
        Self {
            monitor: None,
            monitor_options: None,
            verdict: Verdict::Unknown,
            verdict_info: None,
        }
    }
}

/// Evaluation of one part of a scoring plan
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PartScore {
    pub part: String,
    pub prefix: String,
    pub tests: Vec<String>,
    pub points: u32,
    #[serde(rename = "veredict")]
    pub verdict: Verdict,
    #[serde(rename = "veredict_info")]
    pub verdict_info: Option<String>,
}

/// The scoring plan before evaluation, the per-part results after it
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Scores {
    Plan(Vec<ScorePart>),
    #[serde(serialize_with = "indexed")]
    Results(Vec<PartScore>),
}

/// Sequences are written as maps keyed by position, the format the web
/// front end reads
fn indexed<S: Serializer>(items: &[PartScore], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(items.len()))?;
    for (i, item) in items.iter().enumerate() {
        map.serialize_entry(&i, item)?;
    }
    map.end()
}

/// Everything recorded about one phase.
///
/// Owned by the judge while the phase runs and written once at its end.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PhaseRecord {
    #[serde(skip)]
    pub phase: Phase,
    #[serde(rename = "veredict")]
    pub verdict: Verdict,
    #[serde(rename = "veredict_info", skip_serializing_if = "Option::is_none")]
    pub verdict_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    pub scores: Option<Scores>,
    pub environment: Environment,
    pub submission: Mapping,
    pub problem: Mapping,
    pub driver: Mapping,
    pub handler: Mapping,
    pub preprocess: Option<PreprocessInfo>,
    pub compilation: Option<CompilationInfo>,
    pub execution: Option<ExecutionInfo>,
    pub checking: Option<CheckingInfo>,
    pub postprocess: Option<PostprocessInfo>,
    pub tests: BTreeMap<String, TestResult>,
}

impl PhaseRecord {
    /// A fresh record, pessimistically marked IE until evaluated
    pub fn new(phase: Phase, environment: Environment, docs: &Documents) -> Self {
        Self {
            phase,
            verdict: Verdict::IE,
            verdict_info: None,
            score: None,
            scores: docs.scores.clone().map(Scores::Plan),
            environment,
            submission: docs.submission.clone(),
            problem: docs.problem.clone(),
            driver: docs.driver.clone(),
            handler: docs.handler.clone(),
            preprocess: None,
            compilation: None,
            execution: None,
            checking: None,
            postprocess: None,
            tests: BTreeMap::new(),
        }
    }

    pub fn has_scoring_plan(&self) -> bool {
        self.scores.is_some()
    }

    /// Writes `<dir>/<phase>/<phase>.yml`
    pub fn write(&self, dir: &Path) -> Result<()> {
        let path = dir
            .join(self.phase.as_str())
            .join(format!("{}.yml", self.phase));
        let text = serde_yaml::to_string(self).context("Failed to serialize phase record")?;
        fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// Report written by the top level when the run aborted
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FallbackReport {
    #[serde(rename = "veredict")]
    pub verdict: Verdict,
    #[serde(rename = "veredict_info", skip_serializing_if = "Option::is_none")]
    pub verdict_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_error: Option<String>,
}

impl FallbackReport {
    pub fn cheating() -> Self {
        Self {
            verdict: Verdict::UE,
            verdict_info: Some("Cheating".into()),
            internal_error: None,
        }
    }

    pub fn internal_error(message: String) -> Self {
        Self {
            verdict: Verdict::IE,
            verdict_info: None,
            internal_error: Some(message),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let text = serde_yaml::to_string(self)?;
        fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_yaml::Value;

    fn record() -> PhaseRecord {
        PhaseRecord::new(Phase::Correction, Environment::default(), &Documents::default())
    }

    #[test]
    fn test_wire_keys() {
        let mut record = record();
        record.verdict = Verdict::EE;
        record.verdict_info = Some("Segmentation fault".into());
        let value = serde_yaml::to_value(&record).unwrap();
        assert_eq!(value["veredict"], Value::from("EE"));
        assert_eq!(value["veredict_info"], Value::from("Segmentation fault"));
        assert!(value.get("phase").is_none());
    }

    #[test]
    fn test_part_scores_are_indexed() {
        let mut record = record();
        record.scores = Some(Scores::Results(vec![PartScore {
            part: "easy".into(),
            prefix: "easy".into(),
            tests: vec!["easy1".into()],
            points: 50,
            verdict: Verdict::AC,
            verdict_info: None,
        }]));
        let value = serde_yaml::to_value(&record).unwrap();
        assert_eq!(value["scores"][0]["points"], Value::from(50));
        assert!(value["scores"].is_mapping());
    }

    #[test]
    fn test_fallback_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("correction.yml");
        FallbackReport::cheating().write(&path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "veredict: UE\nveredict_info: Cheating\n"
        );

        FallbackReport::internal_error("missing option (compiler_id)".into())
            .write(&path)
            .unwrap();
        let value: Value = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["veredict"], Value::from("IE"));
        assert_eq!(value["internal_error"], Value::from("missing option (compiler_id)"));
    }

    #[test]
    fn test_environment_is_collected() {
        let env = Environment::collect("slave7", Path::new("/tmp"));
        assert_eq!(env.slave_id, "slave7");
        assert!(!env.uname.is_empty());
        assert!(env.time_end.is_none());
    }
}
