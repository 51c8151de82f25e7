use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Mapping;

/// Extensions of the files every monitored run must leave behind
pub const ARTIFACTS: [&str; 5] = ["inp", "out", "err", "log", "res"];

/// Client of the external sandbox monitor.
///
/// The monitor is an opaque privileged executable: it runs one program under
/// cpu, wall, memory, file and process limits and leaves `<test>.out`,
/// `<test>.err`, `<test>.log` and `<test>.res` in its working directory.
#[derive(Debug, Clone)]
pub struct Monitor {
    path: PathBuf,
    pythonpath: Option<String>,
}

/// One monitored execution
#[derive(Debug, Clone)]
pub struct MonitorRequest<'a> {
    /// Base name of the test, the monitor derives every file name from it
    pub basename: &'a str,
    /// Compiler id, used to pick up `<test>.<id>.ops`
    pub compiler_id: &'a str,
    /// Default wall limit in seconds; later options override it
    pub maxtime: u32,
    /// Backend specific options, placed before the option files
    pub options: Vec<String>,
    /// Program command line
    pub program: Vec<String>,
}

/// How the monitor process itself ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed,
    Faulted(Option<i32>),
}

impl ExecutionOutcome {
    pub fn is_ok(self) -> bool {
        matches!(self, ExecutionOutcome::Completed)
    }
}

impl Monitor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pythonpath: None,
        }
    }

    pub fn with_pythonpath(mut self, pythonpath: Option<String>) -> Self {
        self.pythonpath = pythonpath.filter(|p| !p.is_empty());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the monitor is installed owned by root with the setuid bit
    pub fn is_setuid_root(&self) -> Result<bool> {
        let meta = fs::metadata(&self.path)
            .with_context(|| format!("Failed to stat monitor {}", self.path.display()))?;
        let setuid = meta.mode() & (libc::S_ISUID as u32) != 0;
        Ok(meta.uid() == 0 && meta.gid() == 0 && setuid)
    }

    /// Runs the monitor in `dir` and waits for it
    pub fn run(&self, dir: &Path, request: &MonitorRequest) -> Result<ExecutionOutcome> {
        let ops = collect_options(dir, request.basename, request.compiler_id)?;

        let mut command = Command::new(&self.path);
        command
            .current_dir(dir)
            .arg(format!("--basename={}", request.basename))
            .arg(format!("--maxtime={}", request.maxtime))
            .args(&request.options)
            .args(&ops)
            .arg("--")
            .args(&request.program)
            .stdin(Stdio::null());
        if let Some(pythonpath) = &self.pythonpath {
            command.env("PYTHONPATH", pythonpath);
        }

        log::info!("{command:?}");
        let status = command
            .status()
            .with_context(|| format!("Failed to spawn monitor {}", self.path.display()))?;

        if status.success() {
            Ok(ExecutionOutcome::Completed)
        } else {
            log::info!("monitor exited with {status}");
            Ok(ExecutionOutcome::Faulted(status.code()))
        }
    }
}

/// Merges `<test>.ops` and `<test>.<compiler>.ops` found in `dir`
pub fn collect_options(dir: &Path, test: &str, compiler_id: &str) -> Result<Vec<String>> {
    let mut ops = Vec::new();
    for name in [format!("{test}.ops"), format!("{test}.{compiler_id}.ops")] {
        let path = dir.join(&name);
        if path.is_file() {
            log::info!("using {name}");
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            ops.extend(text.split_whitespace().map(str::to_string));
        }
    }
    Ok(ops)
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    OK,
    EE,
}

/// Contents of the `.res` document written by the monitor
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MonitorResult {
    pub execution: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_error: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds", skip_serializing_if = "Option::is_none")]
    pub cputime: Option<f64>,
    #[serde(default, deserialize_with = "lenient_seconds", skip_serializing_if = "Option::is_none")]
    pub clktime: Option<f64>,
    /// Any other resource usage the monitor reports
    #[serde(flatten)]
    pub usage: Mapping,
}

impl MonitorResult {
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid monitor result {}", path.display()))
    }
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(value)) => Ok(Some(value)),
        Some(Raw::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
