//! Compiler protocol.
//!
//! A backend builds a submission found in the phase directory under the
//! conventional name `program.<extension>` and later runs the built artifact
//! through the monitor, once per test.

mod inject;
mod jvm;
mod native;
mod python;
mod r;
mod registry;
mod relocate;
mod syntax;

pub use inject::{TwoPassInjection, splice};
pub use jvm::JdkBackend;
pub use native::{NativeBackend, NativeFamily};
pub use python::Python3Backend;
pub use r::RBackend;
pub use registry::{Registry, RegistryBuilder};
pub use relocate::{Relocated, RelocatedExecution, Transfer};
pub use syntax::SyntaxCheckBackend;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::SourceModifier;
use crate::monitor::{ExecutionOutcome, Monitor};
use crate::supervise::{POLL_INTERVAL, spawn_in_group, wait_with_timeout};

/// Diagnostic written when the compilation ceiling is hit
pub const COMPILATION_TIME_EXCEEDED: &str = "Compilation time exceeded";
/// First-pass diagnostic log
pub const COMPILATION1: &str = "compilation1.txt";
/// Second-pass diagnostic log
pub const COMPILATION2: &str = "compilation2.txt";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerKind {
    #[serde(rename = "compiler")]
    Native,
    #[serde(rename = "compiler (vm)")]
    Vm,
    #[serde(rename = "interpreter")]
    Interpreter,
}

/// Static identity of a backend
#[derive(Debug, Clone)]
pub struct CompilerInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub language: &'static str,
    pub extension: &'static str,
    pub kind: CompilerKind,
    pub flags1: &'static str,
    pub flags2: &'static str,
}

impl CompilerInfo {
    /// Conventional name of the submitted source
    pub fn source_name(&self) -> String {
        format!("program.{}", self.extension)
    }
}

/// Where and how to compile
#[derive(Debug, Clone)]
pub struct CompileContext<'a> {
    /// Phase directory holding `program.<ext>`
    pub dir: &'a Path,
    pub problem_dir: &'a Path,
    pub driver_dir: &'a Path,
    pub modifier: SourceModifier,
    pub max_time: Duration,
}

/// Where and how to execute one test
#[derive(Debug, Clone)]
pub struct ExecContext<'a> {
    /// Per-test sandbox directory
    pub dir: &'a Path,
    pub driver_dir: &'a Path,
    pub monitor: &'a Monitor,
    pub scratch_dir: &'a Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileOutcome {
    Success,
    Failed,
    TimedOut,
}

impl CompileOutcome {
    pub fn success(self) -> bool {
        self == CompileOutcome::Success
    }

    fn from_flag(ok: bool) -> Self {
        if ok {
            CompileOutcome::Success
        } else {
            CompileOutcome::Failed
        }
    }
}

pub trait Compiler {
    fn info(&self) -> &CompilerInfo;

    /// Toolchain version, if it can be determined
    fn version(&self) -> Option<String>;

    /// File name of the built artifact
    fn executable(&self) -> &str;

    fn compile(&self, ctx: &CompileContext) -> Result<CompileOutcome>;

    /// Copies the built artifact from `origin` into `dir`
    fn prepare_execution(&self, origin: &Path, dir: &Path) -> Result<()> {
        copy_into(origin, dir, self.executable())
    }

    fn execute(&self, ctx: &ExecContext, test: &str) -> Result<ExecutionOutcome>;

    /// Transient build products in `dir` that postprocessing may delete
    fn artifacts(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if self.executable() == self.info().source_name() {
            Ok(Vec::new())
        } else {
            Ok(vec![dir.join(self.executable())])
        }
    }
}

/// Runs a compiler command line under the compilation ceiling.
///
/// Returns `false` when the ceiling was hit and the command was killed.
pub(crate) fn run_compiler(ctx: &CompileContext, cmd: &str) -> Result<bool> {
    log::info!("{cmd}");
    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(cmd)
        .current_dir(ctx.dir)
        .stdin(Stdio::null());
    let mut child =
        spawn_in_group(&mut command).with_context(|| format!("Failed to spawn `{cmd}`"))?;
    let status = wait_with_timeout(&mut child, ctx.max_time, POLL_INTERVAL)?;
    Ok(status.is_some())
}

/// Records the compilation timeout and removes a partial artifact
pub(crate) fn report_timeout(
    ctx: &CompileContext,
    artifact: Option<&str>,
) -> Result<CompileOutcome> {
    fs::write(ctx.dir.join(COMPILATION1), COMPILATION_TIME_EXCEEDED)?;
    if let Some(artifact) = artifact {
        remove_if_exists(&ctx.dir.join(artifact))?;
    }
    Ok(CompileOutcome::TimedOut)
}

/// Fails cleanly for a source modifier the backend cannot honour
pub(crate) fn reject_modifier(ctx: &CompileContext, id: &str) -> Result<CompileOutcome> {
    log::warn!("{id} does not support source modifier {}", ctx.modifier);
    fs::write(
        ctx.dir.join(COMPILATION1),
        format!("Source modifier {} is not supported by {id}", ctx.modifier),
    )?;
    Ok(CompileOutcome::Failed)
}

/// First line `line` of the combined output of a version command
pub(crate) fn version_line(cmd: &str, line: usize) -> Option<String> {
    let output = Command::new("sh").arg("-c").arg(cmd).output().ok()?;
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text.lines().nth(line).map(|l| l.trim().to_string())
}

pub(crate) fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

pub(crate) fn copy_into(origin: &Path, dir: &Path, name: &str) -> Result<()> {
    let from = origin.join(name);
    fs::copy(&from, dir.join(name))
        .with_context(|| format!("Failed to copy {}", from.display()))?;
    Ok(())
}

/// Size of a diagnostic log, missing logs count as empty
pub(crate) fn log_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
