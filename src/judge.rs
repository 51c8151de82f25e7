//! The judge orchestrator.
//!
//! A run grades the reference solution first, as an oracle and a source of
//! timing baselines, and then the candidate against limits derived from it.
//! Each phase goes through preprocess, compilation, execution, checking,
//! evaluation and postprocess, and always ends writing its report.

mod check;
mod compile;
mod evaluate;
mod execute;
mod init;
mod limits;
mod matching;
mod postprocess;
mod preprocess;

pub use limits::{DerivedLimits, LimitOverride, Scaling, TimeLimits, generous_author_limits};
pub use matching::{Matched, SpeedTier, match_solution_compiler};

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::checker::{CheckFiles, CheckerConfig};
use crate::compiler::{
    CompileContext, Compiler, CompilerKind, ExecContext, Registry, remove_if_exists,
};
use crate::config::{
    AllowedCompilers, Documents, Options, RunSettings, SourceModifier, WordList,
};
use crate::error::JudgeError;
use crate::monitor::{ARTIFACTS, ExecutionStatus, Monitor, MonitorResult};
use crate::report::{
    CheckingInfo, CompilationInfo, Environment, ExecutionInfo, PartScore, Phase, PhaseRecord,
    PostprocessInfo, PreprocessInfo, Scores, TestResult,
};
use crate::verdict::{Verdict, aggregate};

pub struct Judge {
    settings: RunSettings,
    docs: Documents,
    options: Options,
    registry: Registry,
    monitor: Monitor,
    environment: Environment,
    tests: Vec<String>,
    limit_override: LimitOverride,
    solution: Option<PhaseRecord>,
    correction: Option<PhaseRecord>,
}

impl Judge {
    /// Replaces the hook deciding fixed limits for some submissions
    pub fn with_limit_override(mut self, limit_override: LimitOverride) -> Self {
        self.limit_override = limit_override;
        self
    }

    pub fn tests(&self) -> &[String] {
        &self.tests
    }

    pub fn solution(&self) -> Option<&PhaseRecord> {
        self.solution.as_ref()
    }

    pub fn correction(&self) -> Option<&PhaseRecord> {
        self.correction.as_ref()
    }

    /// Grades the solution, then the candidate. Returns the candidate's verdict.
    pub fn run(&mut self) -> Result<Verdict> {
        log::info!("**** solution phase ****");
        let solution = self.judge_phase(Phase::Solution)?;

        log::info!("**** correction phase ****");
        let verdict = if solution == Verdict::AC {
            self.judge_phase(Phase::Correction)?
        } else {
            self.setter_error()?
        };

        log::info!("<<<< end with veredict {verdict} >>>>");
        Ok(verdict)
    }

    /// Whatever was recorded so far, for post-mortem dumps
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "tests": self.tests,
            "solution": self.solution,
            "correction": self.correction,
        })
    }

    fn phase_dir(&self, phase: Phase) -> PathBuf {
        self.settings.dir.join(phase.as_str())
    }

    fn problem_dir(&self) -> PathBuf {
        self.settings.dir.join("problem")
    }

    fn judge_phase(&mut self, phase: Phase) -> Result<Verdict> {
        let dir = self.phase_dir(phase);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut record = PhaseRecord::new(phase, self.environment.clone(), &self.docs);
        let steps = self.run_steps(phase, &dir, &mut record);
        let written = self.output_step(&mut record);
        let verdict = record.verdict;
        self.store(record);

        steps?;
        written?;
        Ok(verdict)
    }

    fn run_steps(&self, phase: Phase, dir: &Path, record: &mut PhaseRecord) -> Result<()> {
        self.preprocess_step(record)?;
        let Some(compiler) = self.compilation_step(phase, dir, record)? else {
            return Ok(());
        };
        self.execution_step(phase, dir, compiler.as_ref(), record)?;
        self.checking_step(dir, record)?;
        self.evaluation_step(record);
        self.postprocess_step(dir, compiler.as_ref(), record)
    }

    /// The reference solution failed: the candidate is not judged, and the
    /// solution's files are kept under `correction/setter.error`.
    fn setter_error(&mut self) -> Result<Verdict> {
        let dir = self.phase_dir(Phase::Correction);
        fs::create_dir_all(&dir)?;

        let mut record = PhaseRecord::new(Phase::Correction, self.environment.clone(), &self.docs);
        record.verdict = Verdict::SE;
        let snapshot = copy_tree(&self.phase_dir(Phase::Solution), &dir.join("setter.error"));
        let written = self.output_step(&mut record);
        self.store(record);

        snapshot.context("Failed to keep the setter error files")?;
        written?;
        Ok(Verdict::SE)
    }

    fn output_step(&self, record: &mut PhaseRecord) -> Result<()> {
        record.environment.time_end = Some(crate::create_timestamp());
        record.write(&self.settings.dir)
    }

    fn store(&mut self, record: PhaseRecord) {
        match record.phase {
            Phase::Solution => self.solution = Some(record),
            Phase::Correction => self.correction = Some(record),
        }
    }
}

/// Recursively copies the contents of `from` into `to`
fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_tree() {
        let from = tempfile::tempdir().unwrap();
        fs::create_dir(from.path().join("t1.dir")).unwrap();
        fs::write(from.path().join("t1.dir/t1.inp"), "1").unwrap();
        fs::write(from.path().join("program.cc"), "int main() {}").unwrap();

        let to = tempfile::tempdir().unwrap();
        let target = to.path().join("setter.error");
        copy_tree(from.path(), &target).unwrap();
        assert!(target.join("program.cc").is_file());
        assert_eq!(fs::read_to_string(target.join("t1.dir/t1.inp")).unwrap(), "1");
    }
}
