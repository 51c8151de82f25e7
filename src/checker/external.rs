use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};

use super::{CheckFiles, Checker};
use crate::error::JudgeError;
use crate::supervise::{POLL_INTERVAL, spawn_in_group, wait_with_timeout};
use crate::verdict::Verdict;

/// Delegates the decision to a problem-supplied program, invoked as
/// `program <input> <output> <expected>`.
///
/// A first stdout token among AC, WA, PE and IC is the verdict; otherwise
/// exit status zero means AC and anything else WA.
#[derive(Debug, Clone)]
pub struct ExternalChecker {
    program: PathBuf,
    timeout: Duration,
}

impl ExternalChecker {
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }
}

impl Checker for ExternalChecker {
    fn check(&self, files: &CheckFiles) -> Result<Verdict> {
        let mut stdout = tempfile::tempfile()?;
        let mut command = Command::new(&self.program);
        command
            .arg(files.input)
            .arg(files.output)
            .arg(files.expected)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout.try_clone()?))
            .stderr(Stdio::null());
        if let Some(dir) = self.program.parent() {
            command.current_dir(dir);
        }

        log::debug!("running external checker {}", self.program.display());
        let mut child = spawn_in_group(&mut command)
            .with_context(|| format!("Failed to spawn checker {}", self.program.display()))?;

        let Some(status) = wait_with_timeout(&mut child, self.timeout, POLL_INTERVAL)? else {
            return Err(JudgeError::CheckerTimeout(self.timeout.as_secs_f64()).into());
        };

        let mut text = String::new();
        stdout.seek(SeekFrom::Start(0))?;
        stdout.read_to_string(&mut text)?;

        let verdict = text
            .split_whitespace()
            .next()
            .and_then(Verdict::from_checker_token)
            .unwrap_or(if status.success() {
                Verdict::AC
            } else {
                Verdict::WA
            });
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn check_with(program: PathBuf, timeout: Duration) -> Result<Verdict> {
        let dir = program.parent().unwrap().to_path_buf();
        let output = dir.join("t.out");
        let expected = dir.join("t.cor");
        fs::write(&output, "1\n").unwrap();
        fs::write(&expected, "1\n").unwrap();
        let files = CheckFiles {
            input: &expected,
            output: &output,
            expected: &expected,
        };
        ExternalChecker::new(program, timeout).check(&files)
    }

    #[test]
    fn test_exit_status_decides() {
        let dir = tempfile::tempdir().unwrap();
        let ok = script(dir.path(), "ok.sh", "cmp -s \"$2\" \"$3\"");
        assert_eq!(check_with(ok, Duration::from_secs(5)).unwrap(), Verdict::AC);
        let ko = script(dir.path(), "ko.sh", "exit 1");
        assert_eq!(check_with(ko, Duration::from_secs(5)).unwrap(), Verdict::WA);
    }

    #[test]
    fn test_printed_token_decides() {
        let dir = tempfile::tempdir().unwrap();
        let pe = script(dir.path(), "pe.sh", "echo PE; exit 0");
        assert_eq!(check_with(pe, Duration::from_secs(5)).unwrap(), Verdict::PE);
    }

    #[test]
    fn test_timeout_does_not_hang() {
        let dir = tempfile::tempdir().unwrap();
        let slow = script(dir.path(), "slow.sh", "sleep 30");
        let err = check_with(slow, Duration::from_millis(300)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JudgeError>(),
            Some(JudgeError::CheckerTimeout(_))
        ));
    }
}
