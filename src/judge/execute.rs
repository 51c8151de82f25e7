use super::*;

/// Marker a runtime leaves when the program died of an uncaught exception
const EXCEPTION_MARKER: &str = "exception.txt";

impl Judge {
    /// Runs every test in order, stopping at the first failed execution
    /// unless the phase must see them all
    pub(super) fn execution_step(
        &self,
        phase: Phase,
        dir: &Path,
        compiler: &dyn Compiler,
        record: &mut PhaseRecord,
    ) -> Result<()> {
        log::info!("---- execution step ----");

        // scored problems always run every test
        let continue_on_ee =
            self.options.get_or("continue_on_ee", false)? || record.has_scoring_plan();
        record.execution = Some(ExecutionInfo { continue_on_ee });

        let scaling = match phase {
            Phase::Correction => Some(Scaling::from_options(&self.options)?),
            Phase::Solution => None,
        };

        for test in &self.tests {
            let result = self.execute_one_test(dir, compiler, test, scaling.as_ref())?;
            let ok = result
                .monitor
                .as_ref()
                .is_some_and(|res| res.execution == ExecutionStatus::OK);
            record.tests.insert(test.clone(), result);
            if !ok && !continue_on_ee {
                log::info!("execution of {test} failed, skipping the remaining tests");
                break;
            }
        }
        Ok(())
    }

    fn execute_one_test(
        &self,
        dir: &Path,
        compiler: &dyn Compiler,
        test: &str,
        scaling: Option<&Scaling>,
    ) -> Result<TestResult> {
        let problem = self.problem_dir();
        let test_dir = dir.join(format!("{test}.dir"));
        fs::create_dir_all(&test_dir)?;

        let input = format!("{test}.inp");
        fs::copy(problem.join(&input), test_dir.join(&input))
            .with_context(|| format!("Failed to copy {input}"))?;
        copy_option_files(&problem, &test_dir, test)?;

        let ops_path = test_dir.join(format!("{test}.ops"));
        let mut ops = if ops_path.is_file() {
            fs::read_to_string(&ops_path)?.trim().to_string()
        } else {
            String::new()
        };
        if let Some(scaling) = scaling {
            ops = self.limit_options(test, compiler, scaling, ops)?;
            fs::write(&ops_path, &ops)?;
        }

        compiler.prepare_execution(dir, &test_dir)?;
        let driver = self.settings.dir.join("driver");
        let ctx = ExecContext {
            dir: &test_dir,
            driver_dir: &driver,
            monitor: &self.monitor,
            scratch_dir: &self.settings.scratch_dir,
        };
        let outcome = compiler.execute(&ctx, test)?;
        if !outcome.is_ok() {
            log::info!("monitor reported an execution error on {test}: {outcome:?}");
        }

        collect_artifacts(&test_dir, dir, test)?;
        fs::remove_dir_all(&test_dir)
            .with_context(|| format!("Failed to remove {}", test_dir.display()))?;

        let res = MonitorResult::read(&dir.join(format!("{test}.res")))?;
        Ok(TestResult::executed(res, ops))
    }

    /// Monitor options limiting a correction test by its solution run
    fn limit_options(
        &self,
        test: &str,
        compiler: &dyn Compiler,
        scaling: &Scaling,
        ops: String,
    ) -> Result<String> {
        let measured = self
            .solution
            .as_ref()
            .and_then(|sol| sol.tests.get(test))
            .and_then(|result| result.monitor.as_ref());
        let cputime = measured
            .and_then(|res| res.cputime)
            .ok_or_else(|| JudgeError::MissingOption(format!("cputime of {test}")))?;
        let clktime = measured
            .and_then(|res| res.clktime)
            .ok_or_else(|| JudgeError::MissingOption(format!("clktime of {test}")))?;

        let expected = self.problem_dir().join(format!("{test}.cor"));
        let expected_size = fs::metadata(&expected)
            .map_err(|_| JudgeError::MissingArtifact(expected.display().to_string()))?
            .len();

        let backend = compiler.info();
        let derived = DerivedLimits::derive(
            cputime,
            clktime,
            expected_size,
            SpeedTier::of(backend.extension),
            backend.kind == CompilerKind::Vm,
            scaling,
        );

        let author: Option<String> = self.options.get("author")?;
        match (self.limit_override)(author.as_deref()) {
            Some(fixed) => {
                log::info!("**** fixed limits for author {} ****", author.unwrap_or_default());
                Ok(derived.with_time(fixed).to_options())
            }
            None => Ok(format!("{ops}{}", derived.to_options())),
        }
    }
}

/// Copies `<test>.ops` and `<test>.<compiler>.ops` next to the input
fn copy_option_files(problem: &Path, test_dir: &Path, test: &str) -> Result<()> {
    let prefix = format!("{test}.");
    for entry in fs::read_dir(problem)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(rest) = name.strip_prefix(&prefix) else {
            continue;
        };
        if rest == "ops" || (rest.ends_with(".ops") && !rest[..rest.len() - 4].contains('.')) {
            fs::copy(entry.path(), test_dir.join(&name))?;
        }
    }
    Ok(())
}

/// Moves the monitor's artifacts up to the phase directory. An artifact that
/// is a symbolic link means the sandbox was tampered with.
pub(super) fn collect_artifacts(test_dir: &Path, dir: &Path, test: &str) -> Result<()> {
    for ext in ARTIFACTS {
        let name = format!("{test}.{ext}");
        let path = test_dir.join(&name);
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(JudgeError::MissingArtifact(name).into());
            }
            Err(e) => return Err(e.into()),
        };
        if meta.file_type().is_symlink() {
            return Err(JudgeError::Cheating(name).into());
        }
        fs::rename(&path, dir.join(&name))
            .with_context(|| format!("Failed to move {name}"))?;
    }

    let marker = test_dir.join(EXCEPTION_MARKER);
    match fs::symlink_metadata(&marker) {
        Ok(meta) if meta.file_type().is_symlink() => {
            Err(JudgeError::Cheating(EXCEPTION_MARKER.to_string()).into())
        }
        Ok(_) => {
            let target = dir.join(format!("{test}.exc"));
            remove_if_exists(&target)?;
            fs::rename(&marker, &target)?;
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to inspect {}", marker.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    fn monitored(test_dir: &Path, test: &str) {
        for ext in ARTIFACTS {
            fs::write(test_dir.join(format!("{test}.{ext}")), ext).unwrap();
        }
    }

    #[test]
    fn test_artifacts_move_up() {
        let dir = tempfile::tempdir().unwrap();
        let test_dir = dir.path().join("t1.dir");
        fs::create_dir(&test_dir).unwrap();
        monitored(&test_dir, "t1");
        fs::write(test_dir.join(EXCEPTION_MARKER), "ZeroDivisionError: division").unwrap();

        collect_artifacts(&test_dir, dir.path(), "t1").unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("t1.out")).unwrap(), "out");
        assert!(dir.path().join("t1.exc").is_file());
        assert!(!test_dir.join("t1.res").exists());
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let test_dir = dir.path().join("t1.dir");
        fs::create_dir(&test_dir).unwrap();
        monitored(&test_dir, "t1");
        fs::remove_file(test_dir.join("t1.log")).unwrap();

        let err = collect_artifacts(&test_dir, dir.path(), "t1").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JudgeError>(),
            Some(JudgeError::MissingArtifact(name)) if name == "t1.log"
        ));
        assert!(!JudgeError::is_cheating(&err));
    }

    #[test]
    fn test_symlinked_artifact_is_cheating() {
        for ext in ARTIFACTS {
            let dir = tempfile::tempdir().unwrap();
            let test_dir = dir.path().join("t1.dir");
            fs::create_dir(&test_dir).unwrap();
            monitored(&test_dir, "t1");
            let victim = test_dir.join(format!("t1.{ext}"));
            fs::remove_file(&victim).unwrap();
            symlink("/etc/hostname", &victim).unwrap();

            let err = collect_artifacts(&test_dir, dir.path(), "t1").unwrap_err();
            assert!(JudgeError::is_cheating(&err), "{ext} symlink not detected");
        }
    }

    #[test]
    fn test_symlinked_exception_marker_is_cheating() {
        let dir = tempfile::tempdir().unwrap();
        let test_dir = dir.path().join("t1.dir");
        fs::create_dir(&test_dir).unwrap();
        monitored(&test_dir, "t1");
        symlink("/etc/hostname", test_dir.join(EXCEPTION_MARKER)).unwrap();

        let err = collect_artifacts(&test_dir, dir.path(), "t1").unwrap_err();
        assert!(JudgeError::is_cheating(&err));
        assert!(!dir.path().join("t1.exc").exists());
    }

    #[test]
    fn test_no_exception_marker() {
        let dir = tempfile::tempdir().unwrap();
        let test_dir = dir.path().join("t1.dir");
        fs::create_dir(&test_dir).unwrap();
        monitored(&test_dir, "t1");

        collect_artifacts(&test_dir, dir.path(), "t1").unwrap();
        assert!(!dir.path().join("t1.exc").exists());
    }

    #[test]
    fn test_option_files_are_copied() {
        let problem = tempfile::tempdir().unwrap();
        for name in ["t1.ops", "t1.JDK.ops", "t1.inp", "t10.ops", "t1.a.b.ops"] {
            fs::write(problem.path().join(name), "").unwrap();
        }
        let test_dir = tempfile::tempdir().unwrap();
        copy_option_files(problem.path(), test_dir.path(), "t1").unwrap();

        let mut copied: Vec<String> = fs::read_dir(test_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        copied.sort();
        assert_eq!(copied, ["t1.JDK.ops", "t1.ops"]);
    }
}
