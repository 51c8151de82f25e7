use super::*;

use crate::checker::Checker;

impl Judge {
    pub(super) fn checking_step(&self, dir: &Path, record: &mut PhaseRecord) -> Result<()> {
        log::info!("---- checking step ----");

        let config = CheckerConfig::from_options(&self.options)?;
        let presentation_error = self.options.get_or("presentation_error", true)?;
        record.checking = Some(CheckingInfo {
            checker: config.name().to_string(),
            presentation_error,
            parameters: config.clone(),
        });

        if let CheckerConfig::External {
            external_program, ..
        } = &config
        {
            let program = self.problem_dir().join(external_program);
            fs::copy(&program, dir.join(external_program))
                .with_context(|| format!("Failed to copy checker {}", program.display()))?;
        }
        let checker = config.build(dir);

        let problem = self.problem_dir();
        for test in &self.tests {
            let result = record
                .tests
                .entry(test.clone())
                .or_insert_with(TestResult::not_executed);
            let (verdict, info) = check_one(dir, &problem, test, result, checker.as_ref())?;
            result.verdict = verdict;
            result.verdict_info = info;
        }
        Ok(())
    }
}

fn check_one(
    dir: &Path,
    problem: &Path,
    test: &str,
    result: &TestResult,
    checker: &dyn Checker,
) -> Result<(Verdict, Option<String>)> {
    let Some(monitor) = &result.monitor else {
        return Ok((Verdict::Unknown, None));
    };

    let exception = dir.join(format!("{test}.exc"));
    if exception.is_file() {
        let text = String::from_utf8_lossy(&fs::read(&exception)?).into_owned();
        let name = text.split_whitespace().next().unwrap_or_default();
        return Ok((Verdict::EE, Some(format!("Uncaught exception {name}"))));
    }

    if monitor.execution == ExecutionStatus::EE {
        return Ok((Verdict::EE, monitor.execution_error.clone()));
    }

    let input = problem.join(format!("{test}.inp"));
    let output = dir.join(format!("{test}.out"));
    let expected = problem.join(format!("{test}.cor"));
    let files = CheckFiles {
        input: &input,
        output: &output,
        expected: &expected,
    };
    match checker.check(&files) {
        Ok(verdict) => {
            log::info!("   = veredict for {test}: {verdict}");
            Ok((verdict, None))
        }
        Err(e) => {
            log::warn!("checker failed on {test}: {e:#}");
            Ok((Verdict::IE, Some(format!("{e:#}"))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{DoubleElasticChecker, StandardChecker};

    fn executed(text: &str) -> TestResult {
        TestResult::executed(serde_yaml::from_str(text).unwrap(), String::new())
    }

    fn dirs() -> (tempfile::TempDir, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let problem = tempfile::tempdir().unwrap();
        fs::write(problem.path().join("t.inp"), "1 2\n").unwrap();
        fs::write(problem.path().join("t.cor"), "3\n").unwrap();
        (dir, problem)
    }

    #[test]
    fn test_unexecuted_is_unknown() {
        let (dir, problem) = dirs();
        let checker = StandardChecker::new(true);
        let verdict =
            check_one(dir.path(), problem.path(), "t", &TestResult::not_executed(), &checker);
        assert_eq!(verdict.unwrap(), (Verdict::Unknown, None));
    }

    #[test]
    fn test_exception_marker_wins() {
        let (dir, problem) = dirs();
        fs::write(dir.path().join("t.out"), "3\n").unwrap();
        fs::write(dir.path().join("t.exc"), "ValueError invalid literal\n").unwrap();
        let checker = StandardChecker::new(true);
        let result = executed("execution: OK");
        let verdict = check_one(dir.path(), problem.path(), "t", &result, &checker);
        assert_eq!(
            verdict.unwrap(),
            (Verdict::EE, Some("Uncaught exception ValueError".into()))
        );
    }

    #[test]
    fn test_monitor_error_propagates() {
        let (dir, problem) = dirs();
        let checker = StandardChecker::new(true);
        let result = executed("execution: EE\nexecution_error: Time limit exceeded\n");
        let verdict = check_one(dir.path(), problem.path(), "t", &result, &checker);
        assert_eq!(
            verdict.unwrap(),
            (Verdict::EE, Some("Time limit exceeded".into()))
        );
    }

    #[test]
    fn test_checker_decides() {
        let (dir, problem) = dirs();
        fs::write(dir.path().join("t.out"), "4\n").unwrap();
        let checker = StandardChecker::new(true);
        let result = executed("execution: OK");
        let verdict = check_one(dir.path(), problem.path(), "t", &result, &checker);
        assert_eq!(verdict.unwrap(), (Verdict::WA, None));
    }

    #[test]
    fn test_checker_fault_is_local() {
        let (dir, problem) = dirs();
        fs::write(dir.path().join("t.out"), "3\n").unwrap();
        let checker = DoubleElasticChecker {
            separator1: "#".into(),
            separator2: ",".into(),
            starting: "<<".into(),
            ending: ">>".into(),
            presentation_error: true,
        };
        let (verdict, info) =
            check_one(dir.path(), problem.path(), "t", &executed("execution: OK"), &checker)
                .unwrap();
        assert_eq!(verdict, Verdict::IE);
        assert!(info.unwrap().contains("region markers"));
    }

    #[test]
    fn test_unreadable_output_is_local() {
        let (dir, problem) = dirs();
        let checker = StandardChecker::new(true);
        let (verdict, info) =
            check_one(dir.path(), problem.path(), "t", &executed("execution: OK"), &checker)
                .unwrap();
        assert_eq!(verdict, Verdict::IE);
        assert!(info.is_some());
    }
}
