use super::*;

/// Helper sources a problem may ship for its driver
const JUDGE_HELPERS: [&str; 2] = ["judge.hs", "judge.py"];

impl Judge {
    /// Builds the phase's program. Returns the backend that built it, or
    /// `None` when the phase stops here with its verdict already set.
    pub(super) fn compilation_step(
        &self,
        phase: Phase,
        dir: &Path,
        record: &mut PhaseRecord,
    ) -> Result<Option<Box<dyn Compiler>>> {
        log::info!("---- compilation step ----");

        let compilers: WordList = self
            .options
            .get_or("compilers", WordList::Words("any".into()))?;
        let requested: String = self.options.require("compiler_id")?;
        let mut info = CompilationInfo {
            compilers: compilers.clone().into_vec().join(" "),
            compiler: requested.clone(),
            ..Default::default()
        };

        let allowed = AllowedCompilers::from_words(compilers);
        if !allowed.allows(&requested) {
            record.compilation = Some(info);
            return Err(JudgeError::CompilerNotAllowed(requested).into());
        }

        let compiler = match phase {
            Phase::Correction => self.registry.create(&requested)?,
            Phase::Solution => match self.choose_solution_compiler(&requested, &allowed) {
                Ok(matched) => {
                    log::info!("---> solution compiler matched ({})", matched.how);
                    info.matching = Some(matched.how.to_string());
                    self.registry.create(&matched.id)?
                }
                Err(e) if is_phase_fatal(&e) => {
                    record.compilation = Some(info);
                    return Ok(self.phase_failed(record, e));
                }
                Err(e) => return Err(e),
            },
        };

        let backend = compiler.info();
        log::info!("---> chosen compiler: {}", backend.id);
        info.choosen_compiler = Some(backend.id.to_string());
        info.versus_compiler = match phase {
            Phase::Solution => Some(backend.id.to_string()),
            Phase::Correction => self
                .solution
                .as_ref()
                .and_then(|sol| sol.compilation.as_ref())
                .and_then(|c| c.choosen_compiler.clone()),
        };
        info.language = Some(backend.language.to_string());
        info.version = compiler.version();
        info.kind = Some(backend.kind);
        info.flags1 = Some(backend.flags1.to_string());
        info.flags2 = Some(backend.flags2.to_string());
        info.extension = Some(backend.extension.to_string());
        record.compilation = Some(info);

        let problem = self.problem_dir();
        for helper in JUDGE_HELPERS {
            let path = problem.join(helper);
            if path.is_file() {
                fs::copy(&path, dir.join(helper))
                    .with_context(|| format!("Failed to copy {}", path.display()))?;
            }
        }

        let source = backend.source_name();
        let origin = match phase {
            Phase::Correction => self.settings.dir.join("submission").join(&source),
            Phase::Solution => {
                let solution = problem.join(format!("solution.{}", backend.extension));
                if !solution.is_file() {
                    let missing =
                        JudgeError::MissingSolution(format!("solution.{}", backend.extension));
                    return Ok(self.phase_failed(record, missing.into()));
                }
                solution
            }
        };
        fs::copy(&origin, dir.join(&source))
            .with_context(|| format!("Failed to copy {}", origin.display()))?;

        let modifier: SourceModifier = self
            .options
            .get_or("source_modifier", SourceModifier::Normal)?;
        let driver = self.settings.dir.join("driver");
        let ctx = CompileContext {
            dir,
            problem_dir: &problem,
            driver_dir: &driver,
            modifier,
            max_time: self.settings.max_compilation_time,
        };
        let outcome = compiler.compile(&ctx)?;
        log::info!("---> compilation outcome: {outcome:?}");

        if !outcome.success() {
            record.verdict = Verdict::CE;
            return Ok(None);
        }
        Ok(Some(compiler))
    }

    fn choose_solution_compiler(
        &self,
        requested: &str,
        allowed: &AllowedCompilers,
    ) -> Result<Matched> {
        let extension = self.registry.create(requested)?.info().extension;
        let problem = self.problem_dir();
        match_solution_compiler(requested, extension, allowed, |ext| {
            problem.join(format!("solution.{ext}")).is_file()
        })
    }

    /// Ends the phase with an internal error it can still report on
    fn phase_failed<T>(&self, record: &mut PhaseRecord, err: anyhow::Error) -> Option<T> {
        log::error!("{} phase cannot go on: {err}", record.phase);
        record.verdict = Verdict::IE;
        record.verdict_info = Some(err.to_string());
        None
    }
}

/// Failures that end the current phase only
fn is_phase_fatal(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<JudgeError>(),
        Some(JudgeError::NoSuitableCompiler | JudgeError::MissingSolution(_))
    )
}
