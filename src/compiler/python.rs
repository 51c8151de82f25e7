use std::fs;

use anyhow::{Context, Result};

use super::{
    COMPILATION1, COMPILATION2, CompileContext, CompileOutcome, Compiler, CompilerInfo,
    CompilerKind, ExecContext, RelocatedExecution, Transfer, log_size, report_timeout,
    run_compiler, version_line,
};
use crate::config::SourceModifier;
use crate::monitor::{ExecutionOutcome, MonitorRequest};

/// Marks injected code so a submission can tell it is being graded.
/// Existing driver `main.py` files test `__name__` for this exact value.
pub const GRADER_MARKER: &str = "__name__ = \"__jutge__\"";

#[derive(Debug, Clone)]
pub struct Python3Backend {
    info: CompilerInfo,
}

impl Default for Python3Backend {
    fn default() -> Self {
        Self {
            info: CompilerInfo {
                id: "Python3",
                name: "Python3 Interpreter",
                language: "Python",
                extension: "py",
                kind: CompilerKind::Interpreter,
                flags1: "",
                flags2: "",
            },
        }
    }
}

impl Python3Backend {
    /// Byte-compiles `program.py`, clean iff the log stays empty
    fn syntax_check(&self, ctx: &CompileContext, log: &str) -> Result<CompileOutcome> {
        let cmd = format!("python3 -m py_compile program.py 1> /dev/null 2> {log}");
        if !run_compiler(ctx, &cmd)? {
            return report_timeout(ctx, None);
        }
        Ok(CompileOutcome::from_flag(log_size(&ctx.dir.join(log)) == 0))
    }

    fn inject_main(&self, ctx: &CompileContext) -> Result<()> {
        let original = fs::read_to_string(ctx.dir.join("program.py"))
            .context("Failed to read program.py")?;
        fs::write(ctx.dir.join("original.py"), &original)?;
        let main_path = ctx.problem_dir.join("main.py");
        let main = fs::read_to_string(&main_path)
            .with_context(|| format!("Failed to read {}", main_path.display()))?;
        fs::write(
            ctx.dir.join("program.py"),
            format!("{GRADER_MARKER}\n\n\n{original}\n\n\n{main}\n"),
        )?;
        Ok(())
    }
}

impl Compiler for Python3Backend {
    fn info(&self) -> &CompilerInfo {
        &self.info
    }

    fn version(&self) -> Option<String> {
        version_line("python3 --version", 0)
    }

    fn executable(&self) -> &str {
        "program.py"
    }

    fn compile(&self, ctx: &CompileContext) -> Result<CompileOutcome> {
        let outcome = self.syntax_check(ctx, COMPILATION1)?;
        if !outcome.success() || ctx.modifier == SourceModifier::Normal {
            return Ok(outcome);
        }
        self.inject_main(ctx)?;
        self.syntax_check(ctx, COMPILATION2)
    }

    fn execute(&self, ctx: &ExecContext, test: &str) -> Result<ExecutionOutcome> {
        let request = MonitorRequest {
            basename: test,
            compiler_id: self.info.id,
            maxtime: 30,
            options: Vec::new(),
            program: vec!["/usr/bin/python3".into(), "program.py".into()],
        };
        let outcome = self.execute_relocated(ctx, &request)?;
        if !outcome.is_ok() {
            log::info!("execution error at monitor for {test}");
        }
        Ok(outcome)
    }
}

impl RelocatedExecution for Python3Backend {
    fn transfer(&self) -> Transfer {
        Transfer::Copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_inject_main_wraps_submission() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("program.py"), "def f():\n    return 1\n").unwrap();
        fs::write(dir.path().join("main.py"), "print(f())\n").unwrap();
        let ctx = CompileContext {
            dir: dir.path(),
            problem_dir: dir.path(),
            driver_dir: dir.path(),
            modifier: SourceModifier::NoMain,
            max_time: Duration::from_secs(1),
        };
        Python3Backend::default().inject_main(&ctx).unwrap();

        let program = fs::read_to_string(dir.path().join("program.py")).unwrap();
        assert!(program.starts_with("__name__ = \"__jutge__\"\n"));
        let original_at = program.find("def f()").unwrap();
        let main_at = program.find("print(f())").unwrap();
        assert!(original_at < main_at);
        assert_eq!(
            fs::read_to_string(dir.path().join("original.py")).unwrap(),
            "def f():\n    return 1\n"
        );
    }

    #[test]
    fn test_source_is_not_an_artifact() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Python3Backend::default().artifacts(dir.path()).unwrap().is_empty());
    }
}
