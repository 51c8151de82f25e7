use std::fs::{self, OpenOptions};
use std::io::Write;

use anyhow::{Context, Result};

use super::{
    COMPILATION1, CompileContext, CompileOutcome, Compiler, CompilerInfo, CompilerKind,
    ExecContext, log_size, reject_modifier, report_timeout, run_compiler, version_line,
};
use crate::config::SourceModifier;
use crate::monitor::{ExecutionOutcome, MonitorRequest};

#[derive(Debug, Clone)]
pub struct RBackend {
    info: CompilerInfo,
}

impl Default for RBackend {
    fn default() -> Self {
        Self {
            info: CompilerInfo {
                id: "R",
                name: "R",
                language: "R",
                extension: "R",
                kind: CompilerKind::Interpreter,
                flags1: "",
                flags2: "",
            },
        }
    }
}

impl Compiler for RBackend {
    fn info(&self) -> &CompilerInfo {
        &self.info
    }

    fn version(&self) -> Option<String> {
        version_line("R --version", 0)
    }

    fn executable(&self) -> &str {
        "program.R"
    }

    fn compile(&self, ctx: &CompileContext) -> Result<CompileOutcome> {
        match ctx.modifier {
            SourceModifier::Normal => {}
            SourceModifier::NoMain => {
                let main_path = ctx.problem_dir.join("main.R");
                let main = fs::read_to_string(&main_path)
                    .with_context(|| format!("Failed to read {}", main_path.display()))?;
                let mut program = OpenOptions::new()
                    .append(true)
                    .open(ctx.dir.join("program.R"))
                    .context("Failed to open program.R")?;
                writeln!(program, "\n{main}")?;
            }
            SourceModifier::Structs => return reject_modifier(ctx, self.info.id),
        }

        let cmd = format!(
            "Rscript -e \"invisible(parse('program.R'))\" 1> /dev/null 2> {COMPILATION1}"
        );
        if !run_compiler(ctx, &cmd)? {
            return report_timeout(ctx, None);
        }
        Ok(CompileOutcome::from_flag(
            log_size(&ctx.dir.join(COMPILATION1)) == 0,
        ))
    }

    fn execute(&self, ctx: &ExecContext, test: &str) -> Result<ExecutionOutcome> {
        // a driver may wrap the program in its own entry script
        let executer = ctx.driver_dir.join("etc/R/executer.R");
        let script = if executer.is_file() {
            fs::copy(&executer, ctx.dir.join("executer.R"))?;
            "executer.R"
        } else {
            "program.R"
        };
        let request = MonitorRequest {
            basename: test,
            compiler_id: self.info.id,
            maxtime: 6,
            options: vec!["--maxprocs=100".into(), "--maxfiles=500".into()],
            program: vec!["/usr/bin/Rscript".into(), script.into()],
        };
        ctx.monitor.run(ctx.dir, &request)
    }
}
