use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{
    COMPILATION1, COMPILATION2, CompileContext, CompileOutcome, Compiler, CompilerInfo,
    CompilerKind, ExecContext, RelocatedExecution, Transfer, reject_modifier, report_timeout,
    run_compiler, version_line,
};
use crate::config::SourceModifier;
use crate::monitor::{ExecutionOutcome, MonitorRequest};

const JUDGE_MAIN: &str = "JudgeMain";

/// Java through the JDK.
///
/// The JVM wants the whole test directory to itself, so execution happens in
/// a private scratch directory the test files are moved to and back from.
#[derive(Debug, Clone)]
pub struct JdkBackend {
    info: CompilerInfo,
}

impl Default for JdkBackend {
    fn default() -> Self {
        Self {
            info: CompilerInfo {
                id: "JDK",
                name: "OpenJDK Runtime Environment",
                language: "Java",
                extension: "java",
                kind: CompilerKind::Vm,
                flags1: "",
                flags2: "",
            },
        }
    }
}

impl JdkBackend {
    fn remove_classes(dir: &Path) -> Result<()> {
        for class in class_files(dir)? {
            fs::remove_file(&class)?;
        }
        Ok(())
    }

    /// Brings in the driver's `JudgeMain.java` when it has one
    fn install_judge_main(ctx: &CompileContext) -> Result<bool> {
        let wrapper = ctx.driver_dir.join("etc/jdk").join(format!("{JUDGE_MAIN}.java"));
        if !wrapper.is_file() {
            return Ok(false);
        }
        fs::copy(&wrapper, ctx.dir.join(format!("{JUDGE_MAIN}.java")))
            .with_context(|| format!("Failed to copy {}", wrapper.display()))?;
        Ok(true)
    }

    fn compile_normal(&self, ctx: &CompileContext) -> Result<CompileOutcome> {
        fs::copy(ctx.dir.join("program.java"), ctx.dir.join("Main.java"))
            .context("Failed to copy program.java")?;
        let entry = if Self::install_judge_main(ctx)? {
            JUDGE_MAIN
        } else {
            "Main"
        };
        if !run_compiler(ctx, &format!("javac {entry}.java 2> {COMPILATION1}"))? {
            return report_timeout(ctx, None);
        }
        Ok(CompileOutcome::from_flag(ctx.dir.join("Main.class").exists()))
    }

    fn compile_no_main(&self, ctx: &CompileContext) -> Result<CompileOutcome> {
        if !run_compiler(ctx, &format!("javac program.java 2> {COMPILATION1}"))? {
            return report_timeout(ctx, None);
        }
        let main = ctx.problem_dir.join("main.java");
        fs::copy(&main, ctx.dir.join("Main.java"))
            .with_context(|| format!("Failed to copy {}", main.display()))?;
        let entry = if Self::install_judge_main(ctx)? {
            JUDGE_MAIN
        } else {
            "Main"
        };
        if !run_compiler(ctx, &format!("javac {entry}.java 2> {COMPILATION2}"))? {
            return report_timeout(ctx, None);
        }
        Ok(CompileOutcome::from_flag(ctx.dir.join("Main.class").exists()))
    }
}

fn class_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut classes = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "class") {
            classes.push(path);
        }
    }
    classes.sort();
    Ok(classes)
}

impl Compiler for JdkBackend {
    fn info(&self) -> &CompilerInfo {
        &self.info
    }

    fn version(&self) -> Option<String> {
        version_line("java -version", 1)
    }

    fn executable(&self) -> &str {
        "Main.class"
    }

    fn compile(&self, ctx: &CompileContext) -> Result<CompileOutcome> {
        Self::remove_classes(ctx.dir)?;
        match ctx.modifier {
            SourceModifier::Normal => self.compile_normal(ctx),
            SourceModifier::NoMain => self.compile_no_main(ctx),
            SourceModifier::Structs => reject_modifier(ctx, self.info.id),
        }
    }

    fn prepare_execution(&self, origin: &Path, dir: &Path) -> Result<()> {
        for class in class_files(origin)? {
            if let Some(name) = class.file_name() {
                fs::copy(&class, dir.join(name))?;
            }
        }
        Ok(())
    }

    fn execute(&self, ctx: &ExecContext, test: &str) -> Result<ExecutionOutcome> {
        let entry = if ctx.dir.join(format!("{JUDGE_MAIN}.class")).exists() {
            JUDGE_MAIN
        } else {
            "Main"
        };
        let request = MonitorRequest {
            basename: test,
            compiler_id: self.info.id,
            maxtime: 10,
            options: ["--maxfiles=4096", "--maxprocs=100", "--maxmem=2048:2048"]
                .map(String::from)
                .to_vec(),
            program: ["/usr/bin/java", "-Xmx1024M", "-Xss1024M", entry]
                .map(String::from)
                .to_vec(),
        };
        self.execute_relocated(ctx, &request)
    }

    fn artifacts(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        class_files(dir)
    }
}

impl RelocatedExecution for JdkBackend {
    fn transfer(&self) -> Transfer {
        Transfer::Move
    }
}
