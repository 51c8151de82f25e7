use std::fs;

use anyhow::Result;

use super::{
    COMPILATION1, CompileContext, CompileOutcome, Compiler, CompilerInfo, CompilerKind,
    ExecContext, reject_modifier, report_timeout, run_compiler, version_line,
};
use crate::config::SourceModifier;
use crate::monitor::{ExecutionOutcome, MonitorRequest};

/// Interpreted language whose only build step is a syntax check.
///
/// The check command writes its verdict to `compilation1.txt`; the build
/// succeeds when the trimmed log equals `expected`, and the log is removed.
#[derive(Debug, Clone)]
pub struct SyntaxCheckBackend {
    info: CompilerInfo,
    check: String,
    expected: String,
    program: Vec<String>,
    version_command: Option<String>,
}

impl SyntaxCheckBackend {
    pub fn new(
        info: CompilerInfo,
        check: impl Into<String>,
        expected: impl Into<String>,
        program: Vec<String>,
    ) -> Self {
        Self {
            info,
            check: check.into(),
            expected: expected.into(),
            program,
            version_command: None,
        }
    }

    pub fn with_version_command(mut self, cmd: impl Into<String>) -> Self {
        self.version_command = Some(cmd.into());
        self
    }

    pub fn ruby() -> Self {
        Self::new(
            interpreter("Ruby", "Ruby", "rb"),
            format!("ruby -c program.rb > {COMPILATION1} 2>&1"),
            "Syntax OK",
            vec!["/usr/bin/ruby".into(), "program.rb".into()],
        )
        .with_version_command("ruby --version")
    }

    pub fn perl() -> Self {
        Self::new(
            interpreter("Perl", "Perl", "pl"),
            format!("perl -c program.pl 1> /dev/null 2> {COMPILATION1}"),
            "program.pl syntax OK",
            vec!["/usr/bin/perl".into(), "program.pl".into()],
        )
        .with_version_command("perl -e 'print \"$^V\\n\"'")
    }
}

fn interpreter(id: &'static str, language: &'static str, extension: &'static str) -> CompilerInfo {
    CompilerInfo {
        id,
        name: language,
        language,
        extension,
        kind: CompilerKind::Interpreter,
        flags1: "",
        flags2: "",
    }
}

impl Compiler for SyntaxCheckBackend {
    fn info(&self) -> &CompilerInfo {
        &self.info
    }

    fn version(&self) -> Option<String> {
        self.version_command
            .as_deref()
            .and_then(|cmd| version_line(cmd, 0))
    }

    fn executable(&self) -> &str {
        self.program.last().map(String::as_str).unwrap_or_default()
    }

    fn compile(&self, ctx: &CompileContext) -> Result<CompileOutcome> {
        if ctx.modifier != SourceModifier::Normal {
            return reject_modifier(ctx, self.info.id);
        }
        if !run_compiler(ctx, &self.check)? {
            return report_timeout(ctx, None);
        }
        let log_path = ctx.dir.join(COMPILATION1);
        let log = fs::read_to_string(&log_path).unwrap_or_default();
        if log.trim() != self.expected {
            return Ok(CompileOutcome::Failed);
        }
        fs::remove_file(&log_path)?;
        Ok(CompileOutcome::Success)
    }

    fn execute(&self, ctx: &ExecContext, test: &str) -> Result<ExecutionOutcome> {
        let request = MonitorRequest {
            basename: test,
            compiler_id: self.info.id,
            maxtime: 6,
            options: Vec::new(),
            program: self.program.clone(),
        };
        ctx.monitor.run(ctx.dir, &request)
    }
}
