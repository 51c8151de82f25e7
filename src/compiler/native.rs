use std::process::Command;

use anyhow::Result;

use super::{
    COMPILATION1, CompileContext, CompileOutcome, Compiler, CompilerInfo, CompilerKind,
    ExecContext, TwoPassInjection, remove_if_exists, report_timeout, run_compiler, version_line,
};
use crate::config::SourceModifier;
use crate::monitor::{ExecutionOutcome, MonitorRequest};

const BASE_FLAGS: &str = "-D_JUDGE_ -DNDEBUG -O2";
const PEDANTIC_FLAGS: &str =
    "-D_JUDGE_ -DNDEBUG -O2 -Wall -Wextra -Werror -Wno-sign-compare -Wshadow";

const C_TEMPLATE: &str = "{original}\n\n{main}\n";
const CXX_TEMPLATE: &str = "{stub}\n{original}\n\n{main}\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeFamily {
    C,
    Cxx,
}

/// gcc, clang and their C++ siblings
#[derive(Debug, Clone)]
pub struct NativeBackend {
    info: CompilerInfo,
    command: &'static str,
    family: NativeFamily,
}

impl NativeBackend {
    pub fn gcc() -> Self {
        Self::c("GCC", "GNU C Compiler", "gcc")
    }

    pub fn clang() -> Self {
        Self::c("Clang", "Clang C Compiler", "clang")
    }

    pub fn gxx() -> Self {
        Self::cxx("GXX", "GNU C++ Compiler", "g++", BASE_FLAGS)
    }

    pub fn gxx11() -> Self {
        Self::cxx("GXX11", "GNU C++11 Compiler", "g++", "-D_JUDGE_ -DNDEBUG -O2 -std=c++11")
    }

    pub fn gxx17() -> Self {
        Self::cxx("GXX17", "GNU C++17 Compiler", "g++", "-D_JUDGE_ -DNDEBUG -O2 -std=c++17")
    }

    /// g++ with warnings turned into errors, for introductory courses
    pub fn p1xx() -> Self {
        Self::cxx("P1XX", "GNU C++ Compiler with extra warnings", "g++", PEDANTIC_FLAGS)
    }

    pub fn clangxx17() -> Self {
        Self::cxx(
            "ClangXX17",
            "Clang C++17 Compiler",
            "clang++",
            "-D_JUDGE_ -DNDEBUG -O2 -std=c++17",
        )
    }

    fn c(id: &'static str, name: &'static str, command: &'static str) -> Self {
        Self {
            info: CompilerInfo {
                id,
                name,
                language: "C",
                extension: "c",
                kind: CompilerKind::Native,
                flags1: BASE_FLAGS,
                flags2: BASE_FLAGS,
            },
            command,
            family: NativeFamily::C,
        }
    }

    fn cxx(
        id: &'static str,
        name: &'static str,
        command: &'static str,
        flags: &'static str,
    ) -> Self {
        Self {
            info: CompilerInfo {
                id,
                name,
                language: "C++",
                extension: "cc",
                kind: CompilerKind::Native,
                flags1: flags,
                flags2: flags,
            },
            command,
            family: NativeFamily::Cxx,
        }
    }

    fn libraries(&self) -> &'static str {
        match self.family {
            NativeFamily::C => " -lm",
            NativeFamily::Cxx => "",
        }
    }

    fn strip(&self, ctx: &CompileContext) {
        let exe = ctx.dir.join("program.exe");
        if exe.exists() {
            if let Err(e) = Command::new("strip").arg(&exe).status() {
                log::debug!("strip failed: {e}");
            }
        }
    }

    fn compile_plain(&self, ctx: &CompileContext) -> Result<CompileOutcome> {
        remove_if_exists(&ctx.dir.join("program.exe"))?;
        let cmd = format!(
            "{} {} {} -o program.exe{} 2> {COMPILATION1}",
            self.command,
            self.info.flags1,
            self.info.source_name(),
            self.libraries()
        );
        if !run_compiler(ctx, &cmd)? {
            return report_timeout(ctx, Some("program.exe"));
        }
        Ok(CompileOutcome::from_flag(ctx.dir.join("program.exe").exists()))
    }
}

impl TwoPassInjection for NativeBackend {
    fn source_name(&self) -> String {
        self.info.source_name()
    }

    fn executable_name(&self) -> &str {
        "program.exe"
    }

    fn object_command(&self) -> String {
        format!(
            "{} -c {} {} 2> {COMPILATION1}",
            self.command,
            self.info.flags1,
            self.info.source_name()
        )
    }

    fn final_command(&self) -> String {
        format!(
            "{} {} {} -o program.exe{} 2> compilation2.txt",
            self.command,
            self.info.flags2,
            self.info.source_name(),
            self.libraries()
        )
    }

    fn template_path(&self) -> &'static str {
        match self.family {
            NativeFamily::C => "etc/c/program.c",
            NativeFamily::Cxx => "etc/cc/nomain.cc",
        }
    }

    fn builtin_template(&self) -> &'static str {
        match self.family {
            NativeFamily::C => C_TEMPLATE,
            NativeFamily::Cxx => CXX_TEMPLATE,
        }
    }

    fn main_name(&self) -> String {
        format!("main.{}", self.info.extension)
    }

    fn stub_path(&self) -> Option<&'static str> {
        match self.family {
            NativeFamily::C => None,
            NativeFamily::Cxx => Some("etc/cc/stub.cc"),
        }
    }
}

impl Compiler for NativeBackend {
    fn info(&self) -> &CompilerInfo {
        &self.info
    }

    fn version(&self) -> Option<String> {
        version_line(&format!("{} --version", self.command), 0)
    }

    fn executable(&self) -> &str {
        "program.exe"
    }

    fn compile(&self, ctx: &CompileContext) -> Result<CompileOutcome> {
        let outcome = match ctx.modifier {
            SourceModifier::Normal => self.compile_plain(ctx)?,
            SourceModifier::NoMain | SourceModifier::Structs => self.compile_injected(ctx)?,
        };
        if outcome.success() {
            self.strip(ctx);
        }
        Ok(outcome)
    }

    fn execute(&self, ctx: &ExecContext, test: &str) -> Result<ExecutionOutcome> {
        let request = MonitorRequest {
            basename: test,
            compiler_id: self.info.id,
            maxtime: 6,
            options: Vec::new(),
            program: vec!["./program.exe".into()],
        };
        ctx.monitor.run(ctx.dir, &request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_lines() {
        let gcc = NativeBackend::gcc();
        assert_eq!(
            gcc.object_command(),
            "gcc -c -D_JUDGE_ -DNDEBUG -O2 program.c 2> compilation1.txt"
        );
        assert_eq!(
            gcc.final_command(),
            "gcc -D_JUDGE_ -DNDEBUG -O2 program.c -o program.exe -lm 2> compilation2.txt"
        );

        let gxx17 = NativeBackend::gxx17();
        assert_eq!(gxx17.info().extension, "cc");
        assert!(gxx17.info().flags1.ends_with("-std=c++17"));
        assert_eq!(gxx17.template_path(), "etc/cc/nomain.cc");
        assert_eq!(gxx17.stub_path(), Some("etc/cc/stub.cc"));
    }

    #[test]
    fn test_native_artifacts() {
        let dir = std::path::Path::new("/phase");
        assert_eq!(
            NativeBackend::clang().artifacts(dir).unwrap(),
            vec![dir.join("program.exe")]
        );
    }
}
