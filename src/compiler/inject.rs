use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use super::{
    COMPILATION1, COMPILATION2, CompileContext, CompileOutcome, log_size, report_timeout,
    run_compiler,
};

/// Replaces every `{name}` placeholder of `template` by its part.
///
/// Only the template is scanned, so placeholders inside the parts are left
/// as they are. Unknown placeholders are kept verbatim.
pub fn splice(template: &str, parts: &[(&str, &str)]) -> String {
    let mut text = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        text.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let part = after.find('}').and_then(|close| {
            let name = &after[..close];
            parts
                .iter()
                .find(|(candidate, _)| *candidate == name)
                .map(|(_, part)| (*part, close))
        });
        match part {
            Some((part, close)) => {
                text.push_str(part);
                rest = &after[close + 1..];
            }
            None => {
                text.push('{');
                rest = after;
            }
        }
    }
    text.push_str(rest);
    text
}

/// Backends that complete a partial submission with problem-supplied code.
///
/// The untouched submission is compiled to an object file first so that its
/// diagnostics are reported against the student's own source. Only then is it
/// spliced with `main` and `stub` into a driver template and built for real.
pub trait TwoPassInjection {
    fn source_name(&self) -> String;
    fn executable_name(&self) -> &str;
    /// Command producing `program.o` from the untouched submission
    fn object_command(&self) -> String;
    /// Command producing the executable from the spliced source
    fn final_command(&self) -> String;
    /// Template path relative to the driver directory
    fn template_path(&self) -> &'static str;
    /// Template used when the driver supplies none
    fn builtin_template(&self) -> &'static str;
    /// Name of the problem-supplied main
    fn main_name(&self) -> String;
    /// Optional stub path relative to the driver directory
    fn stub_path(&self) -> Option<&'static str> {
        None
    }

    fn compile_injected(&self, ctx: &CompileContext) -> Result<CompileOutcome> {
        let source = self.source_name();
        let exe = self.executable_name();
        super::remove_if_exists(&ctx.dir.join("program.o"))?;
        super::remove_if_exists(&ctx.dir.join(exe))?;

        if !run_compiler(ctx, &self.object_command())? {
            return report_timeout(ctx, Some("program.o"));
        }
        if !ctx.dir.join("program.o").exists() {
            return Ok(CompileOutcome::Failed);
        }

        let original = fs::read_to_string(ctx.dir.join(&source))
            .with_context(|| format!("Failed to read {source}"))?;
        let extension = source.rsplit('.').next().unwrap_or_default();
        fs::write(ctx.dir.join(format!("original.{extension}")), &original)?;

        let main_path = ctx.problem_dir.join(self.main_name());
        let main = fs::read_to_string(&main_path)
            .with_context(|| format!("Failed to read {}", main_path.display()))?;
        let stub = match self.stub_path() {
            Some(rel) => read_optional(&ctx.driver_dir.join(rel))?.unwrap_or_default(),
            None => String::new(),
        };
        let template = read_optional(&ctx.driver_dir.join(self.template_path()))?
            .unwrap_or_else(|| self.builtin_template().to_string());

        let spliced = splice(
            &template,
            &[("original", &original), ("main", &main), ("stub", &stub)],
        );
        fs::write(ctx.dir.join(&source), spliced)?;

        if !run_compiler(ctx, &self.final_command())? {
            return report_timeout(ctx, Some(exe));
        }
        if ctx.dir.join(exe).exists() {
            return Ok(CompileOutcome::Success);
        }
        if log_size(&ctx.dir.join(COMPILATION2)) == 0 {
            fs::write(ctx.dir.join(COMPILATION1), "Unreported error. ")?;
        }
        Ok(CompileOutcome::Failed)
    }
}

pub(crate) fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceModifier;
    use std::time::Duration;

    #[test]
    fn test_splice_placeholders() {
        let text = splice(
            "{stub}\n{original}\nint main() {{ {main} }}",
            &[("original", "int f();"), ("main", "f();"), ("stub", "")],
        );
        assert_eq!(text, "\nint f();\nint main() {{ f(); }}");
    }

    #[test]
    fn test_splice_leaves_parts_alone() {
        let text = splice(
            "{original}\n{main}",
            &[
                ("original", "void f() { puts(\"{main}\"); }"),
                ("main", "int main() { f(); }"),
                ("stub", "{original}"),
            ],
        );
        assert_eq!(text, "void f() { puts(\"{main}\"); }\nint main() { f(); }");
    }

    /// Stands in for a C toolchain: "compiles" by concatenation.
    struct CatInjection;

    impl TwoPassInjection for CatInjection {
        fn source_name(&self) -> String {
            "program.c".into()
        }
        fn executable_name(&self) -> &str {
            "program.exe"
        }
        fn object_command(&self) -> String {
            concat!(
                "grep -q broken program.c && echo 'syntax error' > compilation1.txt",
                " || cp program.c program.o"
            )
            .into()
        }
        fn final_command(&self) -> String {
            "cp program.c program.exe".into()
        }
        fn template_path(&self) -> &'static str {
            "etc/c/program.c"
        }
        fn builtin_template(&self) -> &'static str {
            "{original}\n--\n{main}"
        }
        fn main_name(&self) -> String {
            "main.c".into()
        }
    }

    fn context(dir: &Path) -> CompileContext<'_> {
        CompileContext {
            dir,
            problem_dir: dir,
            driver_dir: dir,
            modifier: SourceModifier::NoMain,
            max_time: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_two_pass_splices_original_and_main() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("program.c"), "int f() { return 1; }").unwrap();
        fs::write(dir.path().join("main.c"), "int main() { return f(); }").unwrap();

        let outcome = CatInjection.compile_injected(&context(dir.path())).unwrap();
        assert_eq!(outcome, CompileOutcome::Success);
        assert_eq!(
            fs::read_to_string(dir.path().join("program.exe")).unwrap(),
            "int f() { return 1; }\n--\nint main() { return f(); }"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("original.c")).unwrap(),
            "int f() { return 1; }"
        );
    }

    #[test]
    fn test_first_pass_failure_stops_early() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("program.c"), "broken").unwrap();
        fs::write(dir.path().join("main.c"), "int main() {}").unwrap();

        let outcome = CatInjection.compile_injected(&context(dir.path())).unwrap();
        assert_eq!(outcome, CompileOutcome::Failed);
        assert!(!dir.path().join("original.c").exists());
        assert!(!dir.path().join("program.exe").exists());
    }
}
