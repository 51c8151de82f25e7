use std::os::unix::fs::PermissionsExt;

use super::*;

impl Judge {
    /// Loads the run's documents and discovers its tests
    pub fn new(mut settings: RunSettings, registry: Registry) -> Result<Self> {
        log::info!("<<<< start >>>>");
        log::info!("**** init phase ****");

        settings.dir = fs::canonicalize(&settings.dir)
            .with_context(|| format!("Failed to resolve {}", settings.dir.display()))?;
        let docs = Documents::load(&settings.dir)?;
        let options = Options::new(&docs);
        let environment = Environment::collect(&settings.slave_id, &settings.dir);
        let tests = discover_tests(&settings.dir.join("problem"))?;
        log::info!("    tests: {}", tests.join(" "));

        let monitor = Monitor::new(&settings.monitor);
        let mut judge = Self {
            settings,
            docs,
            options,
            registry,
            monitor,
            environment,
            tests,
            limit_override: generous_author_limits,
            solution: None,
            correction: None,
        };
        judge.prepare_libraries()?;
        Ok(judge)
    }

    /// Locks away the auxiliary libraries this problem does not allow and
    /// exposes the allowed ones to monitored programs
    fn prepare_libraries(&mut self) -> Result<()> {
        log::info!("**** prepare pylibs phase ****");

        let allowed = self
            .options
            .get::<WordList>("pylibs")?
            .map(WordList::into_vec)
            .unwrap_or_default();
        let pythonpath = restrict_libraries(&self.settings.libs_dir, &allowed)?;
        log::info!("    allowed libs: {allowed:?}");
        log::info!("    PYTHONPATH: {}", pythonpath.as_deref().unwrap_or(""));

        self.monitor = self.monitor.clone().with_pythonpath(pythonpath);
        Ok(())
    }
}

/// Tests named by the `.inp` files of `problem_dir`
pub(super) fn discover_tests(problem_dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(problem_dir)
        .with_context(|| format!("Failed to list {}", problem_dir.display()))?
    {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "inp") {
            if let Some(stem) = path.file_stem() {
                names.push(stem.to_string_lossy().into_owned());
            }
        }
    }
    Ok(order_tests(names))
}

/// Sample tests first, each group in lexicographic order
pub(super) fn order_tests(names: Vec<String>) -> Vec<String> {
    let (mut samples, mut others): (Vec<_>, Vec<_>) =
        names.into_iter().partition(|name| name.starts_with("sample"));
    samples.sort();
    others.sort();
    samples.extend(others);
    samples
}

/// Clears the permissions of every installed library not in `allowed` and
/// returns the search path of the allowed ones
fn restrict_libraries(root: &Path, allowed: &[String]) -> Result<Option<String>> {
    if !root.is_dir() {
        return Ok(None);
    }

    let mut installed: Vec<String> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    installed.sort();
    log::info!("    installed libs: {installed:?}");

    let mut paths = Vec::new();
    for lib in &installed {
        let path = root.join(lib);
        if allowed.contains(lib) {
            paths.push(
                path.join("lib/python3.10/site-packages")
                    .display()
                    .to_string(),
            );
        } else {
            fs::set_permissions(&path, fs::Permissions::from_mode(0o000))
                .with_context(|| format!("Failed to lock {}", path.display()))?;
        }
    }
    Ok(Some(paths.join(":")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_samples_come_first() {
        let names = ["b", "sample2", "a", "sample1", "c-sample"]
            .map(String::from)
            .to_vec();
        assert_eq!(order_tests(names), ["sample1", "sample2", "a", "b", "c-sample"]);
    }

    #[test]
    fn test_discover_tests() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["t2.inp", "t2.cor", "sample.inp", "t1.inp", "t1.ops", "handler.yml"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        assert_eq!(discover_tests(dir.path()).unwrap(), ["sample", "t1", "t2"]);
    }

    #[test]
    fn test_restrict_libraries() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("numpy")).unwrap();
        fs::create_dir(root.path().join("pandas")).unwrap();

        let pythonpath = restrict_libraries(root.path(), &["numpy".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(
            pythonpath,
            root.path()
                .join("numpy/lib/python3.10/site-packages")
                .display()
                .to_string()
        );
        let mode = fs::metadata(root.path().join("pandas")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0);

        // let the temporary directory clean up after itself
        fs::set_permissions(root.path().join("pandas"), fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_missing_library_root() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(restrict_libraries(&root.path().join("none"), &[]).unwrap(), None);
    }
}
