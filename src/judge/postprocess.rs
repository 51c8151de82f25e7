use super::*;

impl Judge {
    /// Deletes transient files to bound storage
    pub(super) fn postprocess_step(
        &self,
        dir: &Path,
        compiler: &dyn Compiler,
        record: &mut PhaseRecord,
    ) -> Result<()> {
        log::info!("---- postprocess step ----");

        let del_files = self.options.get_or("del_files", true)?;
        record.postprocess = Some(PostprocessInfo { del_files });
        if !del_files {
            return Ok(());
        }

        for artifact in compiler.artifacts(dir)? {
            remove_quietly(&artifact);
        }

        let accepted = record.verdict == Verdict::AC;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_transient(&name, meta.len(), accepted) {
                remove_quietly(&entry.path());
            }
        }
        Ok(())
    }
}

fn is_transient(name: &str, size: u64, accepted: bool) -> bool {
    if name == "compilation1.txt" || name == "compilation2.txt" {
        return size == 0;
    }
    match Path::new(name).extension().and_then(|ext| ext.to_str()) {
        Some("inp" | "wrk" | "res") => true,
        Some("err") => size == 0,
        Some("out") => accepted,
        _ => false,
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = remove_if_exists(path) {
        log::warn!("{e:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_files() {
        assert!(is_transient("t1.inp", 10, false));
        assert!(is_transient("t1.res", 10, false));
        assert!(is_transient("t1.err", 0, false));
        assert!(!is_transient("t1.err", 3, true));
        assert!(is_transient("compilation2.txt", 0, false));
        assert!(!is_transient("compilation1.txt", 12, false));
        assert!(!is_transient("t1.out", 12, false));
        assert!(is_transient("t1.out", 12, true));
        assert!(!is_transient("t1.exc", 0, true));
        assert!(!is_transient("solution.yml", 0, true));
        assert!(!is_transient("program.cc", 100, true));
    }
}
