use super::*;

impl Judge {
    /// Makes sure the monitor can enforce limits before anything runs
    pub(super) fn preprocess_step(&self, record: &mut PhaseRecord) -> Result<()> {
        log::info!("---- preprocess step ----");

        let setuid = self.monitor.is_setuid_root();
        if !self.settings.require_setuid {
            record.preprocess = Some(PreprocessInfo {
                monitor_setuid: setuid.ok(),
            });
            return Ok(());
        }

        let setuid = setuid.unwrap_or(false);
        record.preprocess = Some(PreprocessInfo {
            monitor_setuid: Some(setuid),
        });
        if !setuid {
            return Err(
                JudgeError::MonitorNotInstalled(self.monitor.path().display().to_string()).into(),
            );
        }
        Ok(())
    }
}
