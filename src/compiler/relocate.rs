use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use super::{Compiler, ExecContext};
use crate::monitor::{ExecutionOutcome, MonitorRequest};

/// How a test directory's contents reach the scratch directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Files leave the test directory and come back afterwards
    Move,
    /// The test directory keeps its files; results are copied back
    Copy,
}

/// A test directory temporarily relocated to a private scratch directory.
///
/// Contents are returned by [`Relocated::restore`]. If the guard is dropped
/// without it, for example while an error propagates, it restores on drop and
/// only logs a failure.
#[derive(Debug)]
pub struct Relocated {
    origin: PathBuf,
    scratch: Option<TempDir>,
    transfer: Transfer,
}

impl Relocated {
    pub fn new(
        origin: &Path,
        scratch_root: &Path,
        prefix: &str,
        transfer: Transfer,
    ) -> Result<Self> {
        fs::create_dir_all(scratch_root)?;
        let scratch = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(scratch_root)
            .with_context(|| {
                format!("Failed to create scratch dir in {}", scratch_root.display())
            })?;
        log::debug!("relocating {} to {}", origin.display(), scratch.path().display());
        transfer_files(origin, scratch.path(), transfer)?;
        Ok(Self {
            origin: origin.to_path_buf(),
            scratch: Some(scratch),
            transfer,
        })
    }

    pub fn path(&self) -> &Path {
        self.scratch
            .as_ref()
            .map(TempDir::path)
            .unwrap_or(self.origin.as_path())
    }

    /// Brings every file back and removes the scratch directory
    pub fn restore(mut self) -> Result<()> {
        self.restore_inner()
    }

    fn restore_inner(&mut self) -> Result<()> {
        let Some(scratch) = self.scratch.take() else {
            return Ok(());
        };
        transfer_files(scratch.path(), &self.origin, self.transfer)?;
        scratch
            .close()
            .context("Failed to remove scratch directory")?;
        Ok(())
    }
}

impl Drop for Relocated {
    fn drop(&mut self) {
        if let Err(e) = self.restore_inner() {
            log::error!("failed to restore {}: {e:#}", self.origin.display());
        }
    }
}

fn transfer_files(from: &Path, to: &Path, transfer: Transfer) -> Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let source = entry.path();
        let target = to.join(entry.file_name());
        match transfer {
            Transfer::Move => move_entry(&source, &target)?,
            Transfer::Copy => {
                // results in the scratch dir replace the origin's copies
                remove_entry(&target)?;
                copy_entry(&source, &target)?;
            }
        }
    }
    Ok(())
}

/// Rename, falling back to copy and remove across filesystems
fn move_entry(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    remove_entry(to)?;
    copy_entry(from, to).with_context(|| format!("Failed to move {}", from.display()))?;
    remove_entry(from)
}

/// Copies a file or directory tree, recreating symbolic links as links
fn copy_entry(from: &Path, to: &Path) -> Result<()> {
    let file_type = fs::symlink_metadata(from)?.file_type();
    if file_type.is_symlink() {
        symlink(fs::read_link(from)?, to)
            .with_context(|| format!("Failed to copy link {}", from.display()))?;
    } else if file_type.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_entry(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        fs::copy(from, to).with_context(|| format!("Failed to copy {}", from.display()))?;
    }
    Ok(())
}

fn remove_entry(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)?,
        Ok(_) => fs::remove_file(path)?,
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Backends whose execution must happen away from the test directory
pub trait RelocatedExecution: Compiler {
    fn transfer(&self) -> Transfer;

    fn execute_relocated(
        &self,
        ctx: &ExecContext,
        request: &MonitorRequest,
    ) -> Result<ExecutionOutcome> {
        let prefix = format!("{}.workdir.", request.basename);
        let relocated = Relocated::new(ctx.dir, ctx.scratch_dir, &prefix, self.transfer())?;
        let outcome = ctx.monitor.run(relocated.path(), request);
        relocated.restore()?;
        outcome
    }
}
