use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

/// Polling period used while supervising a child process
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Spawns `command` as the leader of a new process group, so that a later
/// kill also reaches whatever it forked.
pub fn spawn_in_group(command: &mut Command) -> io::Result<Child> {
    command.process_group(0).spawn()
}

/// Waits for `child` for at most `limit`, polling every `interval`.
///
/// Returns `None` if the ceiling was hit, in which case the child has
/// already been killed and reaped.
pub fn wait_with_timeout(
    child: &mut Child,
    limit: Duration,
    interval: Duration,
) -> io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() > limit {
            break;
        }
        thread::sleep(interval);
    }

    log::warn!("Process {} exceeded {:?}, killing it", child.id(), limit);
    let pid = child.id() as libc::pid_t;
    // SAFETY: killpg only sends a signal; the child is not reaped yet so its
    // pid cannot have been recycled
    let grouped = unsafe { libc::killpg(pid, libc::SIGKILL) } == 0;
    if !grouped {
        // the child may finish between the last poll and the kill
        if let Err(e) = child.kill() {
            log::debug!("kill failed: {e}");
        }
    }
    child.wait()?;
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finishes_in_time() {
        let mut child = Command::new("sh").args(["-c", "exit 3"]).spawn().unwrap();
        let status = wait_with_timeout(&mut child, Duration::from_secs(5), POLL_INTERVAL)
            .unwrap()
            .expect("should finish");
        assert_eq!(status.code(), Some(3));
    }

    #[test]
    fn test_killed_after_ceiling() {
        let mut child =
            spawn_in_group(Command::new("sh").args(["-c", "sleep 10; echo late"])).unwrap();
        let start = Instant::now();
        let status =
            wait_with_timeout(&mut child, Duration::from_millis(300), Duration::from_millis(20))
                .unwrap();
        assert!(status.is_none());
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
