use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, System};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Contents of a `.lock` file: enough to tell whether the owning process is
/// still alive, and which data directory it was holding the lock for.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockRecord {
    pid: u32,
    data_dir: String,
    created_at: DateTime<Utc>,
}

/// An acquired lock on `path`. Releases (deletes the lock file) on drop,
/// unless the lock was stolen from a dead process — in which case the
/// caller owns the newly-written record just as if it had created it fresh.
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to release lock file");
            }
        }
    }
}

/// Acquires a lock file at `path`, embedding the current process id and
/// `data_dir`. If an existing lock file names a pid that is no longer
/// running, it is treated as stale and silently replaced. `not_found` maps
/// a live-lock conflict into the caller's error variant (`SessionLocked`
/// or `InstanceLocked`).
pub fn acquire(path: &Path, data_dir: &str, on_conflict: impl FnOnce() -> Error) -> Result<LockGuard> {
    if let Some(existing) = read_lock(path)? {
        if is_pid_alive(existing.pid) {
            return Err(on_conflict());
        }
        debug!(pid = existing.pid, path = %path.display(), "stale lock, pid no longer running");
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let record = LockRecord {
        pid: std::process::id(),
        data_dir: data_dir.to_string(),
        created_at: Utc::now(),
    };
    write_atomic(path, &serde_json::to_vec(&record)?)?;
    Ok(LockGuard { path: path.to_path_buf() })
}

fn read_lock(path: &Path) -> Result<Option<LockRecord>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read(path)?;
    match serde_json::from_slice(&raw) {
        Ok(record) => Ok(Some(record)),
        Err(_) => {
            // Unparseable lock file; treat it as stale rather than fatal.
            Ok(None)
        },
    }
}

fn is_pid_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    system.process(Pid::from_u32(pid)).is_some()
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn acquire_then_drop_releases_lock() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("otui.lock");
        {
            let _guard = acquire(&lock_path, "/data", || Error::Message("conflict".into())).unwrap();
            assert!(lock_path.exists());
        }
        assert!(!lock_path.exists());
    }

    #[test]
    fn live_pid_conflicts() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("otui.lock");
        let _guard = acquire(&lock_path, "/data", || Error::Message("conflict".into())).unwrap();

        let result = acquire(&lock_path, "/data", || Error::InstanceLocked { path: "/data".into() });
        assert!(matches!(result, Err(Error::InstanceLocked { .. })));
    }

    #[test]
    fn dead_pid_lock_is_stolen() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("otui.lock");
        let stale = LockRecord {
            pid: dead_pid_for_test(),
            data_dir: "/old".into(),
            created_at: Utc::now(),
        };
        std::fs::write(&lock_path, serde_json::to_vec(&stale).unwrap()).unwrap();

        let guard = acquire(&lock_path, "/new", || Error::InstanceLocked { path: "/new".into() });
        assert!(guard.is_ok());
    }

    /// A pid astronomically unlikely to be alive in any test environment.
    fn dead_pid_for_test() -> u32 {
        u32::MAX - 7
    }
}
