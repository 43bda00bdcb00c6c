//! External I/O collaborators: snapshotting/restoring source file bytes,
//! working-directory resolution, and the advisory cross-process lock over
//! the log file.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::FileExt;

use checkpoint_core::CheckpointError;

/// Default hidden working directory for a tracked source tree.
pub const DEFAULT_WORKING_DIR: &str = "./.cpt_";
/// Name of the binary log file within the working directory.
pub const LOG_FILE_NAME: &str = "CpLog";
const LOCK_FILE_NAME: &str = ".lock";

pub fn ensure_working_dir(working_dir: &Path) -> Result<(), CheckpointError> {
    fs::create_dir_all(working_dir).map_err(|source| CheckpointError::Setup {
        path: working_dir.display().to_string(),
        source,
    })
}

pub fn log_path(working_dir: &Path) -> PathBuf {
    working_dir.join(LOG_FILE_NAME)
}

pub fn snapshot_path(working_dir: &Path, checkpoint_name: &str) -> PathBuf {
    working_dir.join(checkpoint_name)
}

/// Copies `source_path` to `working_dir/checkpoint_name`, truncating any
/// existing target.
pub fn snapshot(
    source_path: &Path,
    working_dir: &Path,
    checkpoint_name: &str,
) -> Result<(), CheckpointError> {
    let target = snapshot_path(working_dir, checkpoint_name);
    fs::copy(source_path, &target)
        .map(|_| ())
        .map_err(|source| CheckpointError::SnapshotIo {
            path: source_path.display().to_string(),
            source,
        })
}

/// Copies `working_dir/checkpoint_name` over `source_path`.
pub fn restore_from_checkpoint(
    source_path: &Path,
    working_dir: &Path,
    checkpoint_name: &str,
) -> Result<(), CheckpointError> {
    let source = snapshot_path(working_dir, checkpoint_name);
    fs::copy(&source, source_path)
        .map(|_| ())
        .map_err(|source_err| CheckpointError::SnapshotIo {
            path: source_path.display().to_string(),
            source: source_err,
        })
}

/// A cooperative advisory lock over the working directory's log, held for
/// the duration of `load -> mutate -> save`. A second concurrent invocation
/// gets a clean `CheckpointError::Lock` instead of silently racing the
/// first.
pub struct RepoLock {
    file: File,
}

impl RepoLock {
    pub fn acquire(working_dir: &Path) -> Result<Self, CheckpointError> {
        let lock_path = working_dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|source| CheckpointError::Setup {
                path: lock_path.display().to_string(),
                source,
            })?;

        file.try_lock_exclusive()
            .map_err(|_| CheckpointError::Lock(working_dir.display().to_string()))?;

        Ok(RepoLock { file })
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn snapshot_then_restore_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let working_dir = dir.path().join(".cpt_");
        ensure_working_dir(&working_dir).unwrap();

        let source_path = dir.path().join("foo.txt");
        fs::File::create(&source_path)
            .unwrap()
            .write_all(b"hello")
            .unwrap();

        snapshot(&source_path, &working_dir, "v1").unwrap();
        assert_eq!(fs::read(snapshot_path(&working_dir, "v1")).unwrap(), b"hello");

        fs::write(&source_path, b"goodbye").unwrap();
        restore_from_checkpoint(&source_path, &working_dir, "v1").unwrap();
        assert_eq!(fs::read(&source_path).unwrap(), b"hello");
    }

    #[test]
    fn second_lock_acquisition_fails_while_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let working_dir = dir.path().join(".cpt_");
        ensure_working_dir(&working_dir).unwrap();

        let _first = RepoLock::acquire(&working_dir).unwrap();
        let second = RepoLock::acquire(&working_dir);
        assert!(matches!(second, Err(CheckpointError::Lock(_))));
    }
}
