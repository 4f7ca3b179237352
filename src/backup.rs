use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::TfstateError;
use crate::state_file::write_atomic;

const BACKUP_MARKER: &str = ".backup.";
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const MAX_COLLISIONS: u32 = 1000;

/// A snapshot of a state file taken before it was changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    original: PathBuf,
    backup: PathBuf,
}

impl BackupHandle {
    /// Refers to an existing snapshot, e.g. one named on the command line.
    pub fn open(
        original: impl Into<PathBuf>,
        backup: impl Into<PathBuf>,
    ) -> Result<Self, TfstateError> {
        let backup = backup.into();
        if !backup.is_file() {
            return Err(TfstateError::NotFound(format!(
                "backup file {}",
                backup.display()
            )));
        }
        Ok(Self {
            original: original.into(),
            backup,
        })
    }

    pub fn original(&self) -> &Path {
        &self.original
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }
}

/// Writes and restores sibling snapshots named `<file>.backup.<timestamp>`.
///
/// Snapshots are never deleted here; cleaning them up is left to the user.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackupManager;

impl BackupManager {
    pub fn new() -> Self {
        Self
    }

    /// Copies the current bytes of `path` to a new sibling file and flushes it
    /// to disk before returning.
    pub fn snapshot(&self, path: &Path) -> Result<BackupHandle, TfstateError> {
        let bytes = fs::read(path).map_err(|e| TfstateError::io(path, e))?;
        let stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let mut base = path.as_os_str().to_os_string();
        base.push(BACKUP_MARKER);
        base.push(&stamp);

        for attempt in 0..MAX_COLLISIONS {
            let mut candidate = base.clone();
            if attempt > 0 {
                candidate.push(format!("-{attempt}"));
            }
            let candidate = PathBuf::from(candidate);
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(TfstateError::io(&candidate, e)),
            };
            file.write_all(&bytes)
                .and_then(|()| file.sync_all())
                .map_err(|e| TfstateError::io(&candidate, e))?;

            tracing::info!(backup = %candidate.display(), bytes = bytes.len(), "snapshot written");
            return Ok(BackupHandle {
                original: path.to_path_buf(),
                backup: candidate,
            });
        }

        Err(TfstateError::io(
            base,
            std::io::Error::new(ErrorKind::AlreadyExists, "too many backups with this timestamp"),
        ))
    }

    /// Restores the snapshot's bytes over the original file, verbatim.
    pub fn rollback(&self, handle: &BackupHandle) -> Result<(), TfstateError> {
        let bytes = fs::read(&handle.backup).map_err(|e| TfstateError::io(&handle.backup, e))?;
        write_atomic(&handle.original, &bytes)?;
        tracing::info!(
            original = %handle.original.display(),
            backup = %handle.backup.display(),
            "rollback complete"
        );
        Ok(())
    }

    /// Snapshots of `path` found next to it, oldest first.
    pub fn list(&self, path: &Path) -> Result<Vec<PathBuf>, TfstateError> {
        let Some(file_name) = path.file_name() else {
            return Ok(Vec::new());
        };
        let mut prefix = OsString::from(file_name);
        prefix.push(BACKUP_MARKER);
        let dir = parent_dir(path);

        let entries = fs::read_dir(dir).map_err(|e| TfstateError::io(dir, e))?;
        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TfstateError::io(dir, e))?;
            let name = entry.file_name();
            let Some(suffix) = name
                .as_encoded_bytes()
                .strip_prefix(prefix.as_encoded_bytes())
            else {
                continue;
            };
            if entry.path().is_file() {
                let order = backup_order(&String::from_utf8_lossy(suffix));
                backups.push((order, entry.path()));
            }
        }
        backups.sort();
        Ok(backups.into_iter().map(|(_, backup)| backup).collect())
    }
}

// Orders `<stamp>`, `<stamp>-1`, ..., `<stamp>-10` by collision number rather
// than as text.
fn backup_order(suffix: &str) -> (String, u32) {
    match suffix.rsplit_once('-') {
        Some((stamp, n)) => match n.parse() {
            Ok(n) => (stamp.to_string(), n),
            Err(_) => (suffix.to_string(), 0),
        },
        None => (suffix.to_string(), 0),
    }
}

pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn state_file(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("terraform.tfstate");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_snapshot_copies_bytes_to_sibling() {
        let dir = TempDir::new().unwrap();
        let path = state_file(&dir, "{\"serial\": 1}\n");

        let handle = BackupManager::new().snapshot(&path).unwrap();
        assert_eq!(handle.original(), path);
        assert_eq!(handle.backup_path().parent(), path.parent());
        let name = handle.backup_path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("terraform.tfstate.backup."), "{name}");
        assert_eq!(fs::read(handle.backup_path()).unwrap(), fs::read(&path).unwrap());
    }

    #[test]
    fn test_snapshots_never_overwrite_each_other() {
        let dir = TempDir::new().unwrap();
        let path = state_file(&dir, "first");
        let manager = BackupManager::new();

        let first = manager.snapshot(&path).unwrap();
        fs::write(&path, "second").unwrap();
        let second = manager.snapshot(&path).unwrap();

        assert_ne!(first.backup_path(), second.backup_path());
        assert_eq!(fs::read_to_string(first.backup_path()).unwrap(), "first");
        assert_eq!(fs::read_to_string(second.backup_path()).unwrap(), "second");
        assert_eq!(
            manager.list(&path).unwrap(),
            vec![first.backup_path().to_path_buf(), second.backup_path().to_path_buf()]
        );
    }

    #[test]
    fn test_snapshot_of_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let result = BackupManager::new().snapshot(&dir.path().join("absent.tfstate"));
        assert!(matches!(result, Err(TfstateError::Io { .. })));
    }

    #[test]
    fn test_rollback_restores_bytes() {
        let dir = TempDir::new().unwrap();
        let original = "{\n  \"version\": 4,\n  \"serial\": 1\n}\n";
        let path = state_file(&dir, original);
        let manager = BackupManager::new();

        let handle = manager.snapshot(&path).unwrap();
        fs::write(&path, "corrupted").unwrap();
        manager.rollback(&handle).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_open_requires_existing_backup() {
        let dir = TempDir::new().unwrap();
        let path = state_file(&dir, "{}");
        let result = BackupHandle::open(&path, dir.path().join("missing.backup"));
        assert!(matches!(result, Err(TfstateError::NotFound(_))));
    }

    #[test]
    fn test_list_orders_by_collision_number() {
        let dir = TempDir::new().unwrap();
        let path = state_file(&dir, "{}");
        let base = dir.path().join("terraform.tfstate.backup.20260101000000");
        let later = dir.path().join("terraform.tfstate.backup.20260101000001");
        for suffix in ["-10", "-2", "", "-1"] {
            fs::write(format!("{}{suffix}", base.display()), "{}").unwrap();
        }
        fs::write(&later, "{}").unwrap();

        let names: Vec<String> = BackupManager::new()
            .list(&path)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "terraform.tfstate.backup.20260101000000",
                "terraform.tfstate.backup.20260101000000-1",
                "terraform.tfstate.backup.20260101000000-2",
                "terraform.tfstate.backup.20260101000000-10",
                "terraform.tfstate.backup.20260101000001",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_snapshot_keeps_non_utf8_file_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(OsStr::from_bytes(b"state-\xff.tfstate"));
        fs::write(&path, "{}").unwrap();

        let manager = BackupManager::new();
        let handle = manager.snapshot(&path).unwrap();
        let name = handle.backup_path().file_name().unwrap().as_bytes();
        assert!(name.starts_with(b"state-\xff.tfstate.backup."));
        assert_eq!(
            manager.list(&path).unwrap(),
            vec![handle.backup_path().to_path_buf()]
        );
    }

    #[test]
    fn test_list_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        let path = state_file(&dir, "{}");
        fs::write(dir.path().join("other.tfstate.backup.20260101000000"), "{}").unwrap();
        fs::write(dir.path().join("terraform.tfstate.tmp"), "{}").unwrap();
        assert!(BackupManager::new().list(&path).unwrap().is_empty());
    }
}
