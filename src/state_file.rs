use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::backup::{BackupHandle, BackupManager, parent_dir};
use crate::error::TfstateError;
use crate::mutator::{self, Mutation, Outcome};
use crate::terraform::{ResourceIndex, StateDocument};

/// A state file opened for one invocation: its path plus the parsed document.
///
/// Every command works through an explicit `StateFile` value; nothing about
/// the current file is kept in process-wide state.
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    document: StateDocument,
}

/// Result of a write-through mutation.
#[derive(Debug)]
pub struct Applied {
    pub outcome: Outcome,
    pub backup: BackupHandle,
}

impl StateFile {
    /// Reads and parses `path` without structural validation.
    pub fn read(path: impl Into<PathBuf>) -> Result<Self, TfstateError> {
        let path = path.into();
        let bytes = fs::read(&path).map_err(|e| TfstateError::io(&path, e))?;
        let document = StateDocument::parse(&bytes)?;
        tracing::debug!(
            path = %path.display(),
            serial = document.serial(),
            resources = document.resources.len(),
            "state loaded"
        );
        Ok(Self { path, document })
    }

    /// Reads, parses and validates `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TfstateError> {
        let file = Self::read(path)?;
        file.document.validate()?;
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &StateDocument {
        &self.document
    }

    pub fn index(&self) -> ResourceIndex {
        ResourceIndex::build(&self.document)
    }

    /// Snapshot, mutate, re-validate and write back.
    ///
    /// A snapshot failure aborts before the document is touched. A mutation
    /// failure leaves both the document and the file as they were.
    pub fn apply(
        &mut self,
        mutation: &Mutation,
        backups: &BackupManager,
    ) -> Result<Applied, TfstateError> {
        self.document.next_serial()?;
        let backup = backups.snapshot(&self.path)?;
        let outcome = mutator::apply(&mut self.document, mutation)?;
        self.save()?;
        Ok(Applied { outcome, backup })
    }

    /// Writes the document with the next serial.
    pub fn save(&mut self) -> Result<(), TfstateError> {
        self.document.validate()?;
        let bytes = self.document.serialize()?;
        write_atomic(&self.path, &bytes)?;
        self.document.mark_persisted()?;
        tracing::info!(
            path = %self.path.display(),
            serial = self.document.serial(),
            "state written"
        );
        Ok(())
    }
}

/// Replaces `path` with `bytes` via a synced temporary file in the same
/// directory, so readers see either the old or the new contents.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), TfstateError> {
    let dir = parent_dir(path);
    let mut temp = NamedTempFile::new_in(dir).map_err(|e| TfstateError::io(dir, e))?;

    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file()
            .set_permissions(metadata.permissions())
            .map_err(|e| TfstateError::io(temp.path(), e))?;
    }

    temp.write_all(bytes)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| TfstateError::io(temp.path(), e))?;

    temp.persist(path)
        .map_err(|e| TfstateError::io(path, e.error))?;
    Ok(())
}
