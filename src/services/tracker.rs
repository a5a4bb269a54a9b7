//! Processed-folder bookkeeping: which source files still need ingesting.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::IngestError;
use crate::models::SourceKind;
use crate::utils::{file_name_string, has_extension, move_file};

/// Tracks one source directory and its processed subdirectory.
#[derive(Debug, Clone)]
pub struct IngestionTracker {
    source_dir: PathBuf,
    processed_dir: PathBuf,
    kind: SourceKind,
}

impl IngestionTracker {
    pub fn new(source_dir: PathBuf, processed_dir: PathBuf, kind: SourceKind) -> Self {
        Self {
            source_dir,
            processed_dir,
            kind,
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Create the source and processed directories if missing.
    pub fn ensure_dirs(&self) -> Result<(), IngestError> {
        for dir in [&self.source_dir, &self.processed_dir] {
            std::fs::create_dir_all(dir)
                .map_err(|e| IngestError::ScanError(format!("{}: {}", dir.display(), e)))?;
        }
        Ok(())
    }

    /// True when `path` is a file this tracker handles and lives directly in the source dir.
    pub fn accepts(&self, path: &Path) -> bool {
        has_extension(path, self.kind.extension())
            && path
                .parent()
                .is_some_and(|parent| same_dir(parent, &self.source_dir))
    }

    /// True when a file of the same name already sits in the processed directory.
    pub fn is_processed(&self, path: &Path) -> bool {
        self.processed_dir.join(file_name_string(path)).is_file()
    }

    /// Files in the source directory whose names are not yet in the processed directory.
    pub fn new_files(&self) -> Result<Vec<PathBuf>, IngestError> {
        let processed: HashSet<String> = self
            .list(&self.processed_dir)?
            .iter()
            .map(|p| file_name_string(p))
            .collect();

        let mut pending: Vec<PathBuf> = self
            .list(&self.source_dir)?
            .into_iter()
            .filter(|p| !processed.contains(&file_name_string(p)))
            .collect();
        pending.sort();
        Ok(pending)
    }

    /// Files with this tracker's extension directly inside `dir`.
    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| IngestError::ScanError(e.to_string()))?;
            if entry.file_type().is_file() && has_extension(entry.path(), self.kind.extension()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Move a handled file into the processed directory, returning its new path.
    pub fn mark_processed(&self, path: &Path) -> Result<PathBuf, IngestError> {
        let target = self.processed_dir.join(file_name_string(path));
        move_file(path, &target).map_err(|e| IngestError::MoveError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(target)
    }
}

/// Compare directories, resolving relative paths and symlinks when both exist.
fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
