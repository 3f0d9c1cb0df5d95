use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::db::{Database, LedgerError, DB_FILE_NAME};

/// Snapshots of the live database kept in a single directory.
pub(crate) struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub(crate) fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create backup directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy the live database into a timestamped file and return its path.
    pub(crate) fn backup(&self, db: &Database) -> Result<PathBuf> {
        let stem = DB_FILE_NAME.trim_end_matches(".db");
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let mut path = self.dir.join(format!("{stem}_{stamp}.db"));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{stem}_{stamp}_{n}.db"));
            n += 1;
        }
        db.backup_to(&path)?;
        info!(path = %path.display(), "database backed up");
        Ok(path)
    }

    /// Backup file names, newest first.
    pub(crate) fn list(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read backup directory: {}", self.dir.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "db") {
                let modified = entry.metadata()?.modified()?;
                files.push((modified, entry.file_name().to_string_lossy().into_owned()));
            }
        }
        files.sort_by(|a, b| b.cmp(a));
        Ok(files.into_iter().map(|(_, name)| name).collect())
    }

    /// Replace the live database with the named backup.
    pub(crate) fn restore(&self, db: &mut Database, file_name: &str) -> Result<()> {
        let path = self.dir.join(file_name);
        if file_name.contains(['/', '\\']) || !path.is_file() {
            return Err(LedgerError::NotFound(format!("backup {file_name} does not exist")).into());
        }
        db.restore_from(&path)?;
        info!(path = %path.display(), "database restored");
        Ok(())
    }
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
