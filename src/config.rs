use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use crate::db::{SchemaSource, DB_FILE_NAME};

pub(crate) const ENV_DB: &str = "PROJLEDGER_DB";
pub(crate) const ENV_RESOURCES: &str = "PROJLEDGER_RESOURCES";

const SCHEMA_FILE: &str = "database/schema.sql";
const BACKUP_DIR: &str = "db_backup";
const EXPORT_DIR: &str = "exports";

/// Where everything lives on disk.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) db_path: PathBuf,
    pub(crate) resource_dir: PathBuf,
    pub(crate) backup_dir: PathBuf,
    pub(crate) export_dir: PathBuf,
    pub(crate) strict_schema: bool,
}

impl Config {
    /// Defaults sit beside the executable. Explicit paths win.
    pub(crate) fn resolve(
        db_path: Option<PathBuf>,
        resource_dir: Option<PathBuf>,
        strict_schema: bool,
    ) -> Result<Self> {
        let base = match &db_path {
            Some(db) => db
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
            None => default_base_dir()?,
        };
        let resource_dir = match resource_dir {
            Some(dir) => dir,
            None => default_base_dir()?,
        };
        Ok(Self {
            db_path: db_path.unwrap_or_else(|| base.join(DB_FILE_NAME)),
            backup_dir: base.join(BACKUP_DIR),
            export_dir: base.join(EXPORT_DIR),
            resource_dir,
            strict_schema,
        })
    }

    pub(crate) fn schema_source(&self) -> SchemaSource {
        SchemaSource::File {
            path: self.resource_dir.join(SCHEMA_FILE),
            strict: self.strict_schema,
        }
    }
}

/// Directory of the running executable, or the platform data directory when
/// that cannot be determined.
fn default_base_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        return Ok(dir);
    }
    let proj_dirs = ProjectDirs::from("com", "projledger", "ProjLedger")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.to_path_buf())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
