use thiserror::Error;

/// Failure of a single ledger operation. Callers turn these into messages;
/// none of them leave the database in a partially written state.
#[derive(Debug, Error)]
pub(crate) enum LedgerError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub(crate) type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// A required table is still missing after migration.
#[derive(Debug, Error)]
#[error("database is missing required table `{table}`; delete {file} and restart the program")]
pub(crate) struct SchemaError {
    pub(crate) table: String,
    pub(crate) file: String,
}

/// True for SQLite UNIQUE / PRIMARY KEY violations.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
