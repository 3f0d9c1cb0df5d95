mod error;
mod ledger;
mod migrate;
mod reports;
mod schema;
mod sql_types;
mod users;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{info, warn};

pub(crate) use error::{LedgerError, LedgerResult, SchemaError};
pub(crate) use migrate::DB_FILE_NAME;
pub(crate) use schema::SchemaSource;

use crate::models::*;
use error::is_unique_violation;
use sql_types::now_timestamp;

pub(crate) struct Database {
    conn: Connection,
    schema: SchemaSource,
}

impl Database {
    pub(crate) fn open(path: &Path, schema: SchemaSource) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("Failed to set database pragmas")?;
        let mut db = Self { conn, schema };
        db.bootstrap().context("Database migration failed")?;
        info!(path = %path.display(), "database ready");
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wrap an already-populated connection, migrating whatever it holds.
    #[cfg(test)]
    pub(crate) fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let mut db = Self {
            conn,
            schema: SchemaSource::Builtin,
        };
        db.bootstrap()?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Migrate, create missing tables and verify. Safe to run repeatedly.
    pub(crate) fn bootstrap(&mut self) -> Result<()> {
        migrate::ensure_schema(&mut self.conn, &self.schema)?;
        migrate::verify_schema(&self.conn)
    }

    /// Online copy of the live database into `dest`.
    pub(crate) fn backup_to(&self, dest: &Path) -> Result<()> {
        self.conn
            .backup(rusqlite::DatabaseName::Main, dest, None)
            .with_context(|| format!("Failed to back up database to {}", dest.display()))
    }

    /// Replace the live database with the contents of `src`, then bring the
    /// restored copy up to the current schema.
    pub(crate) fn restore_from(&mut self, src: &Path) -> Result<()> {
        self.conn
            .restore(
                rusqlite::DatabaseName::Main,
                src,
                None::<fn(rusqlite::backup::Progress)>,
            )
            .with_context(|| format!("Failed to restore database from {}", src.display()))?;
        self.bootstrap()
            .context("Restored database could not be migrated")
    }

    // ── Years ─────────────────────────────────────────────────

    pub(crate) fn add_year(&self, year: &str) -> LedgerResult<i64> {
        logged("add_year", insert_year(&self.conn, year))
    }

    pub(crate) fn get_years(&self) -> LedgerResult<Vec<Year>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, year, created_at FROM years ORDER BY year")?;
        let rows = stmt.query_map([], |row| {
            Ok(Year {
                id: row.get(0)?,
                year: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn year_exists(&self, year: &str) -> LedgerResult<bool> {
        Ok(year_id(&self.conn, year)?.is_some())
    }

    /// Removes the year with every project and transaction under it.
    pub(crate) fn delete_year(&mut self, year: &str) -> LedgerResult<()> {
        let result = (|| -> LedgerResult<()> {
            let tx = self.conn.transaction()?;
            let year_id = require_year_id(&tx, year)?;
            let txns = delete_transactions_where(
                &tx,
                "year_id = ?1 OR project_id IN (SELECT id FROM projects WHERE year_id = ?1)",
                year_id,
            )?;
            let projects = tx.execute("DELETE FROM projects WHERE year_id = ?1", params![year_id])?;
            tx.execute("DELETE FROM years WHERE id = ?1", params![year_id])?;
            tx.commit()?;
            info!(year, projects, transactions = txns, "deleted year");
            Ok(())
        })();
        logged("delete_year", result)
    }

    // ── Projects ──────────────────────────────────────────────

    /// Registers `year` on the fly when it is not known yet.
    pub(crate) fn add_project(
        &mut self,
        name: &str,
        year: &str,
        month: Option<u32>,
    ) -> LedgerResult<i64> {
        let result = (|| -> LedgerResult<i64> {
            let name = name.trim();
            if name.is_empty() {
                return Err(LedgerError::Invalid("project name must not be empty".into()));
            }
            if let Some(m) = month.filter(|m| !is_valid_month(*m)) {
                return Err(LedgerError::Invalid(format!("month {m} is out of range 1-12")));
            }
            let tx = self.conn.transaction()?;
            let year_id = match year_id(&tx, year)? {
                Some(id) => id,
                None => {
                    let id = insert_year(&tx, year)?;
                    info!(year, "registered year for new project");
                    id
                }
            };
            tx.execute(
                "INSERT INTO projects (name, year_id, month, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![name, year_id, month, now_timestamp()],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            info!(project_id = id, name, year, ?month, "added project");
            Ok(id)
        })();
        logged("add_project", result)
    }

    pub(crate) fn get_projects_by_year(&self, year: &str) -> LedgerResult<Vec<Project>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.name, p.year_id, y.year, p.month, p.created_at
             FROM projects p JOIN years y ON p.year_id = y.id
             WHERE y.year = ?1
             ORDER BY p.month, p.id",
        )?;
        let rows = stmt.query_map(params![year], map_project)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn get_project(&self, id: i64) -> LedgerResult<Option<Project>> {
        Ok(project_by_id(&self.conn, id)?)
    }

    /// Returns the previous name so folders and shortcuts can follow.
    pub(crate) fn rename_project(&self, id: i64, name: &str) -> LedgerResult<String> {
        let result = (|| -> LedgerResult<String> {
            let name = name.trim();
            if name.is_empty() {
                return Err(LedgerError::Invalid("project name must not be empty".into()));
            }
            let old = project_by_id(&self.conn, id)?
                .ok_or_else(|| LedgerError::NotFound(format!("project {id} does not exist")))?;
            self.conn.execute(
                "UPDATE projects SET name = ?1 WHERE id = ?2",
                params![name, id],
            )?;
            info!(project_id = id, old = %old.name, new = name, "renamed project");
            Ok(old.name)
        })();
        logged("rename_project", result)
    }

    /// Removes the project and all of its transactions.
    pub(crate) fn delete_project(&mut self, id: i64) -> LedgerResult<Project> {
        let result = (|| -> LedgerResult<Project> {
            let tx = self.conn.transaction()?;
            let project = project_by_id(&tx, id)?
                .ok_or_else(|| LedgerError::NotFound(format!("project {id} does not exist")))?;
            let txns = delete_transactions_where(&tx, "project_id = ?1", id)?;
            tx.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
            tx.commit()?;
            info!(project_id = id, transactions = txns, "deleted project");
            Ok(project)
        })();
        logged("delete_project", result)
    }

    /// Income projects whose name contains `keyword`, newest period first.
    pub(crate) fn search_income_projects(&self, keyword: &str) -> LedgerResult<Vec<ProjectHit>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT p.id, p.name, y.year, t.month
             FROM transactions t
             JOIN projects p ON t.project_id = p.id
             JOIN years y ON t.year_id = y.id
             WHERE t.type = ?1 AND p.name LIKE ?2
             ORDER BY y.year DESC, t.month DESC",
        )?;
        let rows = stmt.query_map(
            params![EntryKind::Income, format!("%{}%", keyword.trim())],
            |row| {
                Ok(ProjectHit {
                    project_id: row.get(0)?,
                    name: row.get(1)?,
                    year: row.get(2)?,
                    month: row.get(3)?,
                })
            },
        )?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

/// Log a failed operation before handing it back to the caller.
fn logged<T>(op: &'static str, result: LedgerResult<T>) -> LedgerResult<T> {
    if let Err(e) = &result {
        warn!(op, error = %e, "operation failed");
    }
    result
}

fn insert_year(conn: &Connection, year: &str) -> LedgerResult<i64> {
    let year = year.trim();
    if !Year::is_valid_label(year) {
        return Err(LedgerError::Invalid(format!(
            "'{year}' is not a four-digit year"
        )));
    }
    match conn.execute(
        "INSERT INTO years (year, created_at) VALUES (?1, ?2)",
        params![year, now_timestamp()],
    ) {
        Ok(_) => {
            let id = conn.last_insert_rowid();
            info!(year, id, "added year");
            Ok(id)
        }
        Err(e) if is_unique_violation(&e) => {
            Err(LedgerError::Conflict(format!("year {year} already exists")))
        }
        Err(e) => Err(e.into()),
    }
}

fn year_id(conn: &Connection, year: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM years WHERE year = ?1",
        params![year.trim()],
        |row| row.get(0),
    )
    .optional()
}

fn require_year_id(conn: &Connection, year: &str) -> LedgerResult<i64> {
    year_id(conn, year)?
        .ok_or_else(|| LedgerError::NotFound(format!("year {year} is not registered")))
}

fn map_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        year_id: row.get(2)?,
        year: row.get(3)?,
        month: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn project_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<Project>> {
    conn.query_row(
        "SELECT p.id, p.name, p.year_id, y.year, p.month, p.created_at
         FROM projects p JOIN years y ON p.year_id = y.id
         WHERE p.id = ?1",
        params![id],
        map_project,
    )
    .optional()
}

/// Delete transactions matching `condition` (bound to `?1`) with their
/// remarks and sub-ledgers. Tables created by older versions carry no
/// cascading keys, so dependents are removed explicitly.
fn delete_transactions_where(conn: &Connection, condition: &str, id: i64) -> rusqlite::Result<usize> {
    let selector = format!("SELECT id FROM transactions WHERE {condition}");
    conn.execute(
        &format!("DELETE FROM expense_details WHERE transaction_id IN ({selector})"),
        params![id],
    )?;
    conn.execute(
        &format!("DELETE FROM remarks WHERE transaction_id IN ({selector})"),
        params![id],
    )?;
    conn.execute(
        &format!("DELETE FROM transactions WHERE {condition}"),
        params![id],
    )
}

#[cfg(test)]
mod tests;
