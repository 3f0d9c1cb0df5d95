//! Schema lifecycle: named, idempotent migration steps recorded in a ledger
//! table, followed by the table-creation script, indexes and the users
//! singleton. Everything runs inside one transaction.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use super::error::SchemaError;
use super::schema::{self, SchemaSource, Statement};
use super::sql_types::now_timestamp;
use crate::models::{hash_secret, DEFAULT_PASSWORD, DEFAULT_ROLE, DEFAULT_USERNAME};

pub(crate) const DB_FILE_NAME: &str = "project_accounting.db";

const LEDGER_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    id          TEXT PRIMARY KEY,
    applied_at  TEXT NOT NULL
)";

/// A single upgrade of a legacy layout. Steps inspect the catalog before
/// touching anything, so a database that never had a ledger is handled too.
pub(crate) struct Migration {
    pub(crate) id: &'static str,
    /// The step is only recorded once this table exists.
    table: &'static str,
    apply: fn(&Connection) -> Result<()>,
}

/// Applied in order, once before the creation script runs and again after it
/// for steps whose table the script has just created.
pub(crate) const MIGRATIONS: &[Migration] = &[
    Migration {
        id: "0001_projects_month",
        table: "projects",
        apply: add_projects_month,
    },
    Migration {
        id: "0002_transactions_status",
        table: "transactions",
        apply: add_transactions_status,
    },
    Migration {
        id: "0003_transactions_initial_amount",
        table: "transactions",
        apply: add_transactions_initial_amount,
    },
    Migration {
        id: "0004_transactions_stage",
        table: "transactions",
        apply: add_transactions_stage,
    },
    Migration {
        id: "0005_remarks_unique_transaction",
        table: "remarks",
        apply: rebuild_remarks_unique,
    },
    Migration {
        id: "0006_users_credentials",
        table: "users",
        apply: upgrade_users_credentials,
    },
];

/// Bring the store up to the current schema.
pub(crate) fn ensure_schema(conn: &mut Connection, source: &SchemaSource) -> Result<()> {
    let script = source.load()?;
    let tx = conn.transaction().context("Failed to begin migration")?;

    tx.execute_batch(LEDGER_DDL)
        .context("Failed to create migration ledger")?;

    run_pending(&tx)?;
    apply_script(&tx, &script)?;
    // The script may have created an older table shape.
    run_pending(&tx)?;

    for (name, table, sql) in schema::INDEXES {
        if table_exists(&tx, table)? && !index_exists(&tx, name)? {
            tx.execute_batch(sql)
                .with_context(|| format!("Failed to create index {name}"))?;
            info!(index = name, "created index");
        }
    }

    ensure_singleton_user(&tx)?;

    tx.commit().context("Failed to commit migration")?;
    Ok(())
}

/// Fails with [`SchemaError`] when a required table is absent.
pub(crate) fn verify_schema(conn: &Connection) -> Result<()> {
    for table in schema::REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(SchemaError {
                table: (*table).to_string(),
                file: DB_FILE_NAME.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

/// Apply and record every unapplied step whose table exists. A step whose
/// table is missing stays pending.
fn run_pending(conn: &Connection) -> Result<()> {
    for migration in MIGRATIONS {
        if is_applied(conn, migration.id)? || !table_exists(conn, migration.table)? {
            continue;
        }
        (migration.apply)(conn).with_context(|| format!("Migration {} failed", migration.id))?;
        conn.execute(
            "INSERT INTO schema_migrations (id, applied_at) VALUES (?1, ?2)",
            params![migration.id, now_timestamp()],
        )?;
        debug!(id = migration.id, "migration recorded");
    }
    Ok(())
}

/// Run the creation script, skipping `CREATE TABLE` for tables that already
/// exist so an older definition is never fought over.
fn apply_script(conn: &Connection, script: &str) -> Result<()> {
    for statement in schema::parse_script(script) {
        match &statement {
            Statement::CreateTable { table, .. } if table_exists(conn, table)? => {
                debug!(table = %table, "table exists, skipping definition");
            }
            Statement::CreateTable { table, sql } => {
                conn.execute_batch(sql)
                    .with_context(|| format!("Failed to create table {table}"))?;
                info!(table = %table, "created table");
            }
            Statement::Other(_) => {
                conn.execute_batch(statement.sql())
                    .with_context(|| format!("Schema statement failed: {}", statement.sql()))?;
            }
        }
    }
    Ok(())
}

/// Exactly one user row with id 1. The lowest existing row is promoted to
/// id 1, the rest are removed, and an empty table gets the default login.
pub(crate) fn ensure_singleton_user(conn: &Connection) -> Result<()> {
    if !table_exists(conn, "users")? {
        return Ok(());
    }
    let has_primary: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = 1)",
        [],
        |row| row.get(0),
    )?;
    if !has_primary {
        let promoted = conn.execute(
            "UPDATE users SET id = 1 WHERE id = (SELECT MIN(id) FROM users)",
            [],
        )?;
        if promoted > 0 {
            info!("promoted oldest user row to id 1");
        }
    }

    let pruned = conn.execute("DELETE FROM users WHERE id <> 1", [])?;
    if pruned > 0 {
        info!(rows = pruned, "pruned extra user rows");
    }

    let seeded = conn.execute(
        "INSERT OR IGNORE INTO users (id, username, password_hash, role)
         VALUES (1, ?1, ?2, ?3)",
        params![DEFAULT_USERNAME, hash_secret(DEFAULT_PASSWORD), DEFAULT_ROLE],
    )?;
    if seeded > 0 {
        info!(username = DEFAULT_USERNAME, "seeded default user");
    }
    Ok(())
}

// ── Steps ─────────────────────────────────────────────────────

fn add_projects_month(conn: &Connection) -> Result<()> {
    if table_exists(conn, "projects")? && !has_column(conn, "projects", "month")? {
        conn.execute_batch(
            "ALTER TABLE projects ADD COLUMN month INTEGER CHECK (month BETWEEN 1 AND 12)",
        )?;
        info!("projects: added month column");
    }
    Ok(())
}

fn add_transactions_status(conn: &Connection) -> Result<()> {
    if table_exists(conn, "transactions")? && !has_column(conn, "transactions", "status")? {
        conn.execute_batch(
            "ALTER TABLE transactions ADD COLUMN status TEXT NOT NULL DEFAULT '未结项'
             CHECK (status IN ('未结项', '已结项'))",
        )?;
        info!("transactions: added status column");
    }
    Ok(())
}

fn add_transactions_initial_amount(conn: &Connection) -> Result<()> {
    if table_exists(conn, "transactions")? && !has_column(conn, "transactions", "initial_amount")? {
        conn.execute_batch(
            "ALTER TABLE transactions ADD COLUMN initial_amount REAL NOT NULL DEFAULT 0;
             UPDATE transactions SET initial_amount = amount;",
        )?;
        info!("transactions: added initial_amount column, backfilled from amount");
    }
    Ok(())
}

fn add_transactions_stage(conn: &Connection) -> Result<()> {
    if table_exists(conn, "transactions")? && !has_column(conn, "transactions", "stage")? {
        conn.execute_batch("ALTER TABLE transactions ADD COLUMN stage TEXT")?;
        info!("transactions: added stage column");
    }
    Ok(())
}

/// UNIQUE cannot be added with ALTER, so the table is rebuilt keeping the
/// newest remark of each transaction. Remarks pointing at a transaction that
/// no longer exists cannot satisfy the foreign key and are dropped.
fn rebuild_remarks_unique(conn: &Connection) -> Result<()> {
    if !table_exists(conn, "remarks")? || has_unique_index(conn, "remarks", "transaction_id")? {
        return Ok(());
    }
    let before: i64 = conn.query_row("SELECT COUNT(*) FROM remarks", [], |row| row.get(0))?;
    let orphans: i64 = if table_exists(conn, "transactions")? {
        conn.query_row(
            "SELECT COUNT(*) FROM remarks
             WHERE transaction_id IS NOT NULL
               AND transaction_id NOT IN (SELECT id FROM transactions)",
            [],
            |row| row.get(0),
        )?
    } else {
        before
    };
    if orphans > 0 {
        warn!(rows = orphans, "remarks: dropping rows with no transaction");
    }

    conn.execute_batch(schema::REMARKS_SHADOW)?;
    if table_exists(conn, "transactions")? {
        conn.execute_batch(
            "INSERT INTO remarks_new (id, transaction_id, content, updated_at)
             SELECT id, transaction_id, COALESCE(content, ''), COALESCE(updated_at, '')
             FROM remarks
             WHERE id IN (
                 SELECT MAX(id) FROM remarks
                 WHERE transaction_id IN (SELECT id FROM transactions)
                 GROUP BY transaction_id
             );",
        )?;
    }
    conn.execute_batch(
        "DROP TABLE remarks;
         ALTER TABLE remarks_new RENAME TO remarks;",
    )?;
    let after: i64 = conn.query_row("SELECT COUNT(*) FROM remarks", [], |row| row.get(0))?;
    info!(
        kept = after,
        dropped = before - after,
        "remarks: rebuilt with unique transaction_id"
    );
    Ok(())
}

/// Older databases kept a plaintext `password`. Rows are rehashed into the
/// current layout; the singleton rule is applied later.
fn upgrade_users_credentials(conn: &Connection) -> Result<()> {
    if !table_exists(conn, "users")? {
        return Ok(());
    }
    let columns = column_names(conn, "users")?;
    let has = |name: &str| columns.iter().any(|c| c == name);

    if has("password_hash") {
        for (column, ddl) in [
            ("role", "ALTER TABLE users ADD COLUMN role TEXT NOT NULL DEFAULT 'admin'"),
            ("security_question", "ALTER TABLE users ADD COLUMN security_question TEXT"),
            ("security_answer_hash", "ALTER TABLE users ADD COLUMN security_answer_hash TEXT"),
        ] {
            if !has(column) {
                conn.execute_batch(ddl)?;
                info!(column, "users: added column");
            }
        }
        return Ok(());
    }

    let username_expr = if has("username") {
        "COALESCE(username, ?1)"
    } else {
        "?1"
    };
    let password_expr = if has("password") {
        "CAST(password AS TEXT)"
    } else {
        "NULL"
    };
    let role_expr = if has("role") {
        "COALESCE(role, ?2)"
    } else {
        "?2"
    };
    let sql = format!("SELECT id, {username_expr}, {password_expr}, {role_expr} FROM users");

    let legacy: Vec<(i64, String, Option<String>, String)> = {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![DEFAULT_USERNAME, DEFAULT_ROLE], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()?
    };

    conn.execute_batch(schema::USERS_SHADOW)?;
    for (id, username, password, role) in &legacy {
        let hash = hash_secret(password.as_deref().unwrap_or(DEFAULT_PASSWORD));
        conn.execute(
            "INSERT INTO users_new (id, username, password_hash, role) VALUES (?1, ?2, ?3, ?4)",
            params![id, username, hash, role],
        )?;
    }
    conn.execute_batch(
        "DROP TABLE users;
         ALTER TABLE users_new RENAME TO users;",
    )?;
    info!(rows = legacy.len(), "users: migrated plaintext passwords to hashes");
    Ok(())
}

// ── Catalog helpers ──────────────────────────────────────────

fn is_applied(conn: &Connection, id: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?)
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        params![table],
        |row| row.get(0),
    )?)
}

fn index_exists(conn: &Connection, index: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1)",
        params![index],
        |row| row.get(0),
    )?)
}

pub(crate) fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let rows = stmt.query_map(params![table], |row| row.get(0))?;
    Ok(rows.collect::<std::result::Result<Vec<String>, _>>()?)
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    Ok(column_names(conn, table)?.iter().any(|c| c == column))
}

/// True when a UNIQUE index (constraint or explicit) covers exactly `column`.
pub(crate) fn has_unique_index(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let unique_indexes: Vec<String> = {
        let mut stmt = conn.prepare("SELECT name FROM pragma_index_list(?1) WHERE \"unique\" = 1")?;
        let rows = stmt.query_map(params![table], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()?
    };
    for index in unique_indexes {
        let columns: Vec<Option<String>> = {
            let mut stmt = conn.prepare("SELECT name FROM pragma_index_info(?1)")?;
            let rows = stmt.query_map(params![index], |row| row.get(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        if columns.len() == 1 && columns[0].as_deref() == Some(column) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Schema text of every user object, for comparing runs.
#[cfg(test)]
pub(crate) fn schema_snapshot(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT name, COALESCE(sql, '') FROM sqlite_master
         WHERE name NOT LIKE 'sqlite_%' ORDER BY type, name",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

#[cfg(test)]
pub(crate) fn applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM schema_migrations ORDER BY id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

#[cfg(test)]
#[path = "migrate_tests.rs"]
mod tests;
