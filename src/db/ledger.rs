use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::sql_types::{amount_column, amount_param, now_timestamp};
use super::{delete_transactions_where, logged, require_year_id, Database, LedgerError, LedgerResult};
use crate::models::*;

const TXN_SELECT: &str = "SELECT t.id, t.project_id, COALESCE(p.name, ''), y.year, t.month,
        CAST(t.amount AS TEXT), CAST(t.initial_amount AS TEXT), t.type, t.payment_method,
        t.stage, COALESCE(t.status, '未结项'), t.created_at
     FROM transactions t
     LEFT JOIN projects p ON t.project_id = p.id
     JOIN years y ON t.year_id = y.id";

fn map_transaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        project_id: row.get(1)?,
        project_name: row.get(2)?,
        year: row.get(3)?,
        month: row.get(4)?,
        amount: amount_column(row, 5)?,
        initial_amount: amount_column(row, 6)?,
        kind: row.get(7)?,
        payment_method: row.get(8)?,
        stage: row.get(9)?,
        status: row.get(10)?,
        created_at: row.get(11)?,
    })
}

/// Blank stages are stored as NULL.
fn normalize_stage(stage: Option<&str>) -> Option<String> {
    stage
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn not_found(id: i64) -> LedgerError {
    LedgerError::NotFound(format!("transaction {id} does not exist"))
}

/// Where a transaction sits: one project in one month of one year.
struct Slot<'a> {
    project_id: i64,
    year_id: i64,
    year: &'a str,
    month: u32,
}

/// A project holds at most one entry per month and stage; a missing stage
/// counts as a stage of its own. `except` skips the row being edited.
fn ensure_slot_free(
    conn: &Connection,
    slot: &Slot<'_>,
    stage: Option<&str>,
    except: Option<i64>,
) -> LedgerResult<()> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM transactions
         WHERE project_id = ?1 AND year_id = ?2 AND month = ?3 AND stage IS ?4 AND id IS NOT ?5)",
        params![slot.project_id, slot.year_id, slot.month, stage, except],
        |row| row.get(0),
    )?;
    if taken {
        return Err(LedgerError::Conflict(format!(
            "project already has a {} entry in {}-{:02}; choose a different stage",
            stage.unwrap_or("no-stage"),
            slot.year,
            slot.month
        )));
    }
    Ok(())
}

impl Database {
    // ── Transactions ──────────────────────────────────────────

    /// Book a new transaction. The year must already be registered and the
    /// `(project, year, month, stage)` slot must be free.
    pub(crate) fn add_transaction(&mut self, new: &NewTransaction) -> LedgerResult<i64> {
        let result = (|| -> LedgerResult<i64> {
            if !is_valid_month(new.month) {
                return Err(LedgerError::Invalid(format!(
                    "month {} is out of range 1-12",
                    new.month
                )));
            }
            let stage = normalize_stage(new.stage.as_deref());
            let tx = self.conn.transaction()?;
            let year_id = require_year_id(&tx, &new.year)?;

            let project_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1)",
                params![new.project_id],
                |row| row.get(0),
            )?;
            if !project_exists {
                return Err(LedgerError::NotFound(format!(
                    "project {} does not exist",
                    new.project_id
                )));
            }

            let slot = Slot {
                project_id: new.project_id,
                year_id,
                year: &new.year,
                month: new.month,
            };
            ensure_slot_free(&tx, &slot, stage.as_deref(), None)?;

            tx.execute(
                "INSERT INTO transactions
                    (project_id, amount, initial_amount, type, payment_method, stage, month, year_id, created_at, status)
                 VALUES (?1, ?2, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    new.project_id,
                    amount_param(new.amount),
                    new.kind,
                    new.payment_method,
                    stage,
                    new.month,
                    year_id,
                    now_timestamp(),
                    Status::Open,
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            info!(
                transaction_id = id,
                project_id = new.project_id,
                kind = %new.kind,
                amount = %new.amount,
                "added transaction"
            );
            Ok(id)
        })();
        logged("add_transaction", result)
    }

    pub(crate) fn get_transaction(&self, id: i64) -> LedgerResult<Option<Transaction>> {
        Ok(transaction_by_id(&self.conn, id)?)
    }

    /// Transactions of one month, income first, then by creation time.
    pub(crate) fn get_monthly_transactions(
        &self,
        year: &str,
        month: u32,
        filter: &TransactionFilter,
    ) -> LedgerResult<Vec<Transaction>> {
        let mut sql = format!("{TXN_SELECT} WHERE y.year = ?1 AND t.month = ?2");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(year.to_string()), Box::new(month)];

        if !filter.statuses.is_empty() {
            let placeholders = placeholders(param_values.len(), filter.statuses.len());
            sql.push_str(&format!(" AND COALESCE(t.status, '未结项') IN ({placeholders})"));
            for status in &filter.statuses {
                param_values.push(Box::new(*status));
            }
        }
        if let Some(stage) = &filter.stage {
            sql.push_str(&format!(" AND t.stage = ?{}", param_values.len() + 1));
            param_values.push(Box::new(stage.clone()));
        }
        if !filter.kinds.is_empty() {
            let placeholders = placeholders(param_values.len(), filter.kinds.len());
            sql.push_str(&format!(" AND t.type IN ({placeholders})"));
            for kind in &filter.kinds {
                param_values.push(Box::new(*kind));
            }
        }
        if let Some(method) = filter.payment_method {
            sql.push_str(&format!(" AND t.payment_method = ?{}", param_values.len() + 1));
            param_values.push(Box::new(method));
        }
        if let Some(min) = filter.min_amount {
            sql.push_str(&format!(" AND t.amount >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(amount_param(min)));
        }
        if let Some(max) = filter.max_amount {
            sql.push_str(&format!(" AND t.amount <= ?{}", param_values.len() + 1));
            param_values.push(Box::new(amount_param(max)));
        }

        sql.push_str(" ORDER BY CASE t.type WHEN '收入' THEN 0 ELSE 1 END, t.created_at, t.id");

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_ref.as_slice(), map_transaction)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn transaction_count(&self) -> LedgerResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?)
    }

    /// Apply an edit and re-derive `amount` in the same transaction. A type
    /// change drops the data that only the old type carries.
    pub(crate) fn update_transaction(
        &mut self,
        id: i64,
        edit: &TransactionEdit,
    ) -> LedgerResult<TransactionUpdate> {
        let result = (|| -> LedgerResult<TransactionUpdate> {
            let tx = self.conn.transaction()?;
            let (old_kind, old_stage, project_id, year_id, year, month): (
                EntryKind,
                Option<String>,
                i64,
                i64,
                String,
                u32,
            ) = tx
                .query_row(
                    "SELECT t.type, t.stage, t.project_id, t.year_id, COALESCE(y.year, ''), t.month
                     FROM transactions t LEFT JOIN years y ON t.year_id = y.id
                     WHERE t.id = ?1",
                    params![id],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        ))
                    },
                )
                .optional()?
                .ok_or_else(|| not_found(id))?;
            let new_stage = normalize_stage(edit.stage.as_deref());
            if new_stage != old_stage {
                let slot = Slot {
                    project_id,
                    year_id,
                    year: &year,
                    month,
                };
                ensure_slot_free(&tx, &slot, new_stage.as_deref(), Some(id))?;
            }

            tx.execute(
                "UPDATE transactions
                 SET initial_amount = ?1, type = ?2, payment_method = ?3, stage = ?4
                 WHERE id = ?5",
                params![
                    amount_param(edit.initial_amount),
                    edit.kind,
                    edit.payment_method,
                    new_stage,
                    id
                ],
            )?;

            match (old_kind, edit.kind) {
                (EntryKind::Income, EntryKind::Expense) => {
                    let n = tx.execute("DELETE FROM remarks WHERE transaction_id = ?1", params![id])?;
                    debug!(transaction_id = id, removed = n, "dropped remark after type change");
                }
                (EntryKind::Expense, EntryKind::Income) => {
                    let n = tx.execute(
                        "DELETE FROM expense_details WHERE transaction_id = ?1",
                        params![id],
                    )?;
                    debug!(transaction_id = id, removed = n, "dropped expense details after type change");
                }
                _ => {}
            }

            let amount = recompute_amount(&tx, id)?;
            tx.commit()?;
            info!(transaction_id = id, %amount, "updated transaction");
            Ok(TransactionUpdate {
                old_kind,
                new_kind: edit.kind,
                old_stage,
                new_stage,
            })
        })();
        logged("update_transaction", result)
    }

    pub(crate) fn update_transaction_status(&self, id: i64, status: Status) -> LedgerResult<()> {
        let result = (|| -> LedgerResult<()> {
            let changed = self.conn.execute(
                "UPDATE transactions SET status = ?1 WHERE id = ?2",
                params![status, id],
            )?;
            if changed == 0 {
                return Err(not_found(id));
            }
            info!(transaction_id = id, %status, "updated status");
            Ok(())
        })();
        logged("update_transaction_status", result)
    }

    /// Delete a transaction with its remark and sub-ledger.
    pub(crate) fn delete_transaction(&mut self, id: i64) -> LedgerResult<DeletedTransaction> {
        let result = (|| -> LedgerResult<DeletedTransaction> {
            let tx = self.conn.transaction()?;
            let txn = transaction_by_id(&tx, id)?.ok_or_else(|| not_found(id))?;
            let (in_month, project_in_month): (i64, i64) = tx.query_row(
                "SELECT COUNT(*), COALESCE(SUM(project_id = ?3), 0) FROM transactions
                 WHERE year_id = (SELECT year_id FROM transactions WHERE id = ?1) AND month = ?2",
                params![id, txn.month, txn.project_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            delete_transactions_where(&tx, "id = ?1", id)?;
            tx.commit()?;
            info!(transaction_id = id, project = %txn.project_name, "deleted transaction");
            Ok(DeletedTransaction {
                id,
                project_id: txn.project_id,
                project_name: txn.project_name,
                kind: txn.kind,
                stage: txn.stage,
                only_entry_in_month: in_month == 1,
                last_for_project_in_month: project_in_month == 1,
            })
        })();
        logged("delete_transaction", result)
    }

    // ── Amount derivation ────────────────────────────────────

    pub(crate) fn expense_details_total(&self, transaction_id: i64) -> LedgerResult<Decimal> {
        Ok(expense_details_total(&self.conn, transaction_id)?)
    }

    /// Re-derive and store `amount`; returns the stored value.
    pub(crate) fn recompute_amount(&mut self, transaction_id: i64) -> LedgerResult<Decimal> {
        let result = (|| -> LedgerResult<Decimal> {
            let tx = self.conn.transaction()?;
            let amount = recompute_amount(&tx, transaction_id)?;
            tx.commit()?;
            Ok(amount)
        })();
        logged("recompute_amount", result)
    }

    // ── Remarks ───────────────────────────────────────────────

    pub(crate) fn get_remark(&self, transaction_id: i64) -> LedgerResult<Option<Remark>> {
        Ok(remark_for(&self.conn, transaction_id)?)
    }

    /// Insert or replace the remark of an income transaction.
    pub(crate) fn save_remark(&self, transaction_id: i64, content: &str) -> LedgerResult<()> {
        let result = (|| -> LedgerResult<()> {
            match kind_of(&self.conn, transaction_id)? {
                None => return Err(not_found(transaction_id)),
                Some(EntryKind::Expense) => {
                    return Err(LedgerError::Invalid(
                        "remarks can only be attached to income transactions".into(),
                    ))
                }
                Some(EntryKind::Income) => {}
            }
            self.conn.execute(
                "INSERT INTO remarks (transaction_id, content, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(transaction_id) DO UPDATE SET content = ?2, updated_at = ?3",
                params![transaction_id, content, now_timestamp()],
            )?;
            debug!(transaction_id, "saved remark");
            Ok(())
        })();
        logged("save_remark", result)
    }

    // ── Expense details ──────────────────────────────────────

    pub(crate) fn get_expense_details(&self, transaction_id: i64) -> LedgerResult<Vec<ExpenseDetail>> {
        Ok(details_for(&self.conn, transaction_id)?)
    }

    /// Replace the whole sub-ledger of an expense transaction and re-derive
    /// its amount atomically. Returns the new amount.
    pub(crate) fn replace_expense_details(
        &mut self,
        transaction_id: i64,
        details: &[ExpenseDetail],
    ) -> LedgerResult<Decimal> {
        let result = (|| -> LedgerResult<Decimal> {
            for detail in details {
                if detail.name.trim().is_empty() {
                    return Err(LedgerError::Invalid("expense detail name must not be empty".into()));
                }
                if detail.amount < Decimal::ZERO {
                    return Err(LedgerError::Invalid(format!(
                        "expense detail '{}' has a negative amount",
                        detail.name
                    )));
                }
            }
            let tx = self.conn.transaction()?;
            match kind_of(&tx, transaction_id)? {
                None => return Err(not_found(transaction_id)),
                Some(EntryKind::Income) => {
                    return Err(LedgerError::Invalid(
                        "expense details can only be attached to expense transactions".into(),
                    ))
                }
                Some(EntryKind::Expense) => {}
            }
            tx.execute(
                "DELETE FROM expense_details WHERE transaction_id = ?1",
                params![transaction_id],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO expense_details (transaction_id, name, type, amount)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for detail in details {
                    stmt.execute(params![
                        transaction_id,
                        detail.name.trim(),
                        detail.kind,
                        amount_param(detail.amount)
                    ])?;
                }
            }
            let amount = recompute_amount(&tx, transaction_id)?;
            tx.commit()?;
            info!(transaction_id, items = details.len(), %amount, "replaced expense details");
            Ok(amount)
        })();
        logged("replace_expense_details", result)
    }

    /// Remark or sub-ledger, depending on the transaction's type.
    pub(crate) fn get_attachment(&self, transaction_id: i64) -> LedgerResult<Attachment> {
        match kind_of(&self.conn, transaction_id)? {
            None => Err(not_found(transaction_id)),
            Some(EntryKind::Income) => Ok(Attachment::Income {
                remark: remark_for(&self.conn, transaction_id)?,
            }),
            Some(EntryKind::Expense) => Ok(Attachment::Expense {
                details: details_for(&self.conn, transaction_id)?,
            }),
        }
    }
}

fn placeholders(already_bound: usize, count: usize) -> String {
    (0..count)
        .map(|i| format!("?{}", already_bound + i + 1))
        .collect::<Vec<_>>()
        .join(",")
}

pub(super) fn transaction_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<Transaction>> {
    conn.query_row(
        &format!("{TXN_SELECT} WHERE t.id = ?1"),
        params![id],
        map_transaction,
    )
    .optional()
}

fn kind_of(conn: &Connection, transaction_id: i64) -> rusqlite::Result<Option<EntryKind>> {
    conn.query_row(
        "SELECT type FROM transactions WHERE id = ?1",
        params![transaction_id],
        |row| row.get(0),
    )
    .optional()
}

fn remark_for(conn: &Connection, transaction_id: i64) -> rusqlite::Result<Option<Remark>> {
    conn.query_row(
        "SELECT id, transaction_id, COALESCE(content, ''), updated_at
         FROM remarks WHERE transaction_id = ?1",
        params![transaction_id],
        |row| {
            Ok(Remark {
                id: row.get(0)?,
                transaction_id: row.get(1)?,
                content: row.get(2)?,
                updated_at: row.get(3)?,
            })
        },
    )
    .optional()
}

fn details_for(conn: &Connection, transaction_id: i64) -> rusqlite::Result<Vec<ExpenseDetail>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, type, CAST(amount AS TEXT) FROM expense_details
         WHERE transaction_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![transaction_id], |row| {
        Ok(ExpenseDetail {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            kind: row.get(2)?,
            amount: amount_column(row, 3)?,
        })
    })?;
    rows.collect()
}

/// Income lines add, expense lines subtract; zero without lines.
pub(super) fn expense_details_total(conn: &Connection, transaction_id: i64) -> rusqlite::Result<Decimal> {
    Ok(signed_total(&details_for(conn, transaction_id)?))
}

/// Derive `amount` from `initial_amount`, the type and the sub-ledger and
/// store it. Every write path that touches one of those inputs calls this
/// inside its own database transaction.
pub(super) fn recompute_amount(conn: &Connection, transaction_id: i64) -> LedgerResult<Decimal> {
    let (kind, initial): (EntryKind, Decimal) = conn
        .query_row(
            "SELECT type, CAST(initial_amount AS TEXT) FROM transactions WHERE id = ?1",
            params![transaction_id],
            |row| Ok((row.get(0)?, amount_column(row, 1)?)),
        )
        .optional()?
        .ok_or_else(|| not_found(transaction_id))?;
    let total = match kind {
        EntryKind::Expense => expense_details_total(conn, transaction_id)?,
        EntryKind::Income => Decimal::ZERO,
    };
    let amount = derive_amount(kind, initial, total);
    conn.execute(
        "UPDATE transactions SET amount = ?1 WHERE id = ?2",
        params![amount_param(amount), transaction_id],
    )?;
    debug!(transaction_id, %amount, "recomputed amount");
    Ok(amount)
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
