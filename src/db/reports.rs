use rusqlite::params;
use std::ops::RangeInclusive;

use super::sql_types::amount_column;
use super::{logged, Database, LedgerError, LedgerResult};
use crate::models::*;

impl Database {
    /// Income and expense totals of one month. Amounts are summed as
    /// decimals, not as SQLite floats.
    pub(crate) fn monthly_summary(&self, year: &str, month: u32) -> LedgerResult<MonthlySummary> {
        if !is_valid_month(month) {
            return logged(
                "monthly_summary",
                Err(LedgerError::Invalid(format!("month {month} is out of range 1-12"))),
            );
        }
        let mut months = self.summaries(year, month..=month)?;
        Ok(months.pop().unwrap_or_else(|| MonthlySummary::empty(month)))
    }

    pub(crate) fn quarterly_summary(&self, year: &str, quarter: u32) -> LedgerResult<PeriodSummary> {
        let range = match quarter_months(quarter) {
            Some(range) => range,
            None => {
                return logged(
                    "quarterly_summary",
                    Err(LedgerError::Invalid(format!("quarter {quarter} is out of range 1-4"))),
                )
            }
        };
        Ok(PeriodSummary {
            year: year.to_string(),
            months: self.summaries(year, range)?,
        })
    }

    pub(crate) fn annual_summary(&self, year: &str) -> LedgerResult<PeriodSummary> {
        Ok(PeriodSummary {
            year: year.to_string(),
            months: self.summaries(year, 1..=12)?,
        })
    }

    pub(crate) fn has_transactions_in_year(&self, year: &str) -> LedgerResult<bool> {
        Ok(self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM transactions t JOIN years y ON t.year_id = y.id
             WHERE y.year = ?1)",
            params![year],
            |row| row.get(0),
        )?)
    }

    /// One entry per month of `months`, zero-filled where nothing was booked.
    fn summaries(&self, year: &str, months: RangeInclusive<u32>) -> LedgerResult<Vec<MonthlySummary>> {
        let mut out: Vec<MonthlySummary> = months.clone().map(MonthlySummary::empty).collect();
        let mut stmt = self.conn.prepare(
            "SELECT t.month, t.type, CAST(t.amount AS TEXT)
             FROM transactions t JOIN years y ON t.year_id = y.id
             WHERE y.year = ?1 AND t.month BETWEEN ?2 AND ?3",
        )?;
        let rows = stmt.query_map(params![year, months.start(), months.end()], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, EntryKind>(1)?, amount_column(row, 2)?))
        })?;
        for row in rows {
            let (month, kind, amount) = row?;
            let Some(slot) = out.iter_mut().find(|s| s.month == month) else {
                continue;
            };
            match kind {
                EntryKind::Income => slot.income += amount,
                EntryKind::Expense => slot.expense += amount,
            }
        }
        Ok(out)
    }
}
