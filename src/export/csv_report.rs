use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::db::Database;
use crate::models::{Transaction, TransactionFilter};

pub(crate) const COLUMNS: [&str; 10] = [
    "序号",
    "创建时间",
    "项目名称",
    "金额",
    "类型",
    "支付方式",
    "阶段",
    "状态",
    "备注（收入）",
    "支出详情（支出）",
];

/// Label column of the totals rows appended under each month.
const TOTALS_LABEL_COLUMN: usize = 7;

pub(crate) struct CsvReport;

impl CsvReport {
    /// Write one `<year>_<MM>_transactions.csv` per month that has entries.
    pub(crate) fn export_year(db: &Database, year: &str, out_dir: &Path) -> Result<Vec<PathBuf>> {
        if !db.has_transactions_in_year(year)? {
            anyhow::bail!("No transactions recorded for {year}");
        }
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create export directory: {}", out_dir.display()))?;

        let mut written = Vec::new();
        for month in 1..=12 {
            let transactions = db.get_monthly_transactions(year, month, &TransactionFilter::default())?;
            if transactions.is_empty() {
                debug!(year, month, "no transactions, skipping month");
                continue;
            }
            let path = out_dir.join(format!("{year}_{month:02}_transactions.csv"));
            Self::write_month(db, year, month, &transactions, &path)?;
            written.push(path);
        }
        info!(year, files = written.len(), dir = %out_dir.display(), "exported year");
        Ok(written)
    }

    fn write_month(
        db: &Database,
        year: &str,
        month: u32,
        transactions: &[Transaction],
        path: &Path,
    ) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        wtr.write_record(COLUMNS)?;

        for (idx, txn) in transactions.iter().enumerate() {
            let attachment = db.get_attachment(txn.id)?.summary();
            let (remark, details) = if txn.is_income() {
                (attachment, String::new())
            } else {
                (String::new(), attachment)
            };
            let project = if txn.project_name.is_empty() {
                "未知项目"
            } else {
                txn.project_name.as_str()
            };
            wtr.write_record([
                (idx + 1).to_string(),
                txn.created_at.clone(),
                project.to_string(),
                format!("{:.2}", txn.amount),
                txn.kind.to_string(),
                txn.payment_method.to_string(),
                txn.stage.clone().unwrap_or_default(),
                txn.status.to_string(),
                remark,
                details,
            ])?;
        }

        let summary = db.monthly_summary(year, month)?;
        for (label, value) in [
            ("总收入", summary.income),
            ("总支出", summary.expense),
            ("净收入", summary.net()),
        ] {
            wtr.write_record(totals_row(label, &format!("{value:.2}")))?;
        }
        wtr.flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

fn totals_row(label: &str, value: &str) -> Vec<String> {
    let mut row = vec![String::new(); COLUMNS.len()];
    row[TOTALS_LABEL_COLUMN] = label.to_string();
    row[TOTALS_LABEL_COLUMN + 1] = value.to_string();
    row
}

#[cfg(test)]
#[path = "csv_report_tests.rs"]
mod tests;
