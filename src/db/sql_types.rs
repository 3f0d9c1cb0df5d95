use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::Row;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::{EntryKind, PaymentMethod, Status};

#[derive(Debug, thiserror::Error)]
#[error("unknown {what} label: {label}")]
struct UnknownLabel {
    what: &'static str,
    label: String,
}

fn parse_label<T>(value: ValueRef<'_>, what: &'static str, parse: fn(&str) -> Option<T>) -> FromSqlResult<T> {
    let s = value.as_str()?;
    parse(s).ok_or_else(|| {
        FromSqlError::Other(Box::new(UnknownLabel {
            what,
            label: s.to_string(),
        }))
    })
}

impl ToSql for EntryKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for EntryKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_label(value, "type", EntryKind::parse)
    }
}

impl ToSql for PaymentMethod {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for PaymentMethod {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_label(value, "payment method", PaymentMethod::parse)
    }
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_label(value, "status", Status::parse)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("malformed amount: {0:?}")]
struct MalformedAmount(String);

/// Amounts live in REAL columns and are selected as `CAST(x AS TEXT)`.
/// Text that is not a number fails the row instead of reading as zero.
pub(crate) fn amount_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    match Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text)) {
        Ok(amount) => Ok(amount),
        Err(_) => Err(rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::new(MalformedAmount(text)),
        )),
    }
}

pub(crate) fn amount_param(amount: Decimal) -> String {
    amount.normalize().to_string()
}

pub(crate) fn now_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
