use rust_decimal::Decimal;

use super::EntryKind;

#[derive(Debug, Clone)]
pub struct Remark {
    pub id: i64,
    pub transaction_id: i64,
    pub content: String,
    pub updated_at: String,
}

/// One itemized line of an expense transaction's sub-ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseDetail {
    pub id: Option<i64>,
    pub name: String,
    pub kind: EntryKind,
    pub amount: Decimal,
}

impl ExpenseDetail {
    pub fn new(name: impl Into<String>, kind: EntryKind, amount: Decimal) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind,
            amount,
        }
    }

    pub fn signed_amount(&self) -> Decimal {
        self.kind.sign(self.amount)
    }
}

/// Signed total of a sub-ledger: income lines add, expense lines subtract.
pub fn signed_total(details: &[ExpenseDetail]) -> Decimal {
    details.iter().map(ExpenseDetail::signed_amount).sum()
}

/// Type-specific data hanging off a transaction.
#[derive(Debug, Clone)]
pub enum Attachment {
    Income { remark: Option<Remark> },
    Expense { details: Vec<ExpenseDetail> },
}

impl Attachment {
    /// One-line rendering used in reports.
    pub fn summary(&self) -> String {
        match self {
            Self::Income { remark } => remark
                .as_ref()
                .map(|r| r.content.clone())
                .unwrap_or_default(),
            Self::Expense { details } if details.is_empty() => String::new(),
            Self::Expense { details } => {
                let mut parts: Vec<String> = details
                    .iter()
                    .map(|d| format!("{}:{:.2}", d.name, d.amount))
                    .collect();
                parts.push(format!("总额:{:.2}", signed_total(details)));
                parts.join(", ")
            }
        }
    }
}
