mod attachment;
mod project;
mod summary;
mod transaction;
mod user;
mod year;

pub use attachment::{signed_total, Attachment, ExpenseDetail, Remark};
pub use project::{Project, ProjectHit};
pub use summary::{quarter_months, MonthlySummary, PeriodSummary};
pub use transaction::{
    derive_amount, is_valid_month, DeletedTransaction, EntryKind, NewTransaction, PaymentMethod,
    Status, Transaction, TransactionEdit, TransactionFilter, TransactionUpdate,
};
pub use user::{hash_secret, User, DEFAULT_PASSWORD, DEFAULT_ROLE, DEFAULT_USERNAME};
pub use year::Year;

#[cfg(test)]
mod tests;
