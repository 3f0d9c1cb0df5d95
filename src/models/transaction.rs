use rust_decimal::Decimal;

/// Direction of a transaction or of a sub-ledger line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    /// Label stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "收入",
            Self::Expense => "支出",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "收入" | "income" | "in" => Some(Self::Income),
            "支出" | "expense" | "out" => Some(Self::Expense),
            _ => None,
        }
    }

    pub fn all() -> &'static [EntryKind] {
        &[Self::Income, Self::Expense]
    }

    /// Sign applied to a sub-ledger line of this kind when folding it into
    /// the parent transaction's amount.
    pub fn sign(&self, amount: Decimal) -> Decimal {
        match self {
            Self::Income => amount,
            Self::Expense => -amount,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    WeChat,
    Alipay,
    CorporateAccount,
    PersonalAccount,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeChat => "微信",
            Self::Alipay => "支付宝",
            Self::CorporateAccount => "对公账户",
            Self::PersonalAccount => "对私账户",
            Self::Cash => "现金",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "微信" | "wechat" => Some(Self::WeChat),
            "支付宝" | "alipay" => Some(Self::Alipay),
            "对公账户" | "corporate" | "corporate-account" => Some(Self::CorporateAccount),
            "对私账户" | "personal" | "personal-account" => Some(Self::PersonalAccount),
            "现金" | "cash" => Some(Self::Cash),
            _ => None,
        }
    }

    pub fn all() -> &'static [PaymentMethod] {
        &[
            Self::WeChat,
            Self::Alipay,
            Self::CorporateAccount,
            Self::PersonalAccount,
            Self::Cash,
        ]
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Open,
    Closed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "未结项",
            Self::Closed => "已结项",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "未结项" | "open" => Some(Self::Open),
            "已结项" | "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Self::Open => Self::Closed,
            Self::Closed => Self::Open,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A stored transaction joined with its project name and year label.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: i64,
    pub project_id: i64,
    pub project_name: String,
    pub year: String,
    pub month: u32,
    pub amount: Decimal,
    pub initial_amount: Decimal,
    pub kind: EntryKind,
    pub payment_method: PaymentMethod,
    pub stage: Option<String>,
    pub status: Status,
    pub created_at: String,
}

impl Transaction {
    pub fn is_income(&self) -> bool {
        self.kind == EntryKind::Income
    }

    pub fn is_expense(&self) -> bool {
        self.kind == EntryKind::Expense
    }

    /// Difference introduced by the sub-ledger.
    pub fn adjustment(&self) -> Decimal {
        self.amount - self.initial_amount
    }
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub project_id: i64,
    pub amount: Decimal,
    pub kind: EntryKind,
    pub payment_method: PaymentMethod,
    pub month: u32,
    /// Four-digit year label, must already be registered.
    pub year: String,
    pub stage: Option<String>,
}

/// Editable fields of an existing transaction.
#[derive(Debug, Clone)]
pub struct TransactionEdit {
    pub initial_amount: Decimal,
    pub kind: EntryKind,
    pub payment_method: PaymentMethod,
    pub stage: Option<String>,
}

/// What changed in an edit, handed to whoever keeps the project folders in sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionUpdate {
    pub old_kind: EntryKind,
    pub new_kind: EntryKind,
    pub old_stage: Option<String>,
    pub new_stage: Option<String>,
}

impl TransactionUpdate {
    pub fn kind_changed(&self) -> bool {
        self.old_kind != self.new_kind
    }

    pub fn stage_changed(&self) -> bool {
        self.old_stage != self.new_stage
    }
}

/// Identity of a deleted transaction.
#[derive(Debug, Clone)]
pub struct DeletedTransaction {
    pub id: i64,
    pub project_id: i64,
    pub project_name: String,
    pub kind: EntryKind,
    pub stage: Option<String>,
    /// True when it was the only transaction of its year/month.
    pub only_entry_in_month: bool,
    /// True when no other transaction of the same project remains in that month.
    pub last_for_project_in_month: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub statuses: Vec<Status>,
    pub stage: Option<String>,
    pub kinds: Vec<EntryKind>,
    pub payment_method: Option<PaymentMethod>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

impl TransactionFilter {
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
            && self.stage.is_none()
            && self.kinds.is_empty()
            && self.payment_method.is_none()
            && self.min_amount.is_none()
            && self.max_amount.is_none()
    }
}

/// Derived amount: the initial amount plus the signed sub-ledger total for
/// expense transactions, the initial amount alone otherwise.
pub fn derive_amount(kind: EntryKind, initial_amount: Decimal, details_total: Decimal) -> Decimal {
    match kind {
        EntryKind::Expense => initial_amount + details_total,
        EntryKind::Income => initial_amount,
    }
}

pub fn is_valid_month(month: u32) -> bool {
    (1..=12).contains(&month)
}
