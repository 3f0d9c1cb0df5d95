use anyhow::{Context, Result};
use regex::Regex;
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::warn;

/// Tables the application cannot run without.
pub(crate) const REQUIRED_TABLES: &[&str] = &[
    "users",
    "years",
    "projects",
    "transactions",
    "remarks",
    "expense_details",
];

pub(crate) const DEFAULT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id                    INTEGER PRIMARY KEY,
    username              TEXT NOT NULL,
    password_hash         TEXT NOT NULL,
    role                  TEXT NOT NULL DEFAULT 'admin',
    security_question     TEXT,
    security_answer_hash  TEXT
);

CREATE TABLE IF NOT EXISTS years (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    year        TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    year_id     INTEGER NOT NULL REFERENCES years(id) ON DELETE CASCADE,
    month       INTEGER CHECK (month BETWEEN 1 AND 12),
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id      INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    amount          REAL NOT NULL,
    initial_amount  REAL NOT NULL DEFAULT 0,
    type            TEXT NOT NULL CHECK (type IN ('收入', '支出')),
    payment_method  TEXT NOT NULL CHECK (payment_method IN ('微信', '支付宝', '对公账户', '对私账户', '现金')),
    stage           TEXT,
    month           INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
    year_id         INTEGER NOT NULL REFERENCES years(id) ON DELETE CASCADE,
    created_at      TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT '未结项' CHECK (status IN ('未结项', '已结项'))
);

CREATE TABLE IF NOT EXISTS remarks (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id  INTEGER NOT NULL UNIQUE REFERENCES transactions(id) ON DELETE CASCADE,
    content         TEXT NOT NULL DEFAULT '',
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS expense_details (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id  INTEGER NOT NULL REFERENCES transactions(id) ON DELETE CASCADE,
    name            TEXT NOT NULL,
    type            TEXT NOT NULL CHECK (type IN ('收入', '支出')),
    amount          REAL NOT NULL
);
"#;

/// Rebuilt definition of `remarks`, created under a shadow name and renamed
/// into place.
pub(crate) const REMARKS_SHADOW: &str = r#"
CREATE TABLE remarks_new (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id  INTEGER NOT NULL UNIQUE REFERENCES transactions(id) ON DELETE CASCADE,
    content         TEXT NOT NULL DEFAULT '',
    updated_at      TEXT NOT NULL
);
"#;

pub(crate) const USERS_SHADOW: &str = r#"
CREATE TABLE users_new (
    id                    INTEGER PRIMARY KEY,
    username              TEXT NOT NULL,
    password_hash         TEXT NOT NULL,
    role                  TEXT NOT NULL DEFAULT 'admin',
    security_question     TEXT,
    security_answer_hash  TEXT
);
"#;

/// `(index, table, ddl)`; an index is skipped while its table is absent.
pub(crate) const INDEXES: &[(&str, &str, &str)] = &[
    (
        "idx_transactions_year_month",
        "transactions",
        "CREATE INDEX IF NOT EXISTS idx_transactions_year_month ON transactions(year_id, month)",
    ),
    (
        "idx_remarks_transaction",
        "remarks",
        "CREATE INDEX IF NOT EXISTS idx_remarks_transaction ON remarks(transaction_id)",
    ),
    (
        "idx_expense_details_transaction",
        "expense_details",
        "CREATE INDEX IF NOT EXISTS idx_expense_details_transaction ON expense_details(transaction_id)",
    ),
];

/// Where the table-creation script comes from.
#[derive(Debug, Clone)]
pub(crate) enum SchemaSource {
    Builtin,
    /// External script; when `strict` is false a missing or unreadable file
    /// falls back to the built-in schema.
    File { path: PathBuf, strict: bool },
}

impl SchemaSource {
    pub(crate) fn load(&self) -> Result<Cow<'static, str>> {
        match self {
            Self::Builtin => Ok(Cow::Borrowed(DEFAULT_SCHEMA)),
            Self::File { path, strict } => match std::fs::read_to_string(path) {
                Ok(text) => Ok(Cow::Owned(text)),
                Err(e) if !*strict => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "schema file unavailable, using built-in schema"
                    );
                    Ok(Cow::Borrowed(DEFAULT_SCHEMA))
                }
                Err(e) => Err(e)
                    .with_context(|| format!("Schema file not found: {}", path.display())),
            },
        }
    }
}

/// One statement of a schema script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Statement {
    CreateTable { table: String, sql: String },
    Other(String),
}

impl Statement {
    pub(crate) fn sql(&self) -> &str {
        match self {
            Self::CreateTable { sql, .. } | Self::Other(sql) => sql,
        }
    }
}

fn create_table_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)^\s*CREATE\s+(?:TEMP\s+|TEMPORARY\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?["`\[]?(\w+)"#).ok()
    })
    .as_ref()
}

/// Split a script into classified statements. Comments are dropped; `;`
/// inside quotes does not terminate a statement. Trigger bodies are not
/// supported.
pub(crate) fn parse_script(script: &str) -> Vec<Statement> {
    split_statements(script)
        .into_iter()
        .map(|sql| {
            let table = create_table_re()
                .and_then(|re| re.captures(&sql))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_lowercase());
            match table {
                Some(table) => Statement::CreateTable { table, sql },
                None => Statement::Other(sql),
            }
        })
        .collect()
}

fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    current.push(c);
                }
                '-' if chars.peek() == Some(&'-') => {
                    for skipped in chars.by_ref() {
                        if skipped == '\n' {
                            current.push('\n');
                            break;
                        }
                    }
                }
                ';' => {
                    let stmt = current.trim();
                    if !stmt.is_empty() {
                        statements.push(stmt.to_string());
                    }
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }
    statements
}
