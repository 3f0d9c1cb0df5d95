use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

use crate::config::{ENV_DB, ENV_RESOURCES};
use crate::models::{EntryKind, ExpenseDetail, PaymentMethod, Status};

#[derive(Parser)]
#[command(name = "projledger")]
#[command(version, about = "Local-only project bookkeeping ledger", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,

    /// Database file (default: project_accounting.db beside the executable)
    #[arg(long, global = true, env = ENV_DB)]
    pub(crate) db: Option<PathBuf>,

    /// Directory holding database/schema.sql
    #[arg(long, global = true, env = ENV_RESOURCES)]
    pub(crate) resources: Option<PathBuf>,

    /// Fail instead of using the built-in schema when schema.sql is missing
    #[arg(long, global = true)]
    pub(crate) strict_schema: bool,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Create or upgrade the database and exit
    Init,
    /// Check a username and password
    Login {
        #[arg(long, short)]
        username: String,
        #[arg(long, short)]
        password: String,
    },
    /// Manage years
    #[command(subcommand)]
    Year(YearCommand),
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Manage transactions
    #[command(subcommand)]
    Txn(TxnCommand),
    /// Remarks on income transactions
    #[command(subcommand)]
    Remark(RemarkCommand),
    /// Itemized sub-ledger of expense transactions
    #[command(subcommand)]
    Detail(DetailCommand),
    /// Income/expense totals
    #[command(subcommand)]
    Summary(SummaryCommand),
    /// Write one CSV report per month of a year
    Export {
        year: String,
        /// Output directory (default: exports/ beside the database)
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Database snapshots
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Credentials
    #[command(subcommand)]
    User(UserCommand),
}

#[derive(Subcommand)]
pub(crate) enum YearCommand {
    Add { year: String },
    List,
    /// Delete a year with all of its projects and transactions
    Delete { year: String },
}

#[derive(Subcommand)]
pub(crate) enum ProjectCommand {
    Add {
        name: String,
        #[arg(long, short)]
        year: String,
        #[arg(long, short)]
        month: Option<u32>,
    },
    List {
        #[arg(long, short)]
        year: String,
    },
    Rename { id: i64, name: String },
    /// Delete a project with all of its transactions
    Delete { id: i64 },
    /// Find income projects by name
    Search { keyword: String },
}

#[derive(Subcommand)]
pub(crate) enum TxnCommand {
    Add {
        #[arg(long, short)]
        project: i64,
        #[arg(long, short)]
        year: String,
        #[arg(long, short)]
        month: u32,
        #[arg(long, short, allow_hyphen_values = true)]
        amount: Decimal,
        #[arg(long, short, value_parser = parse_kind)]
        kind: EntryKind,
        #[arg(long = "pay", value_parser = parse_payment_method)]
        payment_method: PaymentMethod,
        #[arg(long, short)]
        stage: Option<String>,
    },
    /// Change fields of a transaction; omitted fields keep their value
    Update {
        id: i64,
        #[arg(long, short, allow_hyphen_values = true)]
        amount: Option<Decimal>,
        #[arg(long, short, value_parser = parse_kind)]
        kind: Option<EntryKind>,
        #[arg(long = "pay", value_parser = parse_payment_method)]
        payment_method: Option<PaymentMethod>,
        #[arg(long, short, conflicts_with = "clear_stage")]
        stage: Option<String>,
        #[arg(long)]
        clear_stage: bool,
    },
    /// Set the status, or toggle it when none is given
    Status {
        id: i64,
        #[arg(value_parser = parse_status)]
        status: Option<Status>,
    },
    Delete { id: i64 },
    /// Re-derive the stored amount from the initial amount and sub-ledger
    Recompute { id: i64 },
    List(ListArgs),
    Show { id: i64 },
}

#[derive(Args)]
pub(crate) struct ListArgs {
    #[arg(long, short)]
    pub(crate) year: String,
    #[arg(long, short)]
    pub(crate) month: u32,
    #[arg(long, value_parser = parse_status)]
    pub(crate) status: Vec<Status>,
    #[arg(long, value_parser = parse_kind)]
    pub(crate) kind: Vec<EntryKind>,
    #[arg(long)]
    pub(crate) stage: Option<String>,
    #[arg(long = "pay", value_parser = parse_payment_method)]
    pub(crate) payment_method: Option<PaymentMethod>,
    #[arg(long)]
    pub(crate) min: Option<Decimal>,
    #[arg(long)]
    pub(crate) max: Option<Decimal>,
}

#[derive(Subcommand)]
pub(crate) enum RemarkCommand {
    Set { id: i64, content: String },
    Show { id: i64 },
}

#[derive(Subcommand)]
pub(crate) enum DetailCommand {
    /// Replace the sub-ledger; each item is NAME:TYPE:AMOUNT
    Set {
        id: i64,
        #[arg(value_parser = parse_detail)]
        items: Vec<ExpenseDetail>,
    },
    Show { id: i64 },
}

#[derive(Subcommand)]
pub(crate) enum SummaryCommand {
    Month {
        #[arg(long, short)]
        year: String,
        #[arg(long, short)]
        month: u32,
    },
    Quarter {
        #[arg(long, short)]
        year: String,
        #[arg(long, short)]
        quarter: u32,
    },
    Year { year: String },
}

#[derive(Subcommand)]
pub(crate) enum BackupCommand {
    Create,
    List,
    Restore { file: String },
}

#[derive(Subcommand)]
pub(crate) enum UserCommand {
    /// Set the security question used for password recovery
    Question {
        #[arg(long, short)]
        username: String,
        #[arg(long, short)]
        question: String,
        #[arg(long, short)]
        answer: String,
    },
    /// Reset the password with the security answer
    Recover {
        #[arg(long, short)]
        username: String,
        #[arg(long, short)]
        answer: Option<String>,
        #[arg(long, short = 'n')]
        new_password: Option<String>,
    },
    Passwd {
        #[arg(long, short)]
        username: String,
        #[arg(long, short)]
        old: String,
        #[arg(long, short)]
        new: String,
    },
}

fn parse_kind(s: &str) -> Result<EntryKind, String> {
    EntryKind::parse(s).ok_or_else(|| {
        let labels: Vec<&str> = EntryKind::all().iter().map(EntryKind::as_str).collect();
        format!("unknown type '{s}' ({}|income|expense)", labels.join("|"))
    })
}

fn parse_payment_method(s: &str) -> Result<PaymentMethod, String> {
    PaymentMethod::parse(s).ok_or_else(|| {
        let labels: Vec<&str> = PaymentMethod::all().iter().map(PaymentMethod::as_str).collect();
        format!(
            "unknown payment method '{s}' ({}|wechat|alipay|corporate|personal|cash)",
            labels.join("|")
        )
    })
}

fn parse_status(s: &str) -> Result<Status, String> {
    Status::parse(s).ok_or_else(|| format!("unknown status '{s}' (open|closed)"))
}

/// `NAME:TYPE:AMOUNT`; the name may itself contain colons.
pub(crate) fn parse_detail(s: &str) -> Result<ExpenseDetail, String> {
    let mut parts = s.rsplitn(3, ':');
    let (Some(amount), Some(kind), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected NAME:TYPE:AMOUNT, got '{s}'"));
    };
    let amount: Decimal = amount
        .trim()
        .parse()
        .map_err(|e| format!("bad amount '{amount}': {e}"))?;
    Ok(ExpenseDetail::new(name.trim(), parse_kind(kind)?, amount))
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
