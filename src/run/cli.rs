use anyhow::Result;
use rust_decimal::Decimal;

use super::args::*;
use crate::backup::BackupStore;
use crate::config::Config;
use crate::db::Database;
use crate::export::CsvReport;
use crate::models::*;

pub(crate) fn as_cli(command: Command, db: &mut Database, config: &Config) -> Result<()> {
    match command {
        Command::Init => cli_init(db, config),
        Command::Login { username, password } => cli_login(db, &username, &password),
        Command::Year(cmd) => cli_year(cmd, db),
        Command::Project(cmd) => cli_project(cmd, db),
        Command::Txn(cmd) => cli_txn(cmd, db),
        Command::Remark(cmd) => cli_remark(cmd, db),
        Command::Detail(cmd) => cli_detail(cmd, db),
        Command::Summary(cmd) => cli_summary(cmd, db),
        Command::Export { year, out } => {
            let dir = out.unwrap_or_else(|| config.export_dir.clone());
            let files = CsvReport::export_year(db, &year, &dir)?;
            for file in &files {
                println!("Wrote {}", file.display());
            }
            println!("Exported {} month(s) of {year}", files.len());
            Ok(())
        }
        Command::Backup(cmd) => cli_backup(cmd, db, config),
        Command::User(cmd) => cli_user(cmd, db),
    }
}

fn cli_init(db: &Database, config: &Config) -> Result<()> {
    println!("Database ready: {}", config.db_path.display());
    if let Some(user) = db.get_user()? {
        println!("  User:         {} ({})", user.username, user.role);
    }
    println!("  Years:        {}", db.get_years()?.len());
    println!("  Transactions: {}", db.transaction_count()?);
    Ok(())
}

fn cli_login(db: &Database, username: &str, password: &str) -> Result<()> {
    match db.validate_user(username, &hash_secret(password))? {
        Some(user) => {
            println!("Welcome, {} ({})", user.username, user.role);
            Ok(())
        }
        None => anyhow::bail!("Wrong username or password"),
    }
}

// ── Years & projects ──────────────────────────────────────────

fn cli_year(cmd: YearCommand, db: &mut Database) -> Result<()> {
    match cmd {
        YearCommand::Add { year } => {
            db.add_year(&year)?;
            println!("Added year {year}");
        }
        YearCommand::List => {
            let years = db.get_years()?;
            if years.is_empty() {
                println!("No years");
            }
            for year in &years {
                println!("{year}");
            }
        }
        YearCommand::Delete { year } => {
            db.delete_year(&year)?;
            println!("Deleted year {year}");
        }
    }
    Ok(())
}

fn cli_project(cmd: ProjectCommand, db: &mut Database) -> Result<()> {
    match cmd {
        ProjectCommand::Add { name, year, month } => {
            if !db.year_exists(&year)? {
                println!("Registering year {year}");
            }
            let id = db.add_project(&name, &year, month)?;
            println!("Added project #{id} {name}");
        }
        ProjectCommand::List { year } => {
            let projects = db.get_projects_by_year(&year)?;
            if projects.is_empty() {
                println!("No projects in {year}");
                return Ok(());
            }
            println!("{:<6} {:<6} {:<24} Created", "ID", "Month", "Name");
            println!("{}", "─".repeat(60));
            for p in &projects {
                let month = p.month.map(|m| format!("{m:02}")).unwrap_or_else(|| "-".into());
                println!("{:<6} {:<6} {:<24} {}", p.id, month, p.name, p.created_at);
            }
        }
        ProjectCommand::Rename { id, name } => {
            let old = db.rename_project(id, &name)?;
            println!("Renamed project #{id}: {old} -> {}", name.trim());
        }
        ProjectCommand::Delete { id } => {
            let project = db.delete_project(id)?;
            println!("Deleted project #{id} {project} ({})", project.year);
        }
        ProjectCommand::Search { keyword } => {
            let hits = db.search_income_projects(&keyword)?;
            if hits.is_empty() {
                println!("No income projects match '{keyword}'");
            }
            for hit in &hits {
                println!("{}-{:02}  #{:<5} {}", hit.year, hit.month, hit.project_id, hit.name);
            }
        }
    }
    Ok(())
}

// ── Transactions ──────────────────────────────────────────────

fn cli_txn(cmd: TxnCommand, db: &mut Database) -> Result<()> {
    match cmd {
        TxnCommand::Add {
            project,
            year,
            month,
            amount,
            kind,
            payment_method,
            stage,
        } => {
            let id = db.add_transaction(&NewTransaction {
                project_id: project,
                amount,
                kind,
                payment_method,
                month,
                year,
                stage,
            })?;
            println!("Added transaction #{id}");
        }
        TxnCommand::Update {
            id,
            amount,
            kind,
            payment_method,
            stage,
            clear_stage,
        } => {
            let current = require_transaction(db, id)?;
            let edit = TransactionEdit {
                initial_amount: amount.unwrap_or(current.initial_amount),
                kind: kind.unwrap_or(current.kind),
                payment_method: payment_method.unwrap_or(current.payment_method),
                stage: if clear_stage { None } else { stage.or(current.stage) },
            };
            let update = db.update_transaction(id, &edit)?;
            if update.kind_changed() {
                println!("Type changed {} -> {}", update.old_kind, update.new_kind);
            }
            if update.stage_changed() {
                println!(
                    "Stage changed {} -> {}",
                    update.old_stage.as_deref().unwrap_or("-"),
                    update.new_stage.as_deref().unwrap_or("-")
                );
            }
            let txn = require_transaction(db, id)?;
            println!("Updated transaction #{id}: amount {:.2}", txn.amount);
        }
        TxnCommand::Status { id, status } => {
            let status = match status {
                Some(s) => s,
                None => require_transaction(db, id)?.status.toggled(),
            };
            db.update_transaction_status(id, status)?;
            println!("Transaction #{id} is now {status}");
        }
        TxnCommand::Delete { id } => {
            let deleted = db.delete_transaction(id)?;
            println!(
                "Deleted transaction #{id} ({} {} {})",
                deleted.project_name,
                deleted.kind,
                deleted.stage.as_deref().unwrap_or("")
            );
            if deleted.only_entry_in_month {
                println!("  That month has no transactions left");
            } else if deleted.last_for_project_in_month {
                println!("  {} has no transactions left that month", deleted.project_name);
            }
        }
        TxnCommand::Recompute { id } => {
            let amount = db.recompute_amount(id)?;
            println!("Transaction #{id}: amount {amount:.2}");
        }
        TxnCommand::List(args) => cli_txn_list(args, db)?,
        TxnCommand::Show { id } => {
            let txn = require_transaction(db, id)?;
            println!("Transaction #{}", txn.id);
            println!("{}", "─".repeat(40));
            println!("  Project:   {} (#{})", txn.project_name, txn.project_id);
            println!("  Period:    {}-{:02}", txn.year, txn.month);
            println!("  Type:      {}", txn.kind);
            println!("  Payment:   {}", txn.payment_method);
            println!("  Stage:     {}", txn.stage.as_deref().unwrap_or("-"));
            println!("  Status:    {}", txn.status);
            println!("  Initial:   {:.2}", txn.initial_amount);
            println!("  Amount:    {:.2}", txn.amount);
            if txn.is_expense() {
                println!("  Details:   {:+.2}", txn.adjustment());
            }
            println!("  Created:   {}", txn.created_at);
            print_attachment(&db.get_attachment(id)?);
        }
    }
    Ok(())
}

fn cli_txn_list(args: ListArgs, db: &Database) -> Result<()> {
    let filter = TransactionFilter {
        statuses: args.status,
        stage: args.stage,
        kinds: args.kind,
        payment_method: args.payment_method,
        min_amount: args.min,
        max_amount: args.max,
    };
    let txns = db.get_monthly_transactions(&args.year, args.month, &filter)?;
    if txns.is_empty() {
        let qualifier = if filter.is_empty() { "" } else { " matching the filter" };
        println!("No transactions{qualifier} for {}-{:02}", args.year, args.month);
        return Ok(());
    }

    println!(
        "{:<5} {:<20} {:<20} {:>12} {:<4} {:<8} {:<10} Status",
        "ID", "Created", "Project", "Amount", "Type", "Payment", "Stage"
    );
    println!("{}", "─".repeat(96));
    for t in &txns {
        println!(
            "{:<5} {:<20} {:<20} {:>12.2} {:<4} {:<8} {:<10} {}",
            t.id,
            t.created_at,
            t.project_name,
            t.amount,
            t.kind,
            t.payment_method,
            t.stage.as_deref().unwrap_or(""),
            t.status,
        );
    }
    Ok(())
}

fn require_transaction(db: &Database, id: i64) -> Result<Transaction> {
    db.get_transaction(id)?
        .ok_or_else(|| anyhow::anyhow!("Transaction #{id} not found"))
}

// ── Attachments ───────────────────────────────────────────────

fn cli_remark(cmd: RemarkCommand, db: &mut Database) -> Result<()> {
    match cmd {
        RemarkCommand::Set { id, content } => {
            db.save_remark(id, &content)?;
            println!("Saved remark for #{id}");
        }
        RemarkCommand::Show { id } => match db.get_remark(id)? {
            Some(remark) => println!("{} (updated {})", remark.content, remark.updated_at),
            None => println!("No remark for #{id}"),
        },
    }
    Ok(())
}

fn cli_detail(cmd: DetailCommand, db: &mut Database) -> Result<()> {
    match cmd {
        DetailCommand::Set { id, items } => {
            let amount = db.replace_expense_details(id, &items)?;
            println!("Saved {} item(s) for #{id}; amount is now {amount:.2}", items.len());
        }
        DetailCommand::Show { id } => {
            let details = db.get_expense_details(id)?;
            if details.is_empty() {
                println!("No expense details for #{id}");
                return Ok(());
            }
            print_details(&details);
            println!("{:<29} {:>12.2}", "Total", db.expense_details_total(id)?);
        }
    }
    Ok(())
}

fn print_attachment(attachment: &Attachment) {
    match attachment {
        Attachment::Income { remark } => println!(
            "  Remark:    {}",
            remark.as_ref().map(|r| r.content.as_str()).unwrap_or("-")
        ),
        Attachment::Expense { details } if details.is_empty() => println!("  Details:   -"),
        Attachment::Expense { details } => {
            println!();
            print_details(details);
            println!("{:<29} {:>12.2}", "Total", signed_total(details));
        }
    }
}

fn print_details(details: &[ExpenseDetail]) {
    println!("{:<24} {:<4} {:>12}", "Item", "Type", "Amount");
    println!("{}", "─".repeat(42));
    for d in details {
        println!("{:<24} {:<4} {:>12.2}", d.name, d.kind, d.amount);
    }
}

// ── Reports ───────────────────────────────────────────────────

fn cli_summary(cmd: SummaryCommand, db: &Database) -> Result<()> {
    match cmd {
        SummaryCommand::Month { year, month } => {
            let summary = db.monthly_summary(&year, month)?;
            println!("{year}-{month:02}");
            println!("{}", "─".repeat(40));
            print_totals(summary.income, summary.expense, summary.net());
        }
        SummaryCommand::Quarter { year, quarter } => {
            let period = db.quarterly_summary(&year, quarter)?;
            println!("{year} Q{quarter}");
            print_period(&period);
        }
        SummaryCommand::Year { year } => {
            let period = db.annual_summary(&year)?;
            println!("{year}");
            print_period(&period);
        }
    }
    Ok(())
}

fn print_period(period: &PeriodSummary) {
    println!("{:<6} {:>14} {:>14} {:>14}", "Month", "Income", "Expense", "Net");
    println!("{}", "─".repeat(51));
    for m in &period.months {
        println!(
            "{:<6} {:>14.2} {:>14.2} {:>14.2}",
            format!("{:02}", m.month),
            m.income,
            m.expense,
            m.net()
        );
    }
    println!();
    print_totals(period.income(), period.expense(), period.net());
}

fn print_totals(income: Decimal, expense: Decimal, net: Decimal) {
    println!("  Income:   {income:.2}");
    println!("  Expense:  {expense:.2}");
    println!("  Net:      {net:.2}");
}

// ── Maintenance ───────────────────────────────────────────────

fn cli_backup(cmd: BackupCommand, db: &mut Database, config: &Config) -> Result<()> {
    let store = BackupStore::new(&config.backup_dir)?;
    match cmd {
        BackupCommand::Create => {
            let path = store.backup(db)?;
            println!("Backed up to {}", path.display());
        }
        BackupCommand::List => {
            let files = store.list()?;
            if files.is_empty() {
                println!("No backups in {}", store.dir().display());
            }
            for file in &files {
                println!("{file}");
            }
        }
        BackupCommand::Restore { file } => {
            store.restore(db, &file)?;
            println!("Restored {file}");
        }
    }
    Ok(())
}

fn cli_user(cmd: UserCommand, db: &Database) -> Result<()> {
    match cmd {
        UserCommand::Question {
            username,
            question,
            answer,
        } => {
            db.set_security_question(&username, &question, &hash_secret(answer.trim()))?;
            println!("Security question saved");
        }
        UserCommand::Recover {
            username,
            answer,
            new_password,
        } => match (answer, new_password) {
            (Some(answer), Some(new_password)) => {
                db.recover_password(&username, &hash_secret(answer.trim()), &hash_secret(&new_password))?;
                println!("Password reset for {username}");
            }
            (None, _) => match db.security_question(&username)? {
                Some(question) => println!("{question}"),
                None => anyhow::bail!("No security question set for {username}"),
            },
            (Some(_), None) => anyhow::bail!("--new-password is required with --answer"),
        },
        UserCommand::Passwd { username, old, new } => {
            db.change_password(&username, &hash_secret(&old), &hash_secret(&new))?;
            println!("Password changed");
        }
    }
    Ok(())
}
