#![allow(clippy::unwrap_used)]

use super::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn income(project_id: i64, year: &str, month: u32, amount: Decimal) -> NewTransaction {
    NewTransaction {
        project_id,
        amount,
        kind: EntryKind::Income,
        payment_method: PaymentMethod::CorporateAccount,
        month,
        year: year.into(),
        stage: None,
    }
}

fn expense(project_id: i64, year: &str, month: u32, amount: Decimal) -> NewTransaction {
    NewTransaction {
        kind: EntryKind::Expense,
        payment_method: PaymentMethod::Cash,
        ..income(project_id, year, month, amount)
    }
}

fn count(db: &Database, table: &str) -> i64 {
    db.conn()
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

// ── Years ─────────────────────────────────────────────────────

#[test]
fn test_years_sorted_and_unique() {
    let db = Database::open_in_memory().unwrap();
    db.add_year("2025").unwrap();
    db.add_year("2023").unwrap();
    let labels: Vec<String> = db.get_years().unwrap().into_iter().map(|y| y.year).collect();
    assert_eq!(labels, vec!["2023", "2025"]);
    assert!(db.year_exists("2023").unwrap());
    assert!(!db.year_exists("2024").unwrap());

    match db.add_year("2025") {
        Err(LedgerError::Conflict(msg)) => assert!(msg.contains("2025")),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn test_malformed_year_rejected() {
    let db = Database::open_in_memory().unwrap();
    for label in ["25", "二〇二五", "2025-01", ""] {
        assert!(
            matches!(db.add_year(label), Err(LedgerError::Invalid(_))),
            "{label:?} accepted"
        );
    }
    assert!(db.get_years().unwrap().is_empty());
}

#[test]
fn test_delete_year_cascades() {
    let mut db = Database::open_in_memory().unwrap();
    db.add_year("2024").unwrap();
    let keep = db.add_project("保留项目", "2024", None).unwrap();
    db.add_transaction(&income(keep, "2024", 1, dec!(10))).unwrap();

    let pid = db.add_project("园区", "2025", Some(2)).unwrap();
    let txn = db.add_transaction(&income(pid, "2025", 2, dec!(100))).unwrap();
    db.save_remark(txn, "首付").unwrap();
    let cost = db.add_transaction(&expense(pid, "2025", 3, dec!(50))).unwrap();
    db.replace_expense_details(cost, &[ExpenseDetail::new("人工", EntryKind::Expense, dec!(5))])
        .unwrap();

    db.delete_year("2025").unwrap();

    assert!(!db.year_exists("2025").unwrap());
    assert!(db.get_project(pid).unwrap().is_none());
    assert_eq!(count(&db, "transactions"), 1);
    assert_eq!(count(&db, "remarks"), 0);
    assert_eq!(count(&db, "expense_details"), 0);
    assert!(db.get_project(keep).unwrap().is_some());

    assert!(matches!(db.delete_year("2025"), Err(LedgerError::NotFound(_))));
}

// ── Projects ──────────────────────────────────────────────────

#[test]
fn test_add_project_registers_year() {
    let mut db = Database::open_in_memory().unwrap();
    let id = db.add_project("  新展馆 ", "2026", Some(7)).unwrap();
    assert!(db.year_exists("2026").unwrap());

    let project = db.get_project(id).unwrap().unwrap();
    assert_eq!(project.name, "新展馆");
    assert_eq!(project.year, "2026");
    assert_eq!(project.month, Some(7));

    let second = db.add_project("旧仓库", "2026", None).unwrap();
    let listed: Vec<i64> = db
        .get_projects_by_year("2026")
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(listed, vec![second, id]);
}

#[test]
fn test_add_project_validation() {
    let mut db = Database::open_in_memory().unwrap();
    assert!(matches!(
        db.add_project(" ", "2025", None),
        Err(LedgerError::Invalid(_))
    ));
    assert!(matches!(
        db.add_project("展厅", "2025", Some(0)),
        Err(LedgerError::Invalid(_))
    ));
    assert!(matches!(
        db.add_project("展厅", "20x5", None),
        Err(LedgerError::Invalid(_))
    ));
    // Nothing half-written by the failed attempts.
    assert!(db.get_years().unwrap().is_empty());
}

#[test]
fn test_rename_project_returns_old_name() {
    let mut db = Database::open_in_memory().unwrap();
    let id = db.add_project("草稿", "2025", None).unwrap();
    assert_eq!(db.rename_project(id, "定稿").unwrap(), "草稿");
    assert_eq!(db.get_project(id).unwrap().unwrap().name, "定稿");
    assert!(matches!(
        db.rename_project(id + 1, "x"),
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(
        db.rename_project(id, ""),
        Err(LedgerError::Invalid(_))
    ));
}

#[test]
fn test_delete_project_cascades() {
    let mut db = Database::open_in_memory().unwrap();
    let pid = db.add_project("园区", "2025", None).unwrap();
    let other = db.add_project("学校", "2025", None).unwrap();
    let txn = db.add_transaction(&income(pid, "2025", 4, dec!(100))).unwrap();
    db.save_remark(txn, "x").unwrap();
    db.add_transaction(&income(other, "2025", 4, dec!(100))).unwrap();

    let removed = db.delete_project(pid).unwrap();
    assert_eq!(removed.name, "园区");
    assert_eq!(count(&db, "transactions"), 1);
    assert_eq!(count(&db, "remarks"), 0);
    assert!(matches!(db.delete_project(pid), Err(LedgerError::NotFound(_))));
}

#[test]
fn test_search_income_projects() {
    let mut db = Database::open_in_memory().unwrap();
    let a = db.add_project("城南展厅", "2024", None).unwrap();
    let b = db.add_project("城北展厅", "2025", None).unwrap();
    let c = db.add_project("展厅耗材", "2025", None).unwrap();
    db.add_transaction(&income(a, "2024", 11, dec!(1))).unwrap();
    db.add_transaction(&income(b, "2025", 2, dec!(1))).unwrap();
    db.add_transaction(&income(b, "2025", 6, dec!(1))).unwrap();
    db.add_transaction(&expense(c, "2025", 6, dec!(1))).unwrap();

    let hits = db.search_income_projects("展厅").unwrap();
    let got: Vec<(i64, String, u32)> = hits
        .into_iter()
        .map(|h| (h.project_id, h.year, h.month))
        .collect();
    assert_eq!(
        got,
        vec![
            (b, "2025".to_string(), 6),
            (b, "2025".to_string(), 2),
            (a, "2024".to_string(), 11),
        ]
    );
    assert!(db.search_income_projects("不存在").unwrap().is_empty());
}

// ── Reports ───────────────────────────────────────────────────

fn seeded_2025() -> Database {
    let mut db = Database::open_in_memory().unwrap();
    let pid = db.add_project("园区", "2025", None).unwrap();
    let other = db.add_project("学校", "2025", None).unwrap();
    db.add_transaction(&income(pid, "2025", 1, dec!(1000.50))).unwrap();
    db.add_transaction(&income(other, "2025", 1, dec!(500))).unwrap();
    let cost = db.add_transaction(&expense(pid, "2025", 2, dec!(300))).unwrap();
    db.replace_expense_details(cost, &[ExpenseDetail::new("材料", EntryKind::Expense, dec!(20))])
        .unwrap();
    db.add_transaction(&income(pid, "2025", 5, dec!(200))).unwrap();
    db
}

#[test]
fn test_monthly_summary() {
    let db = seeded_2025();
    let jan = db.monthly_summary("2025", 1).unwrap();
    assert_eq!(jan.income, dec!(1500.50));
    assert_eq!(jan.expense, Decimal::ZERO);

    let feb = db.monthly_summary("2025", 2).unwrap();
    assert_eq!(feb.expense, dec!(280));
    assert_eq!(feb.net(), dec!(-280));

    assert_eq!(db.monthly_summary("2025", 9).unwrap(), MonthlySummary::empty(9));
    assert!(matches!(
        db.monthly_summary("2025", 13),
        Err(LedgerError::Invalid(_))
    ));
}

#[test]
fn test_quarterly_and_annual_summary() {
    let db = seeded_2025();
    let q1 = db.quarterly_summary("2025", 1).unwrap();
    assert_eq!(q1.months.iter().map(|m| m.month).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(q1.income(), dec!(1500.50));
    assert_eq!(q1.expense(), dec!(280));
    assert_eq!(q1.net(), dec!(1220.50));

    let q2 = db.quarterly_summary("2025", 2).unwrap();
    assert_eq!(q2.income(), dec!(200));

    assert!(matches!(
        db.quarterly_summary("2025", 5),
        Err(LedgerError::Invalid(_))
    ));

    let year = db.annual_summary("2025").unwrap();
    assert_eq!(year.months.len(), 12);
    assert_eq!(year.income(), dec!(1700.50));
    assert_eq!(year.net(), dec!(1420.50));

    assert!(db.has_transactions_in_year("2025").unwrap());
    assert!(!db.has_transactions_in_year("2024").unwrap());
}

// ── Credentials ───────────────────────────────────────────────

#[test]
fn test_default_login() {
    let db = Database::open_in_memory().unwrap();
    let user = db
        .validate_user(DEFAULT_USERNAME, &hash_secret(DEFAULT_PASSWORD))
        .unwrap()
        .unwrap();
    assert_eq!(user.id, 1);
    assert_eq!(user.role, DEFAULT_ROLE);
    assert!(db
        .validate_user(DEFAULT_USERNAME, &hash_secret("wrong"))
        .unwrap()
        .is_none());
    assert_eq!(db.get_user().unwrap().unwrap().username, DEFAULT_USERNAME);
}

#[test]
fn test_change_password() {
    let db = Database::open_in_memory().unwrap();
    let old = hash_secret(DEFAULT_PASSWORD);
    let new = hash_secret("s3cret");
    assert!(matches!(
        db.change_password(DEFAULT_USERNAME, &hash_secret("nope"), &new),
        Err(LedgerError::Invalid(_))
    ));
    db.change_password(DEFAULT_USERNAME, &old, &new).unwrap();
    assert!(db.validate_user(DEFAULT_USERNAME, &old).unwrap().is_none());
    assert!(db.validate_user(DEFAULT_USERNAME, &new).unwrap().is_some());
}

#[test]
fn test_password_recovery() {
    let db = Database::open_in_memory().unwrap();
    let new = hash_secret("recovered");

    assert_eq!(db.security_question(DEFAULT_USERNAME).unwrap(), None);
    assert!(matches!(
        db.recover_password(DEFAULT_USERNAME, &hash_secret("x"), &new),
        Err(LedgerError::Invalid(_))
    ));

    db.set_security_question(DEFAULT_USERNAME, "第一辆车?", &hash_secret("捷达"))
        .unwrap();
    assert_eq!(
        db.security_question(DEFAULT_USERNAME).unwrap().as_deref(),
        Some("第一辆车?")
    );
    assert!(matches!(
        db.recover_password(DEFAULT_USERNAME, &hash_secret("桑塔纳"), &new),
        Err(LedgerError::Invalid(_))
    ));
    db.recover_password(DEFAULT_USERNAME, &hash_secret("捷达"), &new)
        .unwrap();
    assert!(db.validate_user(DEFAULT_USERNAME, &new).unwrap().is_some());

    assert!(matches!(
        db.security_question("ghost"),
        Err(LedgerError::NotFound(_))
    ));
}

// ── Files ─────────────────────────────────────────────────────

#[test]
fn test_open_file_backed_store_twice() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DB_FILE_NAME);
    {
        let db = Database::open(&path, SchemaSource::Builtin).unwrap();
        db.add_year("2025").unwrap();
    }
    let db = Database::open(&path, SchemaSource::Builtin).unwrap();
    assert!(db.year_exists("2025").unwrap());
    assert_eq!(count(&db, "users"), 1);
}

#[test]
fn test_backup_and_restore_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let backup = dir.path().join("snapshot.db");
    let mut db = Database::open(&dir.path().join(DB_FILE_NAME), SchemaSource::Builtin).unwrap();
    let pid = db.add_project("园区", "2025", None).unwrap();
    db.add_transaction(&income(pid, "2025", 1, dec!(10))).unwrap();
    db.backup_to(&backup).unwrap();

    db.delete_year("2025").unwrap();
    assert_eq!(db.transaction_count().unwrap(), 0);

    db.restore_from(&backup).unwrap();
    assert!(db.year_exists("2025").unwrap());
    assert_eq!(db.transaction_count().unwrap(), 1);
    assert_eq!(db.get_project(pid).unwrap().unwrap().name, "园区");
}
