#![allow(clippy::unwrap_used)]

use super::*;
use rust_decimal_macros::dec;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("projledger").chain(args.iter().copied())).unwrap()
}

#[test]
fn test_parse_detail() {
    let detail = parse_detail("材料:支出:200.50").unwrap();
    assert_eq!(detail.name, "材料");
    assert_eq!(detail.kind, EntryKind::Expense);
    assert_eq!(detail.amount, dec!(200.50));

    let detail = parse_detail("退款:A:income:50").unwrap();
    assert_eq!(detail.name, "退款:A");
    assert_eq!(detail.kind, EntryKind::Income);
}

#[test]
fn test_parse_detail_rejects_malformed() {
    assert!(parse_detail("材料:200").is_err());
    assert!(parse_detail("材料:transfer:200").is_err());
    assert!(parse_detail("材料:支出:abc").is_err());
}

#[test]
fn test_txn_add_accepts_aliases() {
    let cli = parse(&[
        "txn", "add", "-p", "3", "-y", "2025", "-m", "4", "-a", "1200.5", "-k", "income", "--pay",
        "wechat", "-s", "首期",
    ]);
    match cli.command {
        Command::Txn(TxnCommand::Add {
            project,
            amount,
            kind,
            payment_method,
            stage,
            ..
        }) => {
            assert_eq!(project, 3);
            assert_eq!(amount, dec!(1200.5));
            assert_eq!(kind, EntryKind::Income);
            assert_eq!(payment_method, PaymentMethod::WeChat);
            assert_eq!(stage.as_deref(), Some("首期"));
        }
        _ => panic!("expected txn add"),
    }
}

#[test]
fn test_list_filters_repeat() {
    let cli = parse(&[
        "txn", "list", "-y", "2025", "-m", "4", "--status", "open", "--status", "已结项", "--kind",
        "expense",
    ]);
    match cli.command {
        Command::Txn(TxnCommand::List(args)) => {
            assert_eq!(args.status, vec![Status::Open, Status::Closed]);
            assert_eq!(args.kind, vec![EntryKind::Expense]);
            assert!(args.payment_method.is_none());
        }
        _ => panic!("expected txn list"),
    }
}

#[test]
fn test_global_db_flag_after_subcommand() {
    let cli = parse(&["year", "list", "--db", "/tmp/ledger.db"]);
    assert_eq!(cli.db, Some(PathBuf::from("/tmp/ledger.db")));
    assert!(matches!(cli.command, Command::Year(YearCommand::List)));
}

#[test]
fn test_stage_and_clear_stage_conflict() {
    let result = Cli::try_parse_from([
        "projledger",
        "txn",
        "update",
        "1",
        "--stage",
        "二期",
        "--clear-stage",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_unknown_labels_list_the_stored_ones() {
    assert!(parse_kind("transfer").unwrap_err().contains("收入|支出"));
    assert!(parse_payment_method("paypal").unwrap_err().contains("微信"));
}

#[test]
fn test_unknown_payment_method_rejected() {
    let result = Cli::try_parse_from([
        "projledger", "txn", "add", "-p", "1", "-y", "2025", "-m", "1", "-a", "1", "-k", "income",
        "--pay", "paypal",
    ]);
    assert!(result.is_err());
}
