#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::*;

// ── Labels ────────────────────────────────────────────────────

#[test]
fn test_entry_kind_labels_round_trip() {
    for kind in EntryKind::all() {
        assert_eq!(EntryKind::parse(kind.as_str()), Some(*kind));
    }
    assert_eq!(EntryKind::parse("Income"), Some(EntryKind::Income));
    assert_eq!(EntryKind::parse(" expense "), Some(EntryKind::Expense));
    assert_eq!(EntryKind::parse("transfer"), None);
}

#[test]
fn test_payment_method_aliases() {
    assert_eq!(PaymentMethod::parse("wechat"), Some(PaymentMethod::WeChat));
    assert_eq!(PaymentMethod::parse("支付宝"), Some(PaymentMethod::Alipay));
    assert_eq!(
        PaymentMethod::parse("corporate"),
        Some(PaymentMethod::CorporateAccount)
    );
    assert_eq!(PaymentMethod::parse("现金"), Some(PaymentMethod::Cash));
    assert_eq!(PaymentMethod::parse("paypal"), None);
    assert_eq!(PaymentMethod::all().len(), 5);
}

#[test]
fn test_status_toggle() {
    assert_eq!(Status::Open.toggled(), Status::Closed);
    assert_eq!(Status::Closed.toggled(), Status::Open);
    assert_eq!(Status::parse("已结项"), Some(Status::Closed));
}

// ── Amount derivation ────────────────────────────────────────

#[test]
fn test_signed_total() {
    let details = vec![
        ExpenseDetail::new("材料", EntryKind::Expense, dec!(200)),
        ExpenseDetail::new("退款", EntryKind::Income, dec!(50)),
    ];
    assert_eq!(signed_total(&details), dec!(-150));
    assert_eq!(signed_total(&[]), Decimal::ZERO);
}

#[test]
fn test_derive_amount_expense_applies_details() {
    assert_eq!(
        derive_amount(EntryKind::Expense, dec!(1000), dec!(-150)),
        dec!(850)
    );
}

#[test]
fn test_derive_amount_income_ignores_details() {
    assert_eq!(
        derive_amount(EntryKind::Income, dec!(1000), dec!(-150)),
        dec!(1000)
    );
}

#[test]
fn test_valid_month() {
    assert!(is_valid_month(1));
    assert!(is_valid_month(12));
    assert!(!is_valid_month(0));
    assert!(!is_valid_month(13));
}

// ── Years & periods ──────────────────────────────────────────

#[test]
fn test_year_label_validation() {
    assert!(Year::is_valid_label("2025"));
    assert!(!Year::is_valid_label("25"));
    assert!(!Year::is_valid_label("2025年"));
    assert!(!Year::is_valid_label("20a5"));
}

#[test]
fn test_quarter_months() {
    assert_eq!(quarter_months(1), Some(1..=3));
    assert_eq!(quarter_months(4), Some(10..=12));
    assert_eq!(quarter_months(0), None);
    assert_eq!(quarter_months(5), None);
}

#[test]
fn test_period_summary_totals() {
    let period = PeriodSummary {
        year: "2025".into(),
        months: vec![
            MonthlySummary {
                month: 1,
                income: dec!(500),
                expense: dec!(120.50),
            },
            MonthlySummary {
                month: 2,
                income: dec!(300),
                expense: dec!(80),
            },
        ],
    };
    assert_eq!(period.income(), dec!(800));
    assert_eq!(period.expense(), dec!(200.50));
    assert_eq!(period.net(), dec!(599.50));
}

// ── Attachments ──────────────────────────────────────────────

#[test]
fn test_attachment_summary_expense() {
    let attachment = Attachment::Expense {
        details: vec![
            ExpenseDetail::new("材料", EntryKind::Expense, dec!(200)),
            ExpenseDetail::new("退款", EntryKind::Income, dec!(50)),
        ],
    };
    assert_eq!(
        attachment.summary(),
        "材料:200.00, 退款:50.00, 总额:-150.00"
    );
}

#[test]
fn test_attachment_summary_income_without_remark() {
    let attachment = Attachment::Income { remark: None };
    assert_eq!(attachment.summary(), "");
}

#[test]
fn test_hash_secret_is_stable_hex() {
    let hash = hash_secret("123456");
    assert_eq!(hash.len(), 64);
    assert_eq!(
        hash,
        "8d969eef6ecad3c29a3a629280e686cf0c3f5d5a86aff3ca12020c923adc6c92"
    );
    assert_ne!(hash_secret("123457"), hash);
}
