use rust_decimal::Decimal;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlySummary {
    pub month: u32,
    pub income: Decimal,
    pub expense: Decimal,
}

impl MonthlySummary {
    pub fn empty(month: u32) -> Self {
        Self {
            month,
            income: Decimal::ZERO,
            expense: Decimal::ZERO,
        }
    }

    pub fn net(&self) -> Decimal {
        self.income - self.expense
    }
}

/// Month-by-month breakdown of a quarter or a whole year.
#[derive(Debug, Clone)]
pub struct PeriodSummary {
    pub year: String,
    pub months: Vec<MonthlySummary>,
}

impl PeriodSummary {
    pub fn income(&self) -> Decimal {
        self.months.iter().map(|m| m.income).sum()
    }

    pub fn expense(&self) -> Decimal {
        self.months.iter().map(|m| m.expense).sum()
    }

    pub fn net(&self) -> Decimal {
        self.income() - self.expense()
    }
}

pub fn quarter_months(quarter: u32) -> Option<RangeInclusive<u32>> {
    match quarter {
        1..=4 => {
            let start = (quarter - 1) * 3 + 1;
            Some(start..=start + 2)
        }
        _ => None,
    }
}
