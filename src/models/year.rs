#[derive(Debug, Clone)]
pub struct Year {
    pub id: i64,
    pub year: String,
    pub created_at: String,
}

impl Year {
    /// Year labels are exactly four ASCII digits.
    pub fn is_valid_label(label: &str) -> bool {
        label.len() == 4 && label.bytes().all(|b| b.is_ascii_digit())
    }
}

impl std::fmt::Display for Year {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.year)
    }
}
