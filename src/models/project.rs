#[derive(Debug, Clone)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub year_id: i64,
    pub year: String,
    /// Month the project was opened in, if pinned.
    pub month: Option<u32>,
    pub created_at: String,
}

impl std::fmt::Display for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Search result pointing at the period an income transaction was booked in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectHit {
    pub project_id: i64,
    pub name: String,
    pub year: String,
    pub month: u32,
}
