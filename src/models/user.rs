use sha2::{Digest, Sha256};

pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "123456";
pub const DEFAULT_ROLE: &str = "admin";

/// The single credential record. Hashes never leave the database layer.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub security_question: Option<String>,
}

/// Lowercase hex SHA-256 of a secret. Callers hash before talking to the
/// database; the database only ever compares hashes.
pub fn hash_secret(secret: &str) -> String {
    format!("{:x}", Sha256::digest(secret.as_bytes()))
}
