use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::{logged, Database, LedgerError, LedgerResult};
use crate::models::User;

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        role: row.get(2)?,
        security_question: row.get(3)?,
    })
}

impl Database {
    // ── Credentials ──────────────────────────────────────────
    //
    // Every secret arrives already hashed with `hash_secret`.

    pub(crate) fn get_user(&self) -> LedgerResult<Option<User>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, username, role, security_question FROM users WHERE id = 1",
                [],
                map_user,
            )
            .optional()?)
    }

    pub(crate) fn validate_user(&self, username: &str, password_hash: &str) -> LedgerResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username, role, security_question FROM users
                 WHERE username = ?1 AND password_hash = ?2",
                params![username, password_hash],
                map_user,
            )
            .optional()?;
        info!(username, accepted = user.is_some(), "login attempt");
        Ok(user)
    }

    pub(crate) fn security_question(&self, username: &str) -> LedgerResult<Option<String>> {
        let question: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT security_question FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        match question {
            None => logged("security_question", Err(unknown_user(username))),
            Some(q) => Ok(q.filter(|q| !q.trim().is_empty())),
        }
    }

    pub(crate) fn set_security_question(
        &self,
        username: &str,
        question: &str,
        answer_hash: &str,
    ) -> LedgerResult<()> {
        let result = (|| -> LedgerResult<()> {
            if question.trim().is_empty() {
                return Err(LedgerError::Invalid("security question must not be empty".into()));
            }
            let changed = self.conn.execute(
                "UPDATE users SET security_question = ?1, security_answer_hash = ?2
                 WHERE username = ?3",
                params![question.trim(), answer_hash, username],
            )?;
            if changed == 0 {
                return Err(unknown_user(username));
            }
            info!(username, "security question updated");
            Ok(())
        })();
        logged("set_security_question", result)
    }

    /// Reset the password after a correct security answer.
    pub(crate) fn recover_password(
        &self,
        username: &str,
        answer_hash: &str,
        new_password_hash: &str,
    ) -> LedgerResult<()> {
        let result = (|| -> LedgerResult<()> {
            let stored: Option<Option<String>> = self
                .conn
                .query_row(
                    "SELECT security_answer_hash FROM users WHERE username = ?1",
                    params![username],
                    |row| row.get(0),
                )
                .optional()?;
            match stored.ok_or_else(|| unknown_user(username))? {
                None => Err(LedgerError::Invalid(format!(
                    "user {username} has no security question set"
                ))),
                Some(hash) if hash != answer_hash => {
                    Err(LedgerError::Invalid("security answer does not match".into()))
                }
                Some(_) => {
                    self.conn.execute(
                        "UPDATE users SET password_hash = ?1 WHERE username = ?2",
                        params![new_password_hash, username],
                    )?;
                    info!(username, "password recovered");
                    Ok(())
                }
            }
        })();
        logged("recover_password", result)
    }

    pub(crate) fn change_password(
        &self,
        username: &str,
        old_hash: &str,
        new_hash: &str,
    ) -> LedgerResult<()> {
        let result = (|| -> LedgerResult<()> {
            let changed = self.conn.execute(
                "UPDATE users SET password_hash = ?1 WHERE username = ?2 AND password_hash = ?3",
                params![new_hash, username, old_hash],
            )?;
            if changed == 0 {
                return Err(LedgerError::Invalid("username or current password is wrong".into()));
            }
            info!(username, "password changed");
            Ok(())
        })();
        logged("change_password", result)
    }
}

fn unknown_user(username: &str) -> LedgerError {
    LedgerError::NotFound(format!("user {username} does not exist"))
}
