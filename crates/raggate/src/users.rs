//! User accounts and credential checking.
//!
//! Users are stored in SQLite keyed by username. Authentication goes
//! through the [`CredentialVerifier`] trait so the comparison scheme can
//! change (hashing, external IdP) without touching the handlers. Failed
//! lookups and failed verifications are indistinguishable to callers.

use anyhow::{bail, Result};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use raggate_core::models::User;

/// Compares a supplied password against the stored credential.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, supplied: &str, stored: &str) -> bool;
}

/// Direct string comparison. Matches credentials stored as entered.
pub struct PlaintextVerifier;

impl CredentialVerifier for PlaintextVerifier {
    fn verify(&self, supplied: &str, stored: &str) -> bool {
        supplied == stored
    }
}

/// Username and role, without the credential. Safe to serialize.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub username: String,
    pub role: String,
}

/// An authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub role: String,
}

pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_user(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT username, password, role FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| User {
            username: r.get("username"),
            password: r.get("password"),
            role: r.get("role"),
        }))
    }

    pub async fn add_user(&self, username: &str, password: &str, role: &str) -> Result<()> {
        if username.is_empty() || password.is_empty() || role.is_empty() {
            bail!("username, password and role must all be non-empty");
        }

        let result = sqlx::query("INSERT OR IGNORE INTO users (username, password, role) VALUES (?, ?, ?)")
            .bind(username)
            .bind(password)
            .bind(role)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            bail!("user '{}' already exists", username);
        }
        Ok(())
    }

    /// Update password and/or role for an existing user. Fields left as
    /// `None` keep their current value.
    pub async fn update_user(
        &self,
        username: &str,
        password: Option<&str>,
        role: Option<&str>,
    ) -> Result<()> {
        let Some(current) = self.get_user(username).await? else {
            bail!("user '{}' not found", username);
        };

        let password = password.unwrap_or(&current.password);
        let role = role.unwrap_or(&current.role);
        if password.is_empty() || role.is_empty() {
            bail!("password and role must be non-empty");
        }

        sqlx::query("UPDATE users SET password = ?, role = ? WHERE username = ?")
            .bind(password)
            .bind(role)
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_user(&self, username: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            bail!("user '{}' not found", username);
        }
        Ok(())
    }

    /// All users, credentials omitted, in username order.
    pub async fn list_users(&self) -> Result<Vec<UserSummary>> {
        let rows = sqlx::query("SELECT username, role FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|r| UserSummary {
                username: r.get("username"),
                role: r.get("role"),
            })
            .collect())
    }
}

/// Check credentials. Returns `None` both for an unknown username and a
/// wrong password so responses cannot be used to probe for accounts.
pub async fn authenticate(
    store: &UserStore,
    verifier: &dyn CredentialVerifier,
    username: &str,
    password: &str,
) -> Result<Option<AuthUser>> {
    let Some(user) = store.get_user(username).await? else {
        return Ok(None);
    };

    if !verifier.verify(password, &user.password) {
        return Ok(None);
    }

    Ok(Some(AuthUser {
        username: user.username,
        role: user.role,
    }))
}
