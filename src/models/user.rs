use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::FromSqliteRow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email_verified: bool,
    #[serde(skip_serializing)]
    pub verification_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token_hash: Option<String>,
    pub avatar_key: Option<String>,
    pub is_premium: bool,
    #[serde(skip_serializing)]
    pub payment_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FromSqliteRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            email: row.get("email")?,
            name: row.get("name")?,
            password_hash: row.get("password_hash")?,
            email_verified: row.get("email_verified")?,
            verification_token_hash: row.get("verification_token_hash")?,
            refresh_token_hash: row.get("refresh_token_hash")?,
            avatar_key: row.get("avatar_key")?,
            is_premium: row.get("is_premium")?,
            payment_customer_id: row.get("payment_customer_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

impl User {
    /// Prefix every avatar object key of this user must start with.
    pub fn avatar_prefix(&self) -> String {
        format!("avatars/{}/", self.id)
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterUser {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

impl RegisterUser {
    pub fn validate(&self) -> Result<(), String> {
        let email = normalize_email(&self.email);
        if email.is_empty() || !email.contains('@') || email.starts_with('@') || email.ends_with('@')
        {
            return Err("A valid email is required".to_string());
        }
        if self.password.len() < 8 {
            return Err("Password must be at least 8 characters".to_string());
        }
        if let Some(name) = &self.name {
            if name.chars().count() > 100 {
                return Err("Name must be at most 100 characters".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
