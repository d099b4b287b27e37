use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::db::{with_conn, DbPool};
use crate::error::{AppError, Result};
use crate::models::user::normalize_email;
use crate::models::{FromSqliteRow, User};
use crate::session::{generate_token, hash_token};

#[derive(Clone)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let id = id.to_string();
        with_conn(&self.pool, move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM users WHERE id = ?")?;
            let result = stmt.query_row([&id], User::from_row).optional()?;
            Ok(result)
        })
        .await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        with_conn(&self.pool, move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM users WHERE email = ?")?;
            let result = stmt.query_row([&email], User::from_row).optional()?;
            Ok(result)
        })
        .await
    }

    /// Create an unverified user. Returns the user and the raw verification
    /// token; only its hash is stored.
    pub async fn create(
        &self,
        email: &str,
        name: Option<&str>,
        password: &str,
    ) -> Result<(User, String)> {
        let email = normalize_email(email);
        if self.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let password_hash = hash_password(password)?;
        let verification_token = generate_token();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email,
            name: name
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            password_hash,
            email_verified: false,
            verification_token_hash: Some(hash_token(&verification_token)),
            refresh_token_hash: None,
            avatar_key: None,
            is_premium: false,
            payment_customer_id: None,
            created_at: Utc::now(),
        };
        let user_clone = user.clone();

        with_conn(&self.pool, move |conn| {
            conn.execute(
                "INSERT INTO users (id, email, name, password_hash, email_verified,
                                    verification_token_hash, created_at)
                 VALUES (?, ?, ?, ?, 0, ?, ?)",
                rusqlite::params![
                    user_clone.id,
                    user_clone.email,
                    user_clone.name,
                    user_clone.password_hash,
                    user_clone.verification_token_hash,
                    user_clone.created_at
                ],
            )
            .map_err(insert_error)?;
            Ok(())
        })
        .await?;

        Ok((user, verification_token))
    }

    pub async fn verify_password(&self, email: &str, password: &str) -> Result<Option<User>> {
        let user = self.find_by_email(email).await?;

        match user {
            Some(user) => {
                if verify_password(password, &user.password_hash)? {
                    Ok(Some(user))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    /// Mark the owner of `token` as verified and burn the token.
    pub async fn verify_email(&self, token: &str) -> Result<Option<User>> {
        let token_hash = hash_token(token);
        with_conn(&self.pool, move |conn| {
            let tx = conn.transaction()?;
            let user = tx
                .query_row(
                    "SELECT * FROM users WHERE verification_token_hash = ?",
                    [&token_hash],
                    User::from_row,
                )
                .optional()?;

            let Some(mut user) = user else {
                return Ok(None);
            };

            tx.execute(
                "UPDATE users SET email_verified = 1, verification_token_hash = NULL WHERE id = ?",
                [&user.id],
            )?;
            tx.commit()?;

            user.email_verified = true;
            user.verification_token_hash = None;
            Ok(Some(user))
        })
        .await
    }

    /// Replace the stored verification token. Returns the new raw token.
    pub async fn reset_verification_token(&self, id: &str) -> Result<String> {
        let token = generate_token();
        let token_hash = hash_token(&token);
        let id = id.to_string();
        with_conn(&self.pool, move |conn| {
            conn.execute(
                "UPDATE users SET verification_token_hash = ? WHERE id = ?",
                rusqlite::params![token_hash, id],
            )?;
            Ok(())
        })
        .await?;
        Ok(token)
    }

    /// Store (or clear, with `None`) the hash of the user's refresh token.
    pub async fn set_refresh_token_hash(&self, id: &str, token_hash: Option<&str>) -> Result<()> {
        let id = id.to_string();
        let token_hash = token_hash.map(str::to_string);
        with_conn(&self.pool, move |conn| {
            conn.execute(
                "UPDATE users SET refresh_token_hash = ? WHERE id = ?",
                rusqlite::params![token_hash, id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn find_by_refresh_token_hash(&self, token_hash: &str) -> Result<Option<User>> {
        let token_hash = token_hash.to_string();
        with_conn(&self.pool, move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM users WHERE refresh_token_hash = ?")?;
            let result = stmt.query_row([&token_hash], User::from_row).optional()?;
            Ok(result)
        })
        .await
    }

    /// Swap `old_hash` for `new_hash` only if `old_hash` is still current.
    /// A concurrent refresh that already rotated the token makes this a no-op.
    pub async fn rotate_refresh_token_hash(
        &self,
        id: &str,
        old_hash: &str,
        new_hash: &str,
    ) -> Result<bool> {
        let id = id.to_string();
        let old_hash = old_hash.to_string();
        let new_hash = new_hash.to_string();
        with_conn(&self.pool, move |conn| {
            let rows = conn.execute(
                "UPDATE users SET refresh_token_hash = ? WHERE id = ? AND refresh_token_hash = ?",
                rusqlite::params![new_hash, id, old_hash],
            )?;
            Ok(rows > 0)
        })
        .await
    }

    pub async fn set_avatar_key(&self, id: &str, avatar_key: &str) -> Result<bool> {
        let id = id.to_string();
        let avatar_key = avatar_key.to_string();
        with_conn(&self.pool, move |conn| {
            let rows = conn.execute(
                "UPDATE users SET avatar_key = ? WHERE id = ?",
                rusqlite::params![avatar_key, id],
            )?;
            Ok(rows > 0)
        })
        .await
    }

    /// Update premium status. A `None` customer id keeps the stored one.
    pub async fn set_premium(
        &self,
        id: &str,
        is_premium: bool,
        customer_id: Option<&str>,
    ) -> Result<bool> {
        let id = id.to_string();
        let customer_id = customer_id.map(str::to_string);
        with_conn(&self.pool, move |conn| {
            let rows = conn.execute(
                "UPDATE users
                 SET is_premium = ?, payment_customer_id = COALESCE(?, payment_customer_id)
                 WHERE id = ?",
                rusqlite::params![is_premium, customer_id, id],
            )?;
            Ok(rows > 0)
        })
        .await
    }

    pub async fn find_by_payment_customer(&self, customer_id: &str) -> Result<Option<User>> {
        let customer_id = customer_id.to_string();
        with_conn(&self.pool, move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM users WHERE payment_customer_id = ?")?;
            let result = stmt.query_row([&customer_id], User::from_row).optional()?;
            Ok(result)
        })
        .await
    }

    /// Delete the account and everything it owns in one transaction.
    pub async fn delete_cascade(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        with_conn(&self.pool, move |conn| {
            let tx = conn.transaction()?;

            tx.execute("DELETE FROM set_history WHERE user_id = ?", [&id])?;
            // Sets and workout rows that reference the user's workouts or the
            // user's custom exercises.
            tx.execute(
                "DELETE FROM sets WHERE workout_exercise_id IN (
                    SELECT we.id FROM workout_exercises we
                    LEFT JOIN workouts w ON w.id = we.workout_id
                    LEFT JOIN exercises e ON e.id = we.exercise_id
                    WHERE w.user_id = ?1 OR e.user_id = ?1
                 )",
                [&id],
            )?;
            tx.execute(
                "DELETE FROM workout_exercises WHERE
                    workout_id IN (SELECT id FROM workouts WHERE user_id = ?1)
                    OR exercise_id IN (SELECT id FROM exercises WHERE user_id = ?1)",
                [&id],
            )?;
            tx.execute("DELETE FROM workouts WHERE user_id = ?", [&id])?;
            tx.execute("DELETE FROM exercises WHERE user_id = ?", [&id])?;
            let rows = tx.execute("DELETE FROM users WHERE id = ?", [&id])?;

            tx.commit()?;
            Ok(rows > 0)
        })
        .await
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AppError::PasswordHash)?
        .to_string();
    Ok(password_hash)
}

/// A concurrent registration of the same email can pass the lookup in
/// `create`; the UNIQUE index still rejects the second insert.
fn insert_error(e: rusqlite::Error) -> AppError {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            AppError::Conflict("Email is already registered".to_string())
        }
        e => AppError::from(e),
    }
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AppError::PasswordHash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
