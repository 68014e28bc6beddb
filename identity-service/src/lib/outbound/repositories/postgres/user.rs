use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::FromRow;
use sqlx::PgPool;
use uuid::Uuid;

use crate::credential::errors::CredentialError;
use crate::credential::ports::CredentialRepository;
use crate::domain::credential::models::AttemptState;
use crate::domain::credential::models::Credential;
use crate::domain::credential::models::LockoutPolicy;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Identifier;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::domain::user::ports::SettingsRepository;
use crate::domain::user::ports::SettingsSnapshot;
use crate::domain::user::ports::UserRepository;
use crate::user::errors::UserError;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, roles, email_verified, created_at";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    roles: Vec<String>,
    email_verified: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = UserError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId(row.id),
            username: Username::new(row.username)?,
            email: EmailAddress::new(row.email)?,
            password_hash: row.password_hash,
            roles: row.roles,
            email_verified: row.email_verified,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialRow {
    id: Uuid,
    password_hash: String,
    failed_attempts: i32,
    lockout_until: Option<DateTime<Utc>>,
}

#[derive(FromRow)]
struct AttemptRow {
    failed_attempts: i32,
    lockout_until: Option<DateTime<Utc>>,
}

fn attempts(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

/// Users table, including the credential columns and `user_settings`.
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<User>, UserError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE {} = $1",
            USER_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: User) -> Result<User, UserError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, roles, email_verified, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id.0)
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(&user.roles)
        .bind(user.email_verified)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    if db_err.constraint() == Some("users_username_key") {
                        return UserError::UsernameAlreadyExists(
                            user.username.as_str().to_string(),
                        );
                    }
                    if db_err.constraint() == Some("users_email_key") {
                        return UserError::EmailAlreadyExists(user.email.as_str().to_string());
                    }
                }
            }
            UserError::DatabaseError(e.to_string())
        })?;

        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, UserError> {
        self.find_one("username", username.as_str()).await
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, UserError> {
        self.find_one("email", email.as_str()).await
    }

    async fn update_password(&self, id: &UserId, password_hash: &str) -> Result<(), UserError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id.0)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn mark_email_verified(&self, id: &UserId) -> Result<(), UserError> {
        let result = sqlx::query("UPDATE users SET email_verified = TRUE WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: &UserId) -> Result<(), UserError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialRepository for PostgresUserRepository {
    async fn find_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<Credential>, CredentialError> {
        let (column, value) = match identifier {
            Identifier::Username(username) => ("username", username.as_str()),
            Identifier::Email(email) => ("email", email.as_str()),
        };

        let row: Option<CredentialRow> = sqlx::query_as(&format!(
            "SELECT id, password_hash, failed_attempts, lockout_until FROM users WHERE {} = $1",
            column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CredentialError::DatabaseError(e.to_string()))?;

        Ok(row.map(|r| Credential {
            user_id: UserId(r.id),
            password_hash: r.password_hash,
            failed_attempts: attempts(r.failed_attempts),
            lockout_until: r.lockout_until,
        }))
    }

    async fn record_failure(
        &self,
        user_id: &UserId,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<AttemptState, CredentialError> {
        // Single statement mirroring AttemptState::register_failure; the
        // right-hand sides all see the pre-update row.
        let row: Option<AttemptRow> = sqlx::query_as(
            r#"
            UPDATE users SET
                failed_attempts = CASE
                    WHEN lockout_until > $2 THEN failed_attempts
                    WHEN lockout_until IS NOT NULL THEN 1
                    ELSE failed_attempts + 1
                END,
                lockout_until = CASE
                    WHEN lockout_until > $2 THEN lockout_until
                    WHEN lockout_until IS NOT NULL AND 1 >= $3 THEN $4
                    WHEN lockout_until IS NULL AND failed_attempts + 1 >= $3 THEN $4
                    ELSE NULL
                END
            WHERE id = $1
            RETURNING failed_attempts, lockout_until
            "#,
        )
        .bind(user_id.0)
        .bind(now)
        .bind(i32::try_from(policy.max_attempts).unwrap_or(i32::MAX))
        .bind(now + policy.cooldown)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CredentialError::DatabaseError(e.to_string()))?;

        let row = row.ok_or_else(|| CredentialError::NotFound(user_id.to_string()))?;
        Ok(AttemptState {
            failed_attempts: attempts(row.failed_attempts),
            lockout_until: row.lockout_until,
        })
    }

    async fn reset_failures(&self, user_id: &UserId) -> Result<(), CredentialError> {
        sqlx::query("UPDATE users SET failed_attempts = 0, lockout_until = NULL WHERE id = $1")
            .bind(user_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| CredentialError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for PostgresUserRepository {
    async fn snapshot(&self, id: &UserId) -> Result<SettingsSnapshot, UserError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM user_settings WHERE user_id = $1")
                .bind(id.0)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().collect())
    }
}
