use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::FromRow;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::verification::models::OwnerRef;
use crate::domain::verification::models::VerificationKind;
use crate::domain::verification::models::VerificationToken;
use crate::domain::verification::models::VerificationTokenId;
use crate::verification::errors::VerificationError;
use crate::verification::ports::VerificationTokenRepository;

#[derive(FromRow)]
struct VerificationTokenRow {
    id: Uuid,
    owner: String,
    kind: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
    completed: bool,
    revoked: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<VerificationTokenRow> for VerificationToken {
    type Error = VerificationError;

    fn try_from(row: VerificationTokenRow) -> Result<Self, Self::Error> {
        Ok(VerificationToken {
            id: VerificationTokenId(row.id),
            owner: OwnerRef::new(row.owner),
            kind: row.kind.parse()?,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            completed: row.completed,
            revoked: row.revoked,
            created_at: row.created_at,
        })
    }
}

fn database_error(e: sqlx::Error) -> VerificationError {
    VerificationError::DatabaseError(e.to_string())
}

pub struct PostgresVerificationTokenRepository {
    pool: PgPool,
}

impl PostgresVerificationTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VerificationTokenRepository for PostgresVerificationTokenRepository {
    async fn insert(
        &self,
        token: VerificationToken,
    ) -> Result<VerificationToken, VerificationError> {
        sqlx::query(
            r#"
            INSERT INTO verification_tokens (id, owner, kind, token_hash, expires_at, completed, revoked, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token.id.0)
        .bind(token.owner.as_str())
        .bind(token.kind.as_str())
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.completed)
        .bind(token.revoked)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(token)
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>, VerificationError> {
        let row: Option<VerificationTokenRow> = sqlx::query_as(
            r#"
            SELECT id, owner, kind, token_hash, expires_at, completed, revoked, created_at
            FROM verification_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        row.map(VerificationToken::try_from).transpose()
    }

    async fn complete(
        &self,
        id: &VerificationTokenId,
        now: DateTime<Utc>,
    ) -> Result<bool, VerificationError> {
        let result = sqlx::query(
            r#"
            UPDATE verification_tokens SET completed = TRUE
            WHERE id = $1 AND NOT completed AND NOT revoked AND expires_at > $2
            "#,
        )
        .bind(id.0)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_outstanding(
        &self,
        owner: &OwnerRef,
        kind: VerificationKind,
        now: DateTime<Utc>,
    ) -> Result<u64, VerificationError> {
        let result = sqlx::query(
            r#"
            UPDATE verification_tokens SET revoked = TRUE
            WHERE owner = $1 AND kind = $2 AND NOT completed AND NOT revoked AND expires_at > $3
            "#,
        )
        .bind(owner.as_str())
        .bind(kind.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected())
    }
}
