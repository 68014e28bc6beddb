use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::FromRow;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::session::models::RevokeOutcome;
use crate::domain::session::models::Session;
use crate::domain::session::models::SessionEnd;
use crate::domain::session::models::SessionId;
use crate::domain::user::models::UserId;
use crate::domain::verification::models::VerificationTokenId;
use crate::session::errors::SessionError;
use crate::session::ports::SessionRepository;

const SESSION_COLUMNS: &str =
    "id, user_id, verification_token, expires_at, complete, revoked, created_at, updated_at";

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    verification_token: Option<Uuid>,
    expires_at: DateTime<Utc>,
    complete: bool,
    revoked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: SessionId(row.id),
            user_id: UserId(row.user_id),
            verification_token: row.verification_token.map(VerificationTokenId),
            expires_at: row.expires_at,
            complete: row.complete,
            revoked: row.revoked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn database_error(e: sqlx::Error) -> SessionError {
    SessionError::DatabaseError(e.to_string())
}

pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explain why a conditional update matched no row.
    async fn refusal(&self, id: &SessionId, now: DateTime<Utc>) -> SessionError {
        match self.find(id).await {
            Ok(Some(session)) => session
                .ensure_usable(now)
                .err()
                .unwrap_or_else(|| SessionError::TokenMismatch(id.to_string())),
            Ok(None) => SessionError::NotFound(id.to_string()),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn insert(&self, session: Session) -> Result<Session, SessionError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, verification_token, expires_at, complete, revoked, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(session.id.0)
        .bind(session.user_id.0)
        .bind(session.verification_token.map(|token| token.0))
        .bind(session.expires_at)
        .bind(session.complete)
        .bind(session.revoked)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(session)
    }

    async fn find(&self, id: &SessionId) -> Result<Option<Session>, SessionError> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(row.map(Session::from))
    }

    async fn extend(
        &self,
        id: &SessionId,
        new_expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            r#"
            UPDATE sessions SET expires_at = $2, updated_at = $3
            WHERE id = $1 AND NOT revoked AND NOT complete AND expires_at > $3
            RETURNING {}
            "#,
            SESSION_COLUMNS
        ))
        .bind(id.0)
        .bind(new_expiry)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(self.refusal(id, now).await),
        }
    }

    async fn rotate(
        &self,
        id: &SessionId,
        expected: Option<&VerificationTokenId>,
        next: &VerificationTokenId,
        new_expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            r#"
            UPDATE sessions SET verification_token = $3, expires_at = $4, updated_at = $5
            WHERE id = $1
              AND verification_token IS NOT DISTINCT FROM $2
              AND NOT revoked AND NOT complete AND expires_at > $5
            RETURNING {}
            "#,
            SESSION_COLUMNS
        ))
        .bind(id.0)
        .bind(expected.map(|token| token.0))
        .bind(next.0)
        .bind(new_expiry)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(self.refusal(id, now).await),
        }
    }

    async fn revoke(
        &self,
        id: &SessionId,
        end: SessionEnd,
        now: DateTime<Utc>,
    ) -> Result<RevokeOutcome, SessionError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET revoked = TRUE, complete = $2, updated_at = $3
            WHERE id = $1 AND NOT revoked
            "#,
        )
        .bind(id.0)
        .bind(end == SessionEnd::LoggedOut)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        if result.rows_affected() > 0 {
            return Ok(RevokeOutcome::Revoked);
        }
        match self.find(id).await? {
            Some(_) => Ok(RevokeOutcome::AlreadyRevoked),
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    async fn revoke_all(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, SessionError> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked = TRUE, updated_at = $2 WHERE user_id = $1 AND NOT revoked",
        )
        .bind(user_id.0)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected())
    }
}
