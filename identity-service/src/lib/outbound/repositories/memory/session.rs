use std::collections::HashMap;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::RwLock;

use super::arena::Arena;
use crate::domain::session::models::RevokeOutcome;
use crate::domain::session::models::Session;
use crate::domain::session::models::SessionEnd;
use crate::domain::session::models::SessionId;
use crate::domain::user::models::UserId;
use crate::domain::verification::models::VerificationTokenId;
use crate::session::errors::SessionError;
use crate::session::ports::SessionRepository;

pub struct InMemorySessionRepository {
    sessions: Arena<SessionId, Session>,
    by_user: RwLock<HashMap<UserId, Vec<SessionId>>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self {
            sessions: Arena::new(),
            by_user: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(id: &SessionId) -> SessionError {
    SessionError::NotFound(id.to_string())
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn insert(&self, session: Session) -> Result<Session, SessionError> {
        if !self.sessions.insert(session.id, session.clone()).await {
            return Err(SessionError::DatabaseError(format!(
                "duplicate session id {}",
                session.id
            )));
        }
        self.by_user
            .write()
            .await
            .entry(session.user_id)
            .or_default()
            .push(session.id);

        Ok(session)
    }

    async fn find(&self, id: &SessionId) -> Result<Option<Session>, SessionError> {
        Ok(self.sessions.get(id).await)
    }

    async fn extend(
        &self,
        id: &SessionId,
        new_expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        self.sessions
            .update(id, |session| {
                session.ensure_usable(now)?;
                session.expires_at = new_expiry;
                session.updated_at = now;
                Ok(session.clone())
            })
            .await
            .ok_or_else(|| not_found(id))?
    }

    async fn rotate(
        &self,
        id: &SessionId,
        expected: Option<&VerificationTokenId>,
        next: &VerificationTokenId,
        new_expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        self.sessions
            .update(id, |session| {
                session.apply_rotation(expected, next, new_expiry, now)?;
                Ok(session.clone())
            })
            .await
            .ok_or_else(|| not_found(id))?
    }

    async fn revoke(
        &self,
        id: &SessionId,
        end: SessionEnd,
        now: DateTime<Utc>,
    ) -> Result<RevokeOutcome, SessionError> {
        self.sessions
            .update(id, |session| session.apply_end(end, now))
            .await
            .ok_or_else(|| not_found(id))
    }

    async fn revoke_all(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, SessionError> {
        let ids = self
            .by_user
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default();

        let mut revoked = 0;
        for id in ids {
            let outcome = self
                .sessions
                .update(&id, |session| session.apply_end(SessionEnd::Revoked, now))
                .await;
            if outcome == Some(RevokeOutcome::Revoked) {
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}
