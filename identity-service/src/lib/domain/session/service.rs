use std::sync::Arc;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::domain::session::models::RevokeOutcome;
use crate::domain::session::models::Session;
use crate::domain::session::models::SessionEnd;
use crate::domain::session::models::SessionId;
use crate::domain::user::models::UserId;
use crate::domain::verification::models::VerificationTokenId;
use crate::session::errors::SessionError;
use crate::session::ports::SessionRepository;

/// Session lifecycle on top of a [`SessionRepository`].
///
/// Owns the session lifetime: new sessions and every rotation run until
/// `now + ttl`.
pub struct SessionStore<SR>
where
    SR: SessionRepository,
{
    repository: Arc<SR>,
    ttl: Duration,
}

impl<SR> SessionStore<SR>
where
    SR: SessionRepository,
{
    pub fn new(repository: Arc<SR>, ttl: Duration) -> Self {
        Self { repository, ttl }
    }

    /// Open a session for a freshly authenticated user.
    pub async fn create(&self, user_id: &UserId) -> Result<Session, SessionError> {
        let session = self
            .repository
            .insert(Session::open(*user_id, Utc::now() + self.ttl))
            .await?;

        tracing::debug!(session_id = %session.id, user_id = %user_id, "Session opened");
        Ok(session)
    }

    /// # Errors
    /// * `NotFound` - Session does not exist
    pub async fn get(&self, id: &SessionId) -> Result<Session, SessionError> {
        self.repository
            .find(id)
            .await?
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Extend a usable session to `new_expiry`.
    pub async fn touch(
        &self,
        id: &SessionId,
        new_expiry: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        self.repository.extend(id, new_expiry, Utc::now()).await
    }

    /// Rebind the session to a new refresh token and extend it by one ttl.
    pub async fn rotate(
        &self,
        id: &SessionId,
        expected: Option<&VerificationTokenId>,
        next: &VerificationTokenId,
    ) -> Result<Session, SessionError> {
        let now = Utc::now();
        self.repository
            .rotate(id, expected, next, now + self.ttl, now)
            .await
    }

    /// End a session; ending it again is a no-op.
    pub async fn revoke(
        &self,
        id: &SessionId,
        end: SessionEnd,
    ) -> Result<RevokeOutcome, SessionError> {
        let outcome = self.repository.revoke(id, end, Utc::now()).await?;

        if outcome == RevokeOutcome::Revoked {
            tracing::debug!(session_id = %id, end = ?end, "Session ended");
        }
        Ok(outcome)
    }

    /// Revoke all sessions of a user ("logout everywhere").
    pub async fn revoke_all(&self, user_id: &UserId) -> Result<u64, SessionError> {
        let revoked = self.repository.revoke_all(user_id, Utc::now()).await?;

        tracing::info!(user_id = %user_id, revoked, "Revoked all sessions of user");
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::repositories::memory::InMemorySessionRepository;

    fn store() -> SessionStore<InMemorySessionRepository> {
        SessionStore::new(
            Arc::new(InMemorySessionRepository::new()),
            Duration::hours(1),
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = store();
        let user_id = UserId::new();

        let session = store.create(&user_id).await.unwrap();
        let fetched = store.get(&session.id).await.unwrap();

        assert_eq!(fetched, session);
        assert_eq!(fetched.user_id, user_id);
        assert!(fetched.is_usable(Utc::now()));
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let result = store().get(&SessionId::new()).await;
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_touch_extends_expiry() {
        let store = store();
        let session = store.create(&UserId::new()).await.unwrap();
        let later = session.expires_at + Duration::hours(5);

        let touched = store.touch(&session.id, later).await.unwrap();
        assert_eq!(touched.expires_at, later);
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = store();
        let session = store.create(&UserId::new()).await.unwrap();

        let first = store.revoke(&session.id, SessionEnd::LoggedOut).await.unwrap();
        let second = store.revoke(&session.id, SessionEnd::LoggedOut).await.unwrap();

        assert_eq!(first, RevokeOutcome::Revoked);
        assert_eq!(second, RevokeOutcome::AlreadyRevoked);
        assert!(store.get(&session.id).await.unwrap().revoked);
    }

    #[tokio::test]
    async fn test_touch_after_revoke_fails() {
        let store = store();
        let session = store.create(&UserId::new()).await.unwrap();
        store.revoke(&session.id, SessionEnd::Revoked).await.unwrap();

        let result = store
            .touch(&session.id, Utc::now() + Duration::days(30))
            .await;

        assert!(matches!(result, Err(SessionError::Revoked(_))));
        assert!(store.get(&session.id).await.unwrap().revoked);
    }

    #[tokio::test]
    async fn test_revoke_all_only_touches_owner() {
        let store = store();
        let alice = UserId::new();
        let bob = UserId::new();
        let first = store.create(&alice).await.unwrap();
        let second = store.create(&alice).await.unwrap();
        let other = store.create(&bob).await.unwrap();
        store.revoke(&second.id, SessionEnd::LoggedOut).await.unwrap();

        let revoked = store.revoke_all(&alice).await.unwrap();

        assert_eq!(revoked, 1);
        assert!(store.get(&first.id).await.unwrap().revoked);
        assert!(!store.get(&other.id).await.unwrap().revoked);
    }

    #[tokio::test]
    async fn test_concurrent_rotate_and_revoke_never_resurrects() {
        for _ in 0..50 {
            let store = Arc::new(store());
            let session = store.create(&UserId::new()).await.unwrap();
            let next = VerificationTokenId::new();

            let rotating = {
                let store = Arc::clone(&store);
                let id = session.id;
                tokio::spawn(async move { store.rotate(&id, None, &next).await })
            };
            let revoking = {
                let store = Arc::clone(&store);
                let id = session.id;
                tokio::spawn(async move { store.revoke(&id, SessionEnd::LoggedOut).await })
            };

            let rotated = rotating.await.unwrap();
            revoking.await.unwrap().unwrap();

            let stored = store.get(&session.id).await.unwrap();
            assert!(stored.revoked);
            if rotated.is_err() {
                assert!(matches!(rotated, Err(SessionError::Revoked(_))));
            }
        }
    }
}
