use std::sync::Arc;

use auth::token;
use chrono::Duration;
use chrono::Utc;

use crate::domain::verification::models::IssuedToken;
use crate::domain::verification::models::OwnerRef;
use crate::domain::verification::models::VerificationKind;
use crate::domain::verification::models::VerificationToken;
use crate::domain::verification::models::VerificationTokenId;
use crate::verification::errors::VerificationError;
use crate::verification::ports::VerificationTokenRepository;

/// Issues and consumes single-use verification tokens.
pub struct VerificationTokenManager<VR>
where
    VR: VerificationTokenRepository,
{
    repository: Arc<VR>,
}

impl<VR> VerificationTokenManager<VR>
where
    VR: VerificationTokenRepository,
{
    pub fn new(repository: Arc<VR>) -> Self {
        Self { repository }
    }

    /// Issue a token of `kind` for `owner`, valid for `ttl`.
    ///
    /// Any still-pending token of the same kind for the same owner is revoked
    /// first, so only the most recent link works.
    pub async fn issue(
        &self,
        owner: OwnerRef,
        kind: VerificationKind,
        ttl: Duration,
    ) -> Result<IssuedToken, VerificationError> {
        let now = Utc::now();

        let superseded = self
            .repository
            .revoke_outstanding(&owner, kind, now)
            .await?;
        if superseded > 0 {
            tracing::debug!(kind = %kind, superseded, "Revoked outstanding verification tokens");
        }

        let secret = token::generate_secure_token();
        let record = self
            .repository
            .insert(VerificationToken {
                id: VerificationTokenId::new(),
                owner,
                kind,
                token_hash: token::hash_token(&secret),
                expires_at: now + ttl,
                completed: false,
                revoked: false,
                created_at: now,
            })
            .await?;

        Ok(IssuedToken {
            token: secret,
            record,
        })
    }

    /// Validate a token without consuming it.
    ///
    /// # Errors
    /// * `Invalid` - Unknown token, wrong kind, or revoked
    /// * `Expired` - Past its expiry
    /// * `AlreadyUsed` - Already consumed
    pub async fn peek(
        &self,
        token: &str,
        expected: VerificationKind,
    ) -> Result<VerificationToken, VerificationError> {
        let record = self.lookup(token, expected).await?;
        record.check(Utc::now())?;
        Ok(record)
    }

    /// Consume a token exactly once.
    ///
    /// Of any number of concurrent calls with the same token, exactly one
    /// returns the owner; the others get `AlreadyUsed`.
    ///
    /// # Errors
    /// * `Invalid` - Unknown token, wrong kind, or revoked
    /// * `Expired` - Past its expiry
    /// * `AlreadyUsed` - Already consumed
    pub async fn consume(
        &self,
        token: &str,
        expected: VerificationKind,
    ) -> Result<OwnerRef, VerificationError> {
        let record = self.lookup(token, expected).await?;
        let now = Utc::now();
        record.check(now)?;

        if self.repository.complete(&record.id, now).await? {
            return Ok(record.owner);
        }

        // Someone else changed the token between lookup and compare-and-set
        let current = self
            .repository
            .find_by_hash(&record.token_hash)
            .await?
            .ok_or(VerificationError::Invalid)?;
        Err(current
            .check(now)
            .err()
            .unwrap_or(VerificationError::AlreadyUsed))
    }

    /// Revoke pending tokens of `kind` for `owner`.
    pub async fn revoke_outstanding(
        &self,
        owner: &OwnerRef,
        kind: VerificationKind,
    ) -> Result<u64, VerificationError> {
        self.repository
            .revoke_outstanding(owner, kind, Utc::now())
            .await
    }

    async fn lookup(
        &self,
        token: &str,
        expected: VerificationKind,
    ) -> Result<VerificationToken, VerificationError> {
        let record = self
            .repository
            .find_by_hash(&token::hash_token(token))
            .await?
            .ok_or(VerificationError::Invalid)?;

        if record.kind != expected {
            tracing::warn!(
                expected = %expected,
                actual = %record.kind,
                "Verification token presented for the wrong flow"
            );
            return Err(VerificationError::Invalid);
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use mockall::mock;

    use super::*;
    use crate::outbound::repositories::memory::InMemoryVerificationTokenRepository;

    fn manager() -> VerificationTokenManager<InMemoryVerificationTokenRepository> {
        VerificationTokenManager::new(Arc::new(InMemoryVerificationTokenRepository::new()))
    }

    #[tokio::test]
    async fn test_issue_and_consume() {
        let manager = manager();
        let issued = manager
            .issue(
                OwnerRef::new("user-1"),
                VerificationKind::EmailVerify,
                Duration::hours(24),
            )
            .await
            .unwrap();

        assert_ne!(issued.record.token_hash, issued.token);

        let owner = manager
            .consume(&issued.token, VerificationKind::EmailVerify)
            .await
            .unwrap();
        assert_eq!(owner, OwnerRef::new("user-1"));
    }

    #[tokio::test]
    async fn test_reuse_is_already_used_within_expiry() {
        let manager = manager();
        let issued = manager
            .issue(
                OwnerRef::new("user-1"),
                VerificationKind::PasswordReset,
                Duration::hours(1),
            )
            .await
            .unwrap();

        manager
            .consume(&issued.token, VerificationKind::PasswordReset)
            .await
            .unwrap();
        let again = manager
            .consume(&issued.token, VerificationKind::PasswordReset)
            .await;

        assert_eq!(again, Err(VerificationError::AlreadyUsed));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let manager = manager();
        let issued = manager
            .issue(
                OwnerRef::new("user-1"),
                VerificationKind::EmailVerify,
                Duration::zero(),
            )
            .await
            .unwrap();

        let result = manager
            .consume(&issued.token, VerificationKind::EmailVerify)
            .await;
        assert_eq!(result, Err(VerificationError::Expired));
    }

    #[tokio::test]
    async fn test_unknown_and_wrong_kind_are_invalid() {
        let manager = manager();
        let issued = manager
            .issue(
                OwnerRef::new("user-1"),
                VerificationKind::Invite,
                Duration::hours(1),
            )
            .await
            .unwrap();

        assert_eq!(
            manager
                .consume("not-a-token", VerificationKind::Invite)
                .await,
            Err(VerificationError::Invalid)
        );
        assert_eq!(
            manager
                .consume(&issued.token, VerificationKind::PasswordReset)
                .await,
            Err(VerificationError::Invalid)
        );

        // The wrong-kind attempt did not burn the token
        assert!(manager
            .consume(&issued.token, VerificationKind::Invite)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_new_token_supersedes_previous() {
        let manager = manager();
        let owner = OwnerRef::new("user-1");
        let first = manager
            .issue(owner.clone(), VerificationKind::PasswordReset, Duration::hours(1))
            .await
            .unwrap();
        let second = manager
            .issue(owner, VerificationKind::PasswordReset, Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(
            manager
                .consume(&first.token, VerificationKind::PasswordReset)
                .await,
            Err(VerificationError::Invalid)
        );
        assert!(manager
            .consume(&second.token, VerificationKind::PasswordReset)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_peek_does_not_consume() {
        let manager = manager();
        let issued = manager
            .issue(
                OwnerRef::new("a@example.com"),
                VerificationKind::Invite,
                Duration::hours(1),
            )
            .await
            .unwrap();

        let record = manager
            .peek(&issued.token, VerificationKind::Invite)
            .await
            .unwrap();
        assert_eq!(record.owner, OwnerRef::new("a@example.com"));
        assert!(manager
            .consume(&issued.token, VerificationKind::Invite)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_consume_has_single_winner() {
        let manager = Arc::new(manager());
        let issued = manager
            .issue(
                OwnerRef::new("user-1"),
                VerificationKind::PasswordReset,
                Duration::hours(1),
            )
            .await
            .unwrap();

        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let token = issued.token.clone();
                tokio::spawn(async move {
                    manager
                        .consume(&token, VerificationKind::PasswordReset)
                        .await
                })
            })
            .collect();

        let mut successes = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert_eq!(e, VerificationError::AlreadyUsed),
            }
        }
        assert_eq!(successes, 1);
    }

    mock! {
        pub RacingRepository {}

        #[async_trait::async_trait]
        impl VerificationTokenRepository for RacingRepository {
            async fn insert(&self, token: VerificationToken) -> Result<VerificationToken, VerificationError>;
            async fn find_by_hash(&self, token_hash: &str) -> Result<Option<VerificationToken>, VerificationError>;
            async fn complete(&self, id: &VerificationTokenId, now: chrono::DateTime<Utc>) -> Result<bool, VerificationError>;
            async fn revoke_outstanding(&self, owner: &OwnerRef, kind: VerificationKind, now: chrono::DateTime<Utc>) -> Result<u64, VerificationError>;
        }
    }

    #[tokio::test]
    async fn test_lost_compare_and_set_reports_already_used() {
        let mut repository = MockRacingRepository::new();
        let now = Utc::now();
        let record = VerificationToken {
            id: VerificationTokenId::new(),
            owner: OwnerRef::new("user-1"),
            kind: VerificationKind::EmailVerify,
            token_hash: token::hash_token("secret"),
            expires_at: now + Duration::hours(1),
            completed: false,
            revoked: false,
            created_at: now,
        };

        let pending = record.clone();
        let mut completed = record.clone();
        completed.completed = true;
        let mut lookups = 0;
        repository
            .expect_find_by_hash()
            .times(2)
            .returning(move |_| {
                lookups += 1;
                if lookups == 1 {
                    Ok(Some(pending.clone()))
                } else {
                    Ok(Some(completed.clone()))
                }
            });
        repository
            .expect_complete()
            .times(1)
            .returning(|_, _| Ok(false));

        let manager = VerificationTokenManager::new(Arc::new(repository));
        let result = manager
            .consume("secret", VerificationKind::EmailVerify)
            .await;

        assert_eq!(result, Err(VerificationError::AlreadyUsed));
    }
}
