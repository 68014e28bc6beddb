use std::collections::HashMap;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::RwLock;

use super::arena::Arena;
use crate::domain::verification::models::OwnerRef;
use crate::domain::verification::models::VerificationKind;
use crate::domain::verification::models::VerificationToken;
use crate::domain::verification::models::VerificationTokenId;
use crate::verification::errors::VerificationError;
use crate::verification::ports::VerificationTokenRepository;

#[derive(Default)]
struct Indexes {
    by_hash: HashMap<String, VerificationTokenId>,
    by_owner: HashMap<(OwnerRef, VerificationKind), Vec<VerificationTokenId>>,
}

pub struct InMemoryVerificationTokenRepository {
    tokens: Arena<VerificationTokenId, VerificationToken>,
    indexes: RwLock<Indexes>,
}

impl InMemoryVerificationTokenRepository {
    pub fn new() -> Self {
        Self {
            tokens: Arena::new(),
            indexes: RwLock::new(Indexes::default()),
        }
    }
}

impl Default for InMemoryVerificationTokenRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VerificationTokenRepository for InMemoryVerificationTokenRepository {
    async fn insert(
        &self,
        token: VerificationToken,
    ) -> Result<VerificationToken, VerificationError> {
        let mut indexes = self.indexes.write().await;
        if indexes.by_hash.contains_key(&token.token_hash)
            || !self.tokens.insert(token.id, token.clone()).await
        {
            return Err(VerificationError::DatabaseError(
                "duplicate verification token".to_string(),
            ));
        }

        indexes.by_hash.insert(token.token_hash.clone(), token.id);
        indexes
            .by_owner
            .entry((token.owner.clone(), token.kind))
            .or_default()
            .push(token.id);

        Ok(token)
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>, VerificationError> {
        let id = self.indexes.read().await.by_hash.get(token_hash).copied();
        match id {
            Some(id) => Ok(self.tokens.get(&id).await),
            None => Ok(None),
        }
    }

    async fn complete(
        &self,
        id: &VerificationTokenId,
        now: DateTime<Utc>,
    ) -> Result<bool, VerificationError> {
        Ok(self
            .tokens
            .update(id, |token| token.try_complete(now))
            .await
            .unwrap_or(false))
    }

    async fn revoke_outstanding(
        &self,
        owner: &OwnerRef,
        kind: VerificationKind,
        now: DateTime<Utc>,
    ) -> Result<u64, VerificationError> {
        let ids = self
            .indexes
            .read()
            .await
            .by_owner
            .get(&(owner.clone(), kind))
            .cloned()
            .unwrap_or_default();

        let mut revoked = 0;
        for id in ids {
            let pending = self
                .tokens
                .update(&id, |token| {
                    if token.is_pending(now) {
                        token.revoked = true;
                        true
                    } else {
                        false
                    }
                })
                .await;
            if pending == Some(true) {
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}
