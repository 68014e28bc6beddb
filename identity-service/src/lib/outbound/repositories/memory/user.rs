use std::collections::HashMap;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::sync::RwLock;

use super::arena::Arena;
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

#[derive(Debug, Clone)]
struct UserRecord {
    user: User,
    attempts: AttemptState,
}

impl UserRecord {
    fn credential(&self) -> Credential {
        Credential {
            user_id: self.user.id,
            password_hash: self.user.password_hash.clone(),
            failed_attempts: self.attempts.failed_attempts,
            lockout_until: self.attempts.lockout_until,
        }
    }
}

#[derive(Default)]
struct UniqueKeys {
    usernames: HashMap<Username, UserId>,
    emails: HashMap<EmailAddress, UserId>,
}

/// Users with their credentials and settings.
///
/// Implements [`UserRepository`], [`CredentialRepository`] and
/// [`SettingsRepository`] over the same records.
pub struct InMemoryUserRepository {
    records: Arena<UserId, UserRecord>,
    unique_keys: Mutex<UniqueKeys>,
    settings: RwLock<HashMap<UserId, SettingsSnapshot>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            records: Arena::new(),
            unique_keys: Mutex::new(UniqueKeys::default()),
            settings: RwLock::new(HashMap::new()),
        }
    }

    /// Store one setting for a user.
    pub async fn put_setting(&self, user_id: &UserId, key: &str, value: &str) {
        self.settings
            .write()
            .await
            .entry(*user_id)
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    async fn id_for(&self, identifier: &Identifier) -> Option<UserId> {
        let keys = self.unique_keys.lock().await;
        match identifier {
            Identifier::Username(username) => keys.usernames.get(username).copied(),
            Identifier::Email(email) => keys.emails.get(email).copied(),
        }
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, UserError> {
        let mut keys = self.unique_keys.lock().await;
        if keys.usernames.contains_key(&user.username) {
            return Err(UserError::UsernameAlreadyExists(user.username.to_string()));
        }
        if keys.emails.contains_key(&user.email) {
            return Err(UserError::EmailAlreadyExists(user.email.to_string()));
        }

        let record = UserRecord {
            user: user.clone(),
            attempts: AttemptState::default(),
        };
        if !self.records.insert(user.id, record).await {
            return Err(UserError::DatabaseError(format!(
                "duplicate user id {}",
                user.id
            )));
        }
        keys.usernames.insert(user.username.clone(), user.id);
        keys.emails.insert(user.email.clone(), user.id);

        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        Ok(self.records.get(id).await.map(|record| record.user))
    }

    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, UserError> {
        let identifier = Identifier::Username(username.clone());
        match self.id_for(&identifier).await {
            Some(id) => self.find_by_id(&id).await,
            None => Ok(None),
        }
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, UserError> {
        let identifier = Identifier::Email(email.clone());
        match self.id_for(&identifier).await {
            Some(id) => self.find_by_id(&id).await,
            None => Ok(None),
        }
    }

    async fn update_password(&self, id: &UserId, password_hash: &str) -> Result<(), UserError> {
        self.records
            .update(id, |record| record.user.password_hash = password_hash.to_string())
            .await
            .ok_or_else(|| UserError::NotFound(id.to_string()))
    }

    async fn mark_email_verified(&self, id: &UserId) -> Result<(), UserError> {
        self.records
            .update(id, |record| record.user.email_verified = true)
            .await
            .ok_or_else(|| UserError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &UserId) -> Result<(), UserError> {
        let mut keys = self.unique_keys.lock().await;
        let record = self
            .records
            .get(id)
            .await
            .ok_or_else(|| UserError::NotFound(id.to_string()))?;

        self.records.remove(id).await;
        keys.usernames.remove(&record.user.username);
        keys.emails.remove(&record.user.email);
        drop(keys);

        self.settings.write().await.remove(id);
        Ok(())
    }
}

#[async_trait]
impl CredentialRepository for InMemoryUserRepository {
    async fn find_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<Credential>, CredentialError> {
        let Some(id) = self.id_for(identifier).await else {
            return Ok(None);
        };
        Ok(self.records.get(&id).await.map(|record| record.credential()))
    }

    async fn record_failure(
        &self,
        user_id: &UserId,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<AttemptState, CredentialError> {
        self.records
            .update(user_id, |record| {
                record.attempts = record.attempts.register_failure(policy, now);
                record.attempts
            })
            .await
            .ok_or_else(|| CredentialError::NotFound(user_id.to_string()))
    }

    async fn reset_failures(&self, user_id: &UserId) -> Result<(), CredentialError> {
        self.records
            .update(user_id, |record| record.attempts = AttemptState::default())
            .await
            .ok_or_else(|| CredentialError::NotFound(user_id.to_string()))
    }
}

#[async_trait]
impl SettingsRepository for InMemoryUserRepository {
    async fn snapshot(&self, id: &UserId) -> Result<SettingsSnapshot, UserError> {
        Ok(self
            .settings
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default())
    }
}
