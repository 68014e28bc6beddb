use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::user::errors::UserError;

/// Snapshot of a user's settings handed out at login.
pub type SettingsSnapshot = BTreeMap<String, String>;

/// Persistence operations for the user aggregate.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Persist new user to storage.
    ///
    /// # Arguments
    /// * `user` - User entity to persist
    ///
    /// # Returns
    /// Persisted user entity
    ///
    /// # Errors
    /// * `UsernameAlreadyExists` - Username is already taken
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `DatabaseError` - Database operation failed
    async fn create(&self, user: User) -> Result<User, UserError>;

    /// Retrieve user by identifier.
    ///
    /// # Arguments
    /// * `id` - User ID
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;

    /// Retrieve user by username.
    ///
    /// # Arguments
    /// * `username` - Username to search for
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, UserError>;

    /// Retrieve user by email address.
    ///
    /// # Arguments
    /// * `email` - Normalized email address to search for
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, UserError>;

    /// Replace the stored password hash.
    ///
    /// # Arguments
    /// * `id` - User ID to update
    /// * `password_hash` - Argon2 PHC string of the new password
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `DatabaseError` - Database operation failed
    async fn update_password(&self, id: &UserId, password_hash: &str) -> Result<(), UserError>;

    /// Flag the user's email address as verified.
    ///
    /// # Arguments
    /// * `id` - User ID to update
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `DatabaseError` - Database operation failed
    async fn mark_email_verified(&self, id: &UserId) -> Result<(), UserError>;

    /// Remove user from storage, releasing its username and email.
    ///
    /// # Arguments
    /// * `id` - User ID to delete
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `DatabaseError` - Database operation failed
    async fn delete(&self, id: &UserId) -> Result<(), UserError>;
}

/// Read-only access to user settings (settings CRUD lives in another service).
#[async_trait]
pub trait SettingsRepository: Send + Sync + 'static {
    /// Current settings of a user.
    ///
    /// # Arguments
    /// * `id` - User ID
    ///
    /// # Returns
    /// Key/value settings; empty when none are stored
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn snapshot(&self, id: &UserId) -> Result<SettingsSnapshot, UserError>;
}
