//! Authentication utilities library
//!
//! Provides the cryptographic building blocks of the identity service:
//! - Password hashing (Argon2id), with a decoy verification for unknown accounts
//! - Signed token generation and validation (HS256 JWT)
//! - Opaque single-use tokens (random secret + SHA-256 digest for storage)
//!
//! The service owns session and verification semantics; this crate only knows
//! how to mint, sign, hash and compare.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! let is_valid = hasher.verify("my_password", &hash).unwrap();
//! assert!(is_valid);
//! ```
//!
//! ## Password Policy
//! ```
//! use auth::PasswordPolicy;
//!
//! let policy = PasswordPolicy::default();
//! assert!(policy.check("correct-horse").is_ok());
//! assert!(policy.check("short").is_err());
//! ```
//!
//! ## Signed Tokens
//! ```
//! use auth::{Claims, JwtHandler, TokenKind};
//!
//! let handler = JwtHandler::new(b"secret_key_at_least_32_bytes_long!");
//! let claims = Claims::access("user123", "session456", 15);
//! let token = handler.encode(&claims).unwrap();
//! let decoded = handler.decode(&token, TokenKind::Access).unwrap();
//! assert_eq!(decoded.sid, "session456");
//! ```
//!
//! ## Opaque Tokens
//! ```
//! use auth::token;
//!
//! let raw = token::generate_secure_token();
//! let digest = token::hash_token(&raw);
//! assert_eq!(digest, token::hash_token(&raw));
//! assert_ne!(digest, raw);
//! ```

pub mod jwt;
pub mod password;
pub mod token;

// Re-export commonly used items
pub use jwt::Claims;
pub use jwt::JwtError;
pub use jwt::JwtHandler;
pub use jwt::TokenKind;
pub use password::PasswordError;
pub use password::PasswordHasher;
pub use password::PasswordPolicy;
