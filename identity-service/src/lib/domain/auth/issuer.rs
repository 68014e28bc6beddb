use auth::Claims;
use auth::JwtHandler;
use auth::TokenKind;
use chrono::DateTime;
use chrono::Utc;

use crate::auth::errors::AuthError;
use crate::domain::auth::models::AccessClaims;
use crate::domain::auth::models::AuthSettings;
use crate::domain::auth::models::RefreshClaims;
use crate::domain::auth::models::TokenPair;
use crate::domain::session::models::SessionId;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;

/// Mints and verifies the signed access/refresh pair.
pub struct TokenIssuer {
    jwt_handler: JwtHandler,
    access_ttl_minutes: i64,
    refresh_ttl_days: i64,
}

impl TokenIssuer {
    /// Token lifetimes come from `settings`, so sessions and tokens share one source.
    pub fn new(secret: &[u8], settings: &AuthSettings) -> Self {
        Self {
            jwt_handler: JwtHandler::new(secret),
            access_ttl_minutes: settings.access_ttl_minutes,
            refresh_ttl_days: settings.refresh_ttl_days,
        }
    }

    /// Sign a pair for `user` in `session_id`.
    ///
    /// `refresh_token_id` becomes the refresh token's `jti`; the session must
    /// still be bound to it when the token is presented.
    pub fn issue(
        &self,
        user: &User,
        session_id: &SessionId,
        refresh_token_id: &str,
    ) -> Result<TokenPair, AuthError> {
        let access = Claims::access(user.id, session_id, self.access_ttl_minutes)
            .with_roles(user.roles.clone())
            .with_username(&user.username);
        let refresh = Claims::refresh(user.id, session_id, self.refresh_ttl_days)
            .with_token_id(refresh_token_id);

        Ok(TokenPair {
            access_token: self.jwt_handler.encode(&access)?,
            refresh_token: self.jwt_handler.encode(&refresh)?,
            access_expires_at: timestamp(access.exp)?,
        })
    }

    /// # Errors
    /// * `InvalidToken` - Bad signature, malformed, expired, or not an access token
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let claims = self.jwt_handler.decode(token, TokenKind::Access)?;

        Ok(AccessClaims {
            user_id: parse_user_id(&claims.sub)?,
            session_id: parse_session_id(&claims.sid)?,
            username: claims.username,
            roles: claims.roles,
            expires_at: timestamp(claims.exp)?,
        })
    }

    /// # Errors
    /// * `InvalidToken` - Bad signature, malformed, expired, or not a refresh token
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        let claims = self.jwt_handler.decode(token, TokenKind::RefreshPair)?;

        Ok(RefreshClaims {
            user_id: parse_user_id(&claims.sub)?,
            session_id: parse_session_id(&claims.sid)?,
            token_id: claims.jti,
        })
    }
}

fn parse_user_id(raw: &str) -> Result<UserId, AuthError> {
    UserId::from_string(raw).map_err(|_| AuthError::InvalidToken)
}

fn parse_session_id(raw: &str) -> Result<SessionId, AuthError> {
    SessionId::from_string(raw).map_err(|_| AuthError::InvalidToken)
}

fn timestamp(seconds: i64) -> Result<DateTime<Utc>, AuthError> {
    DateTime::from_timestamp(seconds, 0).ok_or(AuthError::InvalidToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::models::EmailAddress;
    use crate::domain::user::models::Username;

    const SECRET: &[u8] = b"test_secret_key_at_least_32_bytes_long";

    fn issuer(secret: &[u8], access_ttl_minutes: i64) -> TokenIssuer {
        let settings = AuthSettings {
            access_ttl_minutes,
            ..AuthSettings::default()
        };
        TokenIssuer::new(secret, &settings)
    }

    fn alice() -> User {
        User::register(
            Username::new("alice".to_string()).unwrap(),
            EmailAddress::new("alice@example.com".to_string()).unwrap(),
            "hash".to_string(),
            true,
        )
    }

    #[test]
    fn test_issue_then_verify() {
        let issuer = issuer(SECRET, 15);
        let user = alice();
        let session_id = SessionId::new();

        let pair = issuer.issue(&user, &session_id, "refresh-secret").unwrap();

        let access = issuer.verify_access(&pair.access_token).unwrap();
        assert_eq!(access.user_id, user.id);
        assert_eq!(access.session_id, session_id);
        assert_eq!(access.username.as_deref(), Some("alice"));
        assert_eq!(access.roles, vec!["user".to_string()]);
        assert_eq!(access.expires_at, pair.access_expires_at);

        let refresh = issuer.verify_refresh(&pair.refresh_token).unwrap();
        assert_eq!(refresh.session_id, session_id);
        assert_eq!(refresh.user_id, user.id);
        assert_eq!(refresh.token_id, "refresh-secret");
    }

    #[test]
    fn test_tokens_are_not_interchangeable() {
        let issuer = issuer(SECRET, 15);
        let pair = issuer.issue(&alice(), &SessionId::new(), "rt").unwrap();

        assert_eq!(
            issuer.verify_access(&pair.refresh_token),
            Err(AuthError::InvalidToken)
        );
        assert_eq!(
            issuer.verify_refresh(&pair.access_token),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_foreign_signature_and_garbage_rejected() {
        let issuer = issuer(SECRET, 15);
        let other = self::issuer(b"another_secret_key_at_least_32_bytes", 15);
        let pair = other.issue(&alice(), &SessionId::new(), "rt").unwrap();

        assert_eq!(
            issuer.verify_access(&pair.access_token),
            Err(AuthError::InvalidToken)
        );
        assert_eq!(issuer.verify_access("not.a.jwt"), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_expired_access_token_rejected() {
        let issuer = issuer(SECRET, -1);
        let pair = issuer.issue(&alice(), &SessionId::new(), "rt").unwrap();

        assert_eq!(
            issuer.verify_access(&pair.access_token),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_access_lifetime_follows_settings() {
        let user = alice();
        let session_id = SessionId::new();
        let before = Utc::now();

        let short = issuer(SECRET, 5).issue(&user, &session_id, "rt").unwrap();
        let long = issuer(SECRET, 60).issue(&user, &session_id, "rt").unwrap();

        let short_ttl = short.access_expires_at - before;
        let long_ttl = long.access_expires_at - before;
        assert!(short_ttl <= chrono::Duration::minutes(5));
        assert!(short_ttl > chrono::Duration::minutes(4));
        assert!(long_ttl <= chrono::Duration::minutes(60));
        assert!(long_ttl > chrono::Duration::minutes(59));
    }
}
