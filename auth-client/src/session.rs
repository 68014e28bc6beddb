use std::sync::PoisonError;
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub session_id: Option<String>,
}

/// Token pair of the logged-in user, shared by every request of one client.
#[derive(Debug, Default)]
pub struct ClientSession {
    tokens: RwLock<Option<SessionTokens>>,
}

impl ClientSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn establish(&self, tokens: SessionTokens) {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Some(tokens);
    }

    /// Store a rotated pair. A session torn down meanwhile stays down.
    pub fn rotate(&self, access_token: String, refresh_token: String) -> bool {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        match tokens.as_mut() {
            Some(current) => {
                current.access_token = access_token;
                current.refresh_token = refresh_token;
                true
            }
            None => false,
        }
    }

    /// Forced logout: forget both tokens.
    pub fn clear(&self) {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn tokens(&self) -> Option<SessionTokens> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens().map(|t| t.access_token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.tokens().map(|t| t.refresh_token)
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
