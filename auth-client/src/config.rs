use std::time::Duration;

/// Endpoints that must never trigger a refresh: they either issue tokens or
/// do not need one. Entries ending in `/` match every path below them.
const EXCLUDED_PATHS: &[&str] = &[
    "/api/auth/login",
    "/api/auth/register",
    "/api/auth/refresh-token",
    "/api/auth/password-reset/",
    "/api/auth/verify-user",
    "/api/auth/invites/accept",
];

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// How long a request waits for a refresh started by another request
    pub refresh_wait_timeout: Duration,
    /// Upper bound on the refresh call itself
    pub refresh_timeout: Duration,
    pub excluded_paths: Vec<String>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            refresh_wait_timeout: Duration::from_secs(10),
            refresh_timeout: Duration::from_secs(10),
            excluded_paths: EXCLUDED_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn with_refresh_wait_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_wait_timeout = timeout;
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Whether a 401 from `path` is passed through untouched.
    pub fn is_excluded(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        self.excluded_paths.iter().any(|excluded| {
            if excluded.ends_with('/') {
                path.starts_with(excluded.as_str())
            } else {
                path == excluded
            }
        })
    }
}
