use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use tokio::sync::watch;

use crate::errors::ClientError;
use crate::refresher::TokenRefresher;
use crate::session::ClientSession;

/// Latest outcome published to waiting requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Broadcast {
    Idle,
    Refreshed { generation: u64, access_token: String },
    Failed { generation: u64 },
}

enum Role {
    Leader,
    Waiter(watch::Receiver<Broadcast>),
}

#[derive(Debug, Default)]
struct Flight {
    in_flight: bool,
    generation: u64,
}

/// Collapses concurrent refresh attempts of one client session into a
/// single call to the [`TokenRefresher`].
///
/// The first request that needs a new access token becomes the leader and
/// runs the refresh; every request arriving while it runs subscribes to the
/// broadcast slot and reuses the leader's result. A failed refresh is
/// terminal: the session is cleared and every waiter gets
/// [`ClientError::RefreshFailed`].
pub struct RefreshCoordinator<R: TokenRefresher> {
    session: Arc<ClientSession>,
    refresher: R,
    flight: Mutex<Flight>,
    outcome: watch::Sender<Broadcast>,
    wait_timeout: Duration,
    refresh_timeout: Duration,
}

impl<R: TokenRefresher> RefreshCoordinator<R> {
    pub fn new(
        session: Arc<ClientSession>,
        refresher: R,
        wait_timeout: Duration,
        refresh_timeout: Duration,
    ) -> Self {
        let (outcome, _) = watch::channel(Broadcast::Idle);
        Self {
            session,
            refresher,
            flight: Mutex::new(Flight::default()),
            outcome,
            wait_timeout,
            refresh_timeout,
        }
    }

    pub fn session(&self) -> &Arc<ClientSession> {
        &self.session
    }

    /// Number of refreshes that have completed, successfully or not.
    pub fn generation(&self) -> u64 {
        self.flight().generation
    }

    /// Access token to retry with after `rejected` got a 401.
    ///
    /// # Errors
    /// * `NotAuthenticated` - No session to refresh
    /// * `RefreshFailed` - Refresh was refused; the session is gone
    /// * `Timeout` - Another request's refresh did not finish in time
    pub async fn fresh_access_token(&self, rejected: &str) -> Result<String, ClientError> {
        let role = {
            let mut flight = self.flight();

            match self.session.access_token() {
                None => return Err(ClientError::NotAuthenticated),
                // Someone already refreshed since this request was sent
                Some(current) if current != rejected => return Ok(current),
                Some(_) if flight.in_flight => Role::Waiter(self.outcome.subscribe()),
                Some(_) => {
                    flight.in_flight = true;
                    Role::Leader
                }
            }
        };

        match role {
            Role::Leader => self.lead().await,
            Role::Waiter(waiter) => self.wait(waiter).await,
        }
    }

    async fn wait(&self, mut waiter: watch::Receiver<Broadcast>) -> Result<String, ClientError> {
        match tokio::time::timeout(self.wait_timeout, waiter.changed()).await {
            Err(_) => {
                tracing::debug!("Gave up waiting for token refresh");
                Err(ClientError::Timeout)
            }
            Ok(Err(_)) => Err(ClientError::RefreshFailed),
            Ok(Ok(())) => match &*waiter.borrow_and_update() {
                Broadcast::Refreshed { access_token, .. } => Ok(access_token.clone()),
                Broadcast::Failed { .. } | Broadcast::Idle => Err(ClientError::RefreshFailed),
            },
        }
    }

    async fn lead(&self) -> Result<String, ClientError> {
        let guard = LeaderGuard {
            coordinator: self,
            published: false,
        };

        let Some(refresh_token) = self.session.refresh_token() else {
            guard.publish(None);
            return Err(ClientError::NotAuthenticated);
        };

        let refreshed =
            tokio::time::timeout(self.refresh_timeout, self.refresher.refresh(&refresh_token))
                .await
                .unwrap_or(Err(ClientError::Timeout));

        let tokens = match refreshed {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed, ending session");
                self.session.clear();
                guard.publish(None);
                return Err(ClientError::RefreshFailed);
            }
        };

        let access_token = tokens.access_token;
        if self
            .session
            .rotate(access_token.clone(), tokens.refresh_token)
        {
            guard.publish(Some(access_token.clone()));
            Ok(access_token)
        } else {
            tracing::info!("Session ended during refresh");
            guard.publish(None);
            Err(ClientError::RefreshFailed)
        }
    }

    fn finish(&self, access_token: Option<String>) {
        let mut flight = self.flight();
        flight.generation += 1;
        flight.in_flight = false;

        let generation = flight.generation;
        self.outcome.send_replace(match access_token {
            Some(access_token) => Broadcast::Refreshed {
                generation,
                access_token,
            },
            None => Broadcast::Failed { generation },
        });
    }

    fn flight(&self) -> std::sync::MutexGuard<'_, Flight> {
        self.flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases waiters even when the leader's future is dropped mid-refresh.
struct LeaderGuard<'a, R: TokenRefresher> {
    coordinator: &'a RefreshCoordinator<R>,
    published: bool,
}

impl<R: TokenRefresher> LeaderGuard<'_, R> {
    fn publish(mut self, access_token: Option<String>) {
        self.published = true;
        self.coordinator.finish(access_token);
    }
}

impl<R: TokenRefresher> Drop for LeaderGuard<'_, R> {
    fn drop(&mut self) {
        if !self.published {
            tracing::debug!("Refresh abandoned, releasing waiters");
            self.coordinator.finish(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;
    use mockall::mock;

    use super::*;
    use crate::refresher::RefreshedTokens;
    use crate::session::SessionTokens;

    mock! {
        pub TestRefresher {}

        #[async_trait]
        impl TokenRefresher for TestRefresher {
            async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, ClientError>;
        }
    }

    /// Takes `delay` and hands out `access-<n>` for the n-th call.
    struct SlowRefresher {
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TokenRefresher for SlowRefresher {
        async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedTokens, ClientError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            Ok(RefreshedTokens {
                access_token: format!("access-{}", n),
                refresh_token: format!("refresh-{}", n),
            })
        }
    }

    fn logged_in() -> Arc<ClientSession> {
        let session = Arc::new(ClientSession::new());
        session.establish(SessionTokens {
            access_token: "access-0".to_string(),
            refresh_token: "refresh-0".to_string(),
            session_id: None,
        });
        session
    }

    fn slow(delay: Duration) -> (SlowRefresher, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            SlowRefresher {
                delay,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let (refresher, calls) = slow(Duration::from_millis(50));
        let coordinator = Arc::new(RefreshCoordinator::new(
            logged_in(),
            refresher,
            Duration::from_secs(5),
            Duration::from_secs(5),
        ));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move { coordinator.fresh_access_token("access-0").await })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), Ok("access-1".to_string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.generation(), 1);
        assert_eq!(coordinator.session().refresh_token().as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_stale_rejection_returns_current_token() {
        let mut refresher = MockTestRefresher::new();
        refresher.expect_refresh().times(0);
        let coordinator = RefreshCoordinator::new(
            logged_in(),
            refresher,
            Duration::from_secs(1),
            Duration::from_secs(1),
        );

        let token = coordinator.fresh_access_token("access-old").await;

        assert_eq!(token, Ok("access-0".to_string()));
    }

    #[tokio::test]
    async fn test_refresh_failure_tears_session_down() {
        let mut refresher = MockTestRefresher::new();
        refresher
            .expect_refresh()
            .times(1)
            .returning(|_| Err(ClientError::RefreshFailed));
        let session = logged_in();
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&session),
            refresher,
            Duration::from_secs(1),
            Duration::from_secs(1),
        );

        let result = coordinator.fresh_access_token("access-0").await;

        assert_eq!(result, Err(ClientError::RefreshFailed));
        assert!(!session.is_authenticated());

        // Terminal: nothing left to refresh
        let again = coordinator.fresh_access_token("access-0").await;
        assert_eq!(again, Err(ClientError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_waiter_timeout_is_distinct_and_coordinator_recovers() {
        let (refresher, calls) = slow(Duration::from_millis(300));
        let coordinator = Arc::new(RefreshCoordinator::new(
            logged_in(),
            refresher,
            Duration::from_millis(50),
            Duration::from_secs(5),
        ));

        let leader = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.fresh_access_token("access-0").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let waiter = coordinator.fresh_access_token("access-0").await;
        assert_eq!(waiter, Err(ClientError::Timeout));

        assert_eq!(leader.await.unwrap(), Ok("access-1".to_string()));
        assert!(coordinator.session().is_authenticated());

        // A later rejection of the new token starts a fresh refresh
        let next = coordinator.fresh_access_token("access-1").await;
        assert_eq!(next, Ok("access-2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_leader_releases_waiters() {
        let (refresher, _) = slow(Duration::from_secs(10));
        let coordinator = Arc::new(RefreshCoordinator::new(
            logged_in(),
            refresher,
            Duration::from_secs(5),
            Duration::from_secs(30),
        ));

        let leader = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.fresh_access_token("access-0").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let waiter = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.fresh_access_token("access-0").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();

        let released = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter hung")
            .unwrap();
        assert_eq!(released, Err(ClientError::RefreshFailed));
        assert_eq!(coordinator.generation(), 1);
    }

    #[tokio::test]
    async fn test_slow_refresh_counts_as_failure() {
        let (refresher, _) = slow(Duration::from_millis(200));
        let session = logged_in();
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&session),
            refresher,
            Duration::from_secs(1),
            Duration::from_millis(20),
        );

        let result = coordinator.fresh_access_token("access-0").await;

        assert_eq!(result, Err(ClientError::RefreshFailed));
        assert!(!session.is_authenticated());
    }
}
