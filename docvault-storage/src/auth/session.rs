//! Process-wide authorization session.
//!
//! The session owns the current token and walks it through
//! `Uninitialized -> Authorized -> Expired -> Refreshing -> Authorized`.
//! Every caller goes through one async mutex, so load/refresh/save happen
//! with a single writer even when several tasks share the session.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::token::{OAuthToken, TokenStore};
use crate::error::{Result, StorageError};

/// Lifecycle of the session's token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing loaded from the token store yet.
    Uninitialized,
    /// Holding a token that is currently valid.
    Authorized,
    /// Holding a token that needs refreshing or re-consent.
    Expired,
    /// A refresh request is in flight.
    Refreshing,
}

/// Ways of obtaining a fresh token from the authorization server.
#[async_trait]
pub trait AuthFlow: Send + Sync {
    /// Exchange the refresh token of `token` for a new access token.
    async fn refresh(&self, token: &OAuthToken) -> Result<OAuthToken>;

    /// Run the one-time interactive consent flow.
    async fn authorize(&self) -> Result<OAuthToken>;
}

struct SessionInner {
    state: SessionState,
    token: Option<OAuthToken>,
}

/// Lazily authorized handle shared by every upload.
pub struct AuthSession {
    store: Arc<dyn TokenStore>,
    flow: Arc<dyn AuthFlow>,
    inner: Mutex<SessionInner>,
}

impl AuthSession {
    pub fn new(store: Arc<dyn TokenStore>, flow: Arc<dyn AuthFlow>) -> Self {
        Self {
            store,
            flow,
            inner: Mutex::new(SessionInner {
                state: SessionState::Uninitialized,
                token: None,
            }),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Return a usable access token, loading, refreshing or re-authorizing
    /// as needed. New tokens are persisted before being returned.
    pub async fn access_token(&self) -> Result<String> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        if inner.state == SessionState::Uninitialized {
            inner.token = self.store.load()?;
            inner.state = SessionState::Expired;
            debug!(found = inner.token.is_some(), "Loaded persisted token");
        }

        if let Some(token) = inner.token.as_ref() {
            if token.is_valid() {
                inner.state = SessionState::Authorized;
                return Ok(token.access_token.clone());
            }
        }
        inner.state = SessionState::Expired;

        let refreshable = inner.token.as_ref().filter(|t| t.can_refresh()).cloned();
        let fresh = match refreshable {
            Some(old) => {
                inner.state = SessionState::Refreshing;
                info!("Refreshing expired access token");
                match self.flow.refresh(&old).await {
                    // Refresh responses usually omit the refresh token.
                    Ok(mut fresh) => {
                        if fresh.refresh_token.is_none() {
                            fresh.refresh_token = old.refresh_token.clone();
                        }
                        fresh
                    }
                    Err(e) => {
                        inner.state = SessionState::Expired;
                        warn!(error = %e, "Token refresh failed");
                        return Err(match e {
                            StorageError::Auth(_) => e,
                            other => StorageError::Auth(format!("token refresh failed: {}", other)),
                        });
                    }
                }
            }
            None => {
                info!("No usable token, starting interactive authorization");
                self.flow.authorize().await.map_err(|e| match e {
                    StorageError::Auth(_) => e,
                    other => StorageError::Auth(format!("authorization failed: {}", other)),
                })?
            }
        };

        if let Err(e) = self.store.save(&fresh) {
            error!(
                error = %e,
                "Failed to persist token; the next restart will need to authorize again"
            );
        }
        let access = fresh.access_token.clone();
        inner.token = Some(fresh);
        inner.state = SessionState::Authorized;
        Ok(access)
    }

    /// Mark the held token as unusable, e.g. after the server answered 401.
    pub async fn invalidate(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(token) = inner.token.as_mut() {
            token.expiry = Some(chrono::Utc::now());
        }
        if inner.state != SessionState::Uninitialized {
            inner.state = SessionState::Expired;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::MemoryTokenStore;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeFlow {
        refreshes: AtomicUsize,
        authorizations: AtomicUsize,
        fail_refresh: bool,
    }

    #[async_trait]
    impl AuthFlow for FakeFlow {
        async fn refresh(&self, _token: &OAuthToken) -> Result<OAuthToken> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.fail_refresh {
                return Err(StorageError::Auth("invalid_grant".to_string()));
            }
            Ok(OAuthToken {
                access_token: "refreshed".to_string(),
                refresh_token: None,
                expiry: Some(Utc::now() + Duration::hours(1)),
                scopes: vec![],
            })
        }

        async fn authorize(&self) -> Result<OAuthToken> {
            self.authorizations.fetch_add(1, Ordering::SeqCst);
            Ok(OAuthToken {
                access_token: "consented".to_string(),
                refresh_token: Some("new-refresh".to_string()),
                expiry: Some(Utc::now() + Duration::hours(1)),
                scopes: vec![],
            })
        }
    }

    fn expired_token() -> OAuthToken {
        OAuthToken {
            access_token: "stale".to_string(),
            refresh_token: Some("old-refresh".to_string()),
            expiry: Some(Utc::now() - Duration::minutes(5)),
            scopes: vec![],
        }
    }

    #[tokio::test]
    async fn test_valid_persisted_token_is_used_as_is() {
        let valid = OAuthToken {
            expiry: Some(Utc::now() + Duration::hours(2)),
            access_token: "good".to_string(),
            ..expired_token()
        };
        let store = Arc::new(MemoryTokenStore::with_token(valid));
        let flow = Arc::new(FakeFlow::default());
        let session = AuthSession::new(store.clone(), flow.clone());

        assert_eq!(session.state().await, SessionState::Uninitialized);
        assert_eq!(session.access_token().await.unwrap(), "good");
        assert_eq!(session.state().await, SessionState::Authorized);
        assert_eq!(flow.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_persisted() {
        let store = Arc::new(MemoryTokenStore::with_token(expired_token()));
        let flow = Arc::new(FakeFlow::default());
        let session = AuthSession::new(store.clone(), flow.clone());

        assert_eq!(session.access_token().await.unwrap(), "refreshed");
        assert_eq!(flow.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(store.save_count(), 1);

        let saved = store.current().unwrap();
        assert_eq!(saved.refresh_token.as_deref(), Some("old-refresh"));

        // Second call reuses the cached token.
        assert_eq!(session.access_token().await.unwrap(), "refreshed");
        assert_eq!(flow.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_token_runs_interactive_flow() {
        let store = Arc::new(MemoryTokenStore::new());
        let flow = Arc::new(FakeFlow::default());
        let session = AuthSession::new(store.clone(), flow.clone());

        assert_eq!(session.access_token().await.unwrap(), "consented");
        assert_eq!(flow.authorizations.load(Ordering::SeqCst), 1);
        assert_eq!(store.current().unwrap().access_token, "consented");
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token_reauthorizes() {
        let mut token = expired_token();
        token.refresh_token = None;
        let store = Arc::new(MemoryTokenStore::with_token(token));
        let flow = Arc::new(FakeFlow::default());
        let session = AuthSession::new(store, flow.clone());

        assert_eq!(session.access_token().await.unwrap(), "consented");
        assert_eq!(flow.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(flow.authorizations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_leaves_session_expired() {
        let store = Arc::new(MemoryTokenStore::with_token(expired_token()));
        let flow = Arc::new(FakeFlow {
            fail_refresh: true,
            ..Default::default()
        });
        let session = AuthSession::new(store.clone(), flow);

        let err = session.access_token().await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(session.state().await, SessionState::Expired);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let valid = OAuthToken {
            expiry: Some(Utc::now() + Duration::hours(2)),
            ..expired_token()
        };
        let store = Arc::new(MemoryTokenStore::with_token(valid));
        let flow = Arc::new(FakeFlow::default());
        let session = AuthSession::new(store, flow.clone());

        session.access_token().await.unwrap();
        session.invalidate().await;
        assert_eq!(session.state().await, SessionState::Expired);

        assert_eq!(session.access_token().await.unwrap(), "refreshed");
        assert_eq!(flow.refreshes.load(Ordering::SeqCst), 1);
    }

    struct ReadOnlyStore;

    impl TokenStore for ReadOnlyStore {
        fn load(&self) -> Result<Option<OAuthToken>> {
            Ok(None)
        }

        fn save(&self, _token: &OAuthToken) -> Result<()> {
            Err(StorageError::Auth("token file is read-only".to_string()))
        }
    }

    #[tokio::test]
    async fn test_save_failure_keeps_session_usable() {
        let flow = Arc::new(FakeFlow::default());
        let session = AuthSession::new(Arc::new(ReadOnlyStore), flow.clone());

        assert_eq!(session.access_token().await.unwrap(), "consented");
        assert_eq!(session.state().await, SessionState::Authorized);

        // the in-memory token is reused, no second consent
        assert_eq!(session.access_token().await.unwrap(), "consented");
        assert_eq!(flow.authorizations.load(Ordering::SeqCst), 1);
    }
}
