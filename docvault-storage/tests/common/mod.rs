//! Shared helpers for storage integration tests.

use async_trait::async_trait;
use docvault_storage::auth::{AuthFlow, OAuthToken};
use docvault_storage::{Result, StorageError};

/// Flow that can neither refresh nor ask for consent.
pub struct NoFlow;

#[async_trait]
impl AuthFlow for NoFlow {
    async fn refresh(&self, _token: &OAuthToken) -> Result<OAuthToken> {
        Err(StorageError::Auth("refresh disabled in tests".to_string()))
    }

    async fn authorize(&self) -> Result<OAuthToken> {
        Err(StorageError::Auth("consent disabled in tests".to_string()))
    }
}
