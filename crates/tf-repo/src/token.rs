//! Streaming-token storage.

use crate::entities::WebSocketToken;
use async_trait::async_trait;
use std::collections::HashMap;
use tf_error::Result;
use tokio::sync::RwLock;

/// Durable storage for websocket streaming tokens.
#[async_trait]
pub trait TokenRepo: Send + Sync {
    /// Persist a newly minted token.
    async fn create_token(&self, token: WebSocketToken) -> Result<()>;

    /// Look up a token by its opaque value.
    async fn get_token(&self, token: &str) -> Result<Option<WebSocketToken>>;

    /// Delete a token. Missing tokens are not an error.
    async fn delete_token(&self, token: &str) -> Result<()>;
}

/// In-memory [`TokenRepo`] reference implementation.
#[derive(Default)]
pub struct InMemoryTokenRepo {
    tokens: RwLock<HashMap<String, WebSocketToken>>,
}

impl InMemoryTokenRepo {
    /// Construct an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenRepo for InMemoryTokenRepo {
    async fn create_token(&self, token: WebSocketToken) -> Result<()> {
        self.tokens.write().await.insert(token.token.clone(), token);
        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<Option<WebSocketToken>> {
        Ok(self.tokens.read().await.get(token).cloned())
    }

    async fn delete_token(&self, token: &str) -> Result<()> {
        self.tokens.write().await.remove(token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn sample(token: &str) -> WebSocketToken {
        let now = Utc::now();
        WebSocketToken {
            token: token.to_string(),
            execution_id: "e-1".to_string(),
            user_email: Some("viewer@x.com".to_string()),
            client_ip: Some("1.2.3.4".to_string()),
            created_at: now,
            expires_at: now + Duration::hours(24),
        }
    }

    #[tokio::test]
    async fn create_then_get_then_delete() {
        let repo = InMemoryTokenRepo::new();
        repo.create_token(sample("tok-1")).await.unwrap();
        assert!(repo.get_token("tok-1").await.unwrap().is_some());
        repo.delete_token("tok-1").await.unwrap();
        assert!(repo.get_token("tok-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_missing_is_not_an_error() {
        let repo = InMemoryTokenRepo::new();
        repo.delete_token("nope").await.unwrap();
    }
}
