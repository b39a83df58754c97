//! User and pending-claim storage.

use crate::entities::{PendingApiKey, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tf_error::{OrchestratorError, Result};
use tokio::sync::RwLock;

/// Durable storage for user accounts and their pending API-key claims.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Persist a newly created user. Fails with `Conflict` if the email
    /// is already in use.
    async fn create_user(&self, user: User) -> Result<()>;

    /// Look up a user by their email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Look up a user by the SHA-256 hash of their current API key.
    async fn get_user_by_hash(&self, hash: &str) -> Result<Option<User>>;

    /// Stamp `last_used_at`. Best-effort from the caller's perspective.
    async fn update_last_used(&self, email: &str, at: DateTime<Utc>) -> Result<()>;

    /// Associate a user's current api-key hash, used by
    /// [`UserRepo::get_user_by_hash`] lookups. Called once the plaintext key
    /// minted at user creation has been hashed.
    async fn set_api_key_hash(&self, email: &str, hash: String) -> Result<()>;

    /// Mark a user revoked.
    async fn revoke_user(&self, email: &str) -> Result<()>;

    /// Clear a user's pending-claim expiration, called on first claim.
    async fn remove_expiration(&self, email: &str) -> Result<()>;

    /// Persist a pending API-key claim.
    async fn create_pending_key(&self, pending: PendingApiKey) -> Result<()>;

    /// Look up a pending claim by its secret token.
    async fn get_pending_key(&self, secret_token: &str) -> Result<Option<PendingApiKey>>;

    /// Mark a pending claim viewed, recording the claiming IP.
    async fn mark_pending_key_viewed(
        &self,
        secret_token: &str,
        viewer_ip: Option<String>,
    ) -> Result<()>;

    /// Delete a pending claim.
    async fn delete_pending_key(&self, secret_token: &str) -> Result<()>;

    /// List every user, for diagnostics and hydration.
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Every user stamped with the given request id.
    async fn get_users_by_request_id(&self, request_id: &str) -> Result<Vec<User>>;
}

/// The api-key hash this user's account is keyed under, if one was ever
/// minted. Stored alongside the user in the in-memory implementation so
/// hash lookups stay O(1) without re-hashing on every call.
#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    api_key_hash: Option<String>,
}

/// In-memory [`UserRepo`], suitable as a reference implementation and for
/// tests. Not durable across process restarts.
#[derive(Default)]
pub struct InMemoryUserRepo {
    users: RwLock<HashMap<String, StoredUser>>,
    pending: RwLock<HashMap<String, PendingApiKey>>,
}

impl InMemoryUserRepo {
    /// Construct an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn create_user(&self, user: User) -> Result<()> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(
                OrchestratorError::conflict(format!("user already exists: {}", user.email))
                    .with_context("email", user.email.clone()),
            );
        }
        let email = user.email.clone();
        users.insert(
            email,
            StoredUser {
                user,
                api_key_hash: None,
            },
        );
        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(email).map(|s| s.user.clone()))
    }

    async fn get_user_by_hash(&self, hash: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|s| s.api_key_hash.as_deref() == Some(hash))
            .map(|s| s.user.clone()))
    }

    async fn update_last_used(&self, email: &str, at: DateTime<Utc>) -> Result<()> {
        let mut users = self.users.write().await;
        if let Some(stored) = users.get_mut(email) {
            stored.user.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn set_api_key_hash(&self, email: &str, hash: String) -> Result<()> {
        let mut users = self.users.write().await;
        let stored = users.get_mut(email).ok_or_else(|| {
            OrchestratorError::not_found(format!("user not found: {email}"))
                .with_context("email", email.to_string())
        })?;
        stored.api_key_hash = Some(hash);
        Ok(())
    }

    async fn revoke_user(&self, email: &str) -> Result<()> {
        let mut users = self.users.write().await;
        let stored = users.get_mut(email).ok_or_else(|| {
            OrchestratorError::not_found(format!("user not found: {email}"))
                .with_context("email", email.to_string())
        })?;
        stored.user.revoked = true;
        Ok(())
    }

    async fn remove_expiration(&self, email: &str) -> Result<()> {
        let mut users = self.users.write().await;
        if let Some(stored) = users.get_mut(email) {
            stored.user.expires_at = None;
        }
        Ok(())
    }

    async fn create_pending_key(&self, pending: PendingApiKey) -> Result<()> {
        let mut table = self.pending.write().await;
        if table.contains_key(&pending.secret_token) {
            return Err(OrchestratorError::conflict(
                "pending key already exists for this token",
            ));
        }
        table.insert(pending.secret_token.clone(), pending);
        Ok(())
    }

    async fn get_pending_key(&self, secret_token: &str) -> Result<Option<PendingApiKey>> {
        Ok(self.pending.read().await.get(secret_token).cloned())
    }

    async fn mark_pending_key_viewed(
        &self,
        secret_token: &str,
        viewer_ip: Option<String>,
    ) -> Result<()> {
        let mut table = self.pending.write().await;
        let pending = table.get_mut(secret_token).ok_or_else(|| {
            OrchestratorError::not_found("pending key not found")
                .with_context("secret_token", secret_token.to_string())
        })?;
        pending.viewed = true;
        pending.viewer_ip = viewer_ip;
        Ok(())
    }

    async fn delete_pending_key(&self, secret_token: &str) -> Result<()> {
        self.pending.write().await.remove(secret_token);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .map(|s| s.user.clone())
            .collect())
    }

    async fn get_users_by_request_id(&self, request_id: &str) -> Result<Vec<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|s| s.user.created_by_request_id.as_deref() == Some(request_id))
            .map(|s| s.user.clone())
            .collect())
    }
}
