//! Secret storage.

use crate::entities::Secret;
use async_trait::async_trait;
use std::collections::HashMap;
use tf_error::{OrchestratorError, Result};
use tokio::sync::RwLock;

/// Durable storage for secret values.
#[async_trait]
pub trait SecretsRepo: Send + Sync {
    /// Persist a newly created secret. Fails with `Conflict`
    /// (`SecretAlreadyExists`) if the name is already in use.
    async fn create_secret(&self, secret: Secret) -> Result<()>;

    /// Look up a secret by name. `include_value` controls whether the
    /// ciphertext is populated or blanked for a metadata-only read.
    /// Fails with `NotFound` (`SecretNotFound`) if absent.
    async fn get_secret(&self, name: &str, include_value: bool) -> Result<Secret>;

    /// List every secret, with the same `include_value` semantics as
    /// [`SecretsRepo::get_secret`].
    async fn list_secrets(&self, include_value: bool) -> Result<Vec<Secret>>;

    /// Overwrite a stored secret with a new snapshot.
    async fn update_secret(&self, secret: Secret) -> Result<()>;

    /// Delete a secret by name. Fails with `NotFound` if absent.
    async fn delete_secret(&self, name: &str) -> Result<()>;

    /// Every secret stamped with the given request id.
    async fn get_secrets_by_request_id(&self, request_id: &str) -> Result<Vec<Secret>>;
}

/// In-memory [`SecretsRepo`] reference implementation.
#[derive(Default)]
pub struct InMemorySecretsRepo {
    secrets: RwLock<HashMap<String, Secret>>,
}

impl InMemorySecretsRepo {
    /// Construct an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn redact(mut secret: Secret) -> Secret {
        secret.value = String::new();
        secret
    }
}

#[async_trait]
impl SecretsRepo for InMemorySecretsRepo {
    async fn create_secret(&self, secret: Secret) -> Result<()> {
        let mut table = self.secrets.write().await;
        if table.contains_key(&secret.name) {
            return Err(OrchestratorError::conflict(format!(
                "secret already exists: {}",
                secret.name
            ))
            .with_context("name", secret.name.clone()));
        }
        table.insert(secret.name.clone(), secret);
        Ok(())
    }

    async fn get_secret(&self, name: &str, include_value: bool) -> Result<Secret> {
        let table = self.secrets.read().await;
        let secret = table.get(name).cloned().ok_or_else(|| {
            OrchestratorError::not_found(format!("secret not found: {name}"))
                .with_context("name", name.to_string())
        })?;
        Ok(if include_value {
            secret
        } else {
            Self::redact(secret)
        })
    }

    async fn list_secrets(&self, include_value: bool) -> Result<Vec<Secret>> {
        let table = self.secrets.read().await;
        Ok(table
            .values()
            .cloned()
            .map(|s| if include_value { s } else { Self::redact(s) })
            .collect())
    }

    async fn update_secret(&self, secret: Secret) -> Result<()> {
        let mut table = self.secrets.write().await;
        if !table.contains_key(&secret.name) {
            return Err(OrchestratorError::not_found(format!(
                "secret not found: {}",
                secret.name
            )));
        }
        table.insert(secret.name.clone(), secret);
        Ok(())
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        let mut table = self.secrets.write().await;
        table.remove(name).ok_or_else(|| {
            OrchestratorError::not_found(format!("secret not found: {name}"))
                .with_context("name", name.to_string())
        })?;
        Ok(())
    }

    async fn get_secrets_by_request_id(&self, request_id: &str) -> Result<Vec<Secret>> {
        let table = self.secrets.read().await;
        Ok(table
            .values()
            .filter(|s| {
                s.created_by_request_id.as_deref() == Some(request_id)
                    || s.modified_by_request_id.as_deref() == Some(request_id)
            })
            .cloned()
            .collect())
    }
}
