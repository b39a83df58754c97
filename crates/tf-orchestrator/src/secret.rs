//! Secret lifecycle: create, update, delete, with G2 ownership kept in
//! sync via compensating writes on failure.

use crate::Orchestrator;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tf_error::{OrchestratorError, Result};
use tf_repo::Secret;
use tracing::warn;

/// Input to [`Orchestrator::create_secret`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSecretRequest {
    /// Globally unique secret name.
    pub name: String,
    /// The environment-variable identifier this secret is injected as.
    pub key_name: String,
    /// Human-readable description.
    pub description: String,
    /// Plaintext value, stored as-is by the in-memory reference repository.
    pub value: String,
}

impl Orchestrator {
    /// Persist a new secret and grant its creator ownership.
    ///
    /// If granting ownership fails, the secret is deleted to avoid leaving
    /// an orphaned, unreachable record — a best-effort compensating write;
    /// failure to delete is logged, not escalated beyond the original
    /// error.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for an empty name or key_name, `Conflict` if the
    /// name is already in use, `Internal` if the ownership sync fails.
    pub async fn create_secret(
        &self,
        ctx_request_id: &str,
        user_email: &str,
        req: CreateSecretRequest,
    ) -> Result<Secret> {
        if req.name.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("name must not be empty"));
        }
        if req.key_name.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("key_name must not be empty"));
        }

        let now = Utc::now();
        let secret = Secret {
            name: req.name.clone(),
            key_name: req.key_name,
            description: req.description,
            value: req.value,
            created_by: user_email.to_string(),
            owned_by: BTreeSet::from([user_email.to_string()]),
            created_at: now,
            updated_at: now,
            created_by_request_id: Some(ctx_request_id.to_string()),
            modified_by_request_id: None,
        };

        self.secrets_repo.create_secret(secret.clone()).await?;

        if let Err(err) = self
            .enforcer
            .add_ownership_for_resource(&format!("secret:{}", req.name), user_email)
            .await
        {
            if let Err(cleanup_err) = self.secrets_repo.delete_secret(&req.name).await {
                warn!(
                    name = %req.name,
                    error = %cleanup_err,
                    "failed to delete orphaned secret after ownership sync failure"
                );
            }
            return Err(OrchestratorError::internal("failed to synchronize secret ownership")
                .with_context("name", req.name)
                .with_source(err));
        }

        Ok(secret)
    }

    /// Look up a secret by name.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for an empty name, plus whatever the repository
    /// surfaces (`NotFound` if absent).
    pub async fn get_secret(&self, name: &str, include_value: bool) -> Result<Secret> {
        if name.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("name must not be empty"));
        }
        self.secrets_repo.get_secret(name, include_value).await
    }

    /// List every registered secret.
    ///
    /// # Errors
    ///
    /// Whatever the repository surfaces.
    pub async fn list_secrets(&self, include_value: bool) -> Result<Vec<Secret>> {
        self.secrets_repo.list_secrets(include_value).await
    }

    /// Overwrite a secret's value/description, stamping the modifying
    /// request id.
    ///
    /// # Errors
    ///
    /// `NotFound` if the secret does not exist, plus whatever the
    /// repository surfaces.
    pub async fn update_secret(
        &self,
        ctx_request_id: &str,
        name: &str,
        key_name: String,
        description: String,
        value: String,
    ) -> Result<Secret> {
        let mut secret = self.secrets_repo.get_secret(name, true).await?;
        secret.key_name = key_name;
        secret.description = description;
        secret.value = value;
        secret.updated_at = Utc::now();
        secret.modified_by_request_id = Some(ctx_request_id.to_string());
        self.secrets_repo.update_secret(secret.clone()).await?;
        Ok(secret)
    }

    /// Remove a secret and every ownership edge referencing it.
    ///
    /// Ownership edges are cleared before the durable delete so a reader
    /// racing this call never observes a secret that still grants access
    /// but no longer exists. If the durable delete then fails, ownership
    /// is best-effort restored for every email that held it; failure to
    /// restore is logged, not escalated beyond the original error.
    ///
    /// # Errors
    ///
    /// Whatever the repository surfaces for a missing or failed delete.
    pub async fn delete_secret(&self, name: &str) -> Result<()> {
        let secret = self.secrets_repo.get_secret(name, false).await?;
        let resource_key = format!("secret:{name}");
        let previous_owners = secret.owned_by.clone();

        self.enforcer.remove_all_ownerships_for_resource(&resource_key).await?;

        if let Err(err) = self.secrets_repo.delete_secret(name).await {
            for owner in &previous_owners {
                if let Err(restore_err) = self
                    .enforcer
                    .add_ownership_for_resource(&resource_key, owner)
                    .await
                {
                    warn!(
                        name,
                        owner = %owner,
                        error = %restore_err,
                        "failed to restore secret ownership after delete failure"
                    );
                }
            }
            return Err(err);
        }

        Ok(())
    }
}
