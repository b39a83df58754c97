//! User lifecycle: creation with a one-time claim token, the claim
//! exchange itself, API-key authentication, and revocation.

use crate::Orchestrator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tf_error::{ErrorCode, OrchestratorError, Result};
use tf_rbac::{format_role, role_from_string};
use tf_repo::{PendingApiKey, User};
use tracing::warn;

/// Input to [`Orchestrator::create_user`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUserRequest {
    /// The new account's email.
    pub email: String,
    /// Canonical lowercase role name (see [`tf_rbac::role_from_string`]).
    pub role: String,
}

/// Response to a successful [`Orchestrator::create_user`] call. The
/// plaintext API key itself is never returned here — only the claim
/// token the user exchanges for it via [`Orchestrator::claim_api_key`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserResponse {
    /// The created account's email.
    pub email: String,
    /// The one-time token the new user exchanges for their API key.
    pub claim_token: String,
    /// The deadline after which the claim token can no longer be used.
    pub expires_at: DateTime<Utc>,
}

/// Response to a successful [`Orchestrator::claim_api_key`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimApiKeyResponse {
    /// The account the claimed key belongs to.
    pub email: String,
    /// The plaintext API key. Shown exactly once.
    pub api_key: String,
}

impl Orchestrator {
    /// Create a user, mint and hash its API key, grant its role, and issue
    /// a one-time claim token.
    ///
    /// If minting the claim token fails after the user and role have
    /// already been persisted, the role grant is revoked and the account
    /// itself is marked revoked as a compensating write — best-effort;
    /// failures during compensation are logged, not escalated beyond the
    /// original error.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for an empty email or unparseable role, `Conflict`
    /// if the email is already in use, `Internal` if the role sync fails.
    pub async fn create_user(
        &self,
        ctx_request_id: &str,
        req: CreateUserRequest,
    ) -> Result<CreateUserResponse> {
        validate_email_address(&req.email)?;
        let role = role_from_string(&req.role)?;

        let now = Utc::now();
        let expires_at = now + self.settings.claim_window;
        let user = User {
            email: req.email.clone(),
            role: req.role.clone(),
            created_at: now,
            last_used_at: None,
            revoked: false,
            expires_at: Some(expires_at),
            created_by_request_id: Some(ctx_request_id.to_string()),
        };

        self.user_repo.create_user(user).await?;

        let api_key = tf_ids::generate_secret_token(self.settings.secret_token_byte_size);
        let hash = tf_ids::hash_api_key(&api_key);
        self.user_repo.set_api_key_hash(&req.email, hash).await?;

        if let Err(err) = self.enforcer.add_role_for_user(&req.email, role).await {
            if let Err(revoke_err) = self.user_repo.revoke_user(&req.email).await {
                warn!(
                    email = %req.email,
                    error = %revoke_err,
                    "failed to revoke orphaned user after role sync failure"
                );
            }
            return Err(OrchestratorError::internal("failed to synchronize user role")
                .with_context("email", req.email.clone())
                .with_source(err));
        }

        let claim_token = tf_ids::generate_secret_token(self.settings.secret_token_byte_size);
        let pending = PendingApiKey {
            secret_token: claim_token.clone(),
            api_key,
            user_email: req.email.clone(),
            created_by: ctx_request_id.to_string(),
            created_at: now,
            expires_at,
            viewed: false,
            viewer_ip: None,
        };

        if let Err(err) = self.user_repo.create_pending_key(pending).await {
            let formatted_role = format_role(role);
            if let Err(cleanup_err) = self
                .enforcer
                .remove_role_for_user(&req.email, &formatted_role)
                .await
            {
                warn!(
                    email = %req.email,
                    error = %cleanup_err,
                    "failed to remove role for orphaned user after claim-token failure"
                );
            }
            if let Err(revoke_err) = self.user_repo.revoke_user(&req.email).await {
                warn!(
                    email = %req.email,
                    error = %revoke_err,
                    "failed to revoke orphaned user after claim-token failure"
                );
            }
            return Err(err);
        }

        Ok(CreateUserResponse {
            email: req.email,
            claim_token,
            expires_at,
        })
    }

    /// Exchange a one-time claim token for the plaintext API key it
    /// guards.
    ///
    /// # Errors
    ///
    /// `NotFound` if the token is unknown, `Conflict` if it has already
    /// been claimed or has expired.
    pub async fn claim_api_key(
        &self,
        claim_token: &str,
        viewer_ip: Option<String>,
    ) -> Result<ClaimApiKeyResponse> {
        let pending = self
            .user_repo
            .get_pending_key(claim_token)
            .await?
            .ok_or_else(|| OrchestratorError::not_found("claim token not found"))?;

        if pending.viewed {
            return Err(OrchestratorError::conflict("claim token has already been claimed"));
        }
        if Utc::now() > pending.expires_at {
            return Err(OrchestratorError::conflict("claim token has expired"));
        }

        self.user_repo
            .mark_pending_key_viewed(claim_token, viewer_ip)
            .await?;

        if let Err(err) = self.user_repo.remove_expiration(&pending.user_email).await {
            warn!(
                email = %pending.user_email,
                error = %err,
                "failed to clear pending-claim expiration after a successful claim"
            );
        }

        Ok(ClaimApiKeyResponse {
            email: pending.user_email,
            api_key: pending.api_key,
        })
    }

    /// Resolve a presented API key to its owning, non-revoked user.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidApiKey`] if the key does not resolve to
    /// any user, [`ErrorCode::ApiKeyRevoked`] if it resolves to a revoked
    /// one. Neither has a shorthand constructor on
    /// [`tf_error::OrchestratorError`] since they are specific to
    /// authentication rather than general request handling.
    pub async fn authenticate(&self, api_key: &str) -> Result<User> {
        let hash = tf_ids::hash_api_key(api_key);
        let user = self
            .user_repo
            .get_user_by_hash(&hash)
            .await?
            .ok_or_else(|| OrchestratorError::new(ErrorCode::InvalidApiKey, "invalid API key"))?;

        if user.revoked {
            return Err(OrchestratorError::new(ErrorCode::ApiKeyRevoked, "API key has been revoked")
                .with_context("email", user.email.clone()));
        }

        if let Err(err) = self.user_repo.update_last_used(&user.email, Utc::now()).await {
            warn!(email = %user.email, error = %err, "failed to stamp last_used_at");
        }

        Ok(user)
    }

    /// Revoke a user's access: remove their role grant, then mark the
    /// account revoked.
    ///
    /// The role grant is removed before the durable revocation so a
    /// concurrent enforcement check never observes a still-privileged,
    /// about-to-be-revoked user. If the durable revoke then fails, the
    /// role is best-effort restored; failure to restore is logged, not
    /// escalated beyond the original error.
    ///
    /// # Errors
    ///
    /// `NotFound` if the user does not exist or has an unparseable role,
    /// plus whatever the repository surfaces for a failed revoke.
    pub async fn revoke_user(&self, email: &str) -> Result<()> {
        let user = self
            .user_repo
            .get_user_by_email(email)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(format!("user not found: {email}")))?;
        let role = role_from_string(&user.role)?;
        let formatted_role = format_role(role);

        self.enforcer.remove_role_for_user(email, &formatted_role).await?;

        if let Err(err) = self.user_repo.revoke_user(email).await {
            if let Err(restore_err) = self.enforcer.add_role_for_user(email, role).await {
                warn!(
                    email,
                    error = %restore_err,
                    "failed to restore role after revoke failure"
                );
            }
            return Err(err);
        }

        Ok(())
    }
}

/// A pragmatic RFC 5322 address-shape check: one `@`, a non-empty local
/// part with no whitespace or leading/trailing/doubled dots, and a domain
/// with at least one dot and non-empty, hyphen-trimmed labels.
///
/// This is deliberately not a full RFC 5322 grammar (quoted local parts,
/// comments, and IP-literal domains are rejected); it catches the shapes
/// that matter at this boundary — missing `@`, empty parts, embedded
/// whitespace — the same level of rigor `role_from_string` applies to role
/// names.
fn validate_email_address(email: &str) -> Result<()> {
    let invalid = || {
        OrchestratorError::invalid_request(format!("invalid email address: {email}"))
            .with_context("email", email.to_string())
    };

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(invalid());
    };
    if local.is_empty()
        || local.starts_with('.')
        || local.ends_with('.')
        || local.contains("..")
    {
        return Err(invalid());
    }
    if domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }
    if labels.iter().any(|label| {
        label.starts_with('-')
            || label.ends_with('-')
            || !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    }) {
        return Err(invalid());
    }

    Ok(())
}
