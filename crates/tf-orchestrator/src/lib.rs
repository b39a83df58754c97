// SPDX-License-Identifier: MIT OR Apache-2.0
//! The orchestrator service (C6): composes the enforcer, repositories, and
//! providers into the execution/user/secret/image lifecycle.
//!
//! [`Orchestrator`] is constructed once, against a single record of
//! trait-object collaborators, and is the only type in this crate with
//! request-facing methods. Nothing here retains a caller's
//! [`RequestContext`] past the call that received it.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod execution;
mod image;
mod secret;
mod trace;
mod user;

pub use execution::{ExecutionResponse, LogsResponse, ResolvedImage, RunCommandRequest};
pub use image::RegisterImageRequest;
pub use secret::CreateSecretRequest;
pub use tf_trace::TraceResult;
pub use user::{ClaimApiKeyResponse, CreateUserRequest, CreateUserResponse};

use std::sync::Arc;
use tf_enforcer::Enforcer;
use tf_provider::{HealthManager, ImageRegistry, LogManager, ObservabilityManager, TaskManager, WebSocketManager};
use tf_repo::{ConnectionRepo, ExecutionRepo, ImageRepo, SecretsRepo, TokenRepo, UserRepo};

/// The four runtime-tunable values, resolved once at boot (see `tf-config`)
/// and handed to the orchestrator as plain values rather than a dependency
/// on the config-loading crate.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    /// How long a pending API-key claim remains claimable.
    pub claim_window: chrono::Duration,
    /// `ListExecutions` limit used when the caller passes `0`.
    pub default_execution_list_limit: usize,
    /// Entropy, in bytes, drawn for every minted secret token (api keys,
    /// claim tokens). Must be at least [`tf_ids::MIN_SECRET_TOKEN_BYTES`].
    pub secret_token_byte_size: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            claim_window: chrono::Duration::hours(24),
            default_execution_list_limit: 100,
            secret_token_byte_size: tf_ids::MIN_SECRET_TOKEN_BYTES,
        }
    }
}

/// Every collaborator the orchestrator composes, held as trait objects so a
/// real deployment can swap in durable/production adapters without
/// touching this crate.
pub struct Orchestrator {
    pub(crate) enforcer: Arc<Enforcer>,
    pub(crate) user_repo: Arc<dyn UserRepo>,
    pub(crate) execution_repo: Arc<dyn ExecutionRepo>,
    pub(crate) secrets_repo: Arc<dyn SecretsRepo>,
    pub(crate) image_repo: Arc<dyn ImageRepo>,
    #[allow(dead_code)]
    pub(crate) connection_repo: Arc<dyn ConnectionRepo>,
    #[allow(dead_code)]
    pub(crate) token_repo: Arc<dyn TokenRepo>,
    pub(crate) task_manager: Arc<dyn TaskManager>,
    pub(crate) image_registry: Arc<dyn ImageRegistry>,
    pub(crate) log_manager: Arc<dyn LogManager>,
    pub(crate) observability: Arc<dyn ObservabilityManager>,
    pub(crate) websocket_manager: Arc<dyn WebSocketManager>,
    #[allow(dead_code)]
    pub(crate) health_manager: Arc<dyn HealthManager>,
    pub(crate) settings: OrchestratorSettings,
}

/// Every collaborator [`Orchestrator::new`] requires, grouped so
/// construction reads as a single record rather than a twelve-argument
/// function call.
pub struct OrchestratorDeps {
    /// Shared authorization enforcer (hydrated separately by the caller).
    pub enforcer: Arc<Enforcer>,
    /// User and pending-claim storage.
    pub user_repo: Arc<dyn UserRepo>,
    /// Execution storage.
    pub execution_repo: Arc<dyn ExecutionRepo>,
    /// Secret storage.
    pub secrets_repo: Arc<dyn SecretsRepo>,
    /// Read-side image metadata index.
    pub image_repo: Arc<dyn ImageRepo>,
    /// Log-streaming connection bookkeeping.
    pub connection_repo: Arc<dyn ConnectionRepo>,
    /// Streaming-token storage.
    pub token_repo: Arc<dyn TokenRepo>,
    /// Compute dispatch.
    pub task_manager: Arc<dyn TaskManager>,
    /// Image registration.
    pub image_registry: Arc<dyn ImageRegistry>,
    /// Terminal-execution log retrieval.
    pub log_manager: Arc<dyn LogManager>,
    /// Backend-originated log retrieval, by request id.
    pub observability: Arc<dyn ObservabilityManager>,
    /// Streaming-credential issuance and connection notification.
    pub websocket_manager: Arc<dyn WebSocketManager>,
    /// Provider liveness snapshot feed, consumed by `tf-health`; held here
    /// only so `/health` wiring in a daemon can reach it through one
    /// composed value.
    pub health_manager: Arc<dyn HealthManager>,
}

impl Orchestrator {
    /// Construct an orchestrator over the given collaborators and
    /// configuration. Does not hydrate the enforcer — callers hydrate it
    /// separately (typically once, at boot) via [`Enforcer::hydrate`].
    #[must_use]
    pub fn new(deps: OrchestratorDeps, settings: OrchestratorSettings) -> Self {
        Self {
            enforcer: deps.enforcer,
            user_repo: deps.user_repo,
            execution_repo: deps.execution_repo,
            secrets_repo: deps.secrets_repo,
            image_repo: deps.image_repo,
            connection_repo: deps.connection_repo,
            token_repo: deps.token_repo,
            task_manager: deps.task_manager,
            image_registry: deps.image_registry,
            log_manager: deps.log_manager,
            observability: deps.observability,
            websocket_manager: deps.websocket_manager,
            health_manager: deps.health_manager,
            settings,
        }
    }

    /// The authorization enforcer this orchestrator was constructed with,
    /// exposed so a caller can drive hydration or diagnostics.
    #[must_use]
    pub fn enforcer(&self) -> &Arc<Enforcer> {
        &self.enforcer
    }

    /// The provider health snapshot feed, exposed so a caller can build a
    /// `tf-health` reconciler over the same provider this orchestrator
    /// dispatches to.
    #[must_use]
    pub fn health_manager(&self) -> &Arc<dyn HealthManager> {
        &self.health_manager
    }

    /// The execution repository, exposed for the same reason.
    #[must_use]
    pub fn execution_repo(&self) -> &Arc<dyn ExecutionRepo> {
        &self.execution_repo
    }
}
