//! Durable entity records. Repositories own these; nothing outside a
//! repository implementation mutates them directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tf_status::ExecutionStatus;

/// A named user account, keyed by email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique key. RFC 5322 address.
    pub email: String,
    /// The role this user holds, canonical-lowercase.
    pub role: String,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// The last time a credential belonging to this user was used.
    pub last_used_at: Option<DateTime<Utc>>,
    /// `true` once the account has been explicitly revoked.
    pub revoked: bool,
    /// Pending-claim deadline; `None` once a claim has succeeded.
    pub expires_at: Option<DateTime<Utc>>,
    /// The request that created this user, if stamped. Not part of the
    /// original entity shape, but needed so the trace aggregator can
    /// index users by request id the same way it does executions,
    /// secrets, and images.
    pub created_by_request_id: Option<String>,
}

/// A one-time exchange of a secret token for a user's API key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApiKey {
    /// The claim token handed to the user out of band.
    pub secret_token: String,
    /// The API key plaintext the user ultimately receives.
    pub api_key: String,
    /// The user this pending key belongs to.
    pub user_email: String,
    /// The identity (admin, automation) that created this user.
    pub created_by: String,
    /// When the pending key was created.
    pub created_at: DateTime<Utc>,
    /// The deadline after which the token can no longer be claimed.
    pub expires_at: DateTime<Utc>,
    /// `true` once claimed.
    pub viewed: bool,
    /// The IP address that performed the claim, if any.
    pub viewer_ip: Option<String>,
}

/// A stored secret value, referenced by name from execution requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    /// Globally unique key.
    pub name: String,
    /// The environment-variable identifier this secret is injected as.
    pub key_name: String,
    /// Human-readable description.
    pub description: String,
    /// Ciphertext at rest; plaintext only while held in memory.
    pub value: String,
    /// The identity that created this secret.
    pub created_by: String,
    /// Every email currently permitted to read/update/delete this secret.
    pub owned_by: BTreeSet<String>,
    /// When the secret was created.
    pub created_at: DateTime<Utc>,
    /// When the secret was last updated.
    pub updated_at: DateTime<Utc>,
    /// The request that created this secret, if stamped.
    pub created_by_request_id: Option<String>,
    /// The request that last modified this secret, if stamped.
    pub modified_by_request_id: Option<String>,
}

/// A single command execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Provider-issued identifier. Immutable once assigned.
    pub execution_id: String,
    /// The identity that submitted the run request.
    pub created_by: String,
    /// Every email currently permitted to act on this execution.
    pub owned_by: BTreeSet<String>,
    /// The command that was run.
    pub command: String,
    /// The image the command ran under.
    pub image_id: String,
    /// The environment the command ran with, after secret resolution.
    pub env: BTreeMap<String, String>,
    /// The secret names that were resolved into `env`.
    pub secrets: Vec<String>,
    /// When the provider accepted the task.
    pub started_at: DateTime<Utc>,
    /// When the execution reached a terminal status. `None` while running.
    pub completed_at: Option<DateTime<Utc>>,
    /// Current lifecycle status.
    pub status: ExecutionStatus,
    /// Populated only once `completed_at` is set.
    pub exit_code: Option<i32>,
    /// The compute platform the provider ran this on, if reported.
    pub compute_platform: Option<String>,
    /// The request that created this execution, if stamped.
    pub created_by_request_id: Option<String>,
    /// The request that last modified this execution, if stamped.
    pub modified_by_request_id: Option<String>,
}

/// A registered container image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Provider-stable identifier.
    pub image_id: String,
    /// Human-readable name.
    pub image: String,
    /// CPU units requested, provider-defined.
    pub cpu: Option<String>,
    /// Memory requested, provider-defined.
    pub memory: Option<String>,
    /// The platform the image targets (e.g. `linux/amd64`).
    pub platform: Option<String>,
    /// The identity that registered this image.
    pub created_by: String,
    /// Every email currently permitted to use this image.
    pub owned_by: BTreeSet<String>,
    /// When the image was registered.
    pub created_at: DateTime<Utc>,
}

/// A short-lived credential for the log-streaming channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSocketToken {
    /// Opaque bearer value.
    pub token: String,
    /// The execution this token grants a view onto.
    pub execution_id: String,
    /// The user the token was minted for, if known.
    pub user_email: Option<String>,
    /// The IP the token was minted for, if known.
    pub client_ip: Option<String>,
    /// When the token was minted.
    pub created_at: DateTime<Utc>,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
}

/// An open log-streaming connection, tracked so the websocket manager can
/// fan out completion notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Opaque connection identifier.
    pub connection_id: String,
    /// The execution this connection is streaming.
    pub execution_id: String,
    /// The user holding the connection, if known.
    pub user_email: Option<String>,
    /// When the connection was registered.
    pub created_at: DateTime<Utc>,
}
