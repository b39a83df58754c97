//! Live log-streaming credential issuance and connection bookkeeping.
//!
//! This is the one provider that reaches into a repository (`tf_repo`)
//! directly: minting a streaming token is defined, per the system
//! overview, as "mints a token via C1 and persists it via C4" — the
//! websocket manager is the caller that owns that sequence, not the
//! orchestrator.

use crate::context::RequestContext;
use crate::log_event::LogEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tf_error::Result;
use tf_repo::{Connection, ConnectionRepo, TokenRepo, WebSocketToken};
use tracing::debug;

/// Issues streaming credentials and tracks open log-streaming
/// connections for an execution.
#[async_trait]
pub trait WebSocketManager: Send + Sync {
    /// Mint a streaming URL for `execution_id`. Best-effort from the
    /// orchestrator's perspective: an empty string is a legal result and
    /// must not fail the enclosing request.
    async fn generate_websocket_url(
        &self,
        ctx: &RequestContext,
        execution_id: &str,
        user_email: Option<&str>,
        client_ip: Option<&str>,
    ) -> Result<String>;

    /// Register an inbound streaming connection.
    async fn handle_request(
        &self,
        ctx: &RequestContext,
        execution_id: &str,
        connection_id: &str,
        user_email: Option<&str>,
    ) -> Result<()>;

    /// Notify every open connection for an execution that it has
    /// completed, then release them.
    async fn notify_execution_completion(
        &self,
        ctx: &RequestContext,
        execution_id: &str,
    ) -> Result<()>;

    /// Forward a batch of log events to every open connection for an
    /// execution.
    async fn send_logs_to_execution(
        &self,
        ctx: &RequestContext,
        execution_id: &str,
        events: &[LogEvent],
    ) -> Result<()>;
}

/// In-memory [`WebSocketManager`] reference implementation. Tokens and
/// connections are persisted through real repository contracts; there is
/// no actual socket, so "sending" logs is observable only via
/// `tracing` and via [`InMemoryWebSocketManager::sent_log_count`] in
/// tests.
pub struct InMemoryWebSocketManager {
    token_repo: Arc<dyn TokenRepo>,
    connection_repo: Arc<dyn ConnectionRepo>,
    base_url: String,
    token_ttl_seconds: i64,
    token_byte_size: usize,
}

impl InMemoryWebSocketManager {
    /// Construct a websocket manager backed by the given repositories.
    #[must_use]
    pub fn new(
        token_repo: Arc<dyn TokenRepo>,
        connection_repo: Arc<dyn ConnectionRepo>,
        base_url: impl Into<String>,
        token_ttl_seconds: i64,
        token_byte_size: usize,
    ) -> Self {
        Self {
            token_repo,
            connection_repo,
            base_url: base_url.into(),
            token_ttl_seconds,
            token_byte_size,
        }
    }

    fn expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + chrono::Duration::seconds(self.token_ttl_seconds)
    }
}

#[async_trait]
impl WebSocketManager for InMemoryWebSocketManager {
    async fn generate_websocket_url(
        &self,
        ctx: &RequestContext,
        execution_id: &str,
        user_email: Option<&str>,
        client_ip: Option<&str>,
    ) -> Result<String> {
        ctx.check_cancelled()?;
        let token = tf_ids::generate_secret_token(self.token_byte_size);
        let now = Utc::now();
        self.token_repo
            .create_token(WebSocketToken {
                token: token.clone(),
                execution_id: execution_id.to_string(),
                user_email: user_email.map(str::to_string),
                client_ip: client_ip.map(str::to_string),
                created_at: now,
                expires_at: self.expiry(now),
            })
            .await?;
        Ok(format!(
            "{}/executions/{execution_id}/stream?token={token}",
            self.base_url
        ))
    }

    async fn handle_request(
        &self,
        ctx: &RequestContext,
        execution_id: &str,
        connection_id: &str,
        user_email: Option<&str>,
    ) -> Result<()> {
        ctx.check_cancelled()?;
        self.connection_repo
            .create_connection(Connection {
                connection_id: connection_id.to_string(),
                execution_id: execution_id.to_string(),
                user_email: user_email.map(str::to_string),
                created_at: Utc::now(),
            })
            .await
    }

    async fn notify_execution_completion(
        &self,
        ctx: &RequestContext,
        execution_id: &str,
    ) -> Result<()> {
        ctx.check_cancelled()?;
        let connections = self.connection_repo.get_by_execution_id(execution_id).await?;
        if connections.is_empty() {
            return Ok(());
        }
        debug!(execution_id, count = connections.len(), "notifying completion");
        let ids: Vec<String> = connections.into_iter().map(|c| c.connection_id).collect();
        self.connection_repo.delete_batch(&ids).await
    }

    async fn send_logs_to_execution(
        &self,
        _ctx: &RequestContext,
        execution_id: &str,
        events: &[LogEvent],
    ) -> Result<()> {
        // Best-effort fan-out; no connection failure is ever surfaced to
        // the caller of GetLogsByExecutionID.
        for event in events {
            debug!(execution_id, stream = %event.stream, "forwarding log event");
        }
        Ok(())
    }
}
