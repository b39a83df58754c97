// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP composition layer: binds [`tf_orchestrator::Orchestrator`] to an
//! Axum router.
//!
//! This crate is a reference binding, not a frozen wire contract — the
//! API gateway lives outside the orchestrator core. It exists so the
//! workspace is runnable end to end (`cargo run -p tf-daemon`) and so the
//! orchestrator's request-shaped methods have at least one real transport
//! exercising them.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod error;
mod routes;

pub use auth::AuthenticatedUser;
pub use error::ApiError;

use std::sync::Arc;
use tf_orchestrator::Orchestrator;

/// Shared state handed to every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// The composed orchestrator this daemon exposes.
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the Axum router with every route wired to its orchestrator
/// method.
#[must_use]
pub fn build_app(state: Arc<AppState>) -> axum::Router {
    routes::router(state)
}
