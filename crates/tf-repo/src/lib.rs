// SPDX-License-Identifier: MIT OR Apache-2.0
//! Repository contracts: abstract, thread-safe CRUD surfaces for the
//! durable entities the orchestrator reasons about, plus in-memory
//! reference implementations of each.
//!
//! Every trait here is an `async_trait` object-safe contract; the
//! orchestrator is constructed against `Arc<dyn Trait>` values so a real
//! deployment can swap in a database-backed implementation without
//! touching orchestrator code. The `InMemory*` types exist so the crate
//! is runnable end to end without any external dependency, and so tests
//! exercise the same contracts a durable store would have to satisfy.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod connection;
mod entities;
mod execution;
mod image;
mod secrets;
mod token;
mod user;

pub use connection::{ConnectionRepo, InMemoryConnectionRepo};
pub use entities::{Connection, Execution, ImageInfo, PendingApiKey, Secret, User, WebSocketToken};
pub use execution::{ExecutionRepo, InMemoryExecutionRepo};
pub use image::{ImageRepo, InMemoryImageRepo};
pub use secrets::{InMemorySecretsRepo, SecretsRepo};
pub use token::{InMemoryTokenRepo, TokenRepo};
pub use user::{InMemoryUserRepo, UserRepo};
