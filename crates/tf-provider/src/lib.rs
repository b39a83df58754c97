// SPDX-License-Identifier: MIT OR Apache-2.0
//! Provider contracts: the external collaborators the orchestrator
//! dispatches work to — compute, image registry, log storage, backend
//! observability, the log-streaming channel, and the health snapshot
//! feed — plus in-memory reference implementations of each.
//!
//! As with `tf-repo`, every trait is `async_trait` and object-safe; a
//! real deployment supplies `Arc<dyn Trait>` values backed by actual
//! provider SDKs. The `InMemory*` types make the workspace runnable
//! end to end and give the test suite a deterministic double for every
//! external call the orchestrator makes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod context;
mod health;
mod image_registry;
mod log_event;
mod log_manager;
mod observability;
mod task_manager;
mod websocket;

pub use context::RequestContext;
pub use health::{HealthManager, InMemoryHealthManager, ProviderHealthSnapshot};
pub use image_registry::{ImageRegistry, InMemoryImageRegistry};
pub use log_event::LogEvent;
pub use log_manager::{InMemoryLogManager, LogManager};
pub use observability::{InMemoryObservabilityManager, ObservabilityManager};
pub use task_manager::{InMemoryTaskManager, TaskManager, TaskSpec};
pub use websocket::{InMemoryWebSocketManager, WebSocketManager};
