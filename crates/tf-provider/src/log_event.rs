//! The shared log-event shape returned by [`crate::LogManager`] and
//! [`crate::ObservabilityManager`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single line of output from a backend, timestamped at the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// When the backend emitted this line.
    pub timestamp: DateTime<Utc>,
    /// The stream this line came from (`stdout`, `stderr`, or a
    /// provider-defined channel name).
    pub stream: String,
    /// The line content.
    pub message: String,
}

impl LogEvent {
    /// Construct a log event stamped at the current instant.
    #[must_use]
    pub fn now(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            stream: stream.into(),
            message: message.into(),
        }
    }
}
