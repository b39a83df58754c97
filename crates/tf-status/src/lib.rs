// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution status state machine.
//!
//! [`ExecutionStatus`] is the lifecycle of a single command execution, and
//! [`can_transition`] is the single source of truth for which moves
//! between states are legal. Nothing here persists or observes state —
//! the repository stores the current status, the provider reports what
//! actually happened, and the orchestrator is the only caller that
//! invokes [`can_transition`] before writing a new value.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle states of a command execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The execution has been accepted and is being provisioned.
    Starting,
    /// The execution is running on its backend.
    Running,
    /// The execution finished with a zero exit condition.
    Succeeded,
    /// The execution finished with a non-zero exit condition, or failed
    /// before it could run.
    Failed,
    /// The execution was killed and has fully stopped.
    Stopped,
    /// A kill has been requested. This is the final recorded status for a
    /// killed execution: once set, nothing transitions out of it.
    Terminating,
}

impl ExecutionStatus {
    /// The canonical lowercase name for this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Starting => "starting",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Succeeded => "succeeded",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Stopped => "stopped",
            ExecutionStatus::Terminating => "terminating",
        }
    }

    /// Returns `true` if this status is terminal: no further transition is
    /// ever legal out of it.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        terminal_execution_statuses().contains(&self)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The statuses from which no further transition is legal:
/// `Succeeded`, `Failed`, `Stopped`, and `Terminating`.
///
/// `Terminating` is terminal even though its name suggests otherwise: it
/// is the final recorded status once a kill has been accepted, and
/// nothing moves an execution out of it through this predicate. Only
/// `Starting` and `Running` are in-flight.
#[must_use]
pub fn terminal_execution_statuses() -> &'static [ExecutionStatus] {
    &[
        ExecutionStatus::Succeeded,
        ExecutionStatus::Failed,
        ExecutionStatus::Stopped,
        ExecutionStatus::Terminating,
    ]
}

/// Returns `true` if moving from `from` to `to` is a legal transition.
///
/// The complete table:
///
/// - `Starting -> Running` (provisioning succeeded)
/// - `Starting -> Terminating` (killed before it started running)
/// - `Running -> Succeeded` (provider-reported success)
/// - `Running -> Failed` (provider-reported failure)
/// - `Running -> Stopped` (provider-reported stop)
/// - `Running -> Terminating` (kill requested)
///
/// Every other pair, including any transition out of a terminal status,
/// returns `false`. In particular `can_transition(S, Terminating)` is
/// `false` for every terminal `S` — killing an already-finished execution
/// is a no-op at the status-machine level, which is what makes
/// `KillExecution` idempotent.
#[must_use]
pub fn can_transition(from: ExecutionStatus, to: ExecutionStatus) -> bool {
    use ExecutionStatus::{Failed, Running, Starting, Stopped, Succeeded, Terminating};
    matches!(
        (from, to),
        (Starting, Running)
            | (Starting, Terminating)
            | (Running, Succeeded)
            | (Running, Failed)
            | (Running, Stopped)
            | (Running, Terminating)
    )
}
