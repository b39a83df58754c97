// SPDX-License-Identifier: MIT OR Apache-2.0
//! Role and resource vocabulary shared by the enforcer, the repositories,
//! and the orchestrator.
//!
//! Nothing in this crate touches storage or I/O: it is the closed set of
//! names the rest of the system reasons about, plus the handful of pure
//! formatting/parsing functions that keep those names canonical wherever
//! they cross a boundary (wire payloads, log fields, grouping-policy
//! tuples).

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::fmt;
use tf_error::{OrchestratorError, Result};

/// The four roles a user may hold. Roles are exhaustive and exclusive of
/// each other in the grouping policy — a user holds exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Unrestricted access to every resource kind and action.
    Admin,
    /// Operator access: read and kill on executions, create on secrets.
    Operator,
    /// Developer access: full CRUD on resources the developer owns.
    Developer,
    /// Read-only access to executions.
    Viewer,
}

impl Role {
    /// The canonical lowercase name for this role, as it appears in
    /// grouping-policy tuples and log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::Developer => "developer",
            Role::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The full, ordered set of valid roles.
#[must_use]
pub fn valid_roles() -> &'static [Role] {
    &[Role::Admin, Role::Operator, Role::Developer, Role::Viewer]
}

/// Parse a role from its canonical lowercase name.
///
/// Matching is strict: `"Admin"` and `"ADMIN"` are rejected alongside
/// unknown names and the empty string. Callers that accept role names
/// from configuration or a wire payload should surface this error
/// verbatim rather than coercing case.
///
/// # Errors
///
/// Returns [`OrchestratorError::invalid_request`] if `raw` is empty or is
/// not one of the canonical role names.
pub fn role_from_string(raw: &str) -> Result<Role> {
    match raw {
        "admin" => Ok(Role::Admin),
        "operator" => Ok(Role::Operator),
        "developer" => Ok(Role::Developer),
        "viewer" => Ok(Role::Viewer),
        "" => Err(OrchestratorError::invalid_request("role name must not be empty")
            .with_context("field", "role")),
        other => Err(OrchestratorError::invalid_request(format!(
            "unknown role: {other}"
        ))
        .with_context("field", "role")
        .with_context("value", other.to_string())),
    }
}

/// Returns `true` if `raw` is a canonical role name, without allocating an
/// error for the caller that only needs a boolean.
#[must_use]
pub fn is_valid_role(raw: &str) -> bool {
    matches!(raw, "admin" | "operator" | "developer" | "viewer")
}

/// Format a role the way it is written into a grouping-policy subject or
/// a log field: `role:<name>`.
#[must_use]
pub fn format_role(role: Role) -> String {
    format!("role:{}", role.as_str())
}

/// The six actions a policy rule or an authorization request can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Create a new resource.
    Create,
    /// Read an existing resource.
    Read,
    /// Update an existing resource.
    Update,
    /// Delete an existing resource.
    Delete,
    /// Terminate a running execution.
    Kill,
    /// Consume a resource without mutating it (e.g. streaming its logs).
    Use,
}

impl Action {
    /// The canonical lowercase name for this action.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Kill => "kill",
            Action::Use => "use",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse an action from its canonical lowercase name.
///
/// # Errors
///
/// Returns [`OrchestratorError::invalid_request`] if `raw` is not one of
/// the canonical action names.
pub fn action_from_string(raw: &str) -> Result<Action> {
    match raw {
        "create" => Ok(Action::Create),
        "read" => Ok(Action::Read),
        "update" => Ok(Action::Update),
        "delete" => Ok(Action::Delete),
        "kill" => Ok(Action::Kill),
        "use" => Ok(Action::Use),
        other => Err(OrchestratorError::invalid_request(format!(
            "unknown action: {other}"
        ))
        .with_context("field", "action")
        .with_context("value", other.to_string())),
    }
}

/// The resource kinds the enforcer and the ownership table reason about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A command execution.
    Execution,
    /// A secret value.
    Secret,
    /// A container image registration.
    Image,
    /// A user account.
    User,
}

impl ResourceKind {
    /// The canonical lowercase name for this resource kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Execution => "execution",
            ResourceKind::Secret => "secret",
            ResourceKind::Image => "image",
            ResourceKind::User => "user",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete resource identity: its kind plus its instance id, e.g.
/// `execution:a1b2c3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    /// The kind of resource this key identifies.
    pub kind: ResourceKind,
    /// The resource's instance id, opaque to this crate.
    pub id: String,
}

impl ResourceKey {
    /// Construct a new resource key.
    #[must_use]
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Format a resource kind and id the way they appear in an ownership
/// grouping-policy object or a log field: `<kind>:<id>`.
#[must_use]
pub fn format_resource_id(kind: ResourceKind, id: &str) -> String {
    format!("{kind}:{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_from_string_accepts_canonical_names() {
        assert_eq!(role_from_string("admin").unwrap(), Role::Admin);
        assert_eq!(role_from_string("operator").unwrap(), Role::Operator);
        assert_eq!(role_from_string("developer").unwrap(), Role::Developer);
        assert_eq!(role_from_string("viewer").unwrap(), Role::Viewer);
    }

    #[test]
    fn role_from_string_rejects_wrong_case() {
        assert!(role_from_string("Admin").is_err());
        assert!(role_from_string("ADMIN").is_err());
    }

    #[test]
    fn role_from_string_rejects_empty() {
        let err = role_from_string("").unwrap_err();
        assert_eq!(err.code, tf_error::ErrorCode::InvalidRequest);
    }

    #[test]
    fn role_from_string_rejects_unknown() {
        assert!(role_from_string("superuser").is_err());
    }

    #[test]
    fn is_valid_role_matches_role_from_string() {
        for raw in ["admin", "operator", "developer", "viewer", "", "Admin", "x"] {
            assert_eq!(is_valid_role(raw), role_from_string(raw).is_ok());
        }
    }

    #[test]
    fn valid_roles_has_all_four_and_matches_display() {
        let roles = valid_roles();
        assert_eq!(roles.len(), 4);
        for role in roles {
            assert!(is_valid_role(role.as_str()));
            assert_eq!(role.to_string(), role.as_str());
        }
    }

    #[test]
    fn format_role_is_prefixed() {
        assert_eq!(format_role(Role::Admin), "role:admin");
        assert_eq!(format_role(Role::Viewer), "role:viewer");
    }

    #[test]
    fn action_from_string_roundtrip() {
        for action in [
            Action::Create,
            Action::Read,
            Action::Update,
            Action::Delete,
            Action::Kill,
            Action::Use,
        ] {
            assert_eq!(action_from_string(action.as_str()).unwrap(), action);
        }
    }

    #[test]
    fn action_from_string_rejects_unknown() {
        assert!(action_from_string("destroy").is_err());
    }

    #[test]
    fn format_resource_id_matches_display() {
        let key = ResourceKey::new(ResourceKind::Execution, "e-1");
        assert_eq!(key.to_string(), "execution:e-1");
        assert_eq!(format_resource_id(ResourceKind::Execution, "e-1"), key.to_string());
    }

    #[test]
    fn resource_kind_names_are_stable() {
        assert_eq!(ResourceKind::Execution.as_str(), "execution");
        assert_eq!(ResourceKind::Secret.as_str(), "secret");
        assert_eq!(ResourceKind::Image.as_str(), "image");
        assert_eq!(ResourceKind::User.as_str(), "user");
    }

    #[test]
    fn role_serde_roundtrip() {
        let json = serde_json::to_string(&Role::Developer).unwrap();
        assert_eq!(json, "\"developer\"");
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Role::Developer);
    }
}
