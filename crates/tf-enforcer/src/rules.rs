//! The static RBAC rule table and the object-pattern matcher it is
//! expressed against. Compiled into the binary; never mutated at
//! runtime.

use tf_rbac::{Action, Role};

/// What an object pattern requires of a parsed object's id component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObjectPattern {
    /// Matches any object of any kind. Used only for the admin grant.
    AnyObject,
    /// Matches `<kind>` with a concrete id present, e.g.
    /// `/api/v1/secrets/<id>` or `secret:<id>`.
    KindWithId(&'static str),
    /// Matches `<kind>` with no id present, e.g. `/api/v1/secrets` — the
    /// collection endpoint used to create a new resource.
    KindNoId(&'static str),
    /// Matches `<kind>` whether or not an id is present.
    KindEitherId(&'static str),
}

/// Whether a rule's action slot matches any action or exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActionMatch {
    /// Matches every action. Used only for the admin grant.
    Any,
    /// Matches exactly one action.
    One(Action),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Rule {
    pub role: Role,
    pub object: ObjectPattern,
    pub action: ActionMatch,
}

/// The compile-time RBAC policy. Ownership-based grants (`developer` CRUD
/// on owned resources, and the universal ownership grant any role
/// receives over a resource it is listed as an owner of) are not part of
/// this table — they are evaluated separately against G2 by
/// [`crate::Enforcer::enforce`].
pub(crate) const RULES: &[Rule] = &[
    // admin: every action on every object.
    Rule {
        role: Role::Admin,
        object: ObjectPattern::AnyObject,
        action: ActionMatch::Any,
    },
    // operator: read any secret, create secrets, kill any execution.
    Rule {
        role: Role::Operator,
        object: ObjectPattern::KindWithId("secret"),
        action: ActionMatch::One(Action::Read),
    },
    Rule {
        role: Role::Operator,
        object: ObjectPattern::KindNoId("secret"),
        action: ActionMatch::One(Action::Create),
    },
    Rule {
        role: Role::Operator,
        object: ObjectPattern::KindWithId("execution"),
        action: ActionMatch::One(Action::Kill),
    },
    // developer: create executions and secrets (CRUD on owned resources
    // is handled by the ownership check, not this table).
    Rule {
        role: Role::Developer,
        object: ObjectPattern::KindNoId("execution"),
        action: ActionMatch::One(Action::Create),
    },
    Rule {
        role: Role::Developer,
        object: ObjectPattern::KindNoId("secret"),
        action: ActionMatch::One(Action::Create),
    },
    // viewer: read-only on executions, with or without an id.
    Rule {
        role: Role::Viewer,
        object: ObjectPattern::KindEitherId("execution"),
        action: ActionMatch::One(Action::Read),
    },
    // No rule names "user" for any role but admin: the admin AnyObject
    // grant above is the only path to acting on a user resource.
];

/// The kinds ownership grants cover: Read, Update, Delete, Use, Kill.
/// Create is excluded — creating a resource precedes having an
/// ownership edge for it.
pub(crate) fn ownership_covers(action: Action) -> bool {
    matches!(
        action,
        Action::Read | Action::Update | Action::Delete | Action::Use | Action::Kill
    )
}

/// A request object normalized to its resource kind and (if present) id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedObject {
    pub kind: &'static str,
    pub id: Option<String>,
}

fn normalize_kind(raw: &str) -> Option<&'static str> {
    match raw {
        "secret" | "secrets" => Some("secret"),
        "execution" | "executions" => Some("execution"),
        "image" | "images" => Some("image"),
        "user" | "users" => Some("user"),
        _ => None,
    }
}

/// Parse an object string in either of the two shapes the enforcer
/// accepts: an API path `/api/v<n>/<kind>[/<id>]`, or a resource key
/// `<kind>:<id>`. Returns `None` if the object matches neither shape or
/// names an unrecognized kind.
pub(crate) fn parse_object(object: &str) -> Option<ParsedObject> {
    if let Some(rest) = object.strip_prefix('/') {
        let parts: Vec<&str> = rest.split('/').collect();
        if parts.len() < 3 || parts[0] != "api" || !parts[1].starts_with('v') {
            return None;
        }
        let kind = normalize_kind(parts[2])?;
        let id = parts
            .get(3)
            .filter(|segment| !segment.is_empty())
            .map(|segment| (*segment).to_string());
        return Some(ParsedObject { kind, id });
    }
    let (kind_raw, id_raw) = object.split_once(':')?;
    let kind = normalize_kind(kind_raw)?;
    let id = if id_raw.is_empty() {
        None
    } else {
        Some(id_raw.to_string())
    };
    Some(ParsedObject { kind, id })
}

pub(crate) fn pattern_matches(pattern: ObjectPattern, parsed: &ParsedObject) -> bool {
    match pattern {
        ObjectPattern::AnyObject => true,
        ObjectPattern::KindWithId(kind) => parsed.kind == kind && parsed.id.is_some(),
        ObjectPattern::KindNoId(kind) => parsed.kind == kind && parsed.id.is_none(),
        ObjectPattern::KindEitherId(kind) => parsed.kind == kind,
    }
}

pub(crate) fn action_matches(pattern: ActionMatch, action: Action) -> bool {
    match pattern {
        ActionMatch::Any => true,
        ActionMatch::One(expected) => expected == action,
    }
}

/// Build the canonical resource-key string `<kind>:<id>` for a parsed
/// object with a concrete id. Returns `None` for a parsed object with no
/// id (the collection endpoint has no single owner to check).
pub(crate) fn resource_key(parsed: &ParsedObject) -> Option<String> {
    parsed.id.as_ref().map(|id| format!("{}:{}", parsed.kind, id))
}
