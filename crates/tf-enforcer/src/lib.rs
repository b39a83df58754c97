// SPDX-License-Identifier: MIT OR Apache-2.0
//! The authorization enforcer: the only source of truth for "is subject
//! S allowed action A on object O?" during request processing.
//!
//! An [`Enforcer`] holds a static RBAC rule table (compiled in, see
//! [`rules`]) plus two mutable groupings: G1 (user to role labels) and G2
//! (resource key to owner emails). It must stay coherent under
//! concurrent hydration, live mutation from the orchestrator, and
//! compensating rollbacks, which is what makes it the hardest component
//! in the system.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod rules;

use rules::{action_matches, ownership_covers, parse_object, pattern_matches, resource_key};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tf_error::{OrchestratorError, Result};
use tf_rbac::{Action, Role, format_role, role_from_string};
use tf_repo::{ExecutionRepo, ImageRepo, SecretsRepo, UserRepo};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// The in-memory RBAC and ownership enforcer.
///
/// Reads (`enforce`, `get_roles_for_user`, `has_ownership_for_resource`)
/// proceed concurrently with each other; writes (the `add_*`/`remove_*`
/// mutators, and `hydrate`) are serialized against both reads and other
/// writes by `tokio::sync::RwLock`, which favors readers.
pub struct Enforcer {
    g1: RwLock<HashMap<String, BTreeSet<String>>>,
    g2: RwLock<HashMap<String, BTreeSet<String>>>,
    hydrated: AtomicBool,
}

impl Default for Enforcer {
    fn default() -> Self {
        Self::new()
    }
}

impl Enforcer {
    /// Construct an enforcer with empty groupings. The rule table is a
    /// compile-time constant ([`rules::RULES`]) and needs no
    /// construction step of its own.
    #[must_use]
    pub fn new() -> Self {
        Self {
            g1: RwLock::new(HashMap::new()),
            g2: RwLock::new(HashMap::new()),
            hydrated: AtomicBool::new(false),
        }
    }

    /// Returns `true` once [`Enforcer::hydrate`] has completed
    /// successfully.
    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        self.hydrated.load(Ordering::SeqCst)
    }

    /// Populate G1 and G2 from the repositories. Fails fast: any invalid
    /// record (empty identifier, empty creator, unparseable role) aborts
    /// the whole hydration and leaves the enforcer exactly as it was
    /// before the call — partial state is never exposed.
    ///
    /// User, execution, and image loading proceed concurrently; secret
    /// loading is sequential, because each secret failure must be
    /// attributable to that one secret's name rather than to the whole
    /// batch.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::invalid_request`] (tagged
    /// `validation_failure` in its context) on the first invalid record
    /// encountered, and whatever error a repository call itself returns.
    #[instrument(skip_all)]
    pub async fn hydrate(
        &self,
        user_repo: Arc<dyn UserRepo>,
        execution_repo: Arc<dyn ExecutionRepo>,
        secrets_repo: Arc<dyn SecretsRepo>,
        image_repo: Option<Arc<dyn ImageRepo>>,
    ) -> Result<()> {
        let secret_edges = load_secrets(secrets_repo.as_ref()).await?;

        let users_fut = load_users(user_repo.as_ref());
        let executions_fut = load_executions(execution_repo.as_ref());
        let images_fut = load_images(image_repo.as_deref());

        let (user_roles, execution_edges, image_edges) =
            tokio::try_join!(users_fut, executions_fut, images_fut)?;

        let mut g1 = self.g1.write().await;
        let mut g2 = self.g2.write().await;
        g1.clear();
        g2.clear();
        for (email, role_label) in user_roles {
            g1.entry(email).or_default().insert(role_label);
        }
        for (key, owners) in secret_edges
            .into_iter()
            .chain(execution_edges)
            .chain(image_edges)
        {
            g2.entry(key).or_default().extend(owners);
        }
        drop(g1);
        drop(g2);

        self.hydrated.store(true, Ordering::SeqCst);
        debug!("enforcer hydration complete");
        Ok(())
    }

    /// Decide whether `subject` may perform `action` on `object`.
    ///
    /// Deterministic and non-mutating. `object` may be either an API
    /// path (`/api/v1/secrets/github-token`) or a resource key
    /// (`secret:github-token`); unparseable objects are denied rather
    /// than erroring, since no rule can literally match them.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::service_unavailable`] if hydration
    /// has not completed — the only error case, so that a caller that
    /// chooses to treat errors as deny never conflates "hydrating" with
    /// "this subject has no grant."
    pub async fn enforce(&self, subject: &str, object: &str, action: Action) -> Result<bool> {
        if !self.is_hydrated() {
            return Err(OrchestratorError::service_unavailable(
                "enforcer has not completed hydration",
            ));
        }

        let roles = self.get_roles_for_user(subject).await?;
        let subject_roles: BTreeSet<Role> = roles
            .iter()
            .filter_map(|label| label.strip_prefix("role:"))
            .filter_map(|raw| role_from_string(raw).ok())
            .collect();

        let Some(parsed) = parse_object(object) else {
            return Ok(false);
        };

        for rule in rules::RULES {
            if subject_roles.contains(&rule.role)
                && pattern_matches(rule.object, &parsed)
                && action_matches(rule.action, action)
            {
                return Ok(true);
            }
        }

        if ownership_covers(action) {
            if let Some(key) = resource_key(&parsed) {
                if self.has_ownership_for_resource(&key, subject).await? {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// Grant `role` to `email`. Idempotent: granting an already-held role
    /// succeeds without changing state.
    pub async fn add_role_for_user(&self, email: &str, role: Role) -> Result<()> {
        self.g1
            .write()
            .await
            .entry(email.to_string())
            .or_default()
            .insert(format_role(role));
        Ok(())
    }

    /// Revoke a formatted role label (e.g. `"role:developer"`) from
    /// `email`. Idempotent: removing a role the user does not hold
    /// succeeds without error.
    pub async fn remove_role_for_user(&self, email: &str, formatted_role: &str) -> Result<()> {
        if let Some(roles) = self.g1.write().await.get_mut(email) {
            roles.remove(formatted_role);
        }
        Ok(())
    }

    /// Grant ownership of `resource_key` to `owner`. Idempotent.
    pub async fn add_ownership_for_resource(&self, resource_key: &str, owner: &str) -> Result<()> {
        self.g2
            .write()
            .await
            .entry(resource_key.to_string())
            .or_default()
            .insert(owner.to_string());
        Ok(())
    }

    /// Revoke `owner`'s ownership of `resource_key`. Idempotent.
    pub async fn remove_ownership_for_resource(
        &self,
        resource_key: &str,
        owner: &str,
    ) -> Result<()> {
        if let Some(owners) = self.g2.write().await.get_mut(resource_key) {
            owners.remove(owner);
        }
        Ok(())
    }

    /// Remove every ownership edge for `resource_key` (e.g. on secret
    /// deletion). Idempotent.
    pub async fn remove_all_ownerships_for_resource(&self, resource_key: &str) -> Result<()> {
        self.g2.write().await.remove(resource_key);
        Ok(())
    }

    /// Returns `true` if `owner` is recorded as an owner of
    /// `resource_key`.
    pub async fn has_ownership_for_resource(&self, resource_key: &str, owner: &str) -> Result<bool> {
        Ok(self
            .g2
            .read()
            .await
            .get(resource_key)
            .is_some_and(|owners| owners.contains(owner)))
    }

    /// The formatted role labels (e.g. `["role:developer"]`) held by
    /// `email`. Empty if the subject holds no role or is unknown.
    pub async fn get_roles_for_user(&self, email: &str) -> Result<Vec<String>> {
        Ok(self
            .g1
            .read()
            .await
            .get(email)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Diagnostic dump of a grouping policy by name: `"g1"` for the role
    /// grouping, `"g2"` for the ownership grouping. Each tuple is
    /// `(subject, value)`. Unknown names yield an empty list rather than
    /// an error.
    pub async fn get_all_grouping_policies(&self, name: &str) -> Result<Vec<(String, String)>> {
        match name {
            "g1" => Ok(self
                .g1
                .read()
                .await
                .iter()
                .flat_map(|(subject, values)| {
                    values.iter().map(move |v| (subject.clone(), v.clone()))
                })
                .collect()),
            "g2" => Ok(self
                .g2
                .read()
                .await
                .iter()
                .flat_map(|(subject, values)| {
                    values.iter().map(move |v| (subject.clone(), v.clone()))
                })
                .collect()),
            other => {
                warn!(name = other, "unknown grouping policy name");
                Ok(Vec::new())
            }
        }
    }
}

fn validation_failure(entity: &str, detail: impl Into<String>) -> OrchestratorError {
    OrchestratorError::invalid_request(detail)
        .with_context("validation_failure", entity.to_string())
}

async fn load_users(user_repo: &dyn UserRepo) -> Result<Vec<(String, String)>> {
    let users = user_repo.list_users().await?;
    let mut edges = Vec::with_capacity(users.len());
    for user in users {
        if user.email.trim().is_empty() {
            return Err(validation_failure("user", "user record has an empty email"));
        }
        let role = role_from_string(&user.role).map_err(|_| {
            validation_failure(
                "user",
                format!("user {} has an invalid role: {}", user.email, user.role),
            )
        })?;
        edges.push((user.email, format_role(role)));
    }
    Ok(edges)
}

async fn load_secrets(secrets_repo: &dyn SecretsRepo) -> Result<Vec<(String, BTreeSet<String>)>> {
    let secrets = secrets_repo.list_secrets(false).await?;
    let mut edges = Vec::with_capacity(secrets.len());
    for secret in secrets {
        if secret.name.trim().is_empty() {
            return Err(validation_failure("secret", "secret record has an empty name"));
        }
        if secret.created_by.trim().is_empty() {
            return Err(validation_failure(
                "secret",
                format!("secret {} has an empty creator", secret.name),
            ));
        }
        edges.push((format!("secret:{}", secret.name), secret.owned_by));
    }
    Ok(edges)
}

async fn load_executions(
    execution_repo: &dyn ExecutionRepo,
) -> Result<Vec<(String, BTreeSet<String>)>> {
    let executions = execution_repo.list_executions(0, &[]).await?;
    let mut edges = Vec::with_capacity(executions.len());
    for execution in executions {
        if execution.execution_id.trim().is_empty() {
            return Err(validation_failure(
                "execution",
                "execution record has an empty execution_id",
            ));
        }
        if execution.created_by.trim().is_empty() {
            return Err(validation_failure(
                "execution",
                format!("execution {} has an empty creator", execution.execution_id),
            ));
        }
        edges.push((
            format!("execution:{}", execution.execution_id),
            execution.owned_by,
        ));
    }
    Ok(edges)
}

async fn load_images(
    image_repo: Option<&dyn ImageRepo>,
) -> Result<Vec<(String, BTreeSet<String>)>> {
    let Some(image_repo) = image_repo else {
        return Ok(Vec::new());
    };
    let images = image_repo.list_images().await?;
    let mut edges = Vec::with_capacity(images.len());
    for image in images {
        if image.image_id.trim().is_empty() {
            return Err(validation_failure("image", "image record has an empty image_id"));
        }
        if image.created_by.trim().is_empty() {
            return Err(validation_failure(
                "image",
                format!("image {} has an empty creator", image.image_id),
            ));
        }
        edges.push((format!("image:{}", image.image_id), image.owned_by));
    }
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tf_repo::{Execution, ImageInfo, InMemoryExecutionRepo, InMemoryImageRepo, InMemorySecretsRepo, InMemoryUserRepo, Secret, User};
    use tf_status::ExecutionStatus;

    fn repos() -> (
        Arc<InMemoryUserRepo>,
        Arc<InMemoryExecutionRepo>,
        Arc<InMemorySecretsRepo>,
        Arc<InMemoryImageRepo>,
    ) {
        (
            Arc::new(InMemoryUserRepo::new()),
            Arc::new(InMemoryExecutionRepo::new()),
            Arc::new(InMemorySecretsRepo::new()),
            Arc::new(InMemoryImageRepo::new()),
        )
    }

    async fn hydrated_enforcer() -> (Enforcer, Arc<InMemoryExecutionRepo>) {
        let (users, executions, secrets, images) = repos();
        users
            .create_user(User {
                email: "dev@x.com".to_string(),
                role: "developer".to_string(),
                created_at: Utc::now(),
                last_used_at: None,
                revoked: false,
                expires_at: None,
                created_by_request_id: None,
            })
            .await
            .unwrap();
        users
            .create_user(User {
                email: "owner@x.com".to_string(),
                role: "developer".to_string(),
                created_at: Utc::now(),
                last_used_at: None,
                revoked: false,
                expires_at: None,
                created_by_request_id: None,
            })
            .await
            .unwrap();
        executions
            .create_execution(Execution {
                execution_id: "e-1".to_string(),
                created_by: "owner@x.com".to_string(),
                owned_by: BTreeSet::from(["owner@x.com".to_string()]),
                command: "echo hi".to_string(),
                image_id: "img-1".to_string(),
                env: BTreeMap::new(),
                secrets: Vec::new(),
                started_at: Utc::now(),
                completed_at: None,
                status: ExecutionStatus::Running,
                exit_code: None,
                compute_platform: None,
                created_by_request_id: None,
                modified_by_request_id: None,
            })
            .await
            .unwrap();

        let enforcer = Enforcer::new();
        enforcer
            .hydrate(
                users.clone(),
                executions.clone(),
                secrets.clone(),
                Some(images.clone()),
            )
            .await
            .unwrap();
        (enforcer, executions)
    }

    #[tokio::test]
    async fn enforce_before_hydration_is_service_unavailable() {
        let enforcer = Enforcer::new();
        let err = enforcer
            .enforce("dev@x.com", "/api/v1/secrets", Action::Create)
            .await
            .unwrap_err();
        assert_eq!(err.code, tf_error::ErrorCode::ServiceUnavailable);
    }

    #[tokio::test]
    async fn create_then_authorize_scenario() {
        let (enforcer, _executions) = hydrated_enforcer().await;
        assert!(enforcer
            .enforce("dev@x.com", "/api/v1/secrets", Action::Create)
            .await
            .unwrap());
        assert!(!enforcer
            .enforce("dev@x.com", "/api/v1/users/anyone", Action::Read)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn ownership_grants_crud_on_owned_execution() {
        let (enforcer, _executions) = hydrated_enforcer().await;
        assert!(enforcer
            .enforce("owner@x.com", "execution:e-1", Action::Read)
            .await
            .unwrap());
        assert!(enforcer
            .enforce("owner@x.com", "execution:e-1", Action::Kill)
            .await
            .unwrap());
        assert!(!enforcer
            .enforce("dev@x.com", "execution:e-1", Action::Read)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn admin_is_allowed_everything() {
        let (users, executions, secrets, images) = repos();
        users
            .create_user(User {
                email: "root@x.com".to_string(),
                role: "admin".to_string(),
                created_at: Utc::now(),
                last_used_at: None,
                revoked: false,
                expires_at: None,
                created_by_request_id: None,
            })
            .await
            .unwrap();
        let enforcer = Enforcer::new();
        enforcer
            .hydrate(users, executions, secrets, Some(images))
            .await
            .unwrap();
        assert!(enforcer
            .enforce("root@x.com", "/api/v1/users/anyone", Action::Delete)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn operator_can_read_secrets_create_secrets_and_kill_executions_only() {
        let (users, executions, secrets, images) = repos();
        users
            .create_user(User {
                email: "ops@x.com".to_string(),
                role: "operator".to_string(),
                created_at: Utc::now(),
                last_used_at: None,
                revoked: false,
                expires_at: None,
                created_by_request_id: None,
            })
            .await
            .unwrap();
        let enforcer = Enforcer::new();
        enforcer
            .hydrate(users, executions, secrets, Some(images))
            .await
            .unwrap();
        assert!(enforcer
            .enforce("ops@x.com", "/api/v1/secrets/any", Action::Read)
            .await
            .unwrap());
        assert!(enforcer
            .enforce("ops@x.com", "/api/v1/secrets", Action::Create)
            .await
            .unwrap());
        assert!(enforcer
            .enforce("ops@x.com", "/api/v1/executions/e-1", Action::Kill)
            .await
            .unwrap());
        assert!(!enforcer
            .enforce("ops@x.com", "/api/v1/secrets/any", Action::Delete)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn viewer_is_read_only_on_executions() {
        let (users, executions, secrets, images) = repos();
        users
            .create_user(User {
                email: "view@x.com".to_string(),
                role: "viewer".to_string(),
                created_at: Utc::now(),
                last_used_at: None,
                revoked: false,
                expires_at: None,
                created_by_request_id: None,
            })
            .await
            .unwrap();
        let enforcer = Enforcer::new();
        enforcer
            .hydrate(users, executions, secrets, Some(images))
            .await
            .unwrap();
        assert!(enforcer
            .enforce("view@x.com", "/api/v1/executions", Action::Read)
            .await
            .unwrap());
        assert!(enforcer
            .enforce("view@x.com", "/api/v1/executions/e-1", Action::Read)
            .await
            .unwrap());
        assert!(!enforcer
            .enforce("view@x.com", "/api/v1/executions/e-1", Action::Kill)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn hydrate_rejects_empty_identifier() {
        let (users, executions, secrets, images) = repos();
        users
            .create_user(User {
                email: String::new(),
                role: "developer".to_string(),
                created_at: Utc::now(),
                last_used_at: None,
                revoked: false,
                expires_at: None,
                created_by_request_id: None,
            })
            .await
            .unwrap();
        let enforcer = Enforcer::new();
        let err = enforcer
            .hydrate(users, executions, secrets, Some(images))
            .await
            .unwrap_err();
        assert_eq!(err.code, tf_error::ErrorCode::InvalidRequest);
        assert!(!enforcer.is_hydrated());
    }

    #[tokio::test]
    async fn hydrate_rejects_invalid_role() {
        let (users, executions, secrets, images) = repos();
        users
            .create_user(User {
                email: "bad@x.com".to_string(),
                role: "superuser".to_string(),
                created_at: Utc::now(),
                last_used_at: None,
                revoked: false,
                expires_at: None,
                created_by_request_id: None,
            })
            .await
            .unwrap();
        let enforcer = Enforcer::new();
        let err = enforcer
            .hydrate(users, executions, secrets, Some(images))
            .await
            .unwrap_err();
        assert_eq!(err.code, tf_error::ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn mutators_are_idempotent() {
        let enforcer = Enforcer::new();
        enforcer.add_role_for_user("a@x.com", Role::Developer).await.unwrap();
        enforcer.add_role_for_user("a@x.com", Role::Developer).await.unwrap();
        assert_eq!(enforcer.get_roles_for_user("a@x.com").await.unwrap().len(), 1);

        enforcer.remove_role_for_user("a@x.com", "role:developer").await.unwrap();
        enforcer.remove_role_for_user("a@x.com", "role:developer").await.unwrap();
        assert!(enforcer.get_roles_for_user("a@x.com").await.unwrap().is_empty());

        enforcer.add_ownership_for_resource("secret:s-1", "a@x.com").await.unwrap();
        enforcer.add_ownership_for_resource("secret:s-1", "a@x.com").await.unwrap();
        assert!(enforcer.has_ownership_for_resource("secret:s-1", "a@x.com").await.unwrap());

        enforcer.remove_ownership_for_resource("secret:s-1", "a@x.com").await.unwrap();
        enforcer.remove_ownership_for_resource("secret:s-1", "a@x.com").await.unwrap();
        assert!(!enforcer.has_ownership_for_resource("secret:s-1", "a@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn remove_all_ownerships_clears_every_owner() {
        let enforcer = Enforcer::new();
        enforcer.add_ownership_for_resource("secret:s-1", "a@x.com").await.unwrap();
        enforcer.add_ownership_for_resource("secret:s-1", "b@x.com").await.unwrap();
        enforcer.remove_all_ownerships_for_resource("secret:s-1").await.unwrap();
        assert!(!enforcer.has_ownership_for_resource("secret:s-1", "a@x.com").await.unwrap());
        assert!(!enforcer.has_ownership_for_resource("secret:s-1", "b@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn get_all_grouping_policies_reports_both_sets() {
        let enforcer = Enforcer::new();
        enforcer.add_role_for_user("a@x.com", Role::Admin).await.unwrap();
        enforcer.add_ownership_for_resource("secret:s-1", "a@x.com").await.unwrap();
        let g1 = enforcer.get_all_grouping_policies("g1").await.unwrap();
        assert_eq!(g1, vec![("a@x.com".to_string(), "role:admin".to_string())]);
        let g2 = enforcer.get_all_grouping_policies("g2").await.unwrap();
        assert_eq!(g2, vec![("secret:s-1".to_string(), "a@x.com".to_string())]);
        assert!(enforcer.get_all_grouping_policies("unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unparseable_object_is_denied_not_errored() {
        let (enforcer, _executions) = hydrated_enforcer().await;
        assert!(!enforcer
            .enforce("dev@x.com", "not-an-object", Action::Read)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn image_repo_is_optional_at_hydration() {
        let (users, executions, secrets, _images) = repos();
        users
            .create_user(User {
                email: "dev@x.com".to_string(),
                role: "developer".to_string(),
                created_at: Utc::now(),
                last_used_at: None,
                revoked: false,
                expires_at: None,
                created_by_request_id: None,
            })
            .await
            .unwrap();
        let enforcer = Enforcer::new();
        enforcer
            .hydrate(users, executions, secrets, None)
            .await
            .unwrap();
        assert!(enforcer.is_hydrated());
    }

    #[tokio::test]
    async fn image_ownership_is_hydrated() {
        let (users, executions, secrets, images) = repos();
        images
            .put(ImageInfo {
                image_id: "img-1".to_string(),
                image: "ubuntu:22.04".to_string(),
                cpu: None,
                memory: None,
                platform: None,
                created_by: "admin@x.com".to_string(),
                owned_by: BTreeSet::from(["admin@x.com".to_string()]),
                created_at: Utc::now(),
            })
            .await;
        let enforcer = Enforcer::new();
        enforcer
            .hydrate(users, executions, secrets, Some(images))
            .await
            .unwrap();
        assert!(enforcer
            .has_ownership_for_resource("image:img-1", "admin@x.com")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn secret_ownership_is_hydrated() {
        let (users, executions, secrets, images) = repos();
        secrets
            .create_secret(Secret {
                name: "github-token".to_string(),
                key_name: "GITHUB_TOKEN".to_string(),
                description: String::new(),
                value: "super-secret".to_string(),
                created_by: "dev@x.com".to_string(),
                owned_by: BTreeSet::from(["dev@x.com".to_string()]),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                created_by_request_id: None,
                modified_by_request_id: None,
            })
            .await
            .unwrap();
        let enforcer = Enforcer::new();
        enforcer
            .hydrate(users, executions, secrets, Some(images))
            .await
            .unwrap();
        assert!(enforcer
            .has_ownership_for_resource("secret:github-token", "dev@x.com")
            .await
            .unwrap());
    }
}
