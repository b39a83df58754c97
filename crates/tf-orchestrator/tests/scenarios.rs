//! Seed scenarios exercising the orchestrator's cross-crate wiring end to
//! end: RBAC hydration, ownership sync, env/secret precedence, kill
//! idempotence, claim-once semantics, and trace assembly.

use std::sync::Arc;

use tf_enforcer::Enforcer;
use tf_error::ErrorCode;
use tf_orchestrator::{
    CreateSecretRequest, CreateUserRequest, Orchestrator, OrchestratorDeps, OrchestratorSettings,
    RunCommandRequest,
};
use tf_provider::{
    InMemoryHealthManager, InMemoryImageRegistry, InMemoryLogManager, InMemoryObservabilityManager,
    InMemoryTaskManager, InMemoryWebSocketManager, RequestContext,
};
use tf_repo::{
    InMemoryConnectionRepo, InMemoryExecutionRepo, InMemoryImageRepo, InMemorySecretsRepo,
    InMemoryTokenRepo, InMemoryUserRepo,
};
use tf_status::ExecutionStatus;

/// Every collaborator a scenario needs direct access to, alongside the
/// composed [`Orchestrator`] itself.
struct Fixture {
    orchestrator: Orchestrator,
}

impl Fixture {
    async fn new() -> Self {
        let user_repo = Arc::new(InMemoryUserRepo::new());
        let execution_repo = Arc::new(InMemoryExecutionRepo::new());
        let secrets_repo = Arc::new(InMemorySecretsRepo::new());
        let image_repo = Arc::new(InMemoryImageRepo::new());
        let connection_repo = Arc::new(InMemoryConnectionRepo::new());
        let token_repo = Arc::new(InMemoryTokenRepo::new());
        let task_manager = Arc::new(InMemoryTaskManager::new());
        let image_registry = Arc::new(InMemoryImageRegistry::new());
        let log_manager = Arc::new(InMemoryLogManager::new());
        let observability = Arc::new(InMemoryObservabilityManager::new());
        let websocket_manager = Arc::new(InMemoryWebSocketManager::new(
            token_repo.clone(),
            connection_repo.clone(),
            "wss://executions.local",
            3600,
            32,
        ));
        let health_manager = Arc::new(InMemoryHealthManager::new());
        let enforcer = Arc::new(Enforcer::new());

        enforcer
            .hydrate(
                user_repo.clone(),
                execution_repo.clone(),
                secrets_repo.clone(),
                Some(image_repo.clone() as Arc<dyn tf_repo::ImageRepo>),
            )
            .await
            .unwrap();

        let orchestrator = Orchestrator::new(
            OrchestratorDeps {
                enforcer,
                user_repo,
                execution_repo,
                secrets_repo,
                image_repo,
                connection_repo,
                token_repo,
                task_manager,
                image_registry,
                log_manager,
                observability,
                websocket_manager,
                health_manager,
            },
            OrchestratorSettings::default(),
        );

        Self { orchestrator }
    }
}

/// Create a user, claim the one-time token, and confirm the minted key
/// authenticates to the same, newly-privileged account.
#[tokio::test]
async fn create_then_authorize() {
    let fixture = Fixture::new().await;
    let created = fixture
        .orchestrator
        .create_user(
            "req-create",
            CreateUserRequest {
                email: "dev@example.com".to_string(),
                role: "developer".to_string(),
            },
        )
        .await
        .unwrap();

    let claimed = fixture
        .orchestrator
        .claim_api_key(&created.claim_token, Some("203.0.113.5".to_string()))
        .await
        .unwrap();
    assert_eq!(claimed.email, "dev@example.com");

    let authenticated = fixture.orchestrator.authenticate(&claimed.api_key).await.unwrap();
    assert_eq!(authenticated.email, "dev@example.com");
    assert!(!authenticated.revoked);

    let allowed = fixture
        .orchestrator
        .enforcer()
        .enforce("dev@example.com", "/api/v1/executions", tf_rbac::Action::Create)
        .await
        .unwrap();
    assert!(allowed, "a freshly hydrated developer may create executions");
}

/// `RunCommand` grants the caller ownership of the execution it creates,
/// which is what lets that same caller later read its own status back.
#[tokio::test]
async fn run_command_grants_ownership_to_its_caller() {
    let fixture = Fixture::new().await;
    let ctx = RequestContext::new("req-run");

    let response = fixture
        .orchestrator
        .run_command(
            &ctx,
            "dev@example.com",
            None,
            RunCommandRequest {
                command: "echo hi".to_string(),
                image: "ghcr.io/example/base:latest".to_string(),
                env: Default::default(),
                secrets: Vec::new(),
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(response.status, ExecutionStatus::Starting);

    let has_ownership = fixture
        .orchestrator
        .enforcer()
        .has_ownership_for_resource(&format!("execution:{}", response.execution_id), "dev@example.com")
        .await
        .unwrap();
    assert!(has_ownership);

    let fetched = fixture
        .orchestrator
        .get_execution_status(&response.execution_id)
        .await
        .unwrap();
    assert_eq!(fetched.created_by, "dev@example.com");
    assert_eq!(fetched.owned_by.len(), 1);
}

/// Explicit `env` always wins over a same-keyed secret resolved into the
/// task spec — the secret widens the environment, it does not override
/// it.
#[tokio::test]
async fn explicit_env_wins_over_resolved_secret() {
    let fixture = Fixture::new().await;
    let ctx = RequestContext::new("req-secret");

    fixture
        .orchestrator
        .create_secret(
            "req-secret",
            "dev@example.com",
            CreateSecretRequest {
                name: "github-token".to_string(),
                key_name: "GITHUB_TOKEN".to_string(),
                description: "scm access".to_string(),
                value: "secret-value".to_string(),
            },
        )
        .await
        .unwrap();

    let mut env = std::collections::BTreeMap::new();
    env.insert("GITHUB_TOKEN".to_string(), "explicit-value".to_string());

    let response = fixture
        .orchestrator
        .run_command(
            &ctx,
            "dev@example.com",
            None,
            RunCommandRequest {
                command: "echo hi".to_string(),
                image: "ghcr.io/example/base:latest".to_string(),
                env,
                secrets: vec!["github-token".to_string()],
            },
            None,
        )
        .await
        .unwrap();

    let execution = fixture
        .orchestrator
        .get_execution_status(&response.execution_id)
        .await
        .unwrap();
    assert_eq!(execution.env.get("GITHUB_TOKEN").unwrap(), "explicit-value");
    assert_eq!(execution.secrets, vec!["github-token".to_string()]);
}

/// Killing an execution twice is a no-op the second time: once the
/// status has moved to `Terminating`, a second kill returns `Ok(None)`
/// rather than erroring or re-dispatching to the provider.
#[tokio::test]
async fn kill_execution_is_idempotent() {
    let fixture = Fixture::new().await;
    let ctx = RequestContext::new("req-kill");

    let response = fixture
        .orchestrator
        .run_command(
            &ctx,
            "dev@example.com",
            None,
            RunCommandRequest {
                command: "sleep 100".to_string(),
                image: "ghcr.io/example/base:latest".to_string(),
                env: Default::default(),
                secrets: Vec::new(),
            },
            None,
        )
        .await
        .unwrap();

    let first = fixture
        .orchestrator
        .kill_execution(&ctx, &response.execution_id)
        .await
        .unwrap();
    assert!(first.is_some());
    assert_eq!(first.unwrap().status, ExecutionStatus::Terminating);

    let second = fixture
        .orchestrator
        .kill_execution(&ctx, &response.execution_id)
        .await
        .unwrap();
    assert!(second.is_none(), "a second kill on an already-terminating execution is a no-op");
}

/// A claim token may only be exchanged once; the second attempt is a
/// `Conflict`, not a replay of the first response.
#[tokio::test]
async fn claim_token_can_only_be_used_once() {
    let fixture = Fixture::new().await;
    let created = fixture
        .orchestrator
        .create_user(
            "req-claim",
            CreateUserRequest {
                email: "viewer@example.com".to_string(),
                role: "viewer".to_string(),
            },
        )
        .await
        .unwrap();

    fixture
        .orchestrator
        .claim_api_key(&created.claim_token, None)
        .await
        .unwrap();

    let err = fixture
        .orchestrator
        .claim_api_key(&created.claim_token, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Conflict);
}

/// `FetchTrace` assembles every durable record stamped with a given
/// request id, across executions, secrets, and users alike.
#[tokio::test]
async fn fetch_trace_assembles_records_across_repositories() {
    let fixture = Fixture::new().await;
    let ctx = RequestContext::new("req-trace");

    fixture
        .orchestrator
        .create_user(
            "req-trace",
            CreateUserRequest {
                email: "trace-user@example.com".to_string(),
                role: "developer".to_string(),
            },
        )
        .await
        .unwrap();

    fixture
        .orchestrator
        .create_secret(
            "req-trace",
            "trace-user@example.com",
            CreateSecretRequest {
                name: "trace-secret".to_string(),
                key_name: "TRACE_SECRET".to_string(),
                description: "traced".to_string(),
                value: "v".to_string(),
            },
        )
        .await
        .unwrap();

    fixture
        .orchestrator
        .run_command(
            &ctx,
            "trace-user@example.com",
            None,
            RunCommandRequest {
                command: "echo traced".to_string(),
                image: "ghcr.io/example/base:latest".to_string(),
                env: Default::default(),
                secrets: Vec::new(),
            },
            None,
        )
        .await
        .unwrap();

    let trace = fixture.orchestrator.fetch_trace(&ctx, "req-trace").await.unwrap();
    assert_eq!(trace.users.len(), 1);
    assert_eq!(trace.secrets.len(), 1);
    assert_eq!(trace.executions.len(), 1);

    let empty = fixture.orchestrator.fetch_trace(&ctx, "req-nothing-here").await.unwrap();
    assert!(empty.logs.is_empty());
    assert!(empty.executions.is_empty());
}
