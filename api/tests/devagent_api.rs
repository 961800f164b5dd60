//! Listener surface tests: validation, auth, and the full run → get →
//! revoke flow against a mocked remote and local fixture repos.

#![cfg(unix)]

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use api::auth::generate_signature;
use api::config::ListenerConfig;
use api::core::app_state::AppState;
use diff_provider::{DiffProviderRegistry, GitcodeClient, ProviderClient};
use review_pipeline::ReviewRuntime;
use review_store::ReviewStore;
use serde_json::{Value, json};
use task_broker::Broker;
use task_info_store::TaskInfoStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn seed_repo(dir: &Path, files: &[(&str, &str)]) -> String {
    let repo = git2::Repository::init(dir).unwrap();
    let mut index = repo.index().unwrap();
    for (file, content) in files {
        let full = dir.join(file);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
        index.add_path(Path::new(file)).unwrap();
    }
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = git2::Signature::now("test", "test@example.com").unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "seed", &tree, &[])
        .unwrap();
    repo.head().unwrap().shorthand().unwrap().to_string()
}

fn write_stub(dir: &Path, body: &str) -> PathBuf {
    let stub = dir.join("devagent");
    std::fs::write(&stub, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&stub).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&stub, perms).unwrap();
    stub
}

struct TestApp {
    addr: SocketAddr,
    project_branch: String,
    _origins: tempfile::TempDir,
    _tool_dir: tempfile::TempDir,
}

impl TestApp {
    fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{path_and_query}", self.addr)
    }
}

/// Boots the listener on an ephemeral port with a mocked gitcode API,
/// local origin repos and a stub review tool.
async fn spawn_app(remote_api: &MockServer, auth_secret: Option<&str>) -> TestApp {
    let origins = tempfile::tempdir().unwrap();

    let rules_branch = seed_repo(
        &origins.path().join("rules/review"),
        &[
            (
                ".REVIEW_RULES.json",
                r#"[{"name": "rule1.md", "dirs": ["owner/proj/src"], "once": false}]"#,
            ),
            ("REVIEW_RULES/rule1.md", "# rule body\n"),
        ],
    );
    let project_branch = seed_repo(
        &origins.path().join("owner/proj"),
        &[("src/main.cpp", "int main() { return 0; }\n")],
    );

    let tool_dir = tempfile::tempdir().unwrap();
    let stub = write_stub(
        tool_dir.path(),
        r#"echo '{"violations":[{"rule":"hallucinated","file":"src/main.cpp","line":2,"message":"finding"}]}'"#,
    );

    let mut config = ListenerConfig::from_env();
    config.auth_enabled = auth_secret.is_some();
    config.secret_key = auth_secret.unwrap_or("").to_string();
    config.review.max_workers = 2;
    config.review.shallow_fetch = false;
    config.review.clone_base = Some(origins.path().to_string_lossy().into_owned());
    config.review.rules_project = "rules/review".to_string();
    config.review.rules_revision = rules_branch;
    config.review.devagent_bin = stub.to_string_lossy().into_owned();
    config.review.devagent_root = tool_dir.path().join("nonexistent").display().to_string();

    let store = ReviewStore::connect("sqlite::memory:").await.unwrap();
    store.init_schema().await.unwrap();

    let mut providers = DiffProviderRegistry::with_backoff(2, Duration::ZERO);
    providers.register(ProviderClient::Gitcode(GitcodeClient::new(
        reqwest::Client::new(),
        remote_api.uri(),
        "token".to_string(),
    )));

    let runtime = ReviewRuntime::new(
        config.review.clone(),
        Broker::new(Duration::from_secs(3600), 256),
        TaskInfoStore::new(Duration::from_secs(3600)),
        store,
        providers,
    );

    let state = AppState::new(config, runtime);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, api::router(state)).await.unwrap();
    });

    TestApp {
        addr,
        project_branch,
        _origins: origins,
        _tool_dir: tool_dir,
    }
}

fn mount_pr_files(server: &MockServer, base_branch: &str) -> impl std::future::Future<Output = ()> {
    let template = ResponseTemplate::new(200).set_body_json(json!({
        "code": 0,
        "count": 1,
        "added_lines": 1,
        "remove_lines": 0,
        "diff_refs": {"base_sha": base_branch, "head_sha": "head"},
        "diffs": [{
            "statistic": {"path": "src/main.cpp", "old_path": "src/main.cpp", "new_path": "src/main.cpp"},
            "added_lines": 1,
            "remove_lines": 0,
            "content": {"text": [
                {"type": "match", "line_content": "@@ -1,1 +1,2 @@"},
                {"type": "context", "line_content": "int main() { return 0; }"},
                {"type": "new", "line_content": "int unused;"}
            ]}
        }]
    }));
    Mock::given(method("GET"))
        .and(path("/repos/owner/proj/pulls/1/files.json"))
        .respond_with(template)
        .mount(server)
}

async fn get_json(url: &str) -> (u16, Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = resp.status().as_u16();
    let body = resp.json().await.unwrap();
    (status, body)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn health_endpoint_answers() {
    let remote = MockServer::start().await;
    let app = spawn_app(&remote, None).await;

    let (status, body) = get_json(&app.url("/health")).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invalid_inputs_are_rejected() {
    let remote = MockServer::start().await;
    let app = spawn_app(&remote, None).await;

    // Unknown task kind.
    let (status, _) = get_json(&app.url("/api/v1/devagent?task_kind=7&action=1&payload=x")).await;
    assert_eq!(status, 400);

    // Missing action.
    let (status, _) = get_json(&app.url("/api/v1/devagent?task_kind=0")).await;
    assert_eq!(status, 400);

    // Unknown action.
    let (status, _) = get_json(&app.url("/api/v1/devagent?task_kind=0&action=9")).await;
    assert_eq!(status, 400);

    // Run without payload.
    let (status, _) = get_json(&app.url("/api/v1/devagent?task_kind=0&action=1")).await;
    assert_eq!(status, 400);

    // Run with a URL of an unknown remote.
    let (status, _) = get_json(&app.url(
        "/api/v1/devagent?task_kind=0&action=1&payload=https%3A%2F%2Fexample.com%2Fo%2Fr%2Fpull%2F1",
    ))
    .await;
    assert_eq!(status, 400);

    // Run with a known remote but no pull segment.
    let (status, _) = get_json(&app.url(
        "/api/v1/devagent?task_kind=0&action=1&payload=https%3A%2F%2Fgitcode.com%2Fo%2Fr%2Fissues%2F1",
    ))
    .await;
    assert_eq!(status, 400);

    // Revoke without task_id.
    let (status, _) = get_json(&app.url("/api/v1/devagent?task_kind=0&action=2")).await;
    assert_eq!(status, 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unknown_job_polls_as_pending() {
    let remote = MockServer::start().await;
    let app = spawn_app(&remote, None).await;

    let (status, body) =
        get_json(&app.url("/api/v1/devagent?task_kind=0&action=0&payload=no-such-job")).await;
    assert_eq!(status, 200);
    assert_eq!(body["task_status"], 4);
    assert_eq!(body["task_result"], Value::Null);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn run_get_revoke_flow() {
    let remote = MockServer::start().await;
    let app = spawn_app(&remote, None).await;

    // The reviewed project's branch doubles as the PR base revision.
    mount_pr_files(&remote, &app.project_branch).await;

    let payload = "https%3A%2F%2Fgitcode.com%2Fowner%2Fproj%2Fpull%2F1";
    let (status, body) =
        get_json(&app.url(&format!("/api/v1/devagent?task_kind=0&action=1&payload={payload}")))
            .await;
    assert_eq!(status, 200);
    let job_id = body["task_id"].as_str().unwrap().to_string();

    // Poll until terminal.
    let deadline = Instant::now() + Duration::from_secs(60);
    let final_body = loop {
        let (status, body) = get_json(&app.url(&format!(
            "/api/v1/devagent?task_kind=0&action=0&payload={job_id}"
        )))
        .await;
        assert_eq!(status, 200);
        if body["task_status"] != 4 {
            break body;
        }
        assert!(Instant::now() < deadline, "job never finished");
        tokio::time::sleep(Duration::from_millis(25)).await;
    };

    assert_eq!(final_body["task_status"], 1);
    let violations = final_body["task_result"]["results"]["owner/proj"]
        .as_array()
        .unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0]["rule"], "rule1");

    // Revoking a finished job is a no-op.
    let (status, _) = get_json(&app.url(&format!(
        "/api/v1/devagent?task_kind=0&action=2&task_id={job_id}"
    )))
    .await;
    assert_eq!(status, 200);

    let (_, body) = get_json(&app.url(&format!(
        "/api/v1/devagent?task_kind=0&action=0&payload={job_id}"
    )))
    .await;
    assert_eq!(body["task_status"], 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn signed_requests_only_when_auth_enabled() {
    let remote = MockServer::start().await;
    let app = spawn_app(&remote, Some("s3cret")).await;

    let path_and_query = "/api/v1/devagent?task_kind=0&action=0&payload=some-job";

    // Unsigned request is refused.
    let (status, _) = get_json(&app.url(path_and_query)).await;
    assert_eq!(status, 401);

    // Properly signed request passes.
    let timestamp = "1700000000";
    let sign = generate_signature(timestamp, path_and_query, "s3cret");
    let resp = reqwest::Client::new()
        .get(app.url(path_and_query))
        .header("timestamp", timestamp)
        .header("sign", sign)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    // A signature over a different query is refused.
    let other = generate_signature(timestamp, "/api/v1/devagent?task_kind=0&action=2", "s3cret");
    let resp = reqwest::Client::new()
        .get(app.url(path_and_query))
        .header("timestamp", timestamp)
        .header("sign", other)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}
