// End-to-end tests of the wired host against an in-memory backend

use super::helpers::{ChannelNotifier, DuplexLauncher, next_backend, test_paths, wait_until};

use sloop::app::SloopApp;

use sloop_core::config::SloopConfig;
use sloop_core::services::ConnectionService;
use sloop_core::supervisor::SupervisorState;
use sloop_core::thread_guard::ThreadGuard;

use serde_json::json;
use serial_test::serial;

const HOST_CONFIG: &str = r#"
[[connections]]
kind = "sonarqube"
id = "local-sq"
url = "http://localhost:9000"

[restart]
max_starts_before_manual = 2

[binding]
scope_id = "workspace"
scope_name = "Workspace"
connection_id = "local-sq"
project_key = "acme:app"
"#;

/// **VALUE**: Verifies a started host performs the handshake, announces its connections and
/// declares its scope, in that order, then shuts the backend down cleanly.
///
/// **WHY THIS MATTERS**: This is the whole startup contract a backend relies on. Any reordering
/// (scope before connections, anything before `initialize`) breaks a real backend.
#[tokio::test]
async fn given_wired_host_when_started_then_backend_receives_startup_sequence() {
    // GIVEN: A host wired to an in-memory backend
    let config = SloopConfig::parse(HOST_CONFIG).expect("valid config");
    let (launcher, mut backends) = DuplexLauncher::new();
    let (notifier, _gate) = ChannelNotifier::new();
    let app = SloopApp::with_parts(
        config,
        test_paths(),
        ThreadGuard::unbound(),
        Box::new(launcher),
        notifier,
    );

    // WHEN: Starting the host
    app.start();
    let mut backend = next_backend(&mut backends).await;

    // THEN: initialize, then the connections, then the scope
    let (id, params) = backend.expect_request("initialize").await;
    assert_eq!(params["clientConstantInfo"]["name"], "sloop-host");
    backend.respond(id, json!({})).await;

    let connections = backend
        .expect_notification("connection/didUpdateConnections")
        .await;
    assert_eq!(connections["sonarQubeConnections"][0]["connectionId"], "local-sq");

    let scopes = backend
        .expect_notification("configuration/didAddConfigurationScopes")
        .await;
    assert_eq!(scopes["addedScopes"][0]["id"], "workspace");
    assert_eq!(scopes["addedScopes"][0]["binding"]["sonarProjectKey"], "acme:app");

    wait_until(|| app.supervisor().state() == SupervisorState::Running).await;
    assert_eq!(app.scope_tracker().declared_scope().as_deref(), Some("workspace"));

    // WHEN: Shutting down while the backend answers the shutdown request
    let answer = tokio::spawn(async move {
        let (id, _) = backend.expect_request("shutdown").await;
        backend.respond(id, json!(null)).await;
        backend.recv().await
    });
    app.shutdown().await;

    // THEN: The backend sees EOF and the host is fully disposed
    let after_shutdown = answer.await.expect("backend task panicked");
    assert!(after_shutdown.is_none(), "unexpected message after shutdown");
    assert_eq!(app.supervisor().state(), SupervisorState::Disposed);
    assert_eq!(app.scope_tracker().declared_scope(), None);
    assert!(app.registry().try_get_service::<ConnectionService>().is_none());
}

/// **VALUE**: Verifies the host answers the backend's credential requests over the live
/// connection.
///
/// **BUG THIS CATCHES**: Would catch the connection tracker not being attached as a listener,
/// leaving the backend with a method-not-found reply.
#[tokio::test]
#[serial]
async fn given_token_in_env_when_backend_requests_credentials_then_host_replies() {
    // GIVEN: A running host and a token for its connection
    unsafe {
        std::env::set_var("SLOOP_TOKEN_LOCAL_SQ", "squ_abc");
    }
    let config = SloopConfig::parse(HOST_CONFIG).expect("valid config");
    let (launcher, mut backends) = DuplexLauncher::new();
    let (notifier, _gate) = ChannelNotifier::new();
    let app = SloopApp::with_parts(
        config,
        test_paths(),
        ThreadGuard::unbound(),
        Box::new(launcher),
        notifier,
    );
    app.start();
    let mut backend = next_backend(&mut backends).await;
    let (id, _) = backend.expect_request("initialize").await;
    backend.respond(id, json!({})).await;
    backend
        .expect_notification("connection/didUpdateConnections")
        .await;
    backend
        .expect_notification("configuration/didAddConfigurationScopes")
        .await;

    // WHEN: The backend asks for credentials
    backend
        .send(json!({
            "jsonrpc": "2.0",
            "id": 41,
            "method": "connection/getCredentials",
            "params": {"connectionId": "local-sq"},
        }))
        .await;

    // THEN: The host replies with the token
    let reply = backend.recv().await.expect("host closed the connection");
    unsafe {
        std::env::remove_var("SLOOP_TOKEN_LOCAL_SQ");
    }
    assert_eq!(reply["id"], 41);
    assert_eq!(reply["result"]["token"], "squ_abc");

    drop(backend);
    app.shutdown().await;
}

/// **VALUE**: Verifies a crashing backend is restarted and the scope is declared again on the
/// fresh one.
///
/// **WHY THIS MATTERS**: After a crash the new backend has no scopes; the tracker must not treat
/// the old declaration as still valid.
#[tokio::test]
async fn given_running_host_when_backend_crashes_then_restarted_with_scope_redeclared() {
    // GIVEN: A running host
    let config = SloopConfig::parse(HOST_CONFIG).expect("valid config");
    let (launcher, mut backends) = DuplexLauncher::new();
    let (notifier, mut gate) = ChannelNotifier::new();
    let app = SloopApp::with_parts(
        config,
        test_paths(),
        ThreadGuard::unbound(),
        Box::new(launcher),
        notifier,
    );
    app.start();
    let mut first = next_backend(&mut backends).await;
    let (id, _) = first.expect_request("initialize").await;
    first.respond(id, json!({})).await;
    first
        .expect_notification("connection/didUpdateConnections")
        .await;
    first
        .expect_notification("configuration/didAddConfigurationScopes")
        .await;

    // WHEN: The backend dies
    drop(first);

    // THEN: A second backend is started and told about the scope with an add, not an update
    let mut second = next_backend(&mut backends).await;
    let (id, _) = second.expect_request("initialize").await;
    second.respond(id, json!({})).await;
    second
        .expect_notification("connection/didUpdateConnections")
        .await;
    let scopes = second
        .expect_notification("configuration/didAddConfigurationScopes")
        .await;
    assert_eq!(scopes["addedScopes"][0]["id"], "workspace");
    assert_eq!(app.supervisor().current_start_number(), 2);

    // WHEN: The second one dies too
    drop(second);

    // THEN: The restart budget of two is spent and the gate is shown
    let reset = tokio::time::timeout(super::helpers::WAIT, gate.recv())
        .await
        .expect("gate not shown")
        .expect("notifier dropped");
    assert!(backends.try_recv().is_err(), "no third launch before the gate");

    drop(reset);
    app.shutdown().await;
    assert_eq!(app.supervisor().state(), SupervisorState::Disposed);
}
