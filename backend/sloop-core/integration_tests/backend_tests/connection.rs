use crate::backend_tests::helpers::{
    FakeBackend, REQUEST_TIMEOUT, RecordingListener, WAIT, connection_pair, connection_pair_with,
};

use sloop_core::connection_factory::RpcConnectionFactory;
use sloop_core::error::transport::TransportError;
use sloop_core::listeners::ListenerAttacher;
use sloop_core::services::ServiceRegistry;
use sloop_core::transport::{BackendLauncher, Connection, ResponseError};

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Launcher whose backend starts talking before `launch()` has returned.
struct EagerLauncher {
    backends: mpsc::UnboundedSender<FakeBackend>,
}

impl BackendLauncher for EagerLauncher {
    fn launch(&self, listeners: &ListenerAttacher) -> Result<Connection, TransportError> {
        let (connection, mut backend) = connection_pair_with(listeners, REQUEST_TIMEOUT);
        let backends = self.backends.clone();
        tokio::spawn(async move {
            backend
                .send(json!({"jsonrpc": "2.0", "method": "progress/started", "params": {"step": 1}}))
                .await;
            backend
                .send(json!({"jsonrpc": "2.0", "id": 7, "method": "progress/echo", "params": {"n": 2}}))
                .await;
            let _ = backends.send(backend);
        });

        // A real process needs a moment between spawn and the handle reaching the caller.
        std::thread::sleep(Duration::from_millis(50));
        Ok(connection)
    }
}

/// **VALUE**: Verifies a request reaches the backend framed as JSON-RPC and its reply is
/// routed back to the caller.
///
/// **WHY THIS MATTERS**: Every service call, including the handshake, rides on this path.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Request ids are not echoed back to the right waiter
/// - The `jsonrpc` version field is missing
/// - Params are dropped or re-shaped on the way out
#[tokio::test]
async fn given_open_connection_when_request_sent_then_backend_reply_returned() {
    // GIVEN: A connection to an in-memory backend
    let (connection, mut backend) = connection_pair(REQUEST_TIMEOUT);
    let connection = Arc::new(connection);

    // WHEN: The host sends a request and the backend answers it
    let caller = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move {
            connection
                .request("analysis/getSupportedFilePatterns", json!({"configScopeId": "ws"}))
                .await
        })
    };
    let (id, params) = backend.expect_request("analysis/getSupportedFilePatterns").await;
    assert_eq!(params, json!({"configScopeId": "ws"}));
    backend.respond(id, json!({"patterns": ["**/*.rs"]})).await;

    // THEN: The caller gets the backend's result
    let result = timeout(WAIT, caller).await.unwrap().unwrap().unwrap();
    assert_eq!(result, json!({"patterns": ["**/*.rs"]}));
}

/// **VALUE**: Verifies concurrent requests are matched to their own replies.
#[tokio::test]
async fn given_two_pending_requests_when_answered_out_of_order_then_each_caller_gets_its_reply() {
    // GIVEN: Two in-flight requests
    let (connection, mut backend) = connection_pair(REQUEST_TIMEOUT);
    let connection = Arc::new(connection);
    let first = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move { connection.request("a/first", json!(1)).await })
    };
    let (first_id, _) = backend.expect_request("a/first").await;
    let second = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move { connection.request("a/second", json!(2)).await })
    };
    let (second_id, _) = backend.expect_request("a/second").await;

    // WHEN: The backend answers the second one first
    backend.respond(second_id, json!("two")).await;
    backend.respond(first_id, json!("one")).await;

    // THEN: No cross-talk
    assert_eq!(timeout(WAIT, first).await.unwrap().unwrap().unwrap(), json!("one"));
    assert_eq!(timeout(WAIT, second).await.unwrap().unwrap().unwrap(), json!("two"));
}

#[tokio::test]
async fn given_backend_error_reply_when_request_sent_then_rpc_error_with_code() {
    let (connection, mut backend) = connection_pair(REQUEST_TIMEOUT);
    let connection = Arc::new(connection);
    let caller = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move { connection.request("initialize", json!({})).await })
    };

    let (id, _) = backend.expect_request("initialize").await;
    backend.respond_error(id, -32603, "storage root is not writable").await;

    let result = timeout(WAIT, caller).await.unwrap().unwrap();
    assert!(matches!(result, Err(TransportError::Rpc { code: -32603, .. })));
}

/// **VALUE**: Verifies backend notifications are routed to the listener for their service.
#[tokio::test]
async fn given_listener_attached_when_backend_notifies_then_listener_receives_local_method() {
    // GIVEN: A listener for the "progress" service
    let (connection, mut backend) = connection_pair(REQUEST_TIMEOUT);
    let (listener, mut seen) = RecordingListener::new("progress");
    connection.add_listener(listener);

    // WHEN: The backend sends progress/report
    backend
        .send(json!({"jsonrpc": "2.0", "method": "progress/report", "params": {"percentage": 40}}))
        .await;

    // THEN: The listener sees the method without its service prefix
    let (method, params) = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
    assert_eq!(method, "report");
    assert_eq!(params, json!({"percentage": 40}));
    assert_eq!(connection.listener_count(), 1);
}

/// **VALUE**: Verifies backend requests nobody handles are refused instead of left hanging.
///
/// **BUG THIS CATCHES**: Would catch the backend blocking forever on a request the host never
/// answers, or the reply carrying the wrong id.
#[tokio::test]
async fn given_no_listener_when_backend_sends_request_then_method_not_found_reply() {
    // GIVEN: A connection without listeners
    let (_connection, mut backend) = connection_pair(REQUEST_TIMEOUT);

    // WHEN: The backend sends a request
    backend
        .send(json!({"jsonrpc": "2.0", "id": 41, "method": "fs/readFile", "params": {}}))
        .await;

    // THEN: It gets method-not-found with its own id
    let reply = backend.recv().await.unwrap();
    assert_eq!(reply["id"], 41);
    assert_eq!(reply["error"]["code"], ResponseError::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn given_listener_handling_requests_when_backend_asks_then_listener_result_returned() {
    let (connection, mut backend) = connection_pair(REQUEST_TIMEOUT);
    let (listener, _seen) = RecordingListener::new("client");
    connection.add_listener(listener);

    backend
        .send(json!({"jsonrpc": "2.0", "id": "req-1", "method": "client/echo", "params": {"x": 1}}))
        .await;

    let reply = backend.recv().await.unwrap();
    assert_eq!(reply["id"], "req-1");
    assert_eq!(reply["result"], json!({"x": 1}));
}

#[tokio::test]
async fn given_backend_notifications_when_host_notifies_then_backend_receives_them() {
    let (connection, mut backend) = connection_pair(REQUEST_TIMEOUT);

    connection
        .notify("configuration/didRemoveConfigurationScope", json!({"removedId": "ws"}))
        .unwrap();

    let params = backend
        .expect_notification("configuration/didRemoveConfigurationScope")
        .await;
    assert_eq!(params, json!({"removedId": "ws"}));
}

/// **VALUE**: Verifies a backend exit flips the connection dead and fails in-flight calls.
///
/// **WHY THIS MATTERS**: The supervisor learns about crashes only through `closed()`.
#[tokio::test]
async fn given_pending_request_when_backend_exits_then_closed_resolves_and_request_fails() {
    // GIVEN: A request waiting on the backend
    let (connection, mut backend) = connection_pair(REQUEST_TIMEOUT);
    let connection = Arc::new(connection);
    let caller = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move { connection.request("lifecycle/ping", json!(null)).await })
    };
    backend.expect_request("lifecycle/ping").await;

    // WHEN: The backend dies
    backend.crash();

    // THEN: closed() resolves, the connection is dead and the caller gets Closed
    timeout(WAIT, connection.closed()).await.unwrap();
    assert!(!connection.is_alive());
    let result = timeout(WAIT, caller).await.unwrap().unwrap();
    assert!(matches!(result, Err(TransportError::Closed { .. })));
}

#[tokio::test]
async fn given_disposed_connection_when_used_then_backend_sees_eof_and_calls_fail() {
    // GIVEN: An open connection
    let (connection, mut backend) = connection_pair(REQUEST_TIMEOUT);

    // WHEN: Disposing it twice
    connection.dispose().await;
    connection.dispose().await;

    // THEN: The backend reads EOF and later calls fail fast
    assert!(backend.recv().await.is_none());
    assert!(!connection.is_alive());
    let request = connection.request("x/y", json!(null)).await;
    assert!(matches!(request, Err(TransportError::Closed { .. })));
    assert!(connection.notify("x/z", json!(null)).unwrap_err().is_closed());
}

#[tokio::test]
async fn given_silent_backend_when_request_sent_then_times_out() {
    let (connection, mut backend) = connection_pair(Duration::from_millis(100));

    let result = connection.request("slow/call", json!(null)).await;

    assert!(matches!(result, Err(TransportError::Timeout { .. })));
    backend.expect_request("slow/call").await;
    assert!(connection.is_alive());
}

/// **VALUE**: Verifies listeners see the very first messages a freshly launched backend sends.
///
/// **WHY THIS MATTERS**: Backends announce readiness and ask for credentials as soon as they
/// start. Anything arriving before listeners are in place would be dropped or refused.
///
/// **BUG THIS CATCHES**: Would catch listeners being attached only after `launch()` returns,
/// which loses the opening notification and answers the opening request with -32601.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_backend_talking_during_launch_when_connection_opened_then_listeners_see_first_messages() {
    // GIVEN: A factory whose backend sends a notification and a request immediately
    let (backends_tx, mut backends) = mpsc::unbounded_channel();
    let (listener, mut seen) = RecordingListener::new("progress");
    let factory = RpcConnectionFactory::new(
        Box::new(EagerLauncher {
            backends: backends_tx,
        }),
        Arc::new(ServiceRegistry::new()),
        ListenerAttacher::new(vec![listener]),
    );

    // WHEN: Opening the connection
    let _connection = factory.start_new_rpc_instance().unwrap();

    // THEN: The listener received both messages, and the request was answered by it
    let (method, params) = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
    assert_eq!(method, "started");
    assert_eq!(params, json!({"step": 1}));
    let (method, _) = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
    assert_eq!(method, "echo");

    let mut backend = timeout(WAIT, backends.recv()).await.unwrap().unwrap();
    let reply = backend.recv().await.unwrap();
    assert_eq!(reply["id"], 7);
    assert_eq!(reply["result"], json!({"n": 2}));
}
