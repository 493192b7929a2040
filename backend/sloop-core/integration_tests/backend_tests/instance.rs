use crate::backend_tests::helpers::{RecordingHost, WAIT, instance_stack, wait_until};

use sloop_core::error::instance::InstanceError;
use sloop_core::error::transport::TransportError;
use sloop_core::instance::{Instance, InstanceFactory};
use sloop_core::services::LifecycleService;

use models::{BindingConfiguration, BoundProject};

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(200);

fn bound_host() -> Arc<RecordingHost> {
    RecordingHost::with_configuration(BindingConfiguration::bound(
        "ws",
        "Workspace",
        BoundProject {
            connection_id: "on-prem".to_string(),
            project_key: "acme:app".to_string(),
        },
    ))
}

/// **VALUE**: Verifies initialize launches a backend, performs the handshake and then pushes
/// the active binding.
///
/// **WHY THIS MATTERS**: The backend is useless until it has both its initialize params and
/// the current configuration scope.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The handshake goes out before the registry points at the new connection
/// - Initialize params are missing client identity or folders
/// - The binding is pushed before the tracker is initialized
#[tokio::test]
async fn given_fresh_instance_when_initialized_then_handshake_then_binding_applied() {
    // GIVEN: An instance wired to an in-memory launcher
    let host = bound_host();
    let mut stack = instance_stack(&host, SHUTDOWN_TIMEOUT);
    let instance = stack.factory.create_instance().unwrap();

    // WHEN: Initializing while the backend answers the handshake
    let (result, (_backend, params)) = tokio::join!(instance.initialize(), async {
        let mut backend = stack.control.next_backend().await;
        let params = backend.complete_handshake().await;
        (backend, params)
    });

    // THEN: Handshake params describe this host, then the binding was applied
    result.unwrap();
    assert_eq!(params["clientConstantInfo"]["name"], sloop_core::SLOOP_CLIENT_NAME);
    assert_eq!(params["storageRoot"], "/tmp/sloop-test/storage");
    assert_eq!(params["userHome"], "/tmp/sloop-test/.sloop");
    assert_eq!(
        host.events(),
        vec!["binding.initialize", "scope.set_current_configuration"]
    );
    assert_eq!(host.applied.lock().unwrap()[0].scope_id, "ws");
    assert_eq!(stack.registry.current_connection_id(), instance.connection_id());
}

#[tokio::test]
async fn given_no_active_binding_when_initialized_then_nothing_applied() {
    let host = Arc::new(RecordingHost::default());
    let mut stack = instance_stack(&host, SHUTDOWN_TIMEOUT);
    let instance = stack.factory.create_instance().unwrap();

    let (result, _backend) = tokio::join!(instance.initialize(), async {
        let mut backend = stack.control.next_backend().await;
        backend.complete_handshake().await;
        backend
    });

    result.unwrap();
    assert_eq!(host.events(), vec!["binding.initialize"]);
}

/// **VALUE**: Verifies a rejected handshake surfaces as a handshake error.
#[tokio::test]
async fn given_backend_rejects_initialize_when_initialized_then_handshake_error() {
    // GIVEN: A backend that refuses the handshake
    let host = bound_host();
    let mut stack = instance_stack(&host, SHUTDOWN_TIMEOUT);
    let instance = stack.factory.create_instance().unwrap();

    // WHEN: Initializing
    let (result, _backend) = tokio::join!(instance.initialize(), async {
        let mut backend = stack.control.next_backend().await;
        let (id, _) = backend.expect_request("initialize").await;
        backend.respond_error(id, -32603, "unsupported client").await;
        backend
    });

    // THEN: Handshake error, no binding pushed
    assert!(matches!(result, Err(InstanceError::Handshake { .. })));
    assert!(host.events().is_empty());
}

#[tokio::test]
async fn given_launcher_failure_when_initialized_then_transport_error() {
    let host = bound_host();
    let stack = instance_stack(&host, SHUTDOWN_TIMEOUT);
    stack.control.fail.store(true, Ordering::SeqCst);
    let instance = stack.factory.create_instance().unwrap();

    let result = instance.initialize().await;

    assert!(matches!(
        result,
        Err(InstanceError::Transport(TransportError::Locate { .. }))
    ));
    assert!(instance.connection_id().is_none());
}

#[tokio::test]
async fn given_disposed_instance_when_initialized_then_disposed_error_and_no_launch() {
    let host = bound_host();
    let stack = instance_stack(&host, SHUTDOWN_TIMEOUT);
    let instance = stack.factory.create_instance().unwrap();
    instance.dispose().await;

    let result = instance.initialize().await;

    assert!(matches!(result, Err(InstanceError::Disposed { .. })));
    assert_eq!(stack.control.launches.load(Ordering::SeqCst), 0);
}

/// **VALUE**: Verifies dispose asks the backend to shut down, then closes the connection.
///
/// **BUG THIS CATCHES**: Would catch the backend being killed without a chance to flush its
/// state, or a second dispose sending a second shutdown.
#[tokio::test]
async fn given_running_instance_when_disposed_then_shutdown_sent_and_connection_closed() {
    // GIVEN: An initialized instance
    let host = bound_host();
    let mut stack = instance_stack(&host, SHUTDOWN_TIMEOUT);
    let instance = stack.factory.create_instance().unwrap();
    let (result, mut backend) = tokio::join!(instance.initialize(), async {
        let mut backend = stack.control.next_backend().await;
        backend.complete_handshake().await;
        backend
    });
    result.unwrap();

    // WHEN: Disposing while the backend acknowledges shutdown
    let ((), eof) = tokio::join!(instance.dispose(), async {
        let (id, _) = backend.expect_request("shutdown").await;
        backend.respond(id, json!(null)).await;
        backend.recv().await
    });

    // THEN: The backend saw EOF, the death future resolved, a second dispose is a no-op
    assert!(eof.is_none());
    timeout(WAIT, instance.wait_for_shutdown()).await.unwrap();
    assert!(instance.is_disposed());
    instance.dispose().await;
    assert!(instance.connection_id().is_none());
}

#[tokio::test]
async fn given_backend_ignoring_shutdown_when_disposed_then_teardown_still_completes() {
    let host = bound_host();
    let mut stack = instance_stack(&host, SHUTDOWN_TIMEOUT);
    let instance = stack.factory.create_instance().unwrap();
    let (result, mut backend) = tokio::join!(instance.initialize(), async {
        let mut backend = stack.control.next_backend().await;
        backend.complete_handshake().await;
        backend
    });
    result.unwrap();

    let ((), _) = tokio::join!(
        async { timeout(WAIT, instance.dispose()).await.unwrap() },
        backend.expect_request("shutdown")
    );

    assert!(backend.recv().await.is_none());
}

/// **VALUE**: Verifies a backend crash resolves the death future without any dispose call.
///
/// **WHY THIS MATTERS**: This is the only signal the supervisor gets that it must restart.
#[tokio::test]
async fn given_running_instance_when_backend_exits_then_wait_for_shutdown_resolves() {
    // GIVEN: An initialized instance
    let host = bound_host();
    let mut stack = instance_stack(&host, SHUTDOWN_TIMEOUT);
    let instance = stack.factory.create_instance().unwrap();
    let (result, backend) = tokio::join!(instance.initialize(), async {
        let mut backend = stack.control.next_backend().await;
        backend.complete_handshake().await;
        backend
    });
    result.unwrap();

    // WHEN: The backend exits
    backend.crash();

    // THEN: The death future resolves and the registry no longer serves proxies
    timeout(WAIT, instance.wait_for_shutdown()).await.unwrap();
    assert!(!instance.is_disposed());
    assert!(
        stack
            .registry
            .try_get_service::<sloop_core::services::LifecycleService>()
            .is_none()
    );
}

/// **VALUE**: Verifies a dispose that lands while the backend is still being launched closes
/// the connection that launch produces.
///
/// **WHY THIS MATTERS**: Shutdown can arrive at any point of a start. A connection opened after
/// dispose has nobody left to close it, so the backend process would outlive the host.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The late connection is adopted and the handshake is sent on it
/// - The registry keeps the late connection as current
/// - The late connection stays open
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_launch_in_progress_when_disposed_then_late_connection_closed_and_unregistered() {
    // GIVEN: An instance whose launch is held inside the launcher
    let host = Arc::new(RecordingHost::default());
    let mut stack = instance_stack(&host, SHUTDOWN_TIMEOUT);
    stack.control.gate.hold();
    let instance = Arc::new(stack.factory.create_instance().unwrap());
    let initializing = tokio::spawn({
        let instance = Arc::clone(&instance);
        async move { instance.initialize().await }
    });
    let gate = Arc::clone(&stack.control.gate);
    wait_until(|| gate.entered()).await;

    // WHEN: Disposing, then letting the launch finish
    instance.dispose().await;
    stack.control.gate.release();
    let result = timeout(WAIT, initializing).await.unwrap().unwrap();

    // THEN: Initialize reports the disposal and the late connection is torn down
    assert!(matches!(result, Err(InstanceError::Disposed { .. })));
    assert_eq!(instance.connection_id(), None);
    assert!(stack.registry.current_connection_id().is_none());
    assert!(stack.registry.try_get_service::<LifecycleService>().is_none());

    let mut backend = stack.control.next_backend().await;
    assert!(
        backend.recv().await.is_none(),
        "no handshake may reach a backend launched after dispose"
    );
    assert!(host.events().is_empty());
}
