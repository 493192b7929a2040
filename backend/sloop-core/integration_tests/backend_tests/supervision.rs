use crate::backend_tests::helpers::{
    ChannelNotifier, RecordingHost, WAIT, instance_stack, wait_until,
};

use sloop_core::handler::SloopHandler;
use sloop_core::supervisor::{InstanceSupervisor, SupervisorState};
use sloop_core::thread_guard::ThreadGuard;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

/// **VALUE**: Verifies the whole stack restarts a crashed backend, parks after the budget and
/// resumes on manual retry.
///
/// **WHY THIS MATTERS**: This is the user-visible contract: crashes heal themselves a bounded
/// number of times, then the user decides.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - A crash does not trigger a new launch
/// - Scope state survives a backend death
/// - The retry callback does not resume the loop
/// - Teardown order of the trackers is wrong
#[tokio::test]
async fn given_enabled_handler_when_backends_crash_then_restarts_until_manual_retry() {
    // GIVEN: A handler allowing two automatic starts
    let host = Arc::new(RecordingHost::default());
    let mut stack = instance_stack(&host, Duration::from_millis(200));
    let supervisor = Arc::new(InstanceSupervisor::new(
        stack.factory,
        host.clone(),
        host.clone(),
        ThreadGuard::unbound(),
    ));
    let (notifier, mut shown) = ChannelNotifier::new();
    let handler = SloopHandler::new(Arc::clone(&supervisor), notifier, 2);

    // WHEN: The first backend comes up and crashes
    handler.enable_sloop();
    let mut first = stack.control.next_backend().await;
    first.complete_handshake().await;
    wait_until(|| supervisor.state() == SupervisorState::Running).await;
    first.crash();

    // THEN: A second backend is launched after the scope tracker was reset
    let mut second = stack.control.next_backend().await;
    assert_eq!(host.resets.load(Ordering::SeqCst), 1);
    second.complete_handshake().await;
    wait_until(|| supervisor.state() == SupervisorState::Running).await;
    assert_eq!(supervisor.current_start_number(), 2);

    // WHEN: The second one crashes too
    second.crash();

    // THEN: The budget is spent and the retry gate is shown
    let reset = timeout(WAIT, shown.recv()).await.unwrap().unwrap();
    assert_eq!(handler.restart_count(), 2);
    assert_eq!(stack.control.launches.load(Ordering::SeqCst), 2);

    // WHEN: The user retries
    reset.invoke();

    // THEN: A third backend starts
    let mut third = stack.control.next_backend().await;
    third.complete_handshake().await;
    wait_until(|| supervisor.state() == SupervisorState::Running).await;

    // WHEN: Disposing the handler
    let ((), _) = tokio::join!(handler.dispose(), async {
        let (id, _) = third.expect_request("shutdown").await;
        third.respond(id, json!(null)).await;
    });

    // THEN: Trackers were disposed last, connection tracker first
    let events = host.events();
    assert_eq!(
        events[events.len() - 2..],
        ["connection.dispose".to_string(), "scope.dispose".to_string()]
    );
    assert_eq!(supervisor.state(), SupervisorState::Disposed);
}

/// **VALUE**: Verifies launch failures count against the restart budget like crashes do.
#[tokio::test]
async fn given_backend_cannot_launch_when_enabled_then_budget_spent_and_gate_shown() {
    // GIVEN: A launcher that always fails
    let host = Arc::new(RecordingHost::default());
    let stack = instance_stack(&host, Duration::from_millis(200));
    stack.control.fail.store(true, Ordering::SeqCst);
    let launches = Arc::clone(&stack.control.launches);
    let supervisor = Arc::new(InstanceSupervisor::new(
        stack.factory,
        host.clone(),
        host.clone(),
        ThreadGuard::unbound(),
    ));
    let (notifier, mut shown) = ChannelNotifier::new();
    let handler = SloopHandler::new(Arc::clone(&supervisor), notifier, 3);

    // WHEN: Enabling
    handler.enable_sloop();

    // THEN: Three attempts, then the gate
    timeout(WAIT, shown.recv()).await.unwrap().unwrap();
    assert_eq!(launches.load(Ordering::SeqCst), 3);
    assert_eq!(supervisor.current_start_number(), 3);
    assert_eq!(host.resets.load(Ordering::SeqCst), 3);

    handler.dispose().await;
}
