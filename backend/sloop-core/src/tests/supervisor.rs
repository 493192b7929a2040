// Unit tests for the supervisor state machine, driven through in-crate fakes.

use super::fakes::{EventLog, FakeConnectionTracker, FakeFactory, FakeScopeTracker, WAIT, wait_until};
use crate::error::supervisor::SupervisorError;
use crate::supervisor::{InstanceSupervisor, SupervisorState};
use crate::thread_guard::ThreadGuard;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::task::JoinHandle;
use tokio::time::timeout;

struct Harness {
    supervisor: Arc<InstanceSupervisor<FakeFactory>>,
    factory: FakeFactory,
    scope_tracker: Arc<FakeScopeTracker>,
    connection_tracker: Arc<FakeConnectionTracker>,
    events: Arc<EventLog>,
}

fn harness() -> Harness {
    let events = Arc::new(EventLog::default());
    let factory = FakeFactory::new(Arc::clone(&events));
    let scope_tracker = Arc::new(FakeScopeTracker::new(Arc::clone(&events)));
    let connection_tracker = Arc::new(FakeConnectionTracker::new(Arc::clone(&events)));
    let supervisor = Arc::new(InstanceSupervisor::new(
        factory.clone(),
        scope_tracker.clone(),
        connection_tracker.clone(),
        ThreadGuard::unbound(),
    ));

    Harness {
        supervisor,
        factory,
        scope_tracker,
        connection_tracker,
        events,
    }
}

fn spawn_start(supervisor: &Arc<InstanceSupervisor<FakeFactory>>) -> JoinHandle<Result<(), SupervisorError>> {
    let supervisor = Arc::clone(supervisor);
    tokio::spawn(async move { supervisor.start_instance().await })
}

async fn running(h: &Harness) -> JoinHandle<Result<(), SupervisorError>> {
    let task = spawn_start(&h.supervisor);
    let supervisor = Arc::clone(&h.supervisor);
    wait_until(|| supervisor.state() == SupervisorState::Running).await;
    task
}

/// **VALUE**: Verifies the single-instance invariant is enforced without touching the counter.
///
/// **BUG THIS CATCHES**: Would catch a second backend being launched while one is alive, or the
/// start number drifting on rejected calls.
#[tokio::test]
async fn given_running_instance_when_start_called_again_then_already_running_and_counter_unchanged() {
    // GIVEN: A supervisor with a running instance
    let h = harness();
    let _task = running(&h).await;
    let before = h.supervisor.current_start_number();

    // WHEN: Starting again
    let result = h.supervisor.start_instance().await;

    // THEN: AlreadyRunning, counter and factory untouched
    match result {
        Err(SupervisorError::AlreadyRunning {
            message,
            start_number,
            ..
        }) => {
            assert_eq!(start_number, before);
            assert_eq!(message, format!("start #{before} is still active"));
        }
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }
    assert_eq!(h.supervisor.current_start_number(), before);
    assert_eq!(h.factory.state.create_calls.load(Ordering::SeqCst), 1);
}

/// **VALUE**: Verifies a disposed supervisor refuses to start without side effects.
#[tokio::test]
async fn given_disposed_supervisor_when_start_called_then_disposed_and_factory_not_invoked() {
    // GIVEN: A disposed supervisor
    let h = harness();
    h.supervisor.dispose().await;

    // WHEN: Starting
    let result = h.supervisor.start_instance().await;

    // THEN: Disposed error, nothing created, counter still zero
    let err = result.expect_err("disposed supervisor must refuse to start");
    assert!(matches!(err, SupervisorError::Disposed { .. }));
    assert!(
        err.to_string()
            .starts_with("Supervisor Disposed: supervisor was already disposed ")
    );
    assert_eq!(h.factory.state.create_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.supervisor.current_start_number(), 0);
    assert_eq!(h.supervisor.state(), SupervisorState::Disposed);
}

/// **VALUE**: Verifies a factory failure is absorbed and does not run the death cascade.
///
/// **BUG THIS CATCHES**: Would catch the scope tracker being reset for an instance that never
/// existed, or the error escaping to the restart loop.
#[tokio::test]
async fn given_failing_factory_when_start_called_then_completes_without_reset() {
    // GIVEN: A factory that cannot create instances
    let h = harness();
    h.factory.state.fail_create.store(true, Ordering::SeqCst);

    // WHEN: Starting
    let result = timeout(WAIT, h.supervisor.start_instance()).await.unwrap();

    // THEN: Ok, back to idle, no reset, attempt counted
    assert!(result.is_ok());
    assert_eq!(h.supervisor.state(), SupervisorState::Idle);
    assert_eq!(h.scope_tracker.resets.load(Ordering::SeqCst), 0);
    assert_eq!(h.supervisor.current_start_number(), 1);
}

/// **VALUE**: Verifies a failed handshake is treated as a death: one dispose, one reset.
#[tokio::test]
async fn given_failing_initialize_when_start_called_then_disposes_once_and_resets_once() {
    // GIVEN: Instances whose handshake fails
    let h = harness();
    h.factory.state.fail_initialize.store(true, Ordering::SeqCst);

    // WHEN: Starting
    let result = timeout(WAIT, h.supervisor.start_instance()).await.unwrap();

    // THEN: Ok, handle disposed exactly once, scope reset exactly once, idle again
    assert!(result.is_ok());
    let instance = h.factory.state.instance(0);
    assert_eq!(instance.disposed.load(Ordering::SeqCst), 1);
    assert_eq!(h.scope_tracker.resets.load(Ordering::SeqCst), 1);
    assert_eq!(h.supervisor.state(), SupervisorState::Idle);
}

/// **VALUE**: Verifies an unexpected crash runs cleanup and lets the next start proceed.
#[tokio::test]
async fn given_running_instance_when_backend_crashes_then_cleanup_runs_and_start_returns() {
    // GIVEN: A running instance
    let h = harness();
    let task = running(&h).await;

    // WHEN: The backend dies
    h.factory.state.instance(0).crash();

    // THEN: start_instance resolves, handle disposed once, scope reset once
    let result = timeout(WAIT, task).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert_eq!(h.factory.state.instance(0).disposed.load(Ordering::SeqCst), 1);
    assert_eq!(h.scope_tracker.resets.load(Ordering::SeqCst), 1);
    assert_eq!(h.supervisor.state(), SupervisorState::Idle);

    // AND: A new start gets the next number
    let next = running(&h).await;
    assert_eq!(h.supervisor.current_start_number(), 2);
    h.supervisor.dispose().await;
    timeout(WAIT, next).await.unwrap().unwrap().unwrap();
}

/// **VALUE**: Verifies disposal order: handle, then connection tracker, then scope tracker.
///
/// **BUG THIS CATCHES**: Would catch trackers being torn down while the backend is still
/// shutting down, or any of the three running twice.
#[tokio::test]
async fn given_running_instance_when_supervisor_disposed_then_teardown_order_is_fixed() {
    // GIVEN: A running instance
    let h = harness();
    let task = running(&h).await;

    // WHEN: Disposing twice
    timeout(WAIT, h.supervisor.dispose()).await.unwrap();
    h.supervisor.dispose().await;

    // THEN: Each disposal ran once, in order
    let disposals: Vec<_> = h
        .events
        .events()
        .into_iter()
        .filter(|event| event.ends_with(".dispose"))
        .collect();
    assert_eq!(
        disposals,
        vec![
            "instance.dispose",
            "connection_tracker.dispose",
            "scope_tracker.dispose"
        ]
    );
    assert_eq!(h.connection_tracker.disposes.load(Ordering::SeqCst), 1);
    assert_eq!(h.scope_tracker.disposes.load(Ordering::SeqCst), 1);
    assert!(timeout(WAIT, task).await.unwrap().unwrap().is_ok());
}

/// **VALUE**: Verifies a crash racing an explicit dispose still disposes the handle only once.
#[tokio::test]
async fn given_crash_racing_dispose_when_both_resolve_then_handle_disposed_once() {
    // GIVEN: A running instance
    let h = harness();
    let task = running(&h).await;

    // WHEN: The backend crashes while the supervisor is being disposed
    h.factory.state.instance(0).crash();
    timeout(WAIT, h.supervisor.dispose()).await.unwrap();
    timeout(WAIT, task).await.unwrap().unwrap().unwrap();

    // THEN: Exactly one disposal of each participant, trackers last
    assert_eq!(h.factory.state.instance(0).disposed.load(Ordering::SeqCst), 1);
    assert_eq!(h.connection_tracker.disposes.load(Ordering::SeqCst), 1);
    assert_eq!(h.scope_tracker.disposes.load(Ordering::SeqCst), 1);
    let events = h.events.events();
    assert_eq!(events.last(), Some(&"scope_tracker.dispose"));
}

/// **VALUE**: Verifies the start path refuses to run on the UI thread.
#[test]
fn given_ui_thread_guard_when_start_called_on_ui_thread_then_rejected() {
    // GIVEN: A supervisor bound to the current thread as UI thread
    let events = Arc::new(EventLog::default());
    let factory = FakeFactory::new(Arc::clone(&events));
    let supervisor = InstanceSupervisor::new(
        factory.clone(),
        Arc::new(FakeScopeTracker::new(Arc::clone(&events))),
        Arc::new(FakeConnectionTracker::new(Arc::clone(&events))),
        ThreadGuard::bind_current(),
    );
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    // WHEN: Starting from that same thread
    let result = runtime.block_on(supervisor.start_instance());

    // THEN: Rejected before anything is created
    assert!(matches!(result, Err(SupervisorError::OnUiThread { .. })));
    assert_eq!(factory.state.create_calls.load(Ordering::SeqCst), 0);
    assert_eq!(supervisor.current_start_number(), 0);
}
