// Unit tests for the bounded restart loop.

use super::fakes::{GatedStarter, RecordingNotifier, WAIT};
use crate::handler::SloopHandler;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout};

async fn next(rx: &mut UnboundedReceiver<usize>) -> usize {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}

/// **VALUE**: Verifies deaths below the budget restart silently.
///
/// **WHY THIS MATTERS**: The user should only be bothered once the automatic budget is spent.
#[tokio::test]
async fn given_fewer_deaths_than_budget_when_running_then_restarts_without_notification() {
    // GIVEN: A handler allowing three automatic starts
    let (starter, mut started) = GatedStarter::new();
    let (notifier, _shown) = RecordingNotifier::new();
    let handler = SloopHandler::new(Arc::clone(&starter), notifier.clone(), 3);

    // WHEN: The first two instances die
    handler.enable_sloop();
    assert_eq!(next(&mut started).await, 1);
    starter.kill_one();
    assert_eq!(next(&mut started).await, 2);
    starter.kill_one();
    assert_eq!(next(&mut started).await, 3);

    // THEN: Three starts, nothing shown
    assert_eq!(starter.starts(), 3);
    assert_eq!(notifier.shown(), 0);
    assert_eq!(handler.restart_count(), 3);

    handler.dispose().await;
}

/// **VALUE**: Verifies the manual-retry gate appears exactly once when the budget runs out.
#[tokio::test]
async fn given_budget_exhausted_when_loop_parks_then_notifier_shown_once() {
    // GIVEN: Every instance dies immediately
    let (starter, _started) = GatedStarter::new();
    let (notifier, mut shown) = RecordingNotifier::new();
    let handler = SloopHandler::new(Arc::clone(&starter), notifier.clone(), 3);
    starter.kill_all();

    // WHEN: Enabling the loop
    handler.enable_sloop();
    assert_eq!(next(&mut shown).await, 1);
    sleep(Duration::from_millis(50)).await;

    // THEN: Exactly the budget was spent, shown once
    assert_eq!(starter.starts(), 3);
    assert_eq!(notifier.shown(), 1);
    assert_eq!(handler.restart_count(), 3);

    handler.dispose().await;
}

/// **VALUE**: Verifies each manual retry buys exactly one more batch.
///
/// **BUG THIS CATCHES**: Would catch a reset that does not clear the counter (no new starts) or
/// one that lets the loop run past the budget.
#[tokio::test]
async fn given_repeated_manual_retries_when_batches_exhaust_then_counts_scale_with_retries() {
    // GIVEN: Every instance dies immediately, budget of two
    let (starter, _started) = GatedStarter::new();
    let (notifier, mut shown) = RecordingNotifier::new();
    let handler = SloopHandler::new(Arc::clone(&starter), notifier.clone(), 2);
    starter.kill_all();
    handler.enable_sloop();

    // WHEN: The user retries three times
    let retries = 3;
    for batch in 1..=retries {
        assert_eq!(next(&mut shown).await, batch);
        notifier.latest_reset().invoke();
    }
    assert_eq!(next(&mut shown).await, retries + 1);

    // THEN: M+1 notifications and (M+1) x budget starts
    assert_eq!(notifier.shown(), retries + 1);
    assert_eq!(starter.starts(), (retries + 1) * 2);

    handler.dispose().await;
}

/// **VALUE**: Verifies a reset callback from an earlier gate cannot reopen a later one.
///
/// **BUG THIS CATCHES**: Would catch a stale callback that zeroes the counter mid-batch and
/// queues a retry, letting the next gate resume without the user asking.
#[tokio::test]
async fn given_spent_reset_action_when_invoked_again_then_later_batch_unaffected() {
    // GIVEN: A budget of two, exhausted once and retried with the first gate's action
    let (starter, mut started) = GatedStarter::new();
    let (notifier, mut shown) = RecordingNotifier::new();
    let handler = SloopHandler::new(Arc::clone(&starter), notifier.clone(), 2);
    handler.enable_sloop();
    assert_eq!(next(&mut started).await, 1);
    starter.kill_one();
    assert_eq!(next(&mut started).await, 2);
    starter.kill_one();
    assert_eq!(next(&mut shown).await, 1);
    let first = notifier.latest_reset();
    first.invoke();
    assert_eq!(next(&mut started).await, 3);

    // WHEN: The old action fires again in the middle of the next batch
    first.invoke();
    assert_eq!(handler.restart_count(), 1);
    starter.kill_one();
    assert_eq!(next(&mut started).await, 4);
    starter.kill_one();
    assert_eq!(next(&mut shown).await, 2);
    sleep(Duration::from_millis(50)).await;

    // THEN: The batch kept its budget and the second gate is still waiting
    assert_eq!(starter.starts(), 4);
    assert_eq!(notifier.shown(), 2);
    assert_eq!(handler.restart_count(), 2);
    assert!(started.try_recv().is_err());

    handler.dispose().await;
}

/// **VALUE**: Verifies dispose is idempotent and tears the supervisor down once.
#[tokio::test]
async fn given_running_loop_when_disposed_twice_then_starter_disposed_once() {
    // GIVEN: A loop with a live instance
    let (starter, mut started) = GatedStarter::new();
    let (notifier, _shown) = RecordingNotifier::new();
    let handler = SloopHandler::new(Arc::clone(&starter), notifier.clone(), 3);
    handler.enable_sloop();
    assert_eq!(next(&mut started).await, 1);

    // WHEN: Disposing twice
    timeout(WAIT, handler.dispose()).await.unwrap();
    handler.dispose().await;

    // THEN: One disposal, no further starts, no notification
    assert_eq!(starter.disposes.load(Ordering::SeqCst), 1);
    assert_eq!(starter.starts(), 1);
    assert_eq!(notifier.shown(), 0);
}

/// **VALUE**: Verifies the loop exits when the supervisor reports it was disposed.
#[tokio::test]
async fn given_disposed_supervisor_when_loop_starts_then_exits_without_notification() {
    // GIVEN: A starter that reports disposal
    let (starter, _started) = GatedStarter::new();
    starter.report_disposed();
    let (notifier, _shown) = RecordingNotifier::new();
    let handler = SloopHandler::new(Arc::clone(&starter), notifier.clone(), 3);

    // WHEN: Enabling and giving the loop time to run
    handler.enable_sloop();
    sleep(Duration::from_millis(50)).await;

    // THEN: The loop gave up after the first attempt without showing anything
    assert_eq!(starter.starts(), 0);
    assert_eq!(notifier.shown(), 0);
    assert_eq!(handler.restart_count(), 1);

    timeout(WAIT, handler.dispose()).await.unwrap();
}

/// **VALUE**: Verifies a second enable does not spawn a competing loop.
#[tokio::test]
async fn given_enabled_handler_when_enabled_again_then_single_loop_runs() {
    // GIVEN: An enabled handler
    let (starter, mut started) = GatedStarter::new();
    let (notifier, _shown) = RecordingNotifier::new();
    let handler = SloopHandler::new(Arc::clone(&starter), notifier.clone(), 3);
    handler.enable_sloop();

    // WHEN: Enabling again
    handler.enable_sloop();
    assert_eq!(next(&mut started).await, 1);
    sleep(Duration::from_millis(50)).await;

    // THEN: Only one instance was started
    assert_eq!(starter.starts(), 1);
    assert!(started.try_recv().is_err());

    handler.dispose().await;
}

#[test]
fn given_zero_budget_when_constructed_then_clamped_to_one() {
    let (starter, _started) = GatedStarter::new();
    let (notifier, _shown) = RecordingNotifier::new();

    let handler = SloopHandler::new(starter, notifier, 0);

    assert_eq!(handler.max_starts_before_manual(), 1);
}
