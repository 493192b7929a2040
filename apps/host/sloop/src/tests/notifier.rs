// Unit tests for the console retry gate

use crate::notifier::ConsoleRetryNotifier;

use sloop_core::collaborators::{ResetAction, RestartNotifier};

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn counting_reset() -> (ResetAction, Arc<AtomicUsize>, mpsc::UnboundedReceiver<()>) {
    let count = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::unbounded_channel();
    let action = {
        let count = Arc::clone(&count);
        ResetAction::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(());
        })
    };
    (action, count, rx)
}

/// **VALUE**: Verifies pressing Enter resumes automatic restarts.
///
/// **BUG THIS CATCHES**: Would catch the answer being read but the reset never invoked, which
/// leaves the host waiting forever.
#[tokio::test]
async fn given_enter_pressed_when_prompt_shown_then_reset_invoked() {
    // GIVEN: A notifier whose input is a single newline
    let notifier = ConsoleRetryNotifier::with_input(|| Ok(String::from("\n")));
    let (reset, count, mut invoked) = counting_reset();

    // WHEN: The gate is shown
    notifier.show(reset);

    // THEN: The reset runs once
    timeout(WAIT, invoked.recv())
        .await
        .expect("reset was not invoked")
        .expect("reset channel closed");
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// **VALUE**: Verifies a closed stdin does not restart the backend.
///
/// **WHY THIS MATTERS**: When the host runs without a terminal, EOF must not be read as consent;
/// otherwise a crash-looping backend is restarted without bound.
#[tokio::test]
async fn given_closed_input_when_prompt_shown_then_reset_not_invoked() {
    // GIVEN: Input that reports EOF
    let notifier = Arc::new(ConsoleRetryNotifier::with_input(|| Ok(String::new())));
    let (reset, count, _invoked) = counting_reset();

    // WHEN: The gate is shown and the answer is consumed
    notifier.show(reset);
    let deadline = tokio::time::Instant::now() + WAIT;
    while notifier.is_waiting() {
        assert!(tokio::time::Instant::now() < deadline, "prompt never finished");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // THEN: Nothing was reset
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn given_read_error_when_prompt_shown_then_reset_not_invoked() {
    let notifier = ConsoleRetryNotifier::with_input(|| Err(io::Error::other("tty gone")));
    let (reset, count, _invoked) = counting_reset();

    notifier.show(reset);
    let deadline = tokio::time::Instant::now() + WAIT;
    while notifier.is_waiting() {
        assert!(tokio::time::Instant::now() < deadline, "prompt never finished");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn given_prompt_waiting_when_shown_again_then_second_show_ignored() {
    // GIVEN: Input that blocks until the test releases it
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let release_rx = std::sync::Mutex::new(release_rx);
    let notifier = ConsoleRetryNotifier::with_input(move || {
        let _ = release_rx.lock().map(|rx| rx.recv());
        Ok(String::from("\n"))
    });
    let (first, count, mut invoked) = counting_reset();
    let (second, second_count, _second_invoked) = counting_reset();

    // WHEN: Showing twice while the first prompt is pending
    notifier.show(first);
    assert!(notifier.is_waiting());
    notifier.show(second);
    release_tx.send(()).expect("input thread gone");

    // THEN: Only the first reset fires
    timeout(WAIT, invoked.recv())
        .await
        .expect("reset was not invoked")
        .expect("reset channel closed");
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(second_count.load(Ordering::SeqCst), 0);
}

#[test]
fn given_no_runtime_when_prompt_shown_then_not_left_waiting() {
    let notifier = ConsoleRetryNotifier::with_input(|| Ok(String::from("\n")));
    let (reset, count, _invoked) = counting_reset();

    notifier.show(reset);

    assert!(!notifier.is_waiting());
    assert_eq!(count.load(Ordering::SeqCst), 0);
}
