use crate::thread_guard::ThreadGuard;

use std::thread;

#[test]
fn given_unbound_guard_then_never_on_ui_thread() {
    assert!(!ThreadGuard::unbound().is_on_ui_thread());
    assert!(!ThreadGuard::default().is_on_ui_thread());
}

/// **VALUE**: Verifies the guard recognizes only the thread it was bound on.
#[test]
fn given_guard_bound_here_when_checked_elsewhere_then_only_this_thread_matches() {
    // GIVEN: A guard bound to the test thread
    let guard = ThreadGuard::bind_current();

    // WHEN: Checking here and on another thread
    let here = guard.is_on_ui_thread();
    let elsewhere = thread::spawn(move || guard.is_on_ui_thread()).join().unwrap();

    // THEN: Only the binding thread counts as the UI thread
    assert!(here);
    assert!(!elsewhere);
}
