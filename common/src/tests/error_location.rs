use crate::ErrorLocation;

/// **VALUE**: Verifies that `ErrorLocation::caller()` points at the call site, not at itself.
///
/// **WHY THIS MATTERS**: Every transport, supervisor and config error carries a location.
/// If `caller()` lost its `#[track_caller]`, every error in the logs would point into
/// `error_location.rs` and the supervisor's failure logs would be useless.
///
/// **BUG THIS CATCHES**: Would catch if `#[track_caller]` is removed from `caller()`.
#[test]
fn given_caller_helper_when_invoked_then_reports_invoking_file() {
    // GIVEN/WHEN: Capturing the location from this test file
    let location = ErrorLocation::caller();

    // THEN: The file is this test module, not the helper's definition
    assert!(
        location.file.contains("tests") && location.file.contains("error_location.rs"),
        "Should capture the caller's file, got {}",
        location.file
    );
    assert!(location.line > 0);
    assert!(location.column > 0);
}

/// **VALUE**: Verifies the `[file:line:column]` display format.
///
/// **WHY THIS MATTERS**: Log lines are grepped by this suffix when diagnosing restart loops.
#[test]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    // GIVEN: An ErrorLocation
    let location = ErrorLocation::caller();

    // WHEN: Formatting as string
    let formatted = format!("{location}");

    // THEN: Should produce "[file:line:column]" format
    assert!(formatted.starts_with('['), "Should start with '['");
    assert!(formatted.ends_with(']'), "Should end with ']'");
    assert!(formatted.contains(&format!(":{}:", location.line)));
    assert_eq!(formatted.matches(':').count(), 2, "Should have exactly 2 colons");
}

/// **VALUE**: Two call sites on consecutive lines produce consecutive line numbers.
#[test]
fn given_multiple_call_sites_when_capturing_location_then_each_has_unique_line() {
    // GIVEN: A helper function that captures location
    #[track_caller]
    fn capture_location() -> ErrorLocation {
        ErrorLocation::caller()
    }

    // WHEN: Capturing location from different call sites
    let loc1 = capture_location();
    let loc2 = capture_location();

    // THEN: Should have same file but sequential line numbers
    assert_eq!(loc1.file, loc2.file, "Should have same file");
    assert_eq!(loc1.line + 1, loc2.line, "Lines should be sequential");
}
