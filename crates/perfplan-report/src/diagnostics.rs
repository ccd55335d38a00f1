//! Failure message extraction
//!
//! A failure can sit several levels below the event that reports it, e.g. an
//! assertion on a request wrapped by a transaction. [`extract_message`] walks
//! the outcome tree so the report names the actual cause.

use perfplan_core::{AssertionOutcome, OutcomeEvent};

pub const GENERIC_FAILURE: &str = "Request failed - check logs for details";
pub const NO_RESPONSE_BODY: &str = "No response body";
const TRUNCATION_MARKER: &str = "... (truncated)";

/// Human-readable failure message for `event`; never empty.
///
/// Fallback order:
/// 1. messages of the event's own failed assertions
/// 2. failed assertion messages found in its sub-events
/// 3. the response message, unless empty or literally `null`
/// 4. the status code
/// 5. [`GENERIC_FAILURE`]
pub fn extract_message(event: &OutcomeEvent) -> String {
    if let Some(message) = own_assertion_failures(event) {
        return message;
    }

    let nested: Vec<String> = event.sub_events.iter().filter_map(nested_assertion_failures).collect();
    if !nested.is_empty() {
        return nested.join("; ");
    }

    let response = event.response_message.trim();
    if !response.is_empty() && !response.eq_ignore_ascii_case("null") {
        return response.to_string();
    }

    let status = event.status_code.trim();
    if !status.is_empty() {
        return format!("Request failed with status: {status}");
    }

    GENERIC_FAILURE.to_string()
}

/// First failure message reachable from `events`, in buffer order.
pub fn first_failure_message(events: &[OutcomeEvent]) -> Option<String> {
    events
        .iter()
        .flat_map(|event| event.walk())
        .find(|event| !event.success)
        .map(extract_message)
}

/// Shortens `body` to `limit` characters, marking the cut.
pub fn truncate_body(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &body[..cut]),
        None => body.to_string(),
    }
}

/// Response body prepared for display, or [`NO_RESPONSE_BODY`].
pub fn display_body(body: Option<&str>, limit: usize) -> String {
    match body {
        Some(body) if !body.trim().is_empty() => truncate_body(body, limit),
        _ => NO_RESPONSE_BODY.to_string(),
    }
}

fn own_assertion_failures(event: &OutcomeEvent) -> Option<String> {
    let messages: Vec<String> = event.failed_assertions().map(describe).collect();
    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}

fn nested_assertion_failures(event: &OutcomeEvent) -> Option<String> {
    if let Some(message) = own_assertion_failures(event) {
        return Some(message);
    }

    let deeper: Vec<String> = event.sub_events.iter().filter_map(nested_assertion_failures).collect();
    if deeper.is_empty() {
        None
    } else {
        Some(deeper.join("; "))
    }
}

fn describe(outcome: &AssertionOutcome) -> String {
    let message = outcome.message.trim();
    if !message.is_empty() {
        return message.to_string();
    }

    let name = outcome.name.trim();
    if name.is_empty() {
        "Assertion failed".to_string()
    } else {
        format!("{name} failed")
    }
}
