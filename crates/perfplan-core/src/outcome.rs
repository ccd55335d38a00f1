//! Runtime outcome events emitted by an execution engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of evaluating one assertion against an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionOutcome {
    /// Label of the assertion node that produced this outcome.
    pub name: String,
    pub failed: bool,
    /// Failure message; empty when the assertion passed.
    pub message: String,
}

impl AssertionOutcome {
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failed: false,
            message: String::new(),
        }
    }

    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failed: true,
            message: message.into(),
        }
    }
}

/// Outcome of one executed sampler or composite controller.
///
/// The shape mirrors the plan node that produced it: a composite controller
/// carries the events of the children it executed in `sub_events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeEvent {
    pub node_label: String,
    pub url: Option<String>,
    pub method: Option<String>,
    /// Protocol status code as text; empty when no response was received.
    pub status_code: String,
    pub response_message: String,
    pub response_body: Option<String>,
    pub elapsed_ms: u64,
    pub success: bool,
    pub assertion_outcomes: Vec<AssertionOutcome>,
    pub sub_events: Vec<OutcomeEvent>,
    /// Name of the group whose virtual user produced the event.
    pub group: String,
    pub virtual_user: u32,
    pub iteration: u32,
    pub timestamp: DateTime<Utc>,
}

impl OutcomeEvent {
    /// Creates a successful event with no response details attached.
    pub fn new(node_label: impl Into<String>) -> Self {
        Self {
            node_label: node_label.into(),
            url: None,
            method: None,
            status_code: String::new(),
            response_message: String::new(),
            response_body: None,
            elapsed_ms: 0,
            success: true,
            assertion_outcomes: Vec::new(),
            sub_events: Vec::new(),
            group: String::new(),
            virtual_user: 0,
            iteration: 0,
            timestamp: Utc::now(),
        }
    }

    /// Leaf event with a status code and elapsed time; `success` follows
    /// [`OutcomeEvent::refresh_success`].
    pub fn sample(node_label: impl Into<String>, status_code: impl Into<String>, elapsed_ms: u64) -> Self {
        let mut event = Self::new(node_label);
        event.status_code = status_code.into();
        event.elapsed_ms = elapsed_ms;
        event.refresh_success();
        event
    }

    pub fn with_request(mut self, method: impl Into<String>, url: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.url = Some(url.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.response_message = message.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.response_body = Some(body.into());
        self
    }

    pub fn with_assertion(mut self, outcome: AssertionOutcome) -> Self {
        self.assertion_outcomes.push(outcome);
        self.refresh_success();
        self
    }

    pub fn with_sub_events(mut self, sub_events: Vec<OutcomeEvent>) -> Self {
        self.sub_events = sub_events;
        self.refresh_success();
        self
    }

    /// Whether this event was produced by a composite controller.
    pub fn is_composite(&self) -> bool {
        !self.sub_events.is_empty()
    }

    pub fn failed_assertions(&self) -> impl Iterator<Item = &AssertionOutcome> + '_ {
        self.assertion_outcomes.iter().filter(|a| a.failed)
    }

    pub fn has_failed_assertion(&self) -> bool {
        self.assertion_outcomes.iter().any(|a| a.failed)
    }

    /// Recomputes `success` from assertions and, for leaf events, the status code.
    ///
    /// A composite's success depends only on its own assertions; failures of the
    /// children it wraps stay visible through `sub_events`.
    pub fn refresh_success(&mut self) {
        let protocol_failure = !self.is_composite() && is_protocol_failure(&self.status_code);
        self.success = !self.has_failed_assertion() && !protocol_failure;
    }

    /// Depth-first iterator over this event and every nested sub-event.
    pub fn walk(&self) -> impl Iterator<Item = &OutcomeEvent> + '_ {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let event = stack.pop()?;
            stack.extend(event.sub_events.iter().rev());
            Some(event)
        })
    }
}

/// Whether a status code signals a transport or protocol level failure:
/// missing, non-numeric, or 400 and above.
pub fn is_protocol_failure(status_code: &str) -> bool {
    match status_code.trim().parse::<u16>() {
        Ok(code) => code >= 400,
        Err(_) => true,
    }
}
