//! Scripted SampleExecutor for testing
//!
//! Answers requests from a script instead of the network, so engines and
//! runners can be exercised deterministically.
//!
//! # Features
//!
//! - **Per-label responses**: fixed answer for every request with a label
//! - **Deterministic sequences**: queued answers consumed in order, then fallback
//! - **Call history**: every request is recorded for assertions
//! - **Latency simulation**: optional `tokio::time::sleep` per response
//!
//! # Examples
//!
//! ```rust
//! use perfplan_engine::mock::{MockResponse, ScriptedExecutor};
//!
//! let executor = ScriptedExecutor::new()
//!     .respond_to("login", MockResponse::status("401").with_message("Unauthorized"))
//!     .queue_for("search", vec![MockResponse::status("503"), MockResponse::ok()]);
//! ```

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::executor::{SampleExecutor, SampleRequest, SampleResponse};

/// Scripted answer for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub status_code: String,
    pub message: String,
    pub body: Bytes,
    pub latency: Duration,
    pub transport_error: Option<String>,
}

impl MockResponse {
    /// `200 OK` after 10ms.
    pub fn ok() -> Self {
        Self::status("200").with_message("OK")
    }

    pub fn status(code: impl Into<String>) -> Self {
        Self {
            status_code: code.into(),
            message: String::new(),
            body: Bytes::new(),
            latency: Duration::from_millis(10),
            transport_error: None,
        }
    }

    /// No protocol response at all, e.g. a refused connection.
    pub fn transport_error(error: impl Into<String>) -> Self {
        Self {
            transport_error: Some(error.into()),
            ..Self::status("")
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn to_response(&self) -> SampleResponse {
        SampleResponse {
            status_code: self.status_code.clone(),
            message: self.message.clone(),
            body: self.body.clone(),
            elapsed: self.latency,
            transport_error: self.transport_error.clone(),
        }
    }
}

/// Call history entry.
#[derive(Debug, Clone)]
pub struct CallHistoryEntry {
    pub label: String,
    pub method: String,
    pub url: String,
    pub status_code: String,
    pub timestamp: Instant,
}

/// Scripted executor implementation for testing.
pub struct ScriptedExecutor {
    default: MockResponse,
    by_label: RwLock<HashMap<String, MockResponse>>,
    queues: RwLock<HashMap<String, VecDeque<MockResponse>>>,
    history: RwLock<Vec<CallHistoryEntry>>,
    simulate_latency: bool,
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedExecutor {
    /// Answers every request with [`MockResponse::ok`], without sleeping.
    pub fn new() -> Self {
        Self {
            default: MockResponse::ok(),
            by_label: RwLock::new(HashMap::new()),
            queues: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
            simulate_latency: false,
        }
    }

    pub fn with_default(mut self, response: MockResponse) -> Self {
        self.default = response;
        self
    }

    /// Sleep for each response's latency before answering.
    pub fn with_simulated_latency(mut self) -> Self {
        self.simulate_latency = true;
        self
    }

    /// Answers every request labelled `label` with `response`.
    pub fn respond_to(self, label: impl Into<String>, response: MockResponse) -> Self {
        self.by_label.write().insert(label.into(), response);
        self
    }

    /// Answers the next requests labelled `label` with `responses`, in order.
    pub fn queue_for(self, label: impl Into<String>, responses: Vec<MockResponse>) -> Self {
        self.queues
            .write()
            .entry(label.into())
            .or_default()
            .extend(responses);
        self
    }

    pub fn get_call_history(&self) -> Vec<CallHistoryEntry> {
        self.history.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.history.read().len()
    }

    pub fn calls_for(&self, label: &str) -> usize {
        self.history.read().iter().filter(|c| c.label == label).count()
    }

    pub fn clear_history(&self) {
        self.history.write().clear();
    }

    fn next_response(&self, label: &str) -> MockResponse {
        if let Some(queued) = self.queues.write().get_mut(label).and_then(VecDeque::pop_front) {
            return queued;
        }
        self.by_label
            .read()
            .get(label)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

#[async_trait]
impl SampleExecutor for ScriptedExecutor {
    async fn execute(&self, request: &SampleRequest) -> SampleResponse {
        let scripted = self.next_response(&request.label);

        if self.simulate_latency && !scripted.latency.is_zero() {
            tokio::time::sleep(scripted.latency).await;
        }

        self.history.write().push(CallHistoryEntry {
            label: request.label.clone(),
            method: request.method.clone(),
            url: request.url.clone(),
            status_code: scripted.status_code.clone(),
            timestamp: Instant::now(),
        });

        scripted.to_response()
    }
}
