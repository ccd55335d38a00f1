//! Execution hookup
//!
//! [`ExecutionEngine`] receives a frozen plan and streams outcome events to a
//! listener. [`SampleExecutor`] performs a single request; engines never talk
//! to the system under test directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use perfplan_core::{OutcomeListener, SamplerConfig, TestPlan};
use serde::Serialize;

use crate::error::EngineResult;

/// Fully resolved request handed to a [`SampleExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRequest {
    pub label: String,
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl SampleRequest {
    /// Builds a request from a sampler, layering its headers over `defaults`.
    pub fn from_sampler(label: impl Into<String>, sampler: &SamplerConfig, defaults: &[(String, String)]) -> Self {
        let mut headers: Vec<(String, String)> = defaults
            .iter()
            .filter(|(name, _)| !sampler.headers.iter().any(|(own, _)| own.eq_ignore_ascii_case(name)))
            .cloned()
            .collect();
        headers.extend(sampler.headers.iter().cloned());

        Self {
            label: label.into(),
            method: sampler.method.clone(),
            url: sampler.url(),
            headers,
            body: sampler.body.clone(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What a [`SampleExecutor`] observed for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleResponse {
    /// Protocol status code; empty when nothing was received.
    pub status_code: String,
    pub message: String,
    pub body: Bytes,
    pub elapsed: Duration,
    /// Set when the request never produced a protocol response.
    pub transport_error: Option<String>,
}

impl SampleResponse {
    pub fn new(status_code: impl Into<String>, message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            status_code: status_code.into(),
            message: message.into(),
            body: Bytes::new(),
            elapsed,
            transport_error: None,
        }
    }

    pub fn transport_failure(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            status_code: String::new(),
            message: String::new(),
            body: Bytes::new(),
            elapsed,
            transport_error: Some(error.into()),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Performs the network exchange for one sampler.
#[async_trait]
pub trait SampleExecutor: Send + Sync {
    /// Executes `request`. Failures are reported in the response, never raised.
    async fn execute(&self, request: &SampleRequest) -> SampleResponse;
}

/// Totals reported by an engine once every virtual user finished.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub suite: String,
    pub virtual_users: usize,
    /// Emitted events; sub-events are counted with their composite.
    pub events: u64,
    pub failed: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.events as f64 / secs
    }

    pub fn error_rate(&self) -> f64 {
        if self.events == 0 {
            return 0.0;
        }
        self.failed as f64 / self.events as f64
    }
}

/// Drives a frozen plan with concurrent virtual users.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Runs every group of `plan` to completion, reporting each executed
    /// sampler or composite controller to `listener`.
    async fn run(&self, plan: Arc<TestPlan>, listener: Arc<dyn OutcomeListener>) -> EngineResult<RunSummary>;
}
