//! Concurrent outcome collector
//!
//! Virtual users call [`ResultCollector::on_outcome`] concurrently while a run is
//! in progress. Queries are meant for after the engine returned; they take a
//! consistent snapshot of the buffer under the same lock.

use parking_lot::Mutex;
use perfplan_core::{OutcomeEvent, OutcomeListener};
use serde::Serialize;

use crate::diagnostics;
use crate::reporter::{ReportRow, RowOptions};
use crate::stats::AggregateStats;

/// Lifecycle of a collector; it only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorState {
    Idle,
    Collecting,
    Finalized,
}

#[derive(Debug)]
struct Inner {
    state: CollectorState,
    events: Vec<OutcomeEvent>,
    dropped: usize,
}

/// Append-only buffer of the events of one run.
#[derive(Debug)]
pub struct ResultCollector {
    inner: Mutex<Inner>,
}

impl Default for ResultCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCollector {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: CollectorState::Idle,
                events: Vec::new(),
                dropped: 0,
            }),
        }
    }

    /// Buffers one event. Events arriving after [`flush`](Self::flush) are dropped.
    pub fn on_outcome(&self, event: OutcomeEvent) {
        let mut inner = self.inner.lock();
        match inner.state {
            CollectorState::Finalized => {
                inner.dropped += 1;
                tracing::warn!(label = %event.node_label, "outcome arrived after collector was finalized; dropping");
            }
            CollectorState::Idle | CollectorState::Collecting => {
                inner.state = CollectorState::Collecting;
                inner.events.push(event);
            }
        }
    }

    /// Stops accepting events.
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CollectorState::Finalized {
            inner.state = CollectorState::Finalized;
            tracing::debug!(events = inner.events.len(), "result collector finalized");
        }
    }

    pub fn state(&self) -> CollectorState {
        self.inner.lock().state
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().events.is_empty()
    }

    /// Events rejected because they arrived after finalization.
    pub fn dropped(&self) -> usize {
        self.inner.lock().dropped
    }

    /// Snapshot of the buffered events in append order.
    pub fn events(&self) -> Vec<OutcomeEvent> {
        self.inner.lock().events.clone()
    }

    pub fn compute_stats(&self) -> AggregateStats {
        AggregateStats::from_events(&self.inner.lock().events)
    }

    /// True when any buffered event, at any nesting depth, failed.
    pub fn has_failures(&self) -> bool {
        self.inner
            .lock()
            .events
            .iter()
            .any(|event| event.walk().any(|e| !e.success))
    }

    /// Failed events at any nesting depth.
    pub fn failure_count(&self) -> usize {
        self.inner
            .lock()
            .events
            .iter()
            .flat_map(|event| event.walk())
            .filter(|e| !e.success)
            .count()
    }

    /// Failure message for `event`; see [`diagnostics::extract_message`].
    pub fn extract_message(&self, event: &OutcomeEvent) -> String {
        diagnostics::extract_message(event)
    }

    /// First failure message in buffer order, searching nested events.
    pub fn first_failure_message(&self) -> Option<String> {
        diagnostics::first_failure_message(&self.inner.lock().events)
    }

    /// Report-oriented event list.
    ///
    /// With `exclude_composites`, each top-level composite is replaced in place
    /// by its direct sub-events. Only one level is unwrapped.
    pub fn flatten_for_report(&self, exclude_composites: bool) -> Vec<OutcomeEvent> {
        let inner = self.inner.lock();
        if !exclude_composites {
            return inner.events.clone();
        }

        let mut flattened = Vec::with_capacity(inner.events.len());
        for event in &inner.events {
            if event.is_composite() {
                flattened.extend(event.sub_events.iter().cloned());
            } else {
                flattened.push(event.clone());
            }
        }
        flattened
    }

    pub fn report_rows(&self, options: &RowOptions) -> Vec<ReportRow> {
        self.flatten_for_report(options.exclude_composites)
            .iter()
            .map(|event| ReportRow::from_event(event, options))
            .collect()
    }
}

impl OutcomeListener for ResultCollector {
    fn on_outcome(&self, event: OutcomeEvent) {
        ResultCollector::on_outcome(self, event);
    }
}
