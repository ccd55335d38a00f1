//! Result collection and reporting for perfplan runs.

pub mod collector;
pub mod diagnostics;
pub mod reporter;
pub mod stats;

pub use collector::{CollectorState, ResultCollector};
pub use diagnostics::{extract_message, first_failure_message, truncate_body};
pub use reporter::{ReportRow, ReportWriter, RowOptions, SuiteReport};
pub use stats::AggregateStats;
