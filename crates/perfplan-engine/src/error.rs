use std::path::PathBuf;

use perfplan_core::PlanError;
use thiserror::Error;

/// Errors raised by an execution engine before or while driving a run.
///
/// A failed request is never an engine error; it is an outcome event.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine environment could not be prepared; the suite never started.
    #[error("engine bootstrap failed: {message}")]
    Bootstrap {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The per-request results log could not be created or written.
    #[error("results log `{}` failed: {source}", path.display())]
    ResultsLog {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The run was aborted as a whole.
    #[error("run aborted: {reason}")]
    Aborted { reason: String },
}

impl EngineError {
    /// Creates a `Bootstrap` variant without an I/O cause.
    #[must_use]
    pub fn bootstrap(message: impl Into<String>) -> Self {
        Self::Bootstrap {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a `Bootstrap` variant wrapping an I/O failure.
    #[must_use]
    pub fn bootstrap_io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bootstrap {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a `ResultsLog` variant.
    #[must_use]
    pub fn results_log(path: impl Into<PathBuf>, source: impl Into<csv::Error>) -> Self {
        Self::ResultsLog {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Creates an `Aborted` variant.
    #[must_use]
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted { reason: reason.into() }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by [`crate::runner::SuiteRunner`].
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The report could not be persisted.
    #[error("failed to write report `{}`: {source}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run completed but at least one request failed.
    #[error("Test execution contained failures: suite `{suite}` recorded {failed} failing events across {total} results: {first_message}")]
    ExecutionFailure {
        suite: String,
        /// Failing events at any nesting depth
        failed: usize,
        /// Top-level events in the collector
        total: usize,
        first_message: String,
    },
}

pub type RunResult<T> = Result<T, RunError>;
