//! Execution hookup, reference engine and suite runner for perfplan.

pub mod assertion;
pub mod bootstrap;
pub mod error;
pub mod executor;
pub mod local;
pub mod metrics;
pub mod mock;
pub mod results_log;
pub mod runner;
pub mod telemetry;
pub mod variables;

pub use bootstrap::EngineHome;
pub use error::{EngineError, EngineResult, RunError, RunResult};
pub use executor::{ExecutionEngine, RunSummary, SampleExecutor, SampleRequest, SampleResponse};
pub use local::LocalEngine;
pub use mock::{MockResponse, ScriptedExecutor};
pub use results_log::ResultsLog;
pub use runner::{SuiteRun, SuiteRunner};
pub use variables::Variables;
