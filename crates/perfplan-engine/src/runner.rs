//! Suite runner
//!
//! Hands a suite to an [`ExecutionEngine`], reduces the outcome stream with a
//! fresh [`ResultCollector`], persists the report, and turns a run with failed
//! requests into [`RunError::ExecutionFailure`].

use std::sync::Arc;

use perfplan_core::{registry, SuiteContext};
use perfplan_report::diagnostics::GENERIC_FAILURE;
use perfplan_report::{AggregateStats, ReportWriter, ResultCollector, RowOptions, SuiteReport};

use crate::error::{RunError, RunResult};
use crate::executor::{ExecutionEngine, RunSummary};

/// Result of a suite whose requests all passed.
#[derive(Debug, Clone)]
pub struct SuiteRun {
    pub summary: RunSummary,
    pub stats: AggregateStats,
    pub report: SuiteReport,
}

pub struct SuiteRunner {
    engine: Arc<dyn ExecutionEngine>,
}

impl SuiteRunner {
    pub fn new(engine: Arc<dyn ExecutionEngine>) -> Self {
        Self { engine }
    }

    /// Runs the suite bound to the calling thread, releasing the binding first.
    pub async fn run_current(&self) -> RunResult<SuiteRun> {
        let context = registry::take()?;
        self.run(context).await
    }

    /// Runs `context` to completion.
    pub async fn run(&self, context: SuiteContext) -> RunResult<SuiteRun> {
        let config = Arc::clone(context.config());
        let suite = context.name().to_string();
        let plan = Arc::new(context.into_plan());

        tracing::info!(suite = %suite, nodes = plan.len(), "running suite");

        let collector = Arc::new(ResultCollector::new());
        let summary = self.engine.run(Arc::clone(&plan), collector.clone()).await?;
        collector.flush();

        let stats = collector.compute_stats();
        let failed = collector.has_failures();
        let rows = collector.report_rows(&RowOptions::from(&config.report));
        let report = SuiteReport::new(&suite, !failed, stats.clone(), rows);

        let writer = ReportWriter::from_config(&config.report);
        writer
            .write_report(&report, &config.report.path, config.report.format)
            .map_err(|source| RunError::Report {
                path: config.report.path.clone(),
                source,
            })?;

        if failed {
            let first_message = collector
                .first_failure_message()
                .unwrap_or_else(|| GENERIC_FAILURE.to_string());

            tracing::warn!(suite = %suite, failed = stats.failed, total = stats.total, "suite finished with failures");
            return Err(RunError::ExecutionFailure {
                suite,
                failed: collector.failure_count(),
                total: stats.total,
                first_message,
            });
        }

        tracing::info!(suite = %suite, total = stats.total, avg_ms = stats.avg_ms, "suite passed");
        Ok(SuiteRun { summary, stats, report })
    }
}
