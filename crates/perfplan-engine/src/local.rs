//! In-process execution engine
//!
//! Every group gets `threads` virtual users, started evenly across its ramp-up
//! window. A virtual user is a tokio task that walks its group's subtree
//! `iterations` times in document order, executing samplers through a
//! [`SampleExecutor`] and reporting events to the run's listener. Variables
//! extracted from responses stay with the virtual user for the whole run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::{join_all, BoxFuture};
use perfplan_core::config::EngineConfig;
use perfplan_core::{ControllerKind, NodeId, NodeKind, OutcomeEvent, OutcomeListener, PerfPlanConfig, PlanNode, SamplerConfig, TestPlan};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::assertion::{self, ScopedAssertion};
use crate::bootstrap::EngineHome;
use crate::error::{EngineError, EngineResult};
use crate::executor::{ExecutionEngine, RunSummary, SampleExecutor, SampleRequest};
use crate::metrics::{self, ActiveUserGuard};
use crate::results_log::ResultsLog;
use crate::variables::{self, Variables};

/// Reference engine running virtual users on the current tokio runtime.
pub struct LocalEngine {
    executor: Arc<dyn SampleExecutor>,
    config: EngineConfig,
}

impl LocalEngine {
    pub fn new(executor: Arc<dyn SampleExecutor>, config: EngineConfig) -> Self {
        Self { executor, config }
    }

    pub fn from_config(executor: Arc<dyn SampleExecutor>, config: &PerfPlanConfig) -> Self {
        Self::new(executor, config.engine.clone())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn log_summary(&self, summary: &RunSummary) {
        if self.config.summariser_name.is_empty() {
            return;
        }

        tracing::info!(
            summariser = %self.config.summariser_name,
            suite = %summary.suite,
            "{} = {} in {:.1}s = {:.1}/s Err: {} ({:.2}%)",
            self.config.summariser_name,
            summary.events,
            summary.elapsed.as_secs_f64(),
            summary.throughput(),
            summary.failed,
            summary.error_rate() * 100.0
        );
    }
}

#[derive(Default)]
struct RunCounters {
    events: AtomicU64,
    failed: AtomicU64,
}

/// Offset at which virtual user `user` of `threads` starts.
fn start_offset(ramp_up_secs: u32, user: u32, threads: u32) -> Duration {
    if threads == 0 {
        return Duration::ZERO;
    }
    let millis = u128::from(ramp_up_secs) * 1000 * u128::from(user) / u128::from(threads);
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}

#[async_trait]
impl ExecutionEngine for LocalEngine {
    async fn run(&self, plan: Arc<TestPlan>, listener: Arc<dyn OutcomeListener>) -> EngineResult<RunSummary> {
        let home = EngineHome::prepare(&self.config)?;
        let results_log = Arc::new(ResultsLog::create(&self.config.results_log)?);
        let counters = Arc::new(RunCounters::default());
        let started = tokio::time::Instant::now();

        tracing::info!(
            suite = plan.name(),
            groups = plan.groups().count(),
            home = %home.path().display(),
            results_log = %results_log.path().display(),
            "starting run"
        );

        let mut handles = Vec::new();
        for (group_index, group) in plan.groups().enumerate() {
            let NodeKind::Group {
                threads,
                ramp_up_secs,
                iterations,
            } = *group.kind()
            else {
                continue;
            };

            for user in 0..threads {
                let mut vu = VirtualUser {
                    plan: Arc::clone(&plan),
                    executor: Arc::clone(&self.executor),
                    listener: Arc::clone(&listener),
                    results_log: Arc::clone(&results_log),
                    counters: Arc::clone(&counters),
                    group: group.id(),
                    group_name: group.name().to_string(),
                    thread_name: format!("{} {}-{}", group.name(), group_index + 1, user + 1),
                    user,
                    iteration: 0,
                    response_logging: self.config.response_logging,
                    rng: StdRng::from_entropy(),
                    variables: Variables::new(),
                };
                let delay = start_offset(ramp_up_secs, user, threads);

                handles.push(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    vu.run(iterations).await;
                }));
            }
        }

        let virtual_users = handles.len();
        let mut aborted = None;
        for result in join_all(handles).await {
            if let Err(err) = result {
                tracing::error!(error = %err, "virtual user terminated abnormally");
                aborted.get_or_insert_with(|| err.to_string());
            }
        }

        results_log.flush()?;

        if let Some(reason) = aborted {
            return Err(EngineError::aborted(reason));
        }

        let summary = RunSummary {
            suite: plan.name().to_string(),
            virtual_users,
            events: counters.events.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            elapsed: started.elapsed(),
        };
        self.log_summary(&summary);

        Ok(summary)
    }
}

/// Where a walk delivers the events it produces.
enum Sink {
    /// Report each event as soon as it completes.
    Emit,
    /// Gather events for an enclosing composite controller.
    Buffer(Vec<OutcomeEvent>),
}

struct VirtualUser {
    plan: Arc<TestPlan>,
    executor: Arc<dyn SampleExecutor>,
    listener: Arc<dyn OutcomeListener>,
    results_log: Arc<ResultsLog>,
    counters: Arc<RunCounters>,
    group: NodeId,
    group_name: String,
    thread_name: String,
    user: u32,
    iteration: u32,
    response_logging: bool,
    rng: StdRng,
    variables: Variables,
}

impl VirtualUser {
    async fn run(&mut self, iterations: u32) {
        let _active = ActiveUserGuard::enter();
        tracing::debug!(thread = %self.thread_name, iterations, "virtual user started");

        for iteration in 0..iterations {
            self.iteration = iteration;
            let mut sink = Sink::Emit;
            self.walk(self.group, Vec::new(), &mut sink).await;
        }

        tracing::debug!(thread = %self.thread_name, "virtual user finished");
    }

    /// Executes the children of `parent` in order. `scope` holds assertions of
    /// enclosing non-composite controllers.
    fn walk<'a>(&'a mut self, parent: NodeId, scope: Vec<ScopedAssertion>, sink: &'a mut Sink) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let plan = Arc::clone(&self.plan);
            let Some(parent_node) = plan.node(parent) else {
                return;
            };

            let mut children: Vec<&PlanNode> = plan.children(parent).collect();
            if matches!(
                parent_node.kind(),
                NodeKind::Controller {
                    kind: ControllerKind::RandomOrder,
                    ..
                }
            ) {
                children.shuffle(&mut self.rng);
            }

            for child in children {
                match child.kind() {
                    NodeKind::Sampler(config) => {
                        let event = self.execute_sampler(child, config, &scope).await;
                        self.deliver(sink, event);
                    }
                    NodeKind::Controller {
                        generates_composite_sample: true,
                        ..
                    } => {
                        let mut inner = Sink::Buffer(Vec::new());
                        self.walk(child.id(), scope.clone(), &mut inner).await;

                        let Sink::Buffer(executed) = inner else {
                            continue;
                        };
                        if let Some(event) = self.composite_event(child, executed) {
                            self.deliver(sink, event);
                        }
                    }
                    NodeKind::Controller { .. } => {
                        let mut nested = scope.clone();
                        nested.extend(assertion::assertions_of(&plan, child.id()));
                        self.walk(child.id(), nested, sink).await;
                    }
                    NodeKind::Assertion(_) | NodeKind::Extractor(_) | NodeKind::Group { .. } | NodeKind::Root { .. } => {}
                }
            }
        })
    }

    async fn execute_sampler(&mut self, node: &PlanNode, config: &SamplerConfig, scope: &[ScopedAssertion]) -> OutcomeEvent {
        let mut request = SampleRequest::from_sampler(node.name(), config, self.plan.headers());
        self.variables.apply(&mut request);
        let timestamp = Utc::now();
        let response = self.executor.execute(&request).await;

        let mut event = self.new_event(node.name());
        event.timestamp = timestamp;
        event.url = Some(request.url);
        event.method = Some(request.method);
        event.status_code = response.status_code;
        event.response_message = response.transport_error.unwrap_or(response.message);
        event.elapsed_ms = u64::try_from(response.elapsed.as_millis()).unwrap_or(u64::MAX);
        if !response.body.is_empty() {
            event.response_body = Some(String::from_utf8_lossy(&response.body).into_owned());
        }

        let extractors = variables::extractors_of(&self.plan, node.id());
        if !extractors.is_empty() {
            self.variables.extract_all(&extractors, &response.body);
        }

        let own = assertion::assertions_of(&self.plan, node.id());
        assertion::apply(&mut event, scope.iter().chain(own.iter()));

        if self.response_logging {
            tracing::debug!(
                thread = %self.thread_name,
                label = %event.node_label,
                status = %event.status_code,
                elapsed_ms = event.elapsed_ms,
                body = event.response_body.as_deref().unwrap_or(""),
                "response received"
            );
        }

        event
    }

    /// Composite event for a controller, or `None` when no child executed.
    fn composite_event(&self, node: &PlanNode, children: Vec<OutcomeEvent>) -> Option<OutcomeEvent> {
        let first = children.first()?;
        let last = children.last()?;

        let failing = children.iter().filter(|e| !e.success).count();
        let mut event = self.new_event(node.name());
        event.timestamp = first.timestamp;
        event.status_code = last.status_code.clone();
        event.elapsed_ms = children.iter().map(|e| e.elapsed_ms).sum();
        event.response_message = format!(
            "Number of samples in transaction : {}, number of failing samples : {}",
            children.len(),
            failing
        );
        event.sub_events = children;

        // Success comes from the composite's own assertions only.
        let own = assertion::assertions_of(&self.plan, node.id());
        assertion::apply(&mut event, own.iter());

        Some(event)
    }

    fn new_event(&self, label: &str) -> OutcomeEvent {
        let mut event = OutcomeEvent::new(label);
        event.group = self.group_name.clone();
        event.virtual_user = self.user;
        event.iteration = self.iteration;
        event
    }

    fn deliver(&self, sink: &mut Sink, event: OutcomeEvent) {
        match sink {
            Sink::Buffer(events) => events.push(event),
            Sink::Emit => self.emit(event),
        }
    }

    fn emit(&self, event: OutcomeEvent) {
        self.counters.events.fetch_add(1, Ordering::Relaxed);
        if !event.success {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
        }

        metrics::observe_sample(&self.group_name, event.success, event.elapsed_ms);

        if let Err(err) = self.results_log.record(&event, &self.thread_name) {
            tracing::warn!(error = %err, label = %event.node_label, "failed to write results log row");
        }

        self.listener.on_outcome(event);
    }
}
