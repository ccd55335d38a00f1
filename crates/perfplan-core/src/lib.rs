//! Plan model, suite context and builder for perfplan load tests.

pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod ids;
pub mod outcome;
pub mod payload;
pub mod plan;
pub mod traits;

pub use builder::{GroupSettings, SamplerSpec, SimpleHttpPlan};
pub use config::{PerfPlanConfig, ReportFormat, Theme};
pub use context::{registry, SuiteContext};
pub use error::{PlanError, PlanResult};
pub use ids::{ControllerHandle, GroupHandle, NodeId, PlanId, SamplerHandle};
pub use outcome::{is_protocol_failure, AssertionOutcome, OutcomeEvent};
pub use payload::PayloadStore;
pub use plan::{AssertionKind, ControllerKind, JsonExtractor, NodeKind, PlanNode, SamplerConfig, TestPlan};
pub use traits::OutcomeListener;
