//! Suite context
//!
//! A [`SuiteContext`] owns the tree of one suite while it is being assembled.
//! It is an ordinary value that callers pass around; [`registry`] additionally
//! binds one context to the calling thread for code that prefers implicit
//! lookup.

use std::sync::Arc;

use crate::config::{self, PerfPlanConfig};
use crate::ids::{NodeId, PlanId};
use crate::payload::PayloadStore;
use crate::plan::TestPlan;

/// In-progress suite: root, tree, and the configuration snapshot used for
/// defaults.
#[derive(Debug, Clone)]
pub struct SuiteContext {
    plan: TestPlan,
    config: Arc<PerfPlanConfig>,
    payloads: PayloadStore,
}

impl SuiteContext {
    /// Creates a fresh root and empty tree using the process-wide configuration.
    pub fn initialize(suite_name: impl Into<String>) -> Self {
        Self::with_config(suite_name, Arc::new(config::global().clone()))
    }

    /// Creates a fresh root and empty tree using `config` for every default.
    pub fn with_config(suite_name: impl Into<String>, config: Arc<PerfPlanConfig>) -> Self {
        let plan = TestPlan::new(suite_name, config.headers.to_pairs());
        let payloads = PayloadStore::from_config(&config.payloads);

        tracing::debug!(suite = plan.name(), plan_id = %plan.id(), "initialized suite context");

        Self {
            plan,
            config,
            payloads,
        }
    }

    pub fn name(&self) -> &str {
        self.plan.name()
    }

    pub fn plan_id(&self) -> PlanId {
        self.plan.id()
    }

    /// Root node; groups attach here.
    pub fn root(&self) -> NodeId {
        self.plan.root().id()
    }

    /// Read-only view of the tree assembled so far.
    pub fn plan(&self) -> &TestPlan {
        &self.plan
    }

    pub fn config(&self) -> &Arc<PerfPlanConfig> {
        &self.config
    }

    pub fn payloads(&self) -> &PayloadStore {
        &self.payloads
    }

    /// Replaces the payload store, e.g. to point at a fixture directory.
    pub fn set_payloads(&mut self, payloads: PayloadStore) {
        self.payloads = payloads;
    }

    pub(crate) fn plan_mut(&mut self) -> &mut TestPlan {
        &mut self.plan
    }

    /// Freezes the tree for hand-off to an execution engine.
    pub fn into_plan(self) -> TestPlan {
        tracing::debug!(suite = self.plan.name(), nodes = self.plan.len(), "suite plan frozen");
        self.plan
    }
}

/// Per-thread binding of the suite being assembled.
///
/// Bindings never leak across threads. While a `with_current` closure runs the
/// binding is lent out: the registry reads as uninitialized from inside it, and
/// an `initialize`, `install`, `take` or `clear` made there takes precedence
/// over the lent context when the closure returns.
pub mod registry {
    use std::cell::{Cell, RefCell};
    use std::sync::Arc;

    use super::SuiteContext;
    use crate::config::PerfPlanConfig;
    use crate::error::{PlanError, PlanResult};
    use crate::ids::PlanId;

    thread_local! {
        static CURRENT: RefCell<Option<SuiteContext>> = const { RefCell::new(None) };
        // Bumped whenever the binding is replaced or released.
        static EPOCH: Cell<u64> = const { Cell::new(0) };
    }

    fn bump_epoch() {
        EPOCH.with(|epoch| epoch.set(epoch.get().wrapping_add(1)));
    }

    /// Binds a fresh suite to this thread, discarding any previous binding.
    pub fn initialize(suite_name: impl Into<String>) -> PlanId {
        install(SuiteContext::initialize(suite_name))
    }

    /// Like [`initialize`] with an explicit configuration.
    pub fn initialize_with_config(suite_name: impl Into<String>, config: Arc<PerfPlanConfig>) -> PlanId {
        install(SuiteContext::with_config(suite_name, config))
    }

    /// Binds an existing context to this thread, discarding any previous binding.
    pub fn install(context: SuiteContext) -> PlanId {
        let id = context.plan_id();
        let previous = CURRENT.with(|slot| slot.borrow_mut().replace(context));
        bump_epoch();

        if let Some(previous) = previous {
            tracing::debug!(suite = previous.name(), "replaced suite context on this thread");
        }
        id
    }

    /// Runs `f` against this thread's binding.
    ///
    /// No registry borrow is held while `f` runs, so `f` may call back into the
    /// registry.
    pub fn with_current<R>(f: impl FnOnce(&mut SuiteContext) -> PlanResult<R>) -> PlanResult<R> {
        let mut context = CURRENT
            .with(|slot| slot.borrow_mut().take())
            .ok_or(PlanError::NotInitialized)?;
        let lent_at = EPOCH.with(Cell::get);

        let result = f(&mut context);

        if EPOCH.with(Cell::get) == lent_at {
            CURRENT.with(|slot| *slot.borrow_mut() = Some(context));
        } else {
            tracing::debug!(suite = context.name(), "binding changed while lent out; dropping lent context");
        }
        result
    }

    /// Removes and returns this thread's binding.
    pub fn take() -> PlanResult<SuiteContext> {
        let context = CURRENT
            .with(|slot| slot.borrow_mut().take())
            .ok_or(PlanError::NotInitialized)?;
        bump_epoch();
        Ok(context)
    }

    /// Releases this thread's binding; a no-op when nothing is bound.
    pub fn clear() {
        CURRENT.with(|slot| slot.borrow_mut().take());
        bump_epoch();
    }

    pub fn is_initialized() -> bool {
        CURRENT.with(|slot| slot.borrow().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{GroupSettings, SamplerSpec};
    use crate::error::PlanError;

    fn config() -> Arc<PerfPlanConfig> {
        Arc::new(PerfPlanConfig::default())
    }

    #[test]
    fn test_root_carries_configured_headers() {
        let mut settings = PerfPlanConfig::default();
        settings.headers.authorization = Some("Bearer t".to_string());

        let ctx = SuiteContext::with_config("suite", Arc::new(settings));
        assert_eq!(ctx.name(), "suite");
        assert_eq!(ctx.plan().headers()[0].0, "Authorization");
        assert!(ctx.plan().is_empty());
    }

    #[test]
    fn test_uninitialized_thread_fails_loudly() {
        registry::clear();
        assert!(!registry::is_initialized());

        let err = registry::with_current(|ctx| ctx.add_group("g", GroupSettings::default())).unwrap_err();
        assert!(matches!(err, PlanError::NotInitialized));
        assert!(matches!(registry::take(), Err(PlanError::NotInitialized)));
    }

    #[test]
    fn test_clear_is_idempotent() {
        registry::initialize_with_config("suite", config());
        registry::clear();
        registry::clear();
        assert!(!registry::is_initialized());
    }

    #[test]
    fn test_reinitialize_discards_previous_tree() {
        registry::initialize_with_config("first", config());
        let group = registry::with_current(|ctx| ctx.add_group("g", GroupSettings::default())).unwrap();

        let second = registry::initialize_with_config("second", config());

        let err = registry::with_current(|ctx| ctx.add_sampler(group, SamplerSpec::new("s", "/")))
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidAttachment { .. }));

        registry::with_current(|ctx| {
            assert_eq!(ctx.plan_id(), second);
            assert_eq!(ctx.name(), "second");
            assert!(ctx.plan().node(group.id()).is_none());
            assert_eq!(ctx.plan().len(), 1);
            Ok(())
        })
        .unwrap();

        registry::clear();
    }

    #[test]
    fn test_bindings_are_per_thread() {
        registry::initialize_with_config("main", config());

        let seen = std::thread::spawn(registry::is_initialized).join().unwrap();
        assert!(!seen);

        let handle = std::thread::spawn(|| {
            registry::initialize_with_config("worker", config());
            registry::with_current(|ctx| Ok(ctx.name().to_string())).unwrap()
        });
        assert_eq!(handle.join().unwrap(), "worker");

        let name = registry::with_current(|ctx| Ok(ctx.name().to_string())).unwrap();
        assert_eq!(name, "main");
        registry::clear();
    }

    #[test]
    fn test_registry_calls_inside_with_current() {
        registry::initialize_with_config("outer", config());

        let nested = registry::with_current(|ctx| {
            assert!(!registry::is_initialized());
            let inner = registry::with_current(|_| Ok(()));
            assert!(matches!(inner, Err(PlanError::NotInitialized)));

            ctx.add_group("g", GroupSettings::default())?;
            Ok(ctx.plan().len())
        })
        .unwrap();
        assert_eq!(nested, 2);

        // The lent context is rebound with its changes.
        assert!(registry::is_initialized());
        let len = registry::with_current(|ctx| Ok(ctx.plan().len())).unwrap();
        assert_eq!(len, 2);
        registry::clear();
    }

    #[test]
    fn test_rebinding_inside_with_current_wins() {
        registry::initialize_with_config("outer", config());
        let replacement = registry::with_current(|_| Ok(registry::initialize_with_config("inner", config()))).unwrap();

        let (id, name) = registry::with_current(|ctx| Ok((ctx.plan_id(), ctx.name().to_string()))).unwrap();
        assert_eq!(id, replacement);
        assert_eq!(name, "inner");

        registry::with_current(|_| {
            registry::clear();
            Ok(())
        })
        .unwrap();
        assert!(!registry::is_initialized());
    }

    #[test]
    fn test_take_hands_off_binding() {
        registry::initialize_with_config("suite", config());
        let ctx = registry::take().unwrap();
        assert_eq!(ctx.name(), "suite");
        assert!(!registry::is_initialized());
    }
}
