//! Plan builder
//!
//! Attach operations on [`SuiteContext`]. Values a caller leaves unset are
//! resolved from the context's configuration when the node is attached, so the
//! built tree never depends on configuration read later.

use bytes::Bytes;

use crate::context::SuiteContext;
use crate::error::{PlanError, PlanResult};
use crate::ids::{ControllerHandle, GroupHandle, NodeId, SamplerHandle};
use crate::plan::{AssertionKind, ControllerKind, JsonExtractor, NodeKind, SamplerConfig};

/// Virtual-user settings for a group; unset fields come from `load.*`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupSettings {
    pub threads: Option<u32>,
    pub ramp_up_secs: Option<u32>,
    pub iterations: Option<u32>,
}

impl GroupSettings {
    pub fn new(threads: u32, ramp_up_secs: u32, iterations: u32) -> Self {
        Self {
            threads: Some(threads),
            ramp_up_secs: Some(ramp_up_secs),
            iterations: Some(iterations),
        }
    }

    pub fn threads(mut self, threads: u32) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn ramp_up_secs(mut self, secs: u32) -> Self {
        self.ramp_up_secs = Some(secs);
        self
    }

    pub fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = Some(iterations);
        self
    }
}

/// Request description for a sampler; unset target fields come from `target.*`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplerSpec {
    pub name: String,
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: String,
    pub method: Option<String>,
    pub body: Option<Bytes>,
    pub headers: Vec<(String, String)>,
}

impl SamplerSpec {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// One-call plan: a single group running a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleHttpPlan {
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub method: String,
    pub threads: u32,
    pub iterations: u32,
    pub ramp_up_secs: u32,
    /// Expected status codes; `assertions.expected_status_codes` when `None`
    pub expected_codes: Option<Vec<String>>,
}

impl SimpleHttpPlan {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            path: path.into(),
            method: "GET".to_string(),
            threads: 1,
            iterations: 1,
            ramp_up_secs: 0,
            expected_codes: None,
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn load(mut self, threads: u32, iterations: u32, ramp_up_secs: u32) -> Self {
        self.threads = threads;
        self.iterations = iterations;
        self.ramp_up_secs = ramp_up_secs;
        self
    }

    pub fn expect<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_codes = Some(codes.into_iter().map(Into::into).collect());
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl SuiteContext {
    /// Attaches a group of virtual users under the root.
    pub fn add_group(&mut self, name: impl Into<String>, settings: GroupSettings) -> PlanResult<GroupHandle> {
        let defaults = &self.config().load;
        let threads = settings.threads.unwrap_or(defaults.threads);
        let ramp_up_secs = settings.ramp_up_secs.unwrap_or(defaults.ramp_up_secs);
        let iterations = settings.iterations.unwrap_or(defaults.iterations);

        if threads == 0 {
            return Err(PlanError::invalid_parameter("threads", "a group needs at least one virtual user"));
        }
        if iterations == 0 {
            return Err(PlanError::invalid_parameter("iterations", "a group needs at least one iteration"));
        }

        let name = name.into();
        tracing::debug!(group = %name, threads, ramp_up_secs, iterations, "adding group");

        let root = self.root();
        let id = self.plan_mut().attach(
            root,
            name,
            NodeKind::Group {
                threads,
                ramp_up_secs,
                iterations,
            },
        )?;
        Ok(GroupHandle::new(id))
    }

    /// Attaches a controller under a group or another controller.
    pub fn add_controller(
        &mut self,
        parent: impl Into<NodeId>,
        kind: ControllerKind,
        name: impl Into<String>,
        generates_composite_sample: bool,
    ) -> PlanResult<ControllerHandle> {
        let id = self.plan_mut().attach(
            parent.into(),
            name,
            NodeKind::Controller {
                kind,
                generates_composite_sample,
            },
        )?;
        Ok(ControllerHandle::new(id))
    }

    /// Transaction controller that reports its children as one composite event.
    pub fn add_transaction_controller(
        &mut self,
        parent: impl Into<NodeId>,
        name: impl Into<String>,
    ) -> PlanResult<ControllerHandle> {
        self.add_controller(parent, ControllerKind::Transaction, name, true)
    }

    pub fn add_simple_controller(
        &mut self,
        parent: impl Into<NodeId>,
        name: impl Into<String>,
    ) -> PlanResult<ControllerHandle> {
        self.add_controller(parent, ControllerKind::Simple, name, false)
    }

    pub fn add_random_order_controller(
        &mut self,
        parent: impl Into<NodeId>,
        name: impl Into<String>,
    ) -> PlanResult<ControllerHandle> {
        self.add_controller(parent, ControllerKind::RandomOrder, name, false)
    }

    /// Attaches a sampler, resolving unset protocol, host, port and method
    /// from `target.*` now.
    pub fn add_sampler(&mut self, parent: impl Into<NodeId>, spec: SamplerSpec) -> PlanResult<SamplerHandle> {
        if spec.name.trim().is_empty() {
            return Err(PlanError::InvalidName { kind: "sampler" });
        }

        let target = &self.config().target;
        let config = SamplerConfig {
            protocol: non_blank(spec.protocol).unwrap_or_else(|| target.protocol.clone()),
            host: non_blank(spec.host).unwrap_or_else(|| target.host.clone()),
            port: spec.port.or(target.port),
            path: if spec.path.is_empty() { "/".to_string() } else { spec.path },
            method: non_blank(spec.method)
                .unwrap_or_else(|| target.method.clone())
                .to_ascii_uppercase(),
            body: spec.body,
            headers: spec.headers,
        };

        tracing::debug!(sampler = %spec.name, method = %config.method, url = %config.url(), "adding sampler");

        let id = self.plan_mut().attach(parent.into(), spec.name, NodeKind::Sampler(config))?;
        Ok(SamplerHandle::new(id))
    }

    /// Attaches a sampler whose body is read from the payload resource `resource`.
    pub fn add_sampler_with_resource(
        &mut self,
        parent: impl Into<NodeId>,
        spec: SamplerSpec,
        resource: &str,
    ) -> PlanResult<SamplerHandle> {
        let body = self.load_body_from_resource(resource)?;
        self.add_sampler(parent, spec.body(body))
    }

    /// Attaches an assertion to a sampler or controller.
    pub fn add_assertion(
        &mut self,
        parent: impl Into<NodeId>,
        name: impl Into<String>,
        kind: AssertionKind,
    ) -> PlanResult<NodeId> {
        if let AssertionKind::StatusCodeMatch { codes } = &kind {
            if codes.is_empty() {
                return Err(PlanError::invalid_parameter(
                    "codes",
                    "a status code assertion needs at least one expected code",
                ));
            }
        }

        self.plan_mut().attach(parent.into(), name, NodeKind::Assertion(kind))
    }

    pub fn add_status_code_assertion<I, S>(
        &mut self,
        parent: impl Into<NodeId>,
        name: impl Into<String>,
        codes: I,
    ) -> PlanResult<NodeId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_assertion(parent, name, AssertionKind::status_codes(codes))
    }

    pub fn add_duration_assertion(
        &mut self,
        parent: impl Into<NodeId>,
        name: impl Into<String>,
        max_ms: u64,
    ) -> PlanResult<NodeId> {
        self.add_assertion(parent, name, AssertionKind::MaxDuration { ms: max_ms })
    }

    /// Status code assertion expecting `assertions.expected_status_codes`.
    pub fn add_status_code_assertion_from_config(
        &mut self,
        parent: impl Into<NodeId>,
        name: impl Into<String>,
    ) -> PlanResult<NodeId> {
        let codes = self.config().assertions.expected_status_codes.clone();
        self.add_status_code_assertion(parent, name, codes)
    }

    /// Duration assertion bounded by `assertions.max_duration_ms`.
    pub fn add_duration_assertion_from_config(
        &mut self,
        parent: impl Into<NodeId>,
        name: impl Into<String>,
    ) -> PlanResult<NodeId> {
        let max_ms = self.config().assertions.max_duration_ms;
        self.add_duration_assertion(parent, name, max_ms)
    }

    /// Reads a request body from the payload directory.
    pub fn load_body_from_resource(&self, name: &str) -> PlanResult<Bytes> {
        self.payloads().load(name)
    }

    /// Stores the value at `json_path` of the sampler's response in the
    /// virtual-user variable `variable`, or `default` when nothing matches.
    pub fn add_json_extractor(
        &mut self,
        sampler: impl Into<NodeId>,
        name: impl Into<String>,
        variable: impl Into<String>,
        json_path: &str,
        default: impl Into<String>,
    ) -> PlanResult<NodeId> {
        let variable = variable.into();
        if variable.trim().is_empty() {
            return Err(PlanError::InvalidName { kind: "extractor variable" });
        }

        let extractor = JsonExtractor::new(variable.trim(), json_path, default)?;
        self.plan_mut().attach(sampler.into(), name, NodeKind::Extractor(extractor))
    }

    /// Builds `group → sampler → status assertion` from one description.
    ///
    /// The group is named after the suite; the sampler after its target.
    pub fn simple_http_plan(&mut self, plan: SimpleHttpPlan) -> PlanResult<SamplerHandle> {
        let group_name = format!("{} Thread Group", self.name());
        let group = self.add_group(
            group_name,
            GroupSettings::new(plan.threads, plan.ramp_up_secs, plan.iterations),
        )?;

        let mut spec = SamplerSpec::new(format!("Request {}{}", plan.host, plan.path), plan.path)
            .host(plan.host)
            .method(plan.method);
        spec.port = plan.port;
        let sampler = self.add_sampler(group, spec)?;

        match plan.expected_codes {
            Some(codes) => self.add_status_code_assertion(sampler, "Response Code", codes)?,
            None => self.add_status_code_assertion_from_config(sampler, "Response Code")?,
        };
        Ok(sampler)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::PerfPlanConfig;
    use crate::payload::PayloadStore;

    fn context_with(config: PerfPlanConfig) -> SuiteContext {
        SuiteContext::with_config("suite", Arc::new(config))
    }

    fn sampler_config(ctx: &SuiteContext, handle: SamplerHandle) -> SamplerConfig {
        match ctx.plan().node(handle.id()).map(|n| n.kind().clone()) {
            Some(NodeKind::Sampler(config)) => config,
            other => panic!("expected sampler, got {other:?}"),
        }
    }

    #[test]
    fn test_group_defaults_come_from_config() {
        let mut config = PerfPlanConfig::default();
        config.load.threads = 5;
        config.load.iterations = 3;
        let mut ctx = context_with(config);

        let group = ctx.add_group("users", GroupSettings::default().ramp_up_secs(0)).unwrap();
        let node = ctx.plan().node(group.id()).unwrap();
        assert_eq!(
            node.kind(),
            &NodeKind::Group {
                threads: 5,
                ramp_up_secs: 0,
                iterations: 3
            }
        );
    }

    #[test]
    fn test_group_rejects_zero_counts() {
        let mut ctx = context_with(PerfPlanConfig::default());
        let err = ctx.add_group("g", GroupSettings::new(0, 1, 1)).unwrap_err();
        assert!(matches!(err, PlanError::InvalidParameter { parameter: "threads", .. }));

        let err = ctx.add_group("g", GroupSettings::new(1, 1, 0)).unwrap_err();
        assert!(matches!(err, PlanError::InvalidParameter { parameter: "iterations", .. }));
    }

    #[test]
    fn test_sampler_resolves_target_at_attach_time() {
        let mut config = PerfPlanConfig::default();
        config.target.host = "api.internal".to_string();
        config.target.port = Some(8443);
        let mut ctx = context_with(config);

        let group = ctx.add_group("g", GroupSettings::default()).unwrap();
        let sampler = ctx
            .add_sampler(group, SamplerSpec::new("list users", "/users").method("post"))
            .unwrap();

        let resolved = sampler_config(&ctx, sampler);
        assert_eq!(resolved.protocol, "https");
        assert_eq!(resolved.url(), "https://api.internal:8443/users");
        assert_eq!(resolved.method, "POST");

        let explicit = ctx
            .add_sampler(group, SamplerSpec::new("explicit", "/").protocol("http").host("other").port(80))
            .unwrap();
        assert_eq!(sampler_config(&ctx, explicit).url(), "http://other:80/");
    }

    #[test]
    fn test_unnamed_sampler_is_rejected() {
        let mut ctx = context_with(PerfPlanConfig::default());
        let group = ctx.add_group("g", GroupSettings::default()).unwrap();

        let err = ctx.add_sampler(group, SamplerSpec::new("   ", "/")).unwrap_err();
        assert!(matches!(err, PlanError::InvalidName { kind: "sampler" }));
    }

    #[test]
    fn test_duplicate_sibling_names_are_allowed() {
        let mut ctx = context_with(PerfPlanConfig::default());
        let group = ctx.add_group("g", GroupSettings::default()).unwrap();
        ctx.add_sampler(group, SamplerSpec::new("same", "/a")).unwrap();
        ctx.add_sampler(group, SamplerSpec::new("same", "/b")).unwrap();

        assert_eq!(ctx.plan().children(group.id()).count(), 2);
    }

    #[test]
    fn test_assertion_placement() {
        let mut ctx = context_with(PerfPlanConfig::default());
        let group = ctx.add_group("g", GroupSettings::default()).unwrap();
        let txn = ctx.add_transaction_controller(group, "checkout").unwrap();
        let sampler = ctx.add_sampler(txn, SamplerSpec::new("pay", "/pay")).unwrap();

        assert!(ctx.add_status_code_assertion(sampler, "ok", ["200"]).is_ok());
        assert!(ctx.add_duration_assertion(txn, "fast", 500).is_ok());

        let root = ctx.root();
        for parent in [group.id(), root] {
            let err = ctx.add_duration_assertion(parent, "misplaced", 10).unwrap_err();
            assert!(matches!(err, PlanError::InvalidAttachment { child: "assertion", .. }));
        }

        let err = ctx.add_status_code_assertion(sampler, "none", Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, PlanError::InvalidParameter { .. }));
    }

    #[test]
    fn test_config_driven_assertions() {
        let mut config = PerfPlanConfig::default();
        config.assertions.expected_status_codes = vec!["200".to_string(), " 204 ".to_string()];
        config.assertions.max_duration_ms = 750;
        let mut ctx = context_with(config);

        let group = ctx.add_group("g", GroupSettings::default()).unwrap();
        let sampler = ctx.add_sampler(group, SamplerSpec::new("s", "/")).unwrap();
        let codes = ctx.add_status_code_assertion_from_config(sampler, "codes").unwrap();
        let duration = ctx.add_duration_assertion_from_config(sampler, "duration").unwrap();

        assert_eq!(
            ctx.plan().node(codes).unwrap().kind(),
            &NodeKind::Assertion(AssertionKind::status_codes(["200", "204"]))
        );
        assert_eq!(
            ctx.plan().node(duration).unwrap().kind(),
            &NodeKind::Assertion(AssertionKind::MaxDuration { ms: 750 })
        );
    }

    #[test]
    fn test_nested_controllers() {
        let mut ctx = context_with(PerfPlanConfig::default());
        let group = ctx.add_group("g", GroupSettings::default()).unwrap();
        let outer = ctx.add_simple_controller(group, "outer").unwrap();
        let middle = ctx.add_random_order_controller(outer, "middle").unwrap();
        let inner = ctx.add_transaction_controller(middle, "inner").unwrap();
        ctx.add_sampler(inner, SamplerSpec::new("deep", "/deep")).unwrap();

        assert!(ctx.plan().node(inner.id()).unwrap().is_composite_controller());
        assert!(!ctx.plan().node(middle.id()).unwrap().is_composite_controller());
        assert_eq!(ctx.plan().len(), 6);
    }

    #[test]
    fn test_body_from_resource() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("order.json"), b"{\"sku\":1}").unwrap();

        let mut ctx = context_with(PerfPlanConfig::default());
        ctx.set_payloads(PayloadStore::new(dir.path()));
        let group = ctx.add_group("g", GroupSettings::default()).unwrap();

        let sampler = ctx
            .add_sampler_with_resource(group, SamplerSpec::new("order", "/orders").method("POST"), "order.json")
            .unwrap();
        assert_eq!(sampler_config(&ctx, sampler).body.as_deref(), Some(&b"{\"sku\":1}"[..]));

        let before = ctx.plan().len();
        let err = ctx
            .add_sampler_with_resource(group, SamplerSpec::new("missing", "/"), "missing.json")
            .unwrap_err();
        assert!(matches!(err, PlanError::PayloadLoad { .. }));
        assert_eq!(ctx.plan().len(), before);
    }

    #[test]
    fn test_json_extractor_under_sampler() {
        let mut ctx = context_with(PerfPlanConfig::default());
        let group = ctx.add_group("g", GroupSettings::default()).unwrap();
        let sampler = ctx
            .add_sampler(group, SamplerSpec::new("create user", "/users").method("POST"))
            .unwrap();

        let id = ctx
            .add_json_extractor(sampler, "user id", "created_user_id", "$.id", "NOT_FOUND")
            .unwrap();
        match ctx.plan().node(id).map(|n| n.kind()) {
            Some(NodeKind::Extractor(extractor)) => {
                assert_eq!(extractor.variable, "created_user_id");
                assert_eq!(extractor.pointer, "/id");
                assert_eq!(extractor.default, "NOT_FOUND");
            }
            other => panic!("expected extractor, got {other:?}"),
        }

        let err = ctx.add_json_extractor(sampler, "blank", "  ", "$.id", "").unwrap_err();
        assert!(matches!(err, PlanError::InvalidName { kind: "extractor variable" }));

        let err = ctx.add_json_extractor(sampler, "wildcard", "ids", "$.items[*].id", "").unwrap_err();
        assert!(matches!(err, PlanError::InvalidParameter { parameter: "json_path", .. }));

        let err = ctx.add_json_extractor(group, "on group", "ids", "$.id", "").unwrap_err();
        assert!(matches!(err, PlanError::InvalidAttachment { .. }));
    }

    #[test]
    fn test_simple_http_plan_shape() {
        let mut ctx = context_with(PerfPlanConfig::default());
        let sampler = ctx
            .simple_http_plan(
                SimpleHttpPlan::new("api.example.com", "/health")
                    .method("head")
                    .port(8080)
                    .load(4, 10, 2),
            )
            .unwrap();

        let config = sampler_config(&ctx, sampler);
        assert_eq!(config.method, "HEAD");
        assert_eq!(config.url(), "https://api.example.com:8080/health");

        let node = ctx.plan().node(sampler.id()).unwrap();
        assert_eq!(node.name(), "Request api.example.com/health");

        let group = ctx.plan().node(node.parent().unwrap()).unwrap();
        assert_eq!(group.name(), "suite Thread Group");
        assert_eq!(
            group.kind(),
            &NodeKind::Group {
                threads: 4,
                ramp_up_secs: 2,
                iterations: 10
            }
        );

        let assertions: Vec<_> = ctx.plan().children(sampler.id()).map(|n| n.kind().clone()).collect();
        assert_eq!(
            assertions,
            vec![NodeKind::Assertion(AssertionKind::status_codes(["200"]))]
        );
    }

    #[test]
    fn test_simple_http_plan_explicit_codes_and_validation() {
        let mut ctx = context_with(PerfPlanConfig::default());
        let sampler = ctx
            .simple_http_plan(SimpleHttpPlan::new("h", "/").expect(["200", "204"]))
            .unwrap();
        let codes: Vec<_> = ctx.plan().children(sampler.id()).map(|n| n.kind().clone()).collect();
        assert_eq!(codes, vec![NodeKind::Assertion(AssertionKind::status_codes(["200", "204"]))]);

        let err = ctx
            .simple_http_plan(SimpleHttpPlan::new("h", "/").load(0, 1, 0))
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidParameter { parameter: "threads", .. }));
    }
}
