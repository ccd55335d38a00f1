// Property-based tests for plan assembly
//
// Properties tested:
// 1. Attach succeeds exactly when the parent kind may hold the child kind
// 2. Every attached node is reachable from the root exactly once, in order
// 3. Handles from a replaced suite are never accepted by the new one

use std::sync::Arc;

use perfplan_core::{
    registry, AssertionKind, ControllerKind, GroupSettings, JsonExtractor, NodeId, NodeKind, PerfPlanConfig,
    PlanError, SamplerConfig, SamplerSpec, SuiteContext, TestPlan,
};
use proptest::prelude::*;

fn kind_for(tag: u8) -> NodeKind {
    match tag % 5 {
        0 => NodeKind::Group {
            threads: 1,
            ramp_up_secs: 0,
            iterations: 1,
        },
        1 => NodeKind::Controller {
            kind: ControllerKind::Simple,
            generates_composite_sample: tag % 8 == 1,
        },
        2 => NodeKind::Sampler(SamplerConfig {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: None,
            path: "/".to_string(),
            method: "GET".to_string(),
            body: None,
            headers: Vec::new(),
        }),
        3 => NodeKind::Assertion(AssertionKind::MaxDuration { ms: 10 }),
        _ => NodeKind::Extractor(JsonExtractor::new("id", "$.id", "").unwrap()),
    }
}

fn allowed(child: &NodeKind, parent: &NodeKind) -> bool {
    match (child, parent) {
        (NodeKind::Group { .. }, NodeKind::Root { .. }) => true,
        (NodeKind::Controller { .. } | NodeKind::Sampler(_), NodeKind::Group { .. } | NodeKind::Controller { .. }) => {
            true
        }
        (NodeKind::Assertion(_), NodeKind::Sampler(_) | NodeKind::Controller { .. }) => true,
        (NodeKind::Extractor(_), NodeKind::Sampler(_)) => true,
        _ => false,
    }
}

// ============================================================================
// Property 1 + 2: structural rules and reachability
// ============================================================================

proptest! {
    #[test]
    fn prop_attach_follows_structural_rules(steps in prop::collection::vec((any::<u8>(), any::<u16>()), 1..80)) {
        let mut plan = TestPlan::new("suite", Vec::new());
        let mut ids: Vec<NodeId> = vec![plan.root().id()];

        for (tag, pick) in steps {
            let parent = ids[pick as usize % ids.len()];
            let kind = kind_for(tag);
            let expected = allowed(&kind, plan.node(parent).unwrap().kind());

            match plan.attach(parent, format!("n{}", ids.len()), kind) {
                Ok(id) => {
                    prop_assert!(expected);
                    prop_assert_eq!(plan.node(id).unwrap().parent(), Some(parent));
                    ids.push(id);
                }
                Err(err) => {
                    prop_assert!(!expected);
                    let is_attachment_error = matches!(err, PlanError::InvalidAttachment { .. });
                    prop_assert!(is_attachment_error);
                }
            }
        }

        prop_assert_eq!(plan.len(), ids.len());

        let visited: Vec<NodeId> = plan.iter().map(|n| n.id()).collect();
        prop_assert_eq!(visited.len(), ids.len());
        for id in &ids {
            prop_assert_eq!(visited.iter().filter(|v| *v == id).count(), 1);
        }

        for node in plan.iter() {
            for child in node.children() {
                prop_assert_eq!(plan.node(*child).unwrap().parent(), Some(node.id()));
            }
        }
    }
}

// ============================================================================
// Property 3: re-initialize discards the previous tree
// ============================================================================

proptest! {
    #[test]
    fn prop_reinitialize_rejects_old_handles(groups in 1usize..5, samplers in 0usize..5) {
        let config = Arc::new(PerfPlanConfig::default());
        registry::initialize_with_config("first", config.clone());

        let mut old: Vec<NodeId> = Vec::new();
        for g in 0..groups {
            let group = registry::with_current(|ctx| ctx.add_group(format!("g{g}"), GroupSettings::default())).unwrap();
            old.push(group.id());
            for s in 0..samplers {
                let sampler = registry::with_current(|ctx| ctx.add_sampler(group, SamplerSpec::new(format!("s{s}"), "/"))).unwrap();
                old.push(sampler.id());
            }
        }

        registry::initialize_with_config("second", config);

        for id in &old {
            let result = registry::with_current(|ctx| ctx.add_duration_assertion(*id, "a", 1));
            let rejected = matches!(result, Err(PlanError::InvalidAttachment { .. }));
            prop_assert!(rejected);
        }

        let len = registry::with_current(|ctx| Ok(ctx.plan().len())).unwrap();
        prop_assert_eq!(len, 1);
        registry::clear();
    }

    #[test]
    fn prop_explicit_contexts_are_isolated(count in 1usize..10) {
        let config = Arc::new(PerfPlanConfig::default());
        let mut first = SuiteContext::with_config("first", config.clone());
        let mut second = SuiteContext::with_config("second", config);

        for i in 0..count {
            let g = first.add_group(format!("g{i}"), GroupSettings::default()).unwrap();
            prop_assert!(second.add_simple_controller(g, "foreign").is_err());
        }

        prop_assert_eq!(first.plan().groups().count(), count);
        prop_assert_eq!(second.plan().len(), 1);
    }
}
