//! Assertion evaluation and scoping
//!
//! An assertion under a sampler checks that sampler. Under a composite
//! controller it checks the composite event. Under any other controller it
//! checks every sampler in that controller's subtree.

use perfplan_core::{AssertionKind, AssertionOutcome, NodeId, NodeKind, OutcomeEvent, TestPlan};

/// Assertion copied out of the plan for evaluation during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedAssertion {
    pub name: String,
    pub kind: AssertionKind,
}

/// Assertions attached directly to `node`, in document order.
pub fn assertions_of(plan: &TestPlan, node: NodeId) -> Vec<ScopedAssertion> {
    plan.children(node)
        .filter_map(|child| match child.kind() {
            NodeKind::Assertion(kind) => Some(ScopedAssertion {
                name: child.name().to_string(),
                kind: kind.clone(),
            }),
            _ => None,
        })
        .collect()
}

/// Evaluates one assertion against a completed event.
pub fn evaluate(assertion: &ScopedAssertion, event: &OutcomeEvent) -> AssertionOutcome {
    match &assertion.kind {
        AssertionKind::StatusCodeMatch { codes } => {
            let actual = event.status_code.trim();
            if codes.contains(actual) {
                AssertionOutcome::passed(&assertion.name)
            } else {
                let expected: Vec<&str> = codes.iter().map(String::as_str).collect();
                let actual = if actual.is_empty() { "<none>" } else { actual };
                AssertionOutcome::failed(
                    &assertion.name,
                    format!(
                        "{}: expected response code to be one of [{}] but was {}",
                        assertion.name,
                        expected.join(", "),
                        actual
                    ),
                )
            }
        }
        AssertionKind::MaxDuration { ms } => {
            if event.elapsed_ms <= *ms {
                AssertionOutcome::passed(&assertion.name)
            } else {
                AssertionOutcome::failed(
                    &assertion.name,
                    format!(
                        "The operation lasted too long: It took {} milliseconds, but should not have lasted longer than {} milliseconds.",
                        event.elapsed_ms, ms
                    ),
                )
            }
        }
    }
}

/// Evaluates `assertions` in order, appending their outcomes to `event`.
pub fn apply<'a>(event: &mut OutcomeEvent, assertions: impl IntoIterator<Item = &'a ScopedAssertion>) {
    for assertion in assertions {
        let outcome = evaluate(assertion, event);
        event.assertion_outcomes.push(outcome);
    }
    event.refresh_success();
}
