//! Plan node model
//!
//! A suite is a tree `Root → Group → Controller* → Sampler → (Assertion | Extractor)*` kept in
//! an arena. Children are stored in document order, which is the order a
//! virtual user walks them. Structural rules are enforced by [`TestPlan::attach`];
//! nodes carry data only.

use std::collections::BTreeSet;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::ids::{NodeId, PlanId};

/// Grouping behavior of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    /// Measures its children as one logical transaction.
    Transaction,
    /// Runs its children in document order.
    Simple,
    /// Runs its direct children once each, in a fresh random order per pass.
    RandomOrder,
}

impl ControllerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transaction => "transaction",
            Self::Simple => "simple",
            Self::RandomOrder => "random_order",
        }
    }
}

/// Validation rule evaluated against an outcome after it completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    /// Status code must be one of `codes`.
    StatusCodeMatch { codes: BTreeSet<String> },
    /// Elapsed time must not exceed `ms`.
    MaxDuration { ms: u64 },
}

impl AssertionKind {
    /// Builds a status-code assertion from any list of codes.
    pub fn status_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::StatusCodeMatch {
            codes: codes.into_iter().map(|c| c.into().trim().to_string()).collect(),
        }
    }
}

/// Captures a value from a sampler's JSON response into a virtual-user
/// variable, referenced later as `${variable}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonExtractor {
    pub variable: String,
    /// JSONPath as written by the caller, e.g. `$.data[0].id`
    pub path: String,
    /// Equivalent JSON Pointer, e.g. `/data/0/id`
    pub pointer: String,
    /// Value stored when the path matches nothing
    pub default: String,
}

impl JsonExtractor {
    /// Builds an extractor, rejecting paths outside the supported subset
    /// (`$`, `.field`, `[index]`, `['field']`).
    pub fn new(variable: impl Into<String>, path: impl Into<String>, default: impl Into<String>) -> PlanResult<Self> {
        let path = path.into();
        let pointer = json_path_to_pointer(&path)
            .ok_or_else(|| PlanError::invalid_parameter("json_path", format!("unsupported JSONPath `{path}`")))?;

        Ok(Self {
            variable: variable.into(),
            path,
            pointer,
            default: default.into(),
        })
    }
}

/// Translates a simple JSONPath into a JSON Pointer.
pub fn json_path_to_pointer(path: &str) -> Option<String> {
    let mut rest = path.trim().strip_prefix('$')?;
    let mut pointer = String::new();

    while !rest.is_empty() {
        let segment;
        if let Some(after_dot) = rest.strip_prefix('.') {
            let end = after_dot.find(['.', '[']).unwrap_or(after_dot.len());
            segment = &after_dot[..end];
            rest = &after_dot[end..];
        } else if let Some(after_bracket) = rest.strip_prefix('[') {
            let end = after_bracket.find(']')?;
            let inner = after_bracket[..end].trim();
            segment = inner
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
                .unwrap_or(inner);
            if segment == inner && !inner.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            rest = &after_bracket[end + 1..];
        } else {
            return None;
        }

        if segment.is_empty() || segment == "*" {
            return None;
        }
        pointer.push('/');
        pointer.push_str(&segment.replace('~', "~0").replace('/', "~1"));
    }

    Some(pointer)
}

/// Fully resolved request description held by a sampler node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerConfig {
    pub protocol: String,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub method: String,
    pub body: Option<Bytes>,
    pub headers: Vec<(String, String)>,
}

impl SamplerConfig {
    /// Absolute URL of the request, e.g. `https://api.example.com:8443/users`.
    pub fn url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}{}", self.protocol, self.host, port, self.path),
            None => format!("{}://{}{}", self.protocol, self.host, self.path),
        }
    }
}

/// Tagged payload of a plan node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root {
        headers: Vec<(String, String)>,
    },
    Group {
        threads: u32,
        ramp_up_secs: u32,
        iterations: u32,
    },
    Controller {
        kind: ControllerKind,
        generates_composite_sample: bool,
    },
    Sampler(SamplerConfig),
    Assertion(AssertionKind),
    Extractor(JsonExtractor),
}

impl NodeKind {
    /// Short lowercase label used in errors and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Root { .. } => "root",
            Self::Group { .. } => "group",
            Self::Controller { .. } => "controller",
            Self::Sampler(_) => "sampler",
            Self::Assertion(_) => "assertion",
            Self::Extractor(_) => "extractor",
        }
    }

    /// Whether a node of this kind may be attached under `parent`.
    fn accepts_parent(&self, parent: &NodeKind) -> bool {
        match self {
            Self::Root { .. } => false,
            Self::Group { .. } => matches!(parent, Self::Root { .. }),
            Self::Controller { .. } | Self::Sampler(_) => {
                matches!(parent, Self::Group { .. } | Self::Controller { .. })
            }
            Self::Assertion(_) => matches!(parent, Self::Sampler(_) | Self::Controller { .. }),
            Self::Extractor(_) => matches!(parent, Self::Sampler(_)),
        }
    }

    fn placement_rule(&self) -> &'static str {
        match self {
            Self::Root { .. } => "the root cannot be attached to another node",
            Self::Group { .. } => "groups attach only to the root",
            Self::Controller { .. } | Self::Sampler(_) => {
                "controllers and samplers attach only to groups or controllers"
            }
            Self::Assertion(_) => "assertions must describe a sampler or a controller",
            Self::Extractor(_) => "extractors read the response of a sampler",
        }
    }
}

/// One node of the plan tree.
#[derive(Debug, Clone)]
pub struct PlanNode {
    id: NodeId,
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

impl PlanNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_composite_controller(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Controller {
                generates_composite_sample: true,
                ..
            }
        )
    }
}

/// Arena-backed plan tree owned by one suite.
#[derive(Debug, Clone)]
pub struct TestPlan {
    id: PlanId,
    nodes: Vec<PlanNode>,
}

impl TestPlan {
    /// Creates a plan containing only its root.
    pub fn new(suite_name: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        let id = PlanId::new();
        let root = PlanNode {
            id: NodeId::new(id, 0),
            name: suite_name.into(),
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Root { headers },
        };
        Self {
            id,
            nodes: vec![root],
        }
    }

    pub fn id(&self) -> PlanId {
        self.id
    }

    /// Suite name carried by the root.
    pub fn name(&self) -> &str {
        &self.nodes[0].name
    }

    pub fn root(&self) -> &PlanNode {
        &self.nodes[0]
    }

    /// Suite-wide default headers.
    pub fn headers(&self) -> &[(String, String)] {
        match &self.nodes[0].kind {
            NodeKind::Root { headers } => headers,
            _ => &[],
        }
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether nothing has been attached below the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Whether `id` was minted by this plan.
    pub fn contains(&self, id: NodeId) -> bool {
        id.plan() == self.id && id.index() < self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&PlanNode> {
        if id.plan() != self.id {
            return None;
        }
        self.nodes.get(id.index())
    }

    /// Children of `id` in document order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &PlanNode> + '_ {
        self.node(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |child| self.node(*child))
    }

    /// Group nodes in document order.
    pub fn groups(&self) -> impl Iterator<Item = &PlanNode> + '_ {
        self.children(self.root().id)
    }

    /// All nodes in depth-first document order, starting at the root.
    pub fn iter(&self) -> impl Iterator<Item = &PlanNode> + '_ {
        let mut stack = vec![self.root().id];
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            let node = self.node(id)?;
            stack.extend(node.children.iter().rev().copied());
            Some(node)
        })
    }

    /// Attaches a new node under `parent`, enforcing the structural rules.
    pub fn attach(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        kind: NodeKind,
    ) -> PlanResult<NodeId> {
        let name = name.into();

        if parent.plan() != self.id {
            return Err(PlanError::invalid_attachment(
                kind.label(),
                name,
                "node",
                format!("parent {parent} belongs to a different suite"),
            ));
        }

        let parent_kind = match self.nodes.get(parent.index()) {
            Some(node) => &node.kind,
            None => {
                return Err(PlanError::invalid_attachment(
                    kind.label(),
                    name,
                    "node",
                    format!("parent {parent} does not exist"),
                ))
            }
        };

        if !kind.accepts_parent(parent_kind) {
            return Err(PlanError::invalid_attachment(
                kind.label(),
                name,
                parent_kind.label(),
                kind.placement_rule(),
            ));
        }

        let index = u32::try_from(self.nodes.len())
            .map_err(|_| PlanError::invalid_parameter("plan", "too many nodes"))?;
        let id = NodeId::new(self.id, index);

        self.nodes.push(PlanNode {
            id,
            name,
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent.index()].children.push(id);

        Ok(id)
    }
}

impl fmt::Display for TestPlan {
    /// Indented outline of the tree, one node per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in self.iter() {
            let mut depth = 0;
            let mut cursor = node.parent;
            while let Some(parent) = cursor {
                depth += 1;
                cursor = self.node(parent).and_then(|p| p.parent);
            }
            writeln!(f, "{}{} `{}`", "  ".repeat(depth), node.kind.label(), node.name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> NodeKind {
        NodeKind::Group {
            threads: 1,
            ramp_up_secs: 0,
            iterations: 1,
        }
    }

    fn controller() -> NodeKind {
        NodeKind::Controller {
            kind: ControllerKind::Simple,
            generates_composite_sample: false,
        }
    }

    fn sampler() -> NodeKind {
        NodeKind::Sampler(SamplerConfig {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: Some(8080),
            path: "/health".to_string(),
            method: "GET".to_string(),
            body: None,
            headers: Vec::new(),
        })
    }

    fn assertion() -> NodeKind {
        NodeKind::Assertion(AssertionKind::MaxDuration { ms: 100 })
    }

    #[test]
    fn test_attach_builds_document_order() {
        let mut plan = TestPlan::new("suite", Vec::new());
        let root = plan.root().id();
        let g = plan.attach(root, "g", group()).unwrap();
        let c = plan.attach(g, "c", controller()).unwrap();
        let s1 = plan.attach(c, "s1", sampler()).unwrap();
        let s2 = plan.attach(c, "s2", sampler()).unwrap();
        plan.attach(s1, "a", assertion()).unwrap();

        let names: Vec<_> = plan.iter().map(|n| n.name().to_string()).collect();
        assert_eq!(names, vec!["suite", "g", "c", "s1", "a", "s2"]);
        assert_eq!(plan.node(s2).unwrap().parent(), Some(c));
        assert_eq!(plan.len(), 6);
    }

    #[test]
    fn test_structural_rules() {
        let mut plan = TestPlan::new("suite", Vec::new());
        let root = plan.root().id();

        // Only groups hang off the root.
        assert!(plan.attach(root, "s", sampler()).is_err());
        assert!(plan.attach(root, "a", assertion()).is_err());

        let g = plan.attach(root, "g", group()).unwrap();
        assert!(plan.attach(g, "nested group", group()).is_err());

        let err = plan.attach(g, "a", assertion()).unwrap_err();
        assert!(matches!(
            err,
            PlanError::InvalidAttachment {
                parent: "group",
                child: "assertion",
                ..
            }
        ));

        let s = plan.attach(g, "s", sampler()).unwrap();
        let a = plan.attach(s, "a", assertion()).unwrap();
        assert!(plan.attach(a, "deeper", assertion()).is_err());
        assert!(plan.attach(s, "child", sampler()).is_err());
    }

    #[test]
    fn test_foreign_handles_are_rejected() {
        let mut first = TestPlan::new("first", Vec::new());
        let g = first.attach(first.root().id(), "g", group()).unwrap();

        let mut second = TestPlan::new("second", Vec::new());
        assert!(second.node(g).is_none());
        assert!(!second.contains(g));
        assert!(second.attach(g, "s", sampler()).is_err());
    }

    #[test]
    fn test_sampler_url() {
        let NodeKind::Sampler(mut config) = sampler() else {
            unreachable!()
        };
        assert_eq!(config.url(), "http://localhost:8080/health");
        config.port = None;
        assert_eq!(config.url(), "http://localhost/health");
    }

    #[test]
    fn test_display_outline() {
        let mut plan = TestPlan::new("suite", Vec::new());
        let g = plan.attach(plan.root().id(), "g", group()).unwrap();
        plan.attach(g, "s", sampler()).unwrap();
        assert_eq!(plan.to_string(), "root `suite`\n  group `g`\n    sampler `s`\n");
    }

    #[test]
    fn test_extractors_attach_only_to_samplers() {
        let extractor = || NodeKind::Extractor(JsonExtractor::new("user_id", "$.id", "NOT_FOUND").unwrap());

        let mut plan = TestPlan::new("suite", Vec::new());
        let g = plan.attach(plan.root().id(), "g", group()).unwrap();
        let c = plan.attach(g, "c", controller()).unwrap();
        let s = plan.attach(c, "s", sampler()).unwrap();

        assert!(plan.attach(s, "extract id", extractor()).is_ok());
        assert!(matches!(
            plan.attach(c, "extract id", extractor()).unwrap_err(),
            PlanError::InvalidAttachment {
                child: "extractor",
                parent: "controller",
                ..
            }
        ));
        assert!(plan.attach(g, "extract id", extractor()).is_err());
    }

    #[test]
    fn test_json_path_translation() {
        assert_eq!(json_path_to_pointer("$").as_deref(), Some(""));
        assert_eq!(json_path_to_pointer("$.id").as_deref(), Some("/id"));
        assert_eq!(json_path_to_pointer("$.data[0].user_id").as_deref(), Some("/data/0/user_id"));
        assert_eq!(json_path_to_pointer("$['a/b'].c").as_deref(), Some("/a~1b/c"));
        assert_eq!(json_path_to_pointer("$[\"x\"]").as_deref(), Some("/x"));

        assert!(json_path_to_pointer("id").is_none());
        assert!(json_path_to_pointer("$..id").is_none());
        assert!(json_path_to_pointer("$.items[*]").is_none());
        assert!(json_path_to_pointer("$[first]").is_none());
        assert!(JsonExtractor::new("v", "$.items[", "").is_err());
    }
}
