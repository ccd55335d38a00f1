use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one assembled plan.
///
/// A fresh value is minted every time a suite is initialized, so node handles
/// from a replaced suite can be told apart from live ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(Uuid);

impl PlanId {
    /// Generates a new identifier using UUID v7.
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlanId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Position of a node inside the arena of the plan that minted it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    plan: PlanId,
    index: u32,
}

impl NodeId {
    pub(crate) const fn new(plan: PlanId, index: u32) -> Self {
        Self { plan, index }
    }

    /// Plan this node belongs to.
    #[must_use]
    pub const fn plan(&self) -> PlanId {
        self.plan
    }

    /// Arena index; the root is always `0`.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.plan, self.index)
    }
}

macro_rules! define_handle {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name(NodeId);

        impl $name {
            pub(crate) const fn new(id: NodeId) -> Self {
                Self(id)
            }

            /// Underlying node identifier.
            #[must_use]
            pub const fn id(&self) -> NodeId {
                self.0
            }
        }

        impl From<$name> for NodeId {
            fn from(handle: $name) -> Self {
                handle.0
            }
        }
    };
}

define_handle!(GroupHandle, "Handle scoping attach calls to a group subtree.");
define_handle!(ControllerHandle, "Handle scoping attach calls to a controller subtree.");
define_handle!(SamplerHandle, "Handle for attaching assertions to a sampler.");
