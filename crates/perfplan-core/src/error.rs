use thiserror::Error;

/// Canonical error type for plan assembly.
///
/// Every variant is raised at assembly time, before anything is handed to an
/// execution engine. Per-request failures during a run are never errors; they
/// are recorded as outcome events.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A node was attached under a parent that cannot hold it.
    #[error("cannot attach {child} `{name}` under {parent}: {reason}")]
    InvalidAttachment {
        /// Kind of the node being attached (e.g. `"assertion"`).
        child: &'static str,
        /// Name of the node being attached.
        name: String,
        /// Kind of the rejected parent (e.g. `"group"`).
        parent: &'static str,
        /// Human-readable explanation.
        reason: String,
    },

    /// A node that must be named was given an empty name.
    #[error("{kind} requires a non-empty name")]
    InvalidName {
        /// Kind of the unnamed node.
        kind: &'static str,
    },

    /// An external payload resource could not be read.
    #[error("failed to load payload `{name}`: {source}")]
    PayloadLoad {
        /// Resource name as requested by the caller.
        name: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A builder call was made on a thread without a live suite context.
    #[error("no suite context is initialized on this thread")]
    NotInitialized,

    /// A numeric or textual setting is outside its allowed range.
    #[error("invalid parameter `{parameter}`: {message}")]
    InvalidParameter {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// Human-readable details.
        message: String,
    },

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl PlanError {
    /// Creates an `InvalidAttachment` variant.
    #[must_use]
    pub fn invalid_attachment(
        child: &'static str,
        name: impl Into<String>,
        parent: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidAttachment {
            child,
            name: name.into(),
            parent,
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidParameter` variant.
    #[must_use]
    pub fn invalid_parameter(parameter: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter,
            message: message.into(),
        }
    }

    /// Creates a `PayloadLoad` variant.
    #[must_use]
    pub fn payload_load(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::PayloadLoad {
            name: name.into(),
            source,
        }
    }
}

/// Convenient result alias for plan assembly.
pub type PlanResult<T> = Result<T, PlanError>;
