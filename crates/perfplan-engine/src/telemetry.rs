//! Tracing initialization
//!
//! Installs a `tracing-subscriber` registry with an env filter and a console
//! formatting layer. `RUST_LOG` overrides the default directives.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Registry};

pub const DEFAULT_DIRECTIVES: &str = "info,perfplan=debug";

/// Initialize tracing with `directives` unless `RUST_LOG` is set.
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(directives: &str) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    Registry::default().with(env_filter).with(fmt_layer).try_init()
}

/// Initialize tracing with [`DEFAULT_DIRECTIVES`].
pub fn init_default_tracing() -> Result<(), TryInitError> {
    init_tracing(DEFAULT_DIRECTIVES)
}
