//! Tracing subscriber setup for host processes
//!
//! The library only emits `tracing` events; binaries call [`init`] once at
//! startup. `RUST_LOG` overrides the default filter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Error, Result};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "ruvector_endpoints=info";

/// Install the global fmt subscriber
///
/// Fails if a global subscriber is already set.
pub fn try_init() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| Error::internal(format!("Failed to initialize tracing: {}", e)))
}

/// Install the global fmt subscriber, ignoring a subscriber that is already set
pub fn init() {
    let _ = try_init();
}
