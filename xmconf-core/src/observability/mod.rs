//! Observability infrastructure: tracing and metrics.
//!
//! The library only emits events and counters. Binaries call [`init`] once
//! to install a subscriber; no metrics exporter is installed here, so
//! counters are no-ops unless the embedding process sets a recorder.

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod metrics;

/// Initialize the global tracing subscriber and describe core metrics.
///
/// `RUST_LOG` directives take precedence over `default_level`. Calling this
/// twice returns an error from the second call.
pub fn init(default_level: Level) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
        .try_init()?;

    metrics::register_core_metrics();
    tracing::debug!("Observability initialized");
    Ok(())
}
