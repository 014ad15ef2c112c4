use std::io;

use tracing::subscriber::set_global_default;
use tracing::Subscriber;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Builds the subscriber every service in this workspace logs through:
/// env-filtered spans rendered as Bunyan-format JSON lines on stdout.
///
/// `default_filter` applies when `RUST_LOG` is unset.
pub fn make_subscriber(
    service_name: impl Into<String>,
    default_filter: impl Into<String>,
) -> impl Subscriber + Send + Sync {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter.into()));

    Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(BunyanFormattingLayer::new(service_name.into(), io::stdout))
}

/// Installs the subscriber as the process-wide default and routes `log`
/// macro calls into it. Call once at startup.
pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync) {
    LogTracer::init().expect("Failed to set logger");
    set_global_default(subscriber).expect("Failed to set tracing subscriber");
}
