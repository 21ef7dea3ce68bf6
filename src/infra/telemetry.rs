use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

pub const GENERATE_TOTAL: &str = "cookiepress_generate_total";
pub const GENERATE_MS: &str = "cookiepress_generate_ms";
pub const ARCHIVE_BYTES: &str = "cookiepress_archive_bytes";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the generation pipeline emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            GENERATE_TOTAL,
            Unit::Count,
            "Total number of generation requests, labelled by outcome."
        );
        describe_histogram!(
            GENERATE_MS,
            Unit::Milliseconds,
            "End-to-end generation latency in milliseconds."
        );
        describe_histogram!(
            ARCHIVE_BYTES,
            Unit::Bytes,
            "Size of generated project archives in bytes."
        );
    });
}
