use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(logging.level).into())
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "larpwright_snapshot_hit_total",
            Unit::Count,
            "Total number of snapshot cache hits."
        );
        describe_counter!(
            "larpwright_snapshot_miss_total",
            Unit::Count,
            "Total number of snapshot cache misses."
        );
        describe_counter!(
            "larpwright_snapshot_invalidate_total",
            Unit::Count,
            "Total number of full snapshot invalidations."
        );
        describe_counter!(
            "larpwright_snapshot_patch_total",
            Unit::Count,
            "Total number of snapshot patch attempts, labeled by entity kind and outcome."
        );
        describe_histogram!(
            "larpwright_snapshot_build_ms",
            Unit::Milliseconds,
            "Snapshot build latency in milliseconds."
        );
        describe_histogram!(
            "larpwright_snapshot_patch_ms",
            Unit::Milliseconds,
            "Snapshot patch latency in milliseconds."
        );
    });
}
