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
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
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
            "feedsync_mutation_total",
            Unit::Count,
            "Total number of dispatched mutations by kind and outcome."
        );
        describe_counter!(
            "feedsync_rollback_total",
            Unit::Count,
            "Total number of optimistic patches undone after a failed mutation."
        );
        describe_histogram!(
            "feedsync_fetch_merge_ms",
            Unit::Milliseconds,
            "Latency of merging a fetched page into its view in milliseconds."
        );
        describe_counter!(
            "feedsync_fetch_discarded_total",
            Unit::Count,
            "Total number of fetch results dropped because their view changed."
        );
        describe_counter!(
            "feedsync_fetch_error_total",
            Unit::Count,
            "Total number of failed fetches recorded on a view."
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describing_metrics_twice_is_harmless() {
        describe_metrics();
        describe_metrics();
        assert!(METRIC_DESCRIPTIONS.is_completed());
    }
}
