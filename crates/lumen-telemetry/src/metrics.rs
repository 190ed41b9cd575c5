//! Metric names and recorders for generation traffic

use std::time::Instant;

use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};

// Generation metric names
pub const GENERATION_REQUEST_COUNT: &str = "lumen.generation.request.count";
pub const GENERATION_REQUEST_DURATION: &str = "lumen.generation.request.duration";

// Attribute keys
pub const ATTR_PROVIDER: &str = "lumen.provider";
pub const ATTR_OUTCOME: &str = "lumen.outcome";

/// Record a duration measurement on a histogram
pub fn record_duration(histogram: &Histogram<f64>, start: Instant, attributes: &[KeyValue]) {
    histogram.record(start.elapsed().as_secs_f64(), attributes);
}

/// Instruments for generation requests
///
/// Built from the global meter, so they are no-ops until an exporter is
/// installed by [`crate::init`].
#[derive(Clone)]
pub struct GenerationMetrics {
    requests: Counter<u64>,
    duration: Histogram<f64>,
}

impl GenerationMetrics {
    pub fn new() -> Self {
        let meter = global::meter("lumen");

        Self {
            requests: meter
                .u64_counter(GENERATION_REQUEST_COUNT)
                .with_description("Generation requests by provider and outcome")
                .build(),
            duration: meter
                .f64_histogram(GENERATION_REQUEST_DURATION)
                .with_description("End-to-end generation latency")
                .with_unit("s")
                .build(),
        }
    }

    /// Count one finished request and its latency
    ///
    /// `outcome` is `image`, `text`, or the error kind.
    pub fn record(&self, provider: &str, outcome: &str, start: Instant) {
        let attributes = [
            KeyValue::new(ATTR_PROVIDER, provider.to_string()),
            KeyValue::new(ATTR_OUTCOME, outcome.to_string()),
        ];

        self.requests.add(1, &attributes);
        record_duration(&self.duration, start, &attributes);
    }
}

impl Default for GenerationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GenerationMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationMetrics").finish_non_exhaustive()
    }
}
