use std::{collections::HashMap, time::Duration};

use serde::Deserialize;
use url::Url;

use crate::imagegen::parse_positive;

/// Telemetry configuration
///
/// Logs always go to stdout; `[telemetry.otlp]` adds export of traces and
/// generation metrics.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Reported as `service.name`
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Extra resource attributes attached to every signal
    #[serde(default)]
    pub resource_attributes: HashMap<String, String>,
    #[serde(default)]
    pub otlp: Option<OtlpConfig>,
}

/// OTLP collector connection and per-signal switches
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OtlpConfig {
    pub endpoint: Url,
    #[serde(default)]
    pub protocol: OtlpProtocol,
    /// Metric push period (e.g. "30s")
    #[serde(default = "default_export_interval")]
    pub export_interval: String,
    #[serde(default = "default_true")]
    pub traces: bool,
    #[serde(default = "default_true")]
    pub metrics: bool,
    /// Fraction of root traces kept, 0.0 to 1.0
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
    /// Follow the caller's sampling decision when a parent span exists
    #[serde(default = "default_true")]
    pub parent_based: bool,
}

impl OtlpConfig {
    /// Parsed metric push period
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a valid, non-zero duration
    pub fn export_interval(&self) -> anyhow::Result<Duration> {
        parse_positive("telemetry.otlp.export_interval", &self.export_interval)
    }
}

/// Wire protocol used to reach the collector
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OtlpProtocol {
    #[default]
    Grpc,
    HttpProto,
}

fn default_service_name() -> String {
    "lumen".to_string()
}

fn default_export_interval() -> String {
    "30s".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_sampling_rate() -> f64 {
    1.0
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}
