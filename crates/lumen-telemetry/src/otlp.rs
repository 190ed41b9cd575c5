//! OTLP exporter construction

use lumen_config::{OtlpConfig, OtlpProtocol};
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
    trace::{Sampler, SdkTracerProvider},
};

pub fn meter_provider(otlp: &OtlpConfig, resource: Resource) -> anyhow::Result<SdkMeterProvider> {
    let builder = MetricExporter::builder();

    let metric_exporter = match otlp.protocol {
        OtlpProtocol::Grpc => builder.with_tonic().with_endpoint(otlp.endpoint.as_str()).build(),
        OtlpProtocol::HttpProto => builder.with_http().with_endpoint(otlp.endpoint.as_str()).build(),
    }
    .map_err(|e| anyhow::anyhow!("failed to build {:?} metrics exporter: {e}", otlp.protocol))?;

    let reader = PeriodicReader::builder(metric_exporter)
        .with_interval(otlp.export_interval()?)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build())
}

pub fn tracer_provider(otlp: &OtlpConfig, resource: Resource) -> anyhow::Result<SdkTracerProvider> {
    let builder = SpanExporter::builder();

    let span_exporter = match otlp.protocol {
        OtlpProtocol::Grpc => builder.with_tonic().with_endpoint(otlp.endpoint.as_str()).build(),
        OtlpProtocol::HttpProto => builder.with_http().with_endpoint(otlp.endpoint.as_str()).build(),
    }
    .map_err(|e| anyhow::anyhow!("failed to build {:?} span exporter: {e}", otlp.protocol))?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(sampler(otlp))
        .with_batch_exporter(span_exporter)
        .build())
}

/// Ratio sampler from `sampling_rate`, wrapped parent-based unless disabled
pub fn sampler(otlp: &OtlpConfig) -> Sampler {
    let rate = otlp.sampling_rate;

    let sampler = if rate >= 1.0 {
        Sampler::AlwaysOn
    } else if rate <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(rate)
    };

    if otlp.parent_based {
        Sampler::ParentBased(Box::new(sampler))
    } else {
        sampler
    }
}
