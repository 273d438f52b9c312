//! Logging and telemetry initialization.
//!
//! Controlled by `OTEL_EXPORTER_OTLP_ENDPOINT` (the standard OTLP env var):
//! - unset -> compact human-readable events on stderr
//! - `"stderr"` -> JSON spans/events to stderr (non-standard extension)
//! - `"http://..."` -> OTLP HTTP span export to the given endpoint
//!
//! `RUST_LOG` filters events in every mode; the default level is `warn` so
//! the progress lines on stdout stay the only output of a clean run.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const DEFAULT_FILTER: &str = "warn";

/// Opaque guard. Dropping it flushes and shuts down the OTLP pipeline.
/// Hold this in `main()` until exit.
pub struct TelemetryGuard {
    #[cfg(feature = "otel")]
    trace_provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otel")]
        if let Some(provider) = self.trace_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("otel trace shutdown error: {e}");
        }
    }
}

/// Which subscriber [`init`] installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryMode {
    Compact,
    JsonStderr,
    Otlp,
}

impl TelemetryMode {
    /// Pick a mode from the value of `OTEL_EXPORTER_OTLP_ENDPOINT`.
    #[must_use]
    pub fn from_endpoint(endpoint: Option<&str>) -> Self {
        match endpoint {
            None | Some("") => Self::Compact,
            Some("stderr") => Self::JsonStderr,
            Some(_) => Self::Otlp,
        }
    }
}

/// Initialize logging based on `OTEL_EXPORTER_OTLP_ENDPOINT`.
///
/// Returns a guard that must be held until the program exits.
#[must_use]
pub fn init() -> TelemetryGuard {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();

    match TelemetryMode::from_endpoint(endpoint.as_deref()) {
        TelemetryMode::Compact => init_compact(),
        TelemetryMode::JsonStderr => init_json_stderr(),
        #[cfg(feature = "otel")]
        TelemetryMode::Otlp => init_otlp(),
        #[cfg(not(feature = "otel"))]
        TelemetryMode::Otlp => {
            eprintln!(
                "warning: OTEL_EXPORTER_OTLP_ENDPOINT set but ci-prep built without 'otel' feature"
            );
            init_compact()
        }
    }
}

const fn no_export() -> TelemetryGuard {
    TelemetryGuard {
        #[cfg(feature = "otel")]
        trace_provider: None,
    }
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn init_compact() -> TelemetryGuard {
    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .without_time()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
    no_export()
}

/// JSON spans/events to stderr via tracing-subscriber's JSON formatter.
fn init_json_stderr() -> TelemetryGuard {
    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE),
        )
        .try_init();
    no_export()
}

/// OTLP HTTP span export.
///
/// The SDK reads `OTEL_EXPORTER_OTLP_ENDPOINT` from the environment natively
/// and appends `/v1/traces`.
#[cfg(feature = "otel")]
fn init_otlp() -> TelemetryGuard {
    use opentelemetry::trace::TracerProvider as _;

    let span_exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .build()
    {
        Ok(e) => e,
        Err(e) => {
            eprintln!("warning: failed to init OTLP span exporter: {e}");
            return init_compact();
        }
    };

    let trace_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_simple_exporter(span_exporter)
        .with_resource(otel_resource())
        .build();

    let tracer = trace_provider.tracer(env!("CARGO_PKG_NAME"));
    let trace_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(trace_layer)
        .try_init();

    TelemetryGuard {
        trace_provider: Some(trace_provider),
    }
}

#[cfg(feature = "otel")]
fn otel_resource() -> opentelemetry_sdk::Resource {
    use opentelemetry::KeyValue;
    opentelemetry_sdk::Resource::builder()
        .with_attribute(KeyValue::new("service.name", env!("CARGO_PKG_NAME")))
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build()
}
