//! Logging and trace export setup for docent binaries.
//!
//! Call [`init_tracing`] once at process startup.  The firmware itself only
//! uses the `tracing` macros; this module decides where they go.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP collector base URL (e.g. `http://localhost:4318`). When set, spans are exported over OTLP/HTTP. |
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `DOCENT_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |
//!
//! # Example
//!
//! ```rust,no_run
//! // Keep the guard alive until the process exits.
//! let _guard = docent_firmware::telemetry::init_tracing("docent-bench");
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FORMAT_VAR: &str = "DOCENT_LOG_FORMAT";

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Output format of the console layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    /// Read `DOCENT_LOG_FORMAT`; anything but `json` is compact.
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_VAR).as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Uses `RUST_LOG` for filtering and [`LogFormat::from_env`] for the console
/// format.  If `OTEL_EXPORTER_OTLP_ENDPOINT` is set, an OTLP/HTTP span
/// exporter is attached as well; otherwise only the console layer is
/// installed.
///
/// Hold the returned [`TracerProviderGuard`] for the lifetime of the
/// process.  Dropping it flushes pending spans.
///
/// `try_init` is used so that a second call (for example from a test
/// harness) leaves the first subscriber in place instead of panicking.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let format = LogFormat::from_env();
    let provider = build_provider(service_name);
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("docent")));

    let registry = tracing_subscriber::registry().with(env_filter).with(otel_layer);
    let result = match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("[docent] tracing subscriber already set: {e}");
    }

    TracerProviderGuard(provider)
}

// ─────────────────────────────────────────────────────────────────────────────
// RAII guard
// ─────────────────────────────────────────────────────────────────────────────

/// Shuts the OTel [`SdkTracerProvider`] down on drop, flushing pending spans.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    /// Whether spans are being exported.
    pub fn is_exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("[docent] OpenTelemetry provider shutdown error: {e}");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ─────────────────────────────────────────────────────────────────────────────

/// `None` when `OTEL_EXPORTER_OTLP_ENDPOINT` is absent or the exporter fails
/// to build (reported on stderr).
fn build_provider(service_name: &str) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[docent] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            // The bench is synchronous; there is no async runtime for a
            // batch exporter to spawn onto.
            .with_simple_exporter(exporter)
            .build(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_driven_setup() {
        // One test owns both variables so parallel tests never race on them.
        // SAFETY: no other test in this crate reads or writes these env-vars.
        unsafe {
            std::env::remove_var("OTEL_EXPORTER_OTLP_ENDPOINT");
            std::env::set_var(LOG_FORMAT_VAR, "json");
        }
        assert!(build_provider("test-service").is_none());
        assert_eq!(LogFormat::from_env(), LogFormat::Json);

        // SAFETY: as above.
        unsafe { std::env::set_var(LOG_FORMAT_VAR, "pretty") };
        assert_eq!(LogFormat::from_env(), LogFormat::Compact);

        // SAFETY: as above.
        unsafe { std::env::remove_var(LOG_FORMAT_VAR) };
        assert_eq!(LogFormat::from_env(), LogFormat::Compact);
    }

    #[test]
    fn guard_without_provider_drops_cleanly() {
        let guard = TracerProviderGuard(None);
        assert!(!guard.is_exporting());
        drop(guard);
    }
}
