//! Log setup for the `dossier` binary.
//!
//! Everything goes to stderr. Stdout is reserved for the run id and for
//! command output such as a rendered dossier, so `dossier export | head -1`
//! always yields the run id.

use std::io;

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// `RUST_LOG` wins; otherwise everything at `level` and above.
fn filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Formatting layer for stderr. JSON lines carry the `dossier.export` span
/// fields (the run id) on every event; the human format drops colour codes
/// when they would end up in a JSON-consuming pipeline.
fn stderr_layer(json: bool) -> Box<dyn Layer<Registry> + Send + Sync> {
    let base = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_span_events(FmtSpan::NONE);
    if json {
        base.json().with_current_span(true).with_span_list(false).boxed()
    } else {
        base.boxed()
    }
}

/// Install the global subscriber. A second call is a no-op, so tests and
/// embedding programs may call it freely.
pub fn init_tracing(json: bool, level: Level) {
    tracing_subscriber::registry()
        .with(stderr_layer(json).with_filter(filter(level)))
        .try_init()
        .ok();
}
