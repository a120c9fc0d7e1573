//! Structured observability hooks for the export lifecycle.
//!
//! Events are emitted at `info!` (or `warn!` for failures) with an `event`
//! field so they can be filtered in JSON log pipelines. Writer tasks run
//! inside [`export_span`], so every event carries the `run_id`.

use std::path::Path;

use tracing::{debug, info, warn, Span};

use crate::error::Section;
use crate::snapshot::PersonId;

/// Span tagging everything an export does with its run id.
///
/// Attach with [`tracing::Instrument::instrument`]; spawned tasks need
/// `.instrument(Span::current())` to stay inside it.
pub fn export_span(run_id: &str) -> Span {
    tracing::info_span!("dossier.export", run_id = %run_id)
}

/// Emit event: export started.
pub fn emit_export_started(run_id: &str, residents: usize, root: &Path) {
    info!(
        event = "export.started",
        run_id = %run_id,
        residents = residents,
        root = %root.display(),
    );
}

/// Emit event: a section document was persisted.
pub fn emit_section_written(section: Section, path: &Path, bytes: usize) {
    info!(
        event = "section.written",
        section = %section,
        path = %path.display(),
        bytes = bytes,
    );
}

/// Emit event: a section failed (warning level).
pub fn emit_section_failed(section: Section, error: &dyn std::fmt::Display) {
    warn!(event = "section.failed", section = %section, error = %error);
}

/// Emit event: one character dossier was persisted.
pub fn emit_dossier_written(person: PersonId, stem: &str) {
    debug!(event = "dossier.written", person = %person, stem = %stem);
}

/// Emit event: one character dossier could not be produced (warning level).
pub fn emit_dossier_failed(person: PersonId, error: &dyn std::fmt::Display) {
    warn!(event = "dossier.failed", person = %person, error = %error);
}

/// Emit event: export finished with duration, document count, and success status.
pub fn emit_export_finished(run_id: &str, duration_ms: u64, documents: usize, success: bool) {
    info!(
        event = "export.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        documents = documents,
        success = success,
    );
}
