//! Export coordinator.
//!
//! Allocates the run namespace, resolves identifiers, fans the section
//! writers out onto the runtime, joins every one of them, and only then
//! builds the index from the joined character report.
//!
//! ```text
//! namespace ─► identifiers ─► summary ─┬─► locations ─┐
//!                                      ├─► landmarks ─┤
//!                                      ├─► drama ─────┼─► join ─► README.md
//!                                      └─► characters ┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span};

use crate::error::{ExportError, Section, SectionFailure};
use crate::naming::{Collision, IdentifierMap};
use crate::namespace::{RunId, RunManifest, RunNamespace};
use crate::obs::{emit_export_finished, emit_export_started, emit_section_failed, export_span};
use crate::sections::{
    render_drama, render_index, render_landmarks, render_locations, render_summary,
    write_characters, write_section, CharacterReport,
};
use crate::sink::{DocumentSink, FsSink};
use crate::snapshot::WorldSnapshot;

/// Dossier tasks allowed in flight at once unless configured otherwise.
pub const DEFAULT_CHARACTER_CONCURRENCY: usize = 8;

/// Where and how to export.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Directory the run root is created in.
    pub output_base: PathBuf,
    pub run_id: RunId,
    pub character_concurrency: usize,
}

impl ExportOptions {
    pub fn new(output_base: impl Into<PathBuf>, run_id: RunId) -> Self {
        Self {
            output_base: output_base.into(),
            run_id,
            character_concurrency: DEFAULT_CHARACTER_CONCURRENCY,
        }
    }
}

/// What one export run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub manifest: RunManifest,
    /// Fixed section documents written, relative to the run root.
    pub documents: Vec<PathBuf>,
    pub characters: CharacterReport,
    pub collisions: Vec<Collision>,
    pub failures: Vec<SectionFailure>,
    pub duration_ms: u64,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Every document written, sections and dossiers alike.
    pub fn document_count(&self) -> usize {
        self.documents.len() + self.characters.written().len()
    }
}

/// Export `snapshot` into a fresh run directory under `options.output_base`.
pub async fn export(
    snapshot: Arc<WorldSnapshot>,
    options: ExportOptions,
) -> Result<ExportReport, ExportError> {
    let manifest = RunNamespace::create(&options.output_base, options.run_id)?;
    let sink: Arc<dyn DocumentSink> = Arc::new(FsSink::new(manifest.root()));
    export_into(snapshot, manifest, sink, options.character_concurrency).await
}

/// Export into an already allocated namespace through `sink`.
pub async fn export_into(
    snapshot: Arc<WorldSnapshot>,
    manifest: RunManifest,
    sink: Arc<dyn DocumentSink>,
    character_concurrency: usize,
) -> Result<ExportReport, ExportError> {
    let span = export_span(manifest.run_id().as_str());
    run_export(snapshot, manifest, sink, character_concurrency)
        .instrument(span)
        .await
}

async fn run_export(
    snapshot: Arc<WorldSnapshot>,
    manifest: RunManifest,
    sink: Arc<dyn DocumentSink>,
    character_concurrency: usize,
) -> Result<ExportReport, ExportError> {
    let started = Instant::now();
    emit_export_started(
        manifest.run_id().as_str(),
        snapshot.population(),
        manifest.root(),
    );

    let identifiers = Arc::new(IdentifierMap::resolve(&snapshot));
    let mut documents = Vec::new();
    let mut failures = Vec::new();

    match write_section(sink.as_ref(), Section::Summary, render_summary(&snapshot)).await {
        Ok(path) => documents.push(path),
        Err(failure) => failures.push(failure),
    }

    let writers: [(Section, fn(&WorldSnapshot) -> String); 3] = [
        (Section::Locations, render_locations),
        (Section::Landmarks, render_landmarks),
        (Section::Drama, render_drama),
    ];
    let mut sections: Vec<(Section, JoinHandle<Result<PathBuf, SectionFailure>>)> = Vec::new();
    for (section, render) in writers {
        let snapshot = Arc::clone(&snapshot);
        let sink = Arc::clone(&sink);
        let task = tokio::spawn(
            async move { write_section(sink.as_ref(), section, render(&snapshot)).await }
                .instrument(Span::current()),
        );
        sections.push((section, task));
    }

    let characters_task = tokio::spawn(
        write_characters(
            Arc::clone(&snapshot),
            Arc::clone(&identifiers),
            Arc::clone(&sink),
            character_concurrency,
        )
        .instrument(Span::current()),
    );

    // Barrier: every writer is drained, failed or not, before the index.
    for (section, task) in sections {
        match task.await {
            Ok(Ok(path)) => documents.push(path),
            Ok(Err(failure)) => failures.push(failure),
            Err(e) => failures.push(task_lost(section, &e)),
        }
    }
    let characters = match characters_task.await {
        Ok(report) => Some(report),
        Err(e) => {
            failures.push(task_lost(Section::Characters, &e));
            None
        }
    };

    let characters = match characters {
        Some(report) => {
            if !report.failures().is_empty() {
                let detail = report
                    .failures()
                    .iter()
                    .map(|f| format!("{}: {}", f.person, f.detail))
                    .collect::<Vec<_>>()
                    .join(", ");
                failures.push(SectionFailure::new(
                    Section::Characters,
                    format!(
                        "{} of {} dossiers failed ({detail})",
                        report.failures().len(),
                        report.failures().len() + report.written().len(),
                    ),
                ));
            }
            match write_section(sink.as_ref(), Section::Index, render_index(&report)).await {
                Ok(path) => documents.push(path),
                Err(failure) => failures.push(failure),
            }
            report
        }
        None => {
            let failure = SectionFailure::new(
                Section::Index,
                "skipped: the character writer never reported which dossiers exist",
            );
            emit_section_failed(Section::Index, &failure.detail);
            failures.push(failure);
            CharacterReport::default()
        }
    };

    let report = ExportReport {
        manifest,
        documents,
        characters,
        collisions: identifiers.collisions().to_vec(),
        failures,
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    emit_export_finished(
        report.manifest.run_id().as_str(),
        report.duration_ms,
        report.document_count(),
        report.is_complete(),
    );

    if report.is_complete() {
        Ok(report)
    } else {
        Err(ExportError::Incomplete {
            report: Box::new(report),
        })
    }
}

fn task_lost(section: Section, error: &tokio::task::JoinError) -> SectionFailure {
    let failure = SectionFailure::new(section, format!("writer task did not complete: {error}"));
    emit_section_failed(section, &failure.detail);
    failure
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::snapshot::{Person, PersonId, SnapshotRecord};
    use std::io;
    use std::path::Path;

    struct RejectingSink {
        inner: MemorySink,
        reject: &'static str,
    }

    #[async_trait::async_trait]
    impl DocumentSink for RejectingSink {
        async fn write(&self, relative: &Path, contents: String) -> io::Result<()> {
            if relative == Path::new(self.reject) {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.inner.write(relative, contents).await
        }
    }

    struct PanickingSink {
        inner: MemorySink,
        panic_on: &'static str,
    }

    #[async_trait::async_trait]
    impl DocumentSink for PanickingSink {
        async fn write(&self, relative: &Path, contents: String) -> io::Result<()> {
            if relative == Path::new(self.panic_on) {
                panic!("sink blew up on {}", relative.display());
            }
            self.inner.write(relative, contents).await
        }
    }

    fn two_residents() -> Arc<WorldSnapshot> {
        let people = vec![
            Person {
                id: PersonId(1),
                name: "Ada Quill".to_string(),
                ..Default::default()
            },
            Person {
                id: PersonId(2),
                name: "Bo Quill".to_string(),
                ..Default::default()
            },
        ];
        Arc::new(WorldSnapshot::from(SnapshotRecord {
            residents: people.iter().map(|p| p.id).collect(),
            people,
            ..Default::default()
        }))
    }

    fn manifest() -> (tempfile::TempDir, RunManifest) {
        let dir = tempfile::tempdir().unwrap();
        let manifest = RunNamespace::create(dir.path(), "TEST".parse().unwrap()).unwrap();
        (dir, manifest)
    }

    #[tokio::test]
    async fn test_export_into_memory_writes_every_document() {
        let (_dir, manifest) = manifest();
        let sink = Arc::new(MemorySink::new());
        let report = export_into(two_residents(), manifest, sink.clone(), 4)
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.document_count(), 7);
        let paths: Vec<_> = sink.paths();
        for expected in [
            "README.md",
            "characters/Ada-Quill.md",
            "characters/Bo-Quill.md",
            "drama.md",
            "landmark.md",
            "locations.md",
            "summary.md",
        ] {
            assert!(paths.contains(&PathBuf::from(expected)), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn test_failed_section_is_reported_and_others_finish() {
        let (_dir, manifest) = manifest();
        let sink = Arc::new(RejectingSink {
            inner: MemorySink::new(),
            reject: "drama.md",
        });
        let err = export_into(two_residents(), manifest, sink.clone(), 4)
            .await
            .unwrap_err();

        let ExportError::Incomplete { report } = err else {
            panic!("expected an incomplete export");
        };
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].section, Section::Drama);
        assert!(report.failures[0].detail.contains("disk full"));
        assert!(sink.inner.get("locations.md").is_some());
        assert!(sink.inner.get("README.md").is_some());
        assert_eq!(report.characters.written().len(), 2);
    }

    #[tokio::test]
    async fn test_panicking_writer_is_reported_and_index_still_written() {
        let (_dir, manifest) = manifest();
        let sink = Arc::new(PanickingSink {
            inner: MemorySink::new(),
            panic_on: "drama.md",
        });
        let err = export_into(two_residents(), manifest, sink.clone(), 2)
            .await
            .unwrap_err();

        let ExportError::Incomplete { report } = err else {
            panic!("expected an incomplete export");
        };
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].section, Section::Drama);
        assert!(report.failures[0].detail.contains("did not complete"));
        assert!(sink.inner.get("locations.md").is_some());
        let index = sink.inner.get("README.md").unwrap();
        assert!(index.contains("characters/Ada-Quill.md"));
        assert!(index.contains("characters/Bo-Quill.md"));
    }

    #[tokio::test]
    async fn test_failed_dossier_is_left_out_of_index() {
        let (_dir, manifest) = manifest();
        let sink = Arc::new(RejectingSink {
            inner: MemorySink::new(),
            reject: "characters/Bo-Quill.md",
        });
        let err = export_into(two_residents(), manifest, sink.clone(), 1)
            .await
            .unwrap_err();

        let ExportError::Incomplete { report } = err else {
            panic!("expected an incomplete export");
        };
        assert_eq!(report.failures[0].section, Section::Characters);
        let index = sink.inner.get("README.md").unwrap();
        assert!(index.contains("characters/Ada-Quill.md"));
        assert!(!index.contains("Bo-Quill"));
    }
}
