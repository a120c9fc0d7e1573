//! Section writers.
//!
//! Each section is rendered from the snapshot alone and written to its own
//! fixed path, so sections can run concurrently in any order. Character
//! dossiers fan out one task per resident; their paths are keyed by the
//! resident's resolved stem and therefore never overlap.
//!
//! The index is different: it is rendered from a [`CharacterReport`], which
//! only [`write_characters`] produces, after every dossier task has joined.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span};

use crate::dossier::{assemble, link_text, NONE};
use crate::error::{DossierError, Section, SectionFailure};
use crate::naming::IdentifierMap;
use crate::namespace::character_relative_path;
use crate::obs::{emit_dossier_failed, emit_dossier_written, emit_section_failed, emit_section_written};
use crate::sink::DocumentSink;
use crate::snapshot::{NarrativeCategory, PersonId, WorldSnapshot};

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `summary.md`: how generation went and where the town stands.
pub fn render_summary(snapshot: &WorldSnapshot) -> String {
    let town = snapshot.town();
    let mut out = if town.completed {
        format!(
            "After {}s, town generation was successful!\n\n",
            town.elapsed_secs
        )
    } else {
        format!(
            "After {}s, town generation was interrupted before its end date; this is a partial town.\n\n",
            town.elapsed_secs
        )
    };
    out.push_str(&format!(
        "It is now the {}, in the town of {}, pop. {}.\n\n",
        lower_first(&town.date),
        town.name,
        snapshot.population()
    ));
    out.push_str("Excavating nuggets of dramatic intrigue...\n\n");
    for note in snapshot.excavation_notes() {
        out.push_str(note.trim_end());
        out.push('\n');
    }
    out
}

/// `locations.md`: who is where right now.
pub fn render_locations(snapshot: &WorldSnapshot) -> String {
    let mut out = String::new();
    for location in snapshot.locations() {
        out.push_str(&format!("## {}\n\n", location.name));
        let occupants: Vec<_> = location
            .people_here_now
            .iter()
            .filter_map(|id| snapshot.person(*id))
            .collect();
        if occupants.is_empty() {
            out.push_str("- no one here\n");
        }
        for occupant in occupants {
            let doing = match (&occupant.routine, occupant.current_occupation()) {
                (Some(routine), Some(job)) if routine.working => {
                    format!(" (working as {})", job.vocation)
                }
                (Some(routine), _) if !routine.occasion.is_empty() => {
                    format!(" ({})", routine.occasion)
                }
                _ => String::new(),
            };
            out.push_str(&format!("- {}{}\n", occupant.display_form(), doing));
        }
        out.push('\n');
    }
    out
}

/// `landmark.md`: former businesses, current businesses, gravestones.
pub fn render_landmarks(snapshot: &WorldSnapshot) -> String {
    let town = &snapshot.town().name;
    let list = |locations: &[crate::snapshot::Location]| -> String {
        if locations.is_empty() {
            return format!("- {NONE}\n");
        }
        locations.iter().map(|l| format!("- {}\n", l.name)).collect()
    };

    let mut out = format!("# Former businesses in {town}\n\n");
    out.push_str(&list(snapshot.former_businesses()));
    out.push_str(&format!("\n# Current businesses in {town}\n\n"));
    out.push_str(&list(snapshot.businesses()));
    out.push_str("\n# Gravestones\n\n");

    let stones: Vec<&str> = snapshot
        .deceased()
        .filter_map(|p| p.death.as_ref())
        .map(|d| d.gravestone.trim_end())
        .collect();
    if stones.is_empty() {
        out.push_str(&format!("{NONE}\n"));
    }
    for stone in stones {
        out.push_str(&format!("```\n{stone}\n```\n\n"));
    }
    out
}

/// `drama.md`: every narrative finding, verbatim, in category order.
pub fn render_drama(snapshot: &WorldSnapshot) -> String {
    let stories = snapshot.stories();
    let mut out = String::new();
    for category in NarrativeCategory::ALL {
        for finding in stories.findings(category) {
            out.push_str(finding);
            out.push_str("\n\n");
        }
    }
    out
}

/// `README.md`: links to the fixed sections and every completed dossier.
pub fn render_index(characters: &CharacterReport) -> String {
    let mut out = format!(
        "- [Summary]({})\n- [Locations]({})\n- [Businesses & gravestones]({})\n- [Tea]({})\n- Characters\n\n",
        Section::Summary.file_name(),
        Section::Locations.file_name(),
        Section::Landmarks.file_name(),
        Section::Drama.file_name(),
    );
    for dossier in characters.written() {
        out.push_str(&format!(
            "    - [{}]({})\n",
            link_text(&dossier.display),
            path_to_link(&dossier.path)
        ));
    }
    out
}

/// Markdown links always use `/`.
fn path_to_link(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Write one fixed-path section document.
pub async fn write_section(
    sink: &dyn DocumentSink,
    section: Section,
    contents: String,
) -> Result<PathBuf, SectionFailure> {
    let path = PathBuf::from(section.file_name());
    let bytes = contents.len();
    match sink.write(&path, contents).await {
        Ok(()) => {
            emit_section_written(section, &path, bytes);
            Ok(path)
        }
        Err(e) => {
            emit_section_failed(section, &e);
            Err(SectionFailure::new(
                section,
                format!("failed to write {}: {e}", path.display()),
            ))
        }
    }
}

/// A dossier that was fully written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenDossier {
    pub person: PersonId,
    pub display: String,
    pub stem: String,
    /// Relative to the run root.
    pub path: PathBuf,
}

/// A resident whose dossier could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterFailure {
    pub person: PersonId,
    pub detail: String,
}

/// Outcome of the character writer once every dossier task has joined.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CharacterReport {
    written: Vec<WrittenDossier>,
    failures: Vec<CharacterFailure>,
}

impl CharacterReport {
    /// Completed dossiers, in population order.
    pub fn written(&self) -> &[WrittenDossier] {
        &self.written
    }

    pub fn failures(&self) -> &[CharacterFailure] {
        &self.failures
    }
}

/// Render and persist one resident's dossier.
pub async fn write_character(
    snapshot: &WorldSnapshot,
    identifiers: &IdentifierMap,
    sink: &dyn DocumentSink,
    id: PersonId,
) -> Result<WrittenDossier, DossierError> {
    let person = snapshot
        .person(id)
        .ok_or(DossierError::UnknownResident(id))?;
    let stem = identifiers.require(id)?;
    let doc = assemble(snapshot, identifiers, person)?;
    let path = character_relative_path(stem);

    sink.write(&path, doc)
        .await
        .map_err(|source| DossierError::Write {
            path: path.clone(),
            source,
        })?;
    emit_dossier_written(id, stem);

    Ok(WrittenDossier {
        person: id,
        display: person.display_form().to_string(),
        stem: stem.to_string(),
        path,
    })
}

/// Write a dossier for every resident, at most `concurrency` at a time.
///
/// Returns only after every dossier task has finished; a failed or panicked
/// task is recorded in the report and does not stop the others.
pub async fn write_characters(
    snapshot: Arc<WorldSnapshot>,
    identifiers: Arc<IdentifierMap>,
    sink: Arc<dyn DocumentSink>,
    concurrency: usize,
) -> CharacterReport {
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut seen = HashSet::new();
    let mut tasks: Vec<(PersonId, JoinHandle<Result<WrittenDossier, DossierError>>)> = Vec::new();

    for id in snapshot.resident_ids().iter().copied() {
        if !seen.insert(id) {
            continue;
        }
        let snapshot = Arc::clone(&snapshot);
        let identifiers = Arc::clone(&identifiers);
        let sink = Arc::clone(&sink);
        let sem = Arc::clone(&sem);

        let task = tokio::spawn(
            async move {
                let _permit = sem.acquire_owned().await.ok();
                write_character(&snapshot, &identifiers, sink.as_ref(), id).await
            }
            .instrument(Span::current()),
        );
        tasks.push((id, task));
    }

    let mut report = CharacterReport::default();
    for (id, task) in tasks {
        let detail = match task.await {
            Ok(Ok(written)) => {
                report.written.push(written);
                continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("dossier task did not complete: {e}"),
        };
        emit_dossier_failed(id, &detail);
        report.failures.push(CharacterFailure { person: id, detail });
    }
    report
}
