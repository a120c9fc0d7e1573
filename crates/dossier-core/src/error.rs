//! Error taxonomy for the dossier export pipeline.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::coordinator::ExportReport;
use crate::snapshot::PersonId;

/// Errors produced while loading a world snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors produced while allocating the run namespace. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum NamespaceError {
    #[error("cannot create output directory {path:?}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid run id {0:?}: must be non-empty and contain only alphanumerics, '-' or '_'")]
    InvalidRunId(String),
}

/// Errors confined to a single character dossier.
#[derive(Debug, thiserror::Error)]
pub enum DossierError {
    #[error("resident {0} is not present in the snapshot")]
    UnknownResident(PersonId),

    #[error("person {0} has no usable name")]
    MissingIdentity(PersonId),

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors produced while loading or merging configuration groups.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config group {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config group {path:?}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("unsupported config format for {0:?} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("config group {0:?} must be a table of parameters")]
    NotATable(PathBuf),

    #[error("parameter `{parameter}` from group `{previous_group}` is redefined by group `{group}`")]
    DuplicateParameter {
        parameter: String,
        previous_group: String,
        group: String,
    },

    #[error("parameter `{parameter}` has an invalid value: {detail}")]
    InvalidValue { parameter: String, detail: String },
}

/// The documents that make up one run's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Summary,
    Locations,
    Landmarks,
    Drama,
    Characters,
    Index,
}

impl Section {
    /// File name of the section document, relative to the run root.
    /// Characters have one file each under `characters/`.
    pub fn file_name(&self) -> &'static str {
        match self {
            Section::Summary => "summary.md",
            Section::Locations => "locations.md",
            Section::Landmarks => "landmark.md",
            Section::Drama => "drama.md",
            Section::Characters => "characters",
            Section::Index => "README.md",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Summary => "summary",
            Section::Locations => "locations",
            Section::Landmarks => "landmarks",
            Section::Drama => "drama",
            Section::Characters => "characters",
            Section::Index => "index",
        };
        f.write_str(name)
    }
}

/// One section that did not finish cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionFailure {
    pub section: Section,
    pub detail: String,
}

impl SectionFailure {
    pub fn new(section: Section, detail: impl Into<String>) -> Self {
        Self {
            section,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for SectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.section, self.detail)
    }
}

/// Errors surfaced to whoever invoked the export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Namespace(#[from] NamespaceError),

    /// Every writer ran to completion but at least one section failed.
    /// The report still lists everything that was written.
    #[error("export incomplete, failed sections: {}", describe_failures(&.report.failures))]
    Incomplete { report: Box<ExportReport> },
}

fn describe_failures(failures: &[SectionFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_file_names_match_layout() {
        assert_eq!(Section::Summary.file_name(), "summary.md");
        assert_eq!(Section::Landmarks.file_name(), "landmark.md");
        assert_eq!(Section::Drama.file_name(), "drama.md");
        assert_eq!(Section::Index.file_name(), "README.md");
    }

    #[test]
    fn test_dossier_error_names_person() {
        let err = DossierError::MissingIdentity(PersonId(42));
        assert!(err.to_string().contains("#42"));
    }

    #[test]
    fn test_duplicate_parameter_error_names_both_groups() {
        let err = ConfigError::DuplicateParameter {
            parameter: "town_name".to_string(),
            previous_group: "basic".to_string(),
            group: "overrides".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("town_name"));
        assert!(msg.contains("basic"));
        assert!(msg.contains("overrides"));
    }

    #[test]
    fn test_describe_failures_joins_sections() {
        let failures = vec![
            SectionFailure::new(Section::Drama, "disk full"),
            SectionFailure::new(Section::Locations, "permission denied"),
        ];
        assert_eq!(
            describe_failures(&failures),
            "drama: disk full; locations: permission denied"
        );
    }
}
