//! Run-scoped output namespace.
//!
//! Each invocation gets its own root directory named by a [`RunId`]. The
//! fixed sub-tree is created here, before any writer starts, and nowhere else.
//!
//! Layout:
//! ```text
//! <base>/<run-id>/
//!   summary.md  locations.md  landmark.md  drama.md  README.md
//!   characters/<stem>.md
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::NamespaceError;

/// Sub-directory holding one dossier per resident.
pub const CHARACTERS_DIR: &str = "characters";

/// Identifier of one export run, stable for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Derive a run id from the current time: upper-case hex of Unix nanoseconds.
    pub fn generate() -> Self {
        Self::from_time(Utc::now())
    }

    pub fn from_time(at: DateTime<Utc>) -> Self {
        let nanos = at
            .timestamp_nanos_opt()
            .unwrap_or_else(|| at.timestamp_micros().saturating_mul(1_000));
        Self(format!("{:X}", nanos))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RunId {
    type Err = NamespaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(NamespaceError::InvalidRunId(s.to_string()))
        }
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The realized output layout of one run. Read-only once created.
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    run_id: RunId,
    root: PathBuf,
    created_at: DateTime<Utc>,
}

impl RunManifest {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn characters_dir(&self) -> PathBuf {
        self.root.join(CHARACTERS_DIR)
    }
}

/// Path of a character dossier relative to the run root.
pub fn character_relative_path(stem: &str) -> PathBuf {
    Path::new(CHARACTERS_DIR).join(format!("{stem}.md"))
}

/// Allocates run roots.
pub struct RunNamespace;

impl RunNamespace {
    /// Create `<base>/<run_id>/characters/`. Existing directories are reused.
    pub fn create(base: &Path, run_id: RunId) -> Result<RunManifest, NamespaceError> {
        let root = base.join(run_id.as_str());
        let characters = root.join(CHARACTERS_DIR);
        fs::create_dir_all(&characters).map_err(|source| NamespaceError::Create {
            path: characters.clone(),
            source,
        })?;
        debug!(run_id = %run_id, root = ?root, "run namespace ready");

        Ok(RunManifest {
            run_id,
            root,
            created_at: Utc::now(),
        })
    }
}
