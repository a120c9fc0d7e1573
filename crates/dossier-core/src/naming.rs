//! Display name to file identifier resolution.
//!
//! [`sanitize`] is a pure function of the name, so links built anywhere in
//! the export agree with the files actually written. [`IdentifierMap`] layers
//! collision handling on top: the first resident (in population order) to
//! produce a stem keeps it, later ones get a numeric suffix.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::warn;

use crate::error::DossierError;
use crate::snapshot::{PersonId, WorldSnapshot};

/// Replaces every character that is unsafe in a file name.
pub const SEPARATOR: char = '-';

/// Longest stem, in bytes. Leaves room for a collision suffix and `.md`
/// inside the usual 255-byte file name limit.
pub const MAX_STEM_BYTES: usize = 200;

/// Map a display name to a filesystem-legal stem.
///
/// Alphanumerics, `-` and `_` are kept; everything else becomes
/// [`SEPARATOR`]. The result is cut to [`MAX_STEM_BYTES`] on a char
/// boundary. Returns `None` when nothing identifying is left.
pub fn sanitize(name: &str) -> Option<String> {
    let mut stem: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                SEPARATOR
            }
        })
        .collect();

    if stem.len() > MAX_STEM_BYTES {
        let mut cut = MAX_STEM_BYTES;
        while !stem.is_char_boundary(cut) {
            cut -= 1;
        }
        stem.truncate(cut);
    }

    if stem.chars().any(char::is_alphanumeric) {
        Some(stem)
    } else {
        None
    }
}

/// Stems compare case-insensitively so case-folding filesystems cannot merge them.
fn collision_key(stem: &str) -> String {
    stem.to_lowercase()
}

/// A resident whose natural stem was already claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub person: PersonId,
    pub name: String,
    /// What [`sanitize`] produced.
    pub natural: String,
    /// What the resident was given instead.
    pub assigned: String,
}

/// Resolved file stems for every resident of one snapshot.
#[derive(Debug, Clone, Default)]
pub struct IdentifierMap {
    stems: HashMap<PersonId, String>,
    unresolved: HashMap<PersonId, Unresolved>,
    collisions: Vec<Collision>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unresolved {
    UnknownResident,
    MissingIdentity,
}

impl IdentifierMap {
    /// Resolve a stem for every resident of `snapshot`.
    pub fn resolve(snapshot: &WorldSnapshot) -> Self {
        let mut map = Self::default();
        let mut seen = HashSet::new();
        let mut naturals: Vec<(PersonId, &str, String)> = Vec::new();

        for id in snapshot.resident_ids() {
            if !seen.insert(*id) {
                continue;
            }
            let Some(person) = snapshot.person(*id) else {
                map.unresolved.insert(*id, Unresolved::UnknownResident);
                continue;
            };
            match sanitize(&person.name) {
                Some(stem) => naturals.push((*id, person.name.as_str(), stem)),
                None => {
                    map.unresolved.insert(*id, Unresolved::MissingIdentity);
                }
            }
        }

        // Suffixed stems must not shadow anyone's natural stem.
        let reserved: HashSet<String> = naturals.iter().map(|(_, _, s)| collision_key(s)).collect();
        let mut claimed: HashSet<String> = HashSet::new();
        let mut pending = Vec::new();

        for (id, name, natural) in naturals {
            if claimed.insert(collision_key(&natural)) {
                map.stems.insert(id, natural);
            } else {
                pending.push((id, name, natural));
            }
        }

        for (id, name, natural) in pending {
            let mut n = 2u32;
            let assigned = loop {
                let candidate = format!("{natural}{SEPARATOR}{n}");
                let key = collision_key(&candidate);
                if !reserved.contains(&key) && claimed.insert(key) {
                    break candidate;
                }
                n += 1;
            };
            warn!(
                event = "identifier.collision",
                person = %id,
                natural = %natural,
                assigned = %assigned,
                "display name collides with an earlier resident; suffixing"
            );
            map.collisions.push(Collision {
                person: id,
                name: name.to_string(),
                natural,
                assigned: assigned.clone(),
            });
            map.stems.insert(id, assigned);
        }

        map
    }

    pub fn stem(&self, id: PersonId) -> Option<&str> {
        self.stems.get(&id).map(String::as_str)
    }

    /// The stem for `id`, or why there is none.
    pub fn require(&self, id: PersonId) -> Result<&str, DossierError> {
        if let Some(stem) = self.stem(id) {
            return Ok(stem);
        }
        match self.unresolved.get(&id) {
            Some(Unresolved::MissingIdentity) => Err(DossierError::MissingIdentity(id)),
            _ => Err(DossierError::UnknownResident(id)),
        }
    }

    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }
}
