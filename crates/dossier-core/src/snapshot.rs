//! World snapshot model.
//!
//! The simulation hands the exporter one immutable [`WorldSnapshot`]. The raw
//! data lives in [`SnapshotRecord`]; every collection in it defaults to empty
//! so a snapshot taken after an interrupted world-generation run still
//! deserializes. Cross references use [`PersonId`] and may dangle; lookups
//! return `None` rather than failing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;

/// Stable identity of a person across the whole simulation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PersonId(pub u64);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable identity of a dwelling or business.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LocationId(pub u64);

/// Town-level facts used by the summary document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Town {
    pub name: String,
    /// Final in-world date as rendered by the simulation.
    pub date: String,
    /// Wall-clock seconds world generation took.
    #[serde(default)]
    pub elapsed_secs: u64,
    /// `false` when world generation was interrupted before its end date.
    #[serde(default = "default_completed")]
    pub completed: bool,
}

fn default_completed() -> bool {
    true
}

impl Default for Town {
    fn default() -> Self {
        Self {
            name: String::new(),
            date: String::new(),
            elapsed_secs: 0,
            completed: true,
        }
    }
}

/// One five-factor personality component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitScore {
    /// Score in `[-1, 1]`.
    pub value: f64,
    /// Parent this component was inherited from, if any.
    #[serde(default)]
    pub inherited_from: Option<PersonId>,
}

impl TraitScore {
    pub fn category(&self) -> &'static str {
        if self.value > 0.4 {
            "very high"
        } else if self.value > 0.1 {
            "high"
        } else if self.value >= -0.1 {
            "neutral"
        } else if self.value >= -0.4 {
            "low"
        } else {
            "very low"
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    pub openness: TraitScore,
    pub conscientiousness: TraitScore,
    pub extroversion: TraitScore,
    pub agreeableness: TraitScore,
    pub neuroticism: TraitScore,
}

impl Personality {
    /// Components in the conventional O-C-E-A-N order, with their labels.
    pub fn components(&self) -> [(&'static str, &TraitScore); 5] {
        [
            ("Openness", &self.openness),
            ("Conscientiousness", &self.conscientiousness),
            ("Extroversion", &self.extroversion),
            ("Agreeableness", &self.agreeableness),
            ("Neuroticism", &self.neuroticism),
        ]
    }
}

/// Directed relationship held by one person toward another.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// e.g. "acquaintance", "friendship", "enmity"
    pub kind: String,
    #[serde(default)]
    pub charge: f64,
    /// Romantic affinity.
    #[serde(default)]
    pub spark: f64,
    /// Longer pre-rendered outline, when the simulation provides one.
    #[serde(default)]
    pub outline: Option<String>,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (charge {:.1}, spark {:.1})",
            self.kind, self.charge, self.spark
        )
    }
}

/// Family links, direct and derived.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Family {
    pub kids: Vec<PersonId>,
    pub grandchildren: Vec<PersonId>,
    pub greatgrandchildren: Vec<PersonId>,
    pub parents: Vec<PersonId>,
    pub brothers: Vec<PersonId>,
    pub sisters: Vec<PersonId>,
    pub grandparents: Vec<PersonId>,
    pub greatgrandparents: Vec<PersonId>,
    pub aunts: Vec<PersonId>,
    pub uncles: Vec<PersonId>,
    pub nieces: Vec<PersonId>,
    pub nephews: Vec<PersonId>,
    pub cousins: Vec<PersonId>,
    pub ancestors: Vec<PersonId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Occupation {
    pub vocation: String,
    pub employer: String,
    #[serde(default)]
    pub start_year: Option<i32>,
    /// `None` while the job is still held.
    #[serde(default)]
    pub end_year: Option<i32>,
}

impl Occupation {
    pub fn is_current(&self) -> bool {
        self.end_year.is_none()
    }
}

impl fmt::Display for Occupation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.vocation, self.employer)?;
        match (self.start_year, self.end_year) {
            (Some(start), Some(end)) => write!(f, " ({start}–{end})"),
            (Some(start), None) => write!(f, " ({start}–present)"),
            (None, _) => Ok(()),
        }
    }
}

/// What a person is doing at the moment the snapshot was taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub occasion: String,
    #[serde(default)]
    pub working: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeathRecord {
    #[serde(default)]
    pub year: Option<i32>,
    pub gravestone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    /// Display form used in headings and links; falls back to `name`.
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub personality: Option<Personality>,
    /// Relationships this person holds. Not mirrored: the other party may
    /// hold nothing toward this person.
    #[serde(default)]
    pub relationships: BTreeMap<PersonId, Relationship>,
    /// People this person is romantically captivated by.
    #[serde(default)]
    pub captivated_by: Vec<PersonId>,
    #[serde(default)]
    pub spouse: Option<PersonId>,
    #[serde(default)]
    pub family: Family,
    /// Held in order, oldest first.
    #[serde(default)]
    pub occupations: Vec<Occupation>,
    #[serde(default)]
    pub routine: Option<Routine>,
    #[serde(default)]
    pub location: Option<LocationId>,
    #[serde(default)]
    pub death: Option<DeathRecord>,
}

impl Person {
    pub fn display_form(&self) -> &str {
        self.display.as_deref().unwrap_or(&self.name)
    }

    /// The relationship this person holds toward `other`, if any.
    pub fn relationship_toward(&self, other: PersonId) -> Option<&Relationship> {
        self.relationships.get(&other)
    }

    /// Most recent occupation that has not ended.
    pub fn current_occupation(&self) -> Option<&Occupation> {
        self.occupations.iter().rev().find(|o| o.is_current())
    }
}

/// A dwelling or business, current or former.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    #[serde(default)]
    pub people_here_now: Vec<PersonId>,
}

/// The seven kinds of relational findings the story recognizer excavates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeCategory {
    UnrequitedLove,
    LoveTriangles,
    ExtramaritalRomanticInterests,
    AsymmetricFriendships,
    Misanthropes,
    SiblingRivalries,
    BusinessOwnerRivalries,
}

impl NarrativeCategory {
    pub const ALL: [NarrativeCategory; 7] = [
        NarrativeCategory::UnrequitedLove,
        NarrativeCategory::LoveTriangles,
        NarrativeCategory::ExtramaritalRomanticInterests,
        NarrativeCategory::AsymmetricFriendships,
        NarrativeCategory::Misanthropes,
        NarrativeCategory::SiblingRivalries,
        NarrativeCategory::BusinessOwnerRivalries,
    ];
}

/// Pre-rendered findings, one sequence per category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeFindings {
    pub unrequited_love: Vec<String>,
    pub love_triangles: Vec<String>,
    pub extramarital_romantic_interests: Vec<String>,
    pub asymmetric_friendships: Vec<String>,
    pub misanthropes: Vec<String>,
    pub sibling_rivalries: Vec<String>,
    pub business_owner_rivalries: Vec<String>,
}

impl NarrativeFindings {
    pub fn findings(&self, category: NarrativeCategory) -> &[String] {
        match category {
            NarrativeCategory::UnrequitedLove => &self.unrequited_love,
            NarrativeCategory::LoveTriangles => &self.love_triangles,
            NarrativeCategory::ExtramaritalRomanticInterests => {
                &self.extramarital_romantic_interests
            }
            NarrativeCategory::AsymmetricFriendships => &self.asymmetric_friendships,
            NarrativeCategory::Misanthropes => &self.misanthropes,
            NarrativeCategory::SiblingRivalries => &self.sibling_rivalries,
            NarrativeCategory::BusinessOwnerRivalries => &self.business_owner_rivalries,
        }
    }

    pub fn total(&self) -> usize {
        NarrativeCategory::ALL
            .iter()
            .map(|c| self.findings(*c).len())
            .sum()
    }
}

/// Serialized form of a snapshot, exactly as the simulation writes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotRecord {
    pub town: Town,
    /// Everyone the simulation knows about, living or not.
    pub people: Vec<Person>,
    /// Current population, in export order.
    pub residents: Vec<PersonId>,
    pub businesses: Vec<Location>,
    pub dwellings: Vec<Location>,
    pub former_businesses: Vec<Location>,
    pub deceased: Vec<PersonId>,
    pub stories: NarrativeFindings,
    /// Lines logged by the story recognizer while excavating.
    pub excavation_notes: Vec<String>,
}

/// Immutable, indexed view over a [`SnapshotRecord`].
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "SnapshotRecord")]
pub struct WorldSnapshot {
    record: SnapshotRecord,
    by_id: HashMap<PersonId, usize>,
}

impl From<SnapshotRecord> for WorldSnapshot {
    fn from(record: SnapshotRecord) -> Self {
        let by_id = record
            .people
            .iter()
            .enumerate()
            .map(|(idx, p)| (p.id, idx))
            .collect();
        Self { record, by_id }
    }
}

impl WorldSnapshot {
    pub fn from_json_str(raw: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Read and parse a snapshot file.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SnapshotError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn record(&self) -> &SnapshotRecord {
        &self.record
    }

    pub fn town(&self) -> &Town {
        &self.record.town
    }

    pub fn person(&self, id: PersonId) -> Option<&Person> {
        self.by_id.get(&id).map(|idx| &self.record.people[*idx])
    }

    pub fn name_of(&self, id: PersonId) -> Option<&str> {
        self.person(id).map(|p| p.name.as_str())
    }

    /// Case-sensitive lookup by full name; the first match wins.
    pub fn find_person(&self, name: &str) -> Option<&Person> {
        self.record.people.iter().find(|p| p.name == name)
    }

    pub fn resident_ids(&self) -> &[PersonId] {
        &self.record.residents
    }

    /// Residents that resolve to a known person, in population order.
    /// A resident listed twice is yielded once.
    pub fn residents(&self) -> impl Iterator<Item = &Person> + '_ {
        let mut seen = HashSet::new();
        self.record
            .residents
            .iter()
            .filter(move |id| seen.insert(**id))
            .filter_map(|id| self.person(*id))
    }

    /// Number of distinct residents that resolve to a known person.
    pub fn population(&self) -> usize {
        self.residents().count()
    }

    pub fn businesses(&self) -> &[Location] {
        &self.record.businesses
    }

    pub fn former_businesses(&self) -> &[Location] {
        &self.record.former_businesses
    }

    pub fn dwellings(&self) -> &[Location] {
        &self.record.dwellings
    }

    /// Businesses followed by dwellings; a location listed in both appears once.
    pub fn locations(&self) -> Vec<&Location> {
        let mut seen = HashSet::new();
        self.record
            .businesses
            .iter()
            .chain(self.record.dwellings.iter())
            .filter(|loc| seen.insert(loc.id))
            .collect()
    }

    pub fn deceased(&self) -> impl Iterator<Item = &Person> + '_ {
        self.record.deceased.iter().filter_map(|id| self.person(*id))
    }

    pub fn stories(&self) -> &NarrativeFindings {
        &self.record.stories
    }

    pub fn excavation_notes(&self) -> &[String] {
        &self.record.excavation_notes
    }

    /// Count of person references that point at nobody in `people`.
    pub fn dangling_references(&self) -> usize {
        let known = |id: &PersonId| self.by_id.contains_key(id);
        let mut missing = self.record.residents.iter().filter(|id| !known(id)).count();
        missing += self.record.deceased.iter().filter(|id| !known(id)).count();
        for loc in self.locations().into_iter() {
            missing += loc.people_here_now.iter().filter(|id| !known(id)).count();
        }
        for person in &self.record.people {
            missing += person.relationships.keys().filter(|id| !known(id)).count();
            missing += person.captivated_by.iter().filter(|id| !known(id)).count();
            missing += person.spouse.iter().filter(|id| !known(id)).count();
            let f = &person.family;
            for group in [
                &f.kids,
                &f.grandchildren,
                &f.greatgrandchildren,
                &f.parents,
                &f.brothers,
                &f.sisters,
                &f.grandparents,
                &f.greatgrandparents,
                &f.aunts,
                &f.uncles,
                &f.nieces,
                &f.nephews,
                &f.cousins,
                &f.ancestors,
            ] {
                missing += group.iter().filter(|id| !known(id)).count();
            }
        }
        missing
    }
}
