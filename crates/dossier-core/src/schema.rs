//! Inspectable field tables for diagnostic tooling.
//!
//! Lists what each snapshot entity carries so a user exploring a town knows
//! what to ask for. The export pipeline never consults this table.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Town,
    Person,
    Location,
    Relationship,
    Occupation,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Town,
        EntityKind::Person,
        EntityKind::Location,
        EntityKind::Relationship,
        EntityKind::Occupation,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Town => "town",
            EntityKind::Person => "person",
            EntityKind::Location => "location",
            EntityKind::Relationship => "relationship",
            EntityKind::Occupation => "occupation",
        };
        f.write_str(name)
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<String> = EntityKind::ALL.iter().map(ToString::to_string).collect();
                format!("unknown entity kind {s:?} (expected one of: {})", known.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: &'static str,
    pub description: &'static str,
}

const fn field(name: &'static str, kind: &'static str, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        description,
    }
}

const TOWN_FIELDS: &[FieldSpec] = &[
    field("name", "text", "town name"),
    field("date", "text", "final in-world date"),
    field("elapsed_secs", "integer", "wall-clock seconds world generation took"),
    field("completed", "bool", "false when generation was interrupted"),
];

const PERSON_FIELDS: &[FieldSpec] = &[
    field("id", "person id", "stable identity"),
    field("name", "text", "full name; source of the dossier file name"),
    field("display", "text?", "display form for headings and links"),
    field("description", "text?", "physical description"),
    field("personality", "five-factor?", "openness, conscientiousness, extroversion, agreeableness, neuroticism"),
    field("relationships", "map person id -> relationship", "relationships this person holds; not mirrored"),
    field("captivated_by", "[person id]", "romantic interests"),
    field("spouse", "person id?", "current spouse"),
    field("family", "family links", "kids through cousins, plus ancestors"),
    field("occupations", "[occupation]", "jobs held, oldest first"),
    field("routine", "routine?", "current occasion and whether working"),
    field("location", "location id?", "where this person is now"),
    field("death", "death record?", "year and gravestone text"),
];

const LOCATION_FIELDS: &[FieldSpec] = &[
    field("id", "location id", "stable identity"),
    field("name", "text", "rendered name and address"),
    field("people_here_now", "[person id]", "current occupants"),
];

const RELATIONSHIP_FIELDS: &[FieldSpec] = &[
    field("kind", "text", "acquaintance, friendship, enmity, ..."),
    field("charge", "number", "platonic affinity"),
    field("spark", "number", "romantic affinity"),
    field("outline", "text?", "longer pre-rendered outline"),
];

const OCCUPATION_FIELDS: &[FieldSpec] = &[
    field("vocation", "text", "job title"),
    field("employer", "text", "business name"),
    field("start_year", "integer?", "year hired"),
    field("end_year", "integer?", "year left; absent while still held"),
];

/// The inspectable fields of `kind`.
pub fn fields(kind: EntityKind) -> &'static [FieldSpec] {
    match kind {
        EntityKind::Town => TOWN_FIELDS,
        EntityKind::Person => PERSON_FIELDS,
        EntityKind::Location => LOCATION_FIELDS,
        EntityKind::Relationship => RELATIONSHIP_FIELDS,
        EntityKind::Occupation => OCCUPATION_FIELDS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Location, Occupation, Person, Relationship, Town};

    /// Every field in the table must exist on the serialized entity.
    fn assert_fields_exist(kind: EntityKind, value: serde_json::Value) {
        let obj = value.as_object().expect("entity serializes to an object");
        for spec in fields(kind) {
            assert!(obj.contains_key(spec.name), "{kind} has no field {}", spec.name);
        }
        assert_eq!(obj.len(), fields(kind).len(), "{kind} table is incomplete");
    }

    #[test]
    fn test_tables_match_entities() {
        assert_fields_exist(EntityKind::Town, serde_json::to_value(Town::default()).unwrap());
        assert_fields_exist(EntityKind::Person, serde_json::to_value(Person::default()).unwrap());
        assert_fields_exist(
            EntityKind::Location,
            serde_json::to_value(Location::default()).unwrap(),
        );
        assert_fields_exist(
            EntityKind::Relationship,
            serde_json::to_value(Relationship::default()).unwrap(),
        );
        assert_fields_exist(
            EntityKind::Occupation,
            serde_json::to_value(Occupation::default()).unwrap(),
        );
    }

    #[test]
    fn test_entity_kind_parses_case_insensitively() {
        assert_eq!("Person".parse::<EntityKind>().unwrap(), EntityKind::Person);
        assert!("gravestone".parse::<EntityKind>().is_err());
    }
}
