//! Per-character dossier assembly.
//!
//! A dossier is one markdown document describing a single person: heading,
//! physical description, personality, romantic life, relationships, work
//! history, family and ancestors. Every section renders an explicit `none`
//! form when its data is absent; only a missing identity fails the document.

use std::cmp::Ordering;

use crate::error::DossierError;
use crate::naming::IdentifierMap;
use crate::snapshot::{Person, PersonId, WorldSnapshot};

/// Marker rendered for empty relation categories.
pub const NONE: &str = "none";

/// Rendered in place of an affinity the other party does not hold.
pub const NO_SPARK: &str = "n/a";

const HEART: &str = "❤";

/// Assemble the full dossier for `person`.
pub fn assemble(
    snapshot: &WorldSnapshot,
    identifiers: &IdentifierMap,
    person: &Person,
) -> Result<String, DossierError> {
    if person.name.trim().is_empty() {
        return Err(DossierError::MissingIdentity(person.id));
    }

    let mut doc = format!("# {}\n\n", person.display_form());
    if let Some(description) = person.description.as_deref() {
        if !description.trim().is_empty() {
            doc.push_str(description.trim_end());
            doc.push_str("\n\n");
        }
    }

    doc.push_str("## Personality\n\n");
    doc.push_str(&render_personality(snapshot, person));
    doc.push_str("\n## Romantic Life\n\n");
    doc.push_str(&render_romantic_life(snapshot, person));
    doc.push_str("\n## All Relationships\n\n");
    doc.push_str(&bullets(relationship_lines(snapshot, person, Some(identifiers))));
    doc.push_str("\n## Work History\n\n");
    doc.push_str(&bullets(person.occupations.iter().map(ToString::to_string).collect()));
    doc.push_str("\n## Family\n\n");
    doc.push_str(&render_family(snapshot, person));
    doc.push_str("\n## Ancestors\n\n");
    doc.push_str(&bullets(names(snapshot, &person.family.ancestors)));

    Ok(doc)
}

/// Escape `text` for use inside a markdown link label.
pub fn link_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn bullets(lines: Vec<String>) -> String {
    if lines.is_empty() {
        return format!("- {NONE}\n");
    }
    lines.iter().map(|l| format!("- {l}\n")).collect()
}

/// Names of the known people among `ids`, in order. Dangling ids are skipped.
fn names(snapshot: &WorldSnapshot, ids: &[PersonId]) -> Vec<String> {
    ids.iter()
        .filter_map(|id| snapshot.name_of(*id))
        .map(str::to_string)
        .collect()
}

fn joined_or_none(names: Vec<String>) -> String {
    if names.is_empty() {
        NONE.to_string()
    } else {
        names.join(", ")
    }
}

/// Five-factor personality, one line per component.
pub fn render_personality(snapshot: &WorldSnapshot, person: &Person) -> String {
    let Some(personality) = person.personality.as_ref() else {
        return format!("- {NONE}\n");
    };

    let mut out = String::new();
    for (label, score) in personality.components() {
        out.push_str(&format!(
            "- {}: {:.2} ({})",
            label,
            score.value,
            score.category()
        ));
        if let Some(parent) = score.inherited_from.and_then(|id| snapshot.name_of(id)) {
            out.push_str(&format!(" (takes after {parent})"));
        }
        out.push('\n');
    }
    out
}

fn fmt_spark(spark: Option<f64>) -> String {
    spark.map_or_else(|| NO_SPARK.to_string(), |s| format!("{s:.1}"))
}

/// `(<person's spark toward other> ❤ <other's spark toward person>)`
fn spark_pair(person: &Person, other: &Person) -> String {
    format!(
        "({} {} {})",
        fmt_spark(person.relationship_toward(other.id).map(|r| r.spark)),
        HEART,
        fmt_spark(other.relationship_toward(person.id).map(|r| r.spark)),
    )
}

/// Highest spark first; interests this person holds no relationship toward sort last.
fn by_spark_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Love interests other than the spouse, ranked by this person's spark toward them.
pub fn other_love_interests<'a>(snapshot: &'a WorldSnapshot, person: &Person) -> Vec<&'a Person> {
    let mut seen = std::collections::HashSet::new();
    let mut interests: Vec<(&Person, Option<f64>)> = person
        .captivated_by
        .iter()
        .filter(|id| Some(**id) != person.spouse && **id != person.id && seen.insert(**id))
        .filter_map(|id| snapshot.person(*id))
        .map(|other| (other, person.relationship_toward(other.id).map(|r| r.spark)))
        .collect();
    interests.sort_by(|a, b| by_spark_desc(a.1, b.1));
    interests.into_iter().map(|(p, _)| p).collect()
}

/// Spouse with mutual sparks, then every other love interest.
pub fn render_romantic_life(snapshot: &WorldSnapshot, person: &Person) -> String {
    let spouse = person.spouse.and_then(|id| snapshot.person(id));
    let mut out = match spouse {
        Some(spouse) => format!("- Spouse: {} {}\n", spouse.name, spark_pair(person, spouse)),
        None => format!("- Spouse: {NONE}\n"),
    };

    let others: Vec<String> = other_love_interests(snapshot, person)
        .into_iter()
        .map(|other| format!("{} {}", other.name, spark_pair(person, other)))
        .collect();
    out.push_str(&format!(
        "- Other love interests: {}\n",
        joined_or_none(others)
    ));
    out
}

/// One line per resident this person holds a relationship toward.
///
/// With `identifiers`, names link to the other resident's dossier.
pub fn relationship_lines(
    snapshot: &WorldSnapshot,
    person: &Person,
    identifiers: Option<&IdentifierMap>,
) -> Vec<String> {
    snapshot
        .residents()
        .filter(|other| other.id != person.id)
        .filter_map(|other| {
            let relationship = person.relationship_toward(other.id)?;
            let label = match identifiers.and_then(|ids| ids.stem(other.id)) {
                Some(stem) => format!("[{}]({}.md)", link_text(other.display_form()), stem),
                None => other.display_form().to_string(),
            };
            Some(format!("{label}: {relationship}"))
        })
        .collect()
}

/// Every relation category, each as a comma-joined list or `none`.
pub fn render_family(snapshot: &WorldSnapshot, person: &Person) -> String {
    let f = &person.family;
    let spouse: &[PersonId] = person.spouse.as_slice();
    let rows: [(&str, &[PersonId]); 14] = [
        ("Spouse", spouse),
        ("Children", &f.kids),
        ("Grandchildren", &f.grandchildren),
        ("Great-grandchildren", &f.greatgrandchildren),
        ("Parents", &f.parents),
        ("Brothers", &f.brothers),
        ("Sisters", &f.sisters),
        ("Grandparents", &f.grandparents),
        ("Great-grandparents", &f.greatgrandparents),
        ("Aunts", &f.aunts),
        ("Uncles", &f.uncles),
        ("Nieces", &f.nieces),
        ("Nephews", &f.nephews),
        ("Cousins", &f.cousins),
    ];

    rows.iter()
        .map(|(label, ids)| format!("- {}: {}\n", label, joined_or_none(names(snapshot, ids))))
        .collect()
}

/// Both directed relationships between `person` and `other`, each on its own.
pub fn outline_relationship(person: &Person, other: &Person) -> String {
    let mut out = String::new();
    for (from, to) in [(person, other), (other, person)] {
        out.push_str(&format!(
            "### {}'s relationship toward {}\n\n",
            from.display_form(),
            to.display_form()
        ));
        match from.relationship_toward(to.id) {
            Some(rel) => {
                out.push_str(&rel.to_string());
                out.push('\n');
                if let Some(outline) = rel.outline.as_deref() {
                    out.push('\n');
                    out.push_str(outline.trim_end());
                    out.push('\n');
                }
            }
            None => {
                out.push_str(NONE);
                out.push('\n');
            }
        }
        out.push('\n');
    }
    out
}

/// This person's relationship toward every other resident, unlinked.
pub fn outline_social_network(snapshot: &WorldSnapshot, person: &Person) -> String {
    bullets(relationship_lines(snapshot, person, None))
}
