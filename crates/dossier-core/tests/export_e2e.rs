use std::fs;
use std::path::Path;
use std::sync::Arc;

use dossier_core::{export, sanitize, ExportError, ExportOptions, RunId, Section, WorldSnapshot};

const TOWN: &str = r#"{
    "town": {"name": "Lake Hollow", "date": "Night of May 3, 1979", "elapsed_secs": 12},
    "people": [
        {
            "id": 1, "name": "Ada Quill",
            "description": "Ada is a tall woman with red hair.",
            "spouse": 2,
            "relationships": {"2": {"kind": "friendship", "charge": 8.0, "spark": 9.5}},
            "family": {"kids": [], "parents": []}
        },
        {
            "id": 2, "name": "Bo Quill",
            "spouse": 1,
            "relationships": {"1": {"kind": "friendship", "charge": 7.0, "spark": 6.0}}
        },
        {
            "id": 3, "name": "Cy Marsh",
            "captivated_by": [1],
            "relationships": {"1": {"kind": "acquaintance", "charge": 2.0, "spark": 4.0}}
        }
    ],
    "residents": [1, 2, 3],
    "businesses": [{"id": 10, "name": "Quill Hardware", "people_here_now": [1]}],
    "former_businesses": [{"id": 11, "name": "Marsh Dry Goods"}],
    "dwellings": [{"id": 20, "name": "12 Elm St.", "people_here_now": [2, 3]}],
    "stories": {"love_triangles": ["Cy Marsh pines for the married Ada Quill."]}
}"#;

fn bullets_between(doc: &str, start: &str, end: &str) -> usize {
    let from = doc.find(start).expect("start heading") + start.len();
    let to = doc[from..].find(end).map_or(doc.len(), |i| from + i);
    doc[from..to].lines().filter(|l| l.starts_with("- ")).count()
}

#[tokio::test]
async fn export_three_residents_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = Arc::new(WorldSnapshot::from_json_str(TOWN).unwrap());
    let run_id: RunId = "E2E".parse().unwrap();

    let report = export(Arc::clone(&snapshot), ExportOptions::new(dir.path(), run_id))
        .await
        .unwrap();
    let root = dir.path().join("E2E");
    assert_eq!(report.manifest.root(), root);

    let readme = fs::read_to_string(root.join("README.md")).unwrap();
    assert_eq!(readme.matches("](characters/").count(), 3);
    for name in ["Ada Quill", "Bo Quill", "Cy Marsh"] {
        let stem = sanitize(name).unwrap();
        let link = format!("    - [{name}](characters/{stem}.md)");
        assert!(readme.contains(&link), "index is missing {link}");
        assert!(root.join("characters").join(format!("{stem}.md")).is_file());
    }

    let landmarks = fs::read_to_string(root.join("landmark.md")).unwrap();
    assert_eq!(
        bullets_between(&landmarks, "# Former businesses", "# Current businesses"),
        1
    );
    assert_eq!(
        bullets_between(&landmarks, "# Current businesses", "# Gravestones"),
        1
    );
    assert!(landmarks.contains("- Marsh Dry Goods"));
    assert!(landmarks.contains("- Quill Hardware"));

    let drama = fs::read_to_string(root.join("drama.md")).unwrap();
    assert_eq!(drama, "Cy Marsh pines for the married Ada Quill.\n\n");

    let summary = fs::read_to_string(root.join("summary.md")).unwrap();
    assert!(summary.contains("It is now the night of May 3, 1979, in the town of Lake Hollow, pop. 3."));
}

#[tokio::test]
async fn dossiers_render_romance_from_both_sides() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = Arc::new(WorldSnapshot::from_json_str(TOWN).unwrap());
    export(snapshot, ExportOptions::new(dir.path(), "ROMANCE".parse().unwrap()))
        .await
        .unwrap();
    let characters = dir.path().join("ROMANCE").join("characters");

    let ada = fs::read_to_string(characters.join("Ada-Quill.md")).unwrap();
    assert!(ada.starts_with("# Ada Quill\n\nAda is a tall woman with red hair.\n"));
    assert!(ada.contains("- Spouse: Bo Quill (9.5 ❤ 6.0)"));
    assert!(ada.contains("- Other love interests: none"));
    assert!(ada.contains("- [Bo Quill](Bo-Quill.md): friendship (charge 8.0, spark 9.5)"));
    // Cy holds a relationship toward Ada, not the other way round.
    assert!(!ada.contains("Cy Marsh"));

    let cy = fs::read_to_string(characters.join("Cy-Marsh.md")).unwrap();
    assert!(cy.contains("- Spouse: none"));
    assert!(cy.contains("- Other love interests: Ada Quill (4.0 ❤ n/a)"));
    assert!(cy.contains("- Parents: none"));
    assert!(cy.contains("## Ancestors\n\n- none\n"));
}

#[tokio::test]
async fn interrupted_partial_snapshot_still_exports() {
    let raw = r#"{
        "town": {"name": "Half Built", "date": "Day of June 1, 1902", "completed": false},
        "people": [
            {"id": 1, "name": "Eli Root", "spouse": 77, "captivated_by": [78],
             "family": {"parents": [79], "kids": [2]}},
            {"id": 2, "name": "Eli Root"}
        ],
        "residents": [1, 2, 5],
        "dwellings": [{"id": 1, "name": "Root Farm", "people_here_now": [1, 99]}]
    }"#;
    let dir = tempfile::tempdir().unwrap();
    let snapshot = Arc::new(WorldSnapshot::from_json_str(raw).unwrap());
    assert!(snapshot.dangling_references() > 0);

    let err = export(snapshot, ExportOptions::new(dir.path(), "PARTIAL".parse().unwrap()))
        .await
        .unwrap_err();
    let ExportError::Incomplete { report } = err else {
        panic!("expected an incomplete export");
    };

    // Resident 5 does not exist; everything else is written.
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].section, Section::Characters);
    assert!(report.failures[0].detail.contains("#5"));
    assert_eq!(report.characters.written().len(), 2);
    assert_eq!(report.collisions.len(), 1);

    let root = dir.path().join("PARTIAL");
    let first = fs::read_to_string(root.join("characters/Eli-Root.md")).unwrap();
    let second = fs::read_to_string(root.join("characters/Eli-Root-2.md")).unwrap();
    assert!(first.contains("- Children: Eli Root"));
    assert!(!second.contains("- Children: Eli Root"));
    assert!(first.contains("- Spouse: none"));

    let readme = fs::read_to_string(root.join("README.md")).unwrap();
    assert_eq!(readme.matches("](characters/").count(), 2);
    assert!(readme.contains("characters/Eli-Root-2.md"));

    let summary = fs::read_to_string(root.join("summary.md")).unwrap();
    assert!(summary.contains("interrupted"));
    let locations = fs::read_to_string(root.join("locations.md")).unwrap();
    assert!(locations.contains("## Root Farm\n\n- Eli Root\n"));
}

#[tokio::test]
async fn namespace_failure_aborts_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    fs::write(&blocker, b"not a directory").unwrap();
    let snapshot = Arc::new(WorldSnapshot::from_json_str(TOWN).unwrap());

    let err = export(snapshot, ExportOptions::new(&blocker, "X".parse().unwrap()))
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Namespace(_)));
    assert!(!Path::new(&blocker).join("X").exists());
}

#[tokio::test]
async fn index_lists_every_dossier_of_a_large_town() {
    let people: Vec<String> = (1..=60)
        .map(|i| format!(r#"{{"id": {i}, "name": "Resident {i}"}}"#))
        .collect();
    let residents: Vec<String> = (1..=60).map(|i| i.to_string()).collect();
    let raw = format!(
        r#"{{"town": {{"name": "Big", "date": "Now"}}, "people": [{}], "residents": [{}]}}"#,
        people.join(","),
        residents.join(",")
    );
    let dir = tempfile::tempdir().unwrap();
    let snapshot = Arc::new(WorldSnapshot::from_json_str(&raw).unwrap());
    let mut options = ExportOptions::new(dir.path(), "BIG".parse().unwrap());
    options.character_concurrency = 3;

    let report = export(snapshot, options).await.unwrap();
    assert_eq!(report.characters.written().len(), 60);

    let root = dir.path().join("BIG");
    let readme = fs::read_to_string(root.join("README.md")).unwrap();
    let linked: Vec<&str> = readme
        .lines()
        .filter_map(|l| l.split("](").nth(1))
        .filter(|target| target.starts_with("characters/"))
        .map(|target| target.trim_end_matches(')'))
        .collect();
    assert_eq!(linked.len(), 60);
    for target in linked {
        assert!(root.join(target).is_file(), "index links missing {target}");
    }
    let on_disk = fs::read_dir(root.join("characters")).unwrap().count();
    assert_eq!(on_disk, 60);
}

#[tokio::test]
async fn very_long_name_still_gets_a_dossier() {
    let name = "A".repeat(300);
    let raw = format!(
        r#"{{"town": {{"name": "Long", "date": "Now"}}, "people": [{{"id": 1, "name": "{name}"}}], "residents": [1]}}"#
    );
    let dir = tempfile::tempdir().unwrap();
    let snapshot = Arc::new(WorldSnapshot::from_json_str(&raw).unwrap());

    let report = export(snapshot, ExportOptions::new(dir.path(), "LONG".parse().unwrap()))
        .await
        .unwrap();
    let written = &report.characters.written()[0];
    assert!(written.stem.len() < name.len());
    assert!(dir.path().join("LONG").join(&written.path).is_file());
}
