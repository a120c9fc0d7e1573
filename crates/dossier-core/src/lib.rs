//! Town Dossier Core Library
//!
//! Turns a read-only snapshot of a simulated town into a directory of
//! cross-linked markdown documents: a summary, location occupancy,
//! businesses and gravestones, narrative findings, one dossier per
//! resident, and an index tying them together.

pub mod config;
pub mod coordinator;
pub mod dossier;
pub mod error;
pub mod naming;
pub mod namespace;
pub mod obs;
pub mod schema;
pub mod sections;
pub mod sink;
pub mod snapshot;
pub mod telemetry;

pub use config::{
    load_and_merge, merge_parameter_groups, DuplicatePolicy, ExportSettings, MergedConfig,
    ParameterGroup, ParameterOverride,
};
pub use coordinator::{
    export, export_into, ExportOptions, ExportReport, DEFAULT_CHARACTER_CONCURRENCY,
};
pub use dossier::{assemble, outline_relationship, outline_social_network};
pub use error::{
    ConfigError, DossierError, ExportError, NamespaceError, Section, SectionFailure, SnapshotError,
};
pub use naming::{sanitize, Collision, IdentifierMap};
pub use namespace::{RunId, RunManifest, RunNamespace, CHARACTERS_DIR};
pub use schema::{fields, EntityKind, FieldSpec};
pub use sections::{CharacterFailure, CharacterReport, WrittenDossier};
pub use sink::{DocumentSink, FsSink, MemorySink};
pub use snapshot::{Person, PersonId, SnapshotRecord, WorldSnapshot};
pub use telemetry::init_tracing;

/// Town Dossier version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
