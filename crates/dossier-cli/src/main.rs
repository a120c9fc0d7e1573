//! Town Dossier CLI
//!
//! The `dossier` command exports a simulated town's snapshot as a directory
//! of cross-linked markdown documents.
//!
//! ## Commands
//!
//! - `export`: Write every document for a snapshot into a fresh run directory
//! - `show`: Print one resident's dossier
//! - `relationship`: Print both directed relationships between two people
//! - `inspect`: List the inspectable fields of an entity kind
//! - `config`: Print the merged parameter namespace

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn, Level};

use dossier_core::{
    assemble, fields, load_and_merge, outline_relationship, outline_social_network,
    DuplicatePolicy, EntityKind, ExportError, ExportOptions, ExportSettings, IdentifierMap,
    ParameterOverride, RunId, WorldSnapshot,
};

#[derive(Parser)]
#[command(name = "dossier")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Export a simulated town as cross-linked markdown dossiers", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a snapshot into a new run directory and print its run id
    Export {
        /// Path to the world snapshot (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Parameter group files, merged in the order given
        #[arg(short, long = "config")]
        configs: Vec<PathBuf>,

        /// Directory the run directory is created in (overrides `export_root`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run id to use instead of one derived from the current time
        #[arg(long)]
        run_id: Option<String>,

        /// Fail when a later config group redefines a parameter
        #[arg(long)]
        strict_config: bool,

        /// Dossiers written concurrently (overrides `export_character_concurrency`)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Print one resident's dossier
    Show {
        /// Path to the world snapshot (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Full name of the person
        #[arg(short, long)]
        name: String,

        /// Print this person's view of every resident instead
        #[arg(long)]
        network: bool,
    },

    /// Print both directed relationships between two people
    Relationship {
        /// Path to the world snapshot (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Full name of the first person
        a: String,

        /// Full name of the second person
        b: String,
    },

    /// List the inspectable fields of an entity kind
    Inspect {
        /// person, location, relationship, occupation or town
        kind: String,
    },

    /// Merge parameter groups and print the result as JSON
    Config {
        /// Parameter group files, merged in the order given
        #[arg(short, long = "config", required = true)]
        configs: Vec<PathBuf>,

        /// Fail when a later group redefines a parameter
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    dossier_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Export {
            snapshot,
            configs,
            output,
            run_id,
            strict_config,
            concurrency,
        } => {
            let mut out = std::io::stdout().lock();
            cmd_export(
                &mut out,
                &snapshot,
                &configs,
                output,
                run_id.as_deref(),
                policy(strict_config),
                concurrency,
            )
            .await
        }
        Commands::Show {
            snapshot,
            name,
            network,
        } => cmd_show(&mut std::io::stdout().lock(), &snapshot, &name, network),
        Commands::Relationship { snapshot, a, b } => {
            cmd_relationship(&mut std::io::stdout().lock(), &snapshot, &a, &b)
        }
        Commands::Inspect { kind } => cmd_inspect(&mut std::io::stdout().lock(), &kind),
        Commands::Config { configs, strict } => {
            cmd_config(&mut std::io::stdout().lock(), &configs, policy(strict))
        }
    }
}

fn policy(strict: bool) -> DuplicatePolicy {
    if strict {
        DuplicatePolicy::Reject
    } else {
        DuplicatePolicy::Warn
    }
}

fn load_snapshot(path: &Path) -> Result<WorldSnapshot> {
    WorldSnapshot::load(path).with_context(|| format!("Failed to load snapshot {:?}", path))
}

/// Export a snapshot. The run id is written to `out` before any document.
async fn cmd_export(
    out: &mut impl Write,
    snapshot_path: &Path,
    configs: &[PathBuf],
    output: Option<PathBuf>,
    run_id: Option<&str>,
    policy: DuplicatePolicy,
    concurrency: Option<usize>,
) -> Result<()> {
    let run_id = match run_id {
        Some(id) => id.parse::<RunId>()?,
        None => RunId::generate(),
    };
    writeln!(out, "{run_id}")?;
    out.flush()?;

    let merged = load_and_merge(configs, policy).context("Failed to merge config groups")?;
    let mut settings = ExportSettings::from_config(&merged)?;
    if let Some(dir) = output {
        settings.output_base = dir;
    }
    if let Some(n) = concurrency {
        anyhow::ensure!(n > 0, "--concurrency must be at least 1");
        settings.character_concurrency = n;
    }

    let snapshot = load_snapshot(snapshot_path)?;
    let dangling = snapshot.dangling_references();
    if dangling > 0 {
        warn!(
            dangling,
            "snapshot has references to unknown people; they render as absent"
        );
    }

    let mut options = ExportOptions::new(settings.output_base, run_id);
    options.character_concurrency = settings.character_concurrency;

    match dossier_core::export(Arc::new(snapshot), options).await {
        Ok(report) => {
            info!(
                root = %report.manifest.root().display(),
                documents = report.document_count(),
                collisions = report.collisions.len(),
                "Export complete"
            );
            Ok(())
        }
        Err(ExportError::Incomplete { report }) => {
            for failure in &report.failures {
                eprintln!("failed: {}: {}", failure.section, failure.detail);
            }
            let sections: Vec<String> =
                report.failures.iter().map(|f| f.section.to_string()).collect();
            anyhow::bail!(
                "Export {} incomplete ({} documents written), failed sections: {}",
                report.manifest.run_id(),
                report.document_count(),
                sections.join(", ")
            )
        }
        Err(e) => Err(e).context("Export aborted"),
    }
}

/// Print one dossier, or the person's relationship toward every resident.
fn cmd_show(out: &mut impl Write, snapshot_path: &Path, name: &str, network: bool) -> Result<()> {
    let snapshot = load_snapshot(snapshot_path)?;
    let person = snapshot
        .find_person(name)
        .with_context(|| format!("No person named {name:?} in snapshot"))?;

    if network {
        write!(out, "{}", outline_social_network(&snapshot, person))?;
        return Ok(());
    }

    let identifiers = IdentifierMap::resolve(&snapshot);
    let doc = assemble(&snapshot, &identifiers, person)?;
    write!(out, "{doc}")?;
    Ok(())
}

fn cmd_relationship(out: &mut impl Write, snapshot_path: &Path, a: &str, b: &str) -> Result<()> {
    let snapshot = load_snapshot(snapshot_path)?;
    let find = |name: &str| {
        snapshot
            .find_person(name)
            .with_context(|| format!("No person named {name:?} in snapshot"))
    };
    let (first, second) = (find(a)?, find(b)?);
    write!(out, "{}", outline_relationship(first, second))?;
    Ok(())
}

fn cmd_inspect(out: &mut impl Write, kind: &str) -> Result<()> {
    let kind: EntityKind = kind.parse().map_err(anyhow::Error::msg)?;
    writeln!(out, "{:<16} {:<28} DESCRIPTION", "FIELD", "TYPE")?;
    for spec in fields(kind) {
        writeln!(out, "{:<16} {:<28} {}", spec.name, spec.kind, spec.description)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct ConfigView<'a> {
    parameters: &'a BTreeMap<String, Value>,
    origins: BTreeMap<&'a str, &'a str>,
    overrides: &'a [ParameterOverride],
}

fn cmd_config(out: &mut impl Write, configs: &[PathBuf], policy: DuplicatePolicy) -> Result<()> {
    let merged = load_and_merge(configs, policy).context("Failed to merge config groups")?;
    let origins = merged
        .values()
        .keys()
        .filter_map(|k| merged.origin(k).map(|g| (k.as_str(), g)))
        .collect();
    let view = ConfigView {
        parameters: merged.values(),
        origins,
        overrides: merged.overrides(),
    };
    writeln!(out, "{}", serde_json::to_string_pretty(&view)?)?;
    Ok(())
}
