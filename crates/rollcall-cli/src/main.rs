use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rollcall_core::{
    match_roster, match_single, Descriptor, RecognizeError, RegistryLoader, RegistrySnapshot,
};
use rollcall_store::RegistryStore;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "rollcall", about = "Face descriptor registry and matcher for attendance")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create (or rename) an identity record, without a descriptor
    Add {
        /// Unique identity id (e.g. a student id)
        id: String,
        /// Human-readable display name
        name: String,
    },
    /// Attach a face descriptor to an existing identity
    Enroll {
        id: String,
        /// JSON file holding one descriptor (array of numbers), as
        /// produced by the vision service
        descriptor: PathBuf,
    },
    /// Clear an identity's descriptor (the record is kept)
    Remove { id: String },
    /// List identity records and their enrollment state
    List,
    /// Count identities enrolled for recognition
    Count,
    /// Match query descriptors against the registry
    Recognize {
        /// JSON file with one descriptor, or an array of descriptors
        /// with --all-faces
        descriptor: PathBuf,
        /// Classroom mode: accept several faces and report a roster
        #[arg(long)]
        all_faces: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env();
    tracing::debug!(
        db = %cfg.db_path.display(),
        threshold = cfg.threshold,
        dimension = cfg.dimension,
        "config loaded"
    );

    if let Some(parent) = cfg.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let store = RegistryStore::open(&cfg.db_path)
        .with_context(|| format!("opening registry at {}", cfg.db_path.display()))?;

    match cli.command {
        Commands::Add { id, name } => {
            store.add_identity(&id, &name)?;
            println!("added {id} ({name})");
        }
        Commands::Enroll { id, descriptor } => {
            let descriptor = read_one_descriptor(&descriptor)?;
            if descriptor.dim() != cfg.dimension {
                anyhow::bail!(
                    "descriptor has {} components, registry expects {}",
                    descriptor.dim(),
                    cfg.dimension
                );
            }
            store.enroll(&id, &descriptor)?;
            println!("enrolled {id}");
        }
        Commands::Remove { id } => {
            store.remove_descriptor(&id)?;
            println!("removed descriptor for {id}");
        }
        Commands::List => {
            for identity in store.list()? {
                let state = if identity.has_descriptor() {
                    "enrolled"
                } else {
                    "no descriptor"
                };
                println!("{}\t{}\t{state}", identity.identity_id, identity.display_name);
            }
        }
        Commands::Count => {
            println!("{}", store.registered_count()?);
        }
        Commands::Recognize {
            descriptor,
            all_faces,
        } => {
            let snapshot = RegistrySnapshot::build(cfg.dimension, store.load()?)
                .map_err(fail)?;
            if snapshot.is_empty() {
                return Err(fail(RecognizeError::NoEnrolledIdentities));
            }
            if all_faces {
                let queries = read_many_descriptors(&descriptor)?;
                let report = match_roster(&snapshot, &queries, cfg.threshold).map_err(fail)?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let query = read_one_descriptor(&descriptor)?;
                let candidate = match_single(&snapshot, &query, cfg.threshold).map_err(fail)?;
                println!("{}", serde_json::to_string_pretty(&candidate)?);
            }
        }
    }

    Ok(())
}

/// Flatten a recognition error into an anyhow error carrying its stable
/// code, so scripts can grep a predictable token.
fn fail(err: RecognizeError) -> anyhow::Error {
    anyhow::anyhow!("{err} [{}]", err.code())
}

fn read_one_descriptor(path: &PathBuf) -> Result<Descriptor> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing descriptor {}", path.display()))
}

fn read_many_descriptors(path: &PathBuf) -> Result<Vec<Descriptor>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parsing descriptor list {}", path.display()))
}
