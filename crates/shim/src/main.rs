//! Shim
//!
//! Loads configuration settings, migrates them between schema versions and
//! writes the result back out.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use shim::config::{CONFIG_FILE, ShimConfig};
use shim::entity::{KINDS, schema_for};
use shim::inspect;
use shim::io;
use shim::migrate::Migrator;
use shim::session::ConfigSession;
use shim::shim_types::SchemaVersion;
use shim::store::{LoggingLifecycle, ObjectStore};

/// Configuration shim
#[derive(Parser, Debug)]
#[command(name = "shim")]
#[command(about = "Schema-driven configuration loader and migrator", long_about = None)]
struct Args {
    /// Path to the shim configuration file
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Tracing filter, overrides the configuration file
    #[arg(long)]
    log: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a settings file, migrate it and save the result
    Migrate {
        /// Settings file to read
        input: PathBuf,

        /// Where to write the migrated settings
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Schema version to migrate to
        #[arg(short, long)]
        target: Option<u32>,
    },

    /// Decode a settings file and print the object store
    Dump {
        input: PathBuf,

        /// Print entities as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the node outline of a settings file
    Meta { input: PathBuf },

    /// Print the declared fields of every kind at a schema version
    Schema {
        #[arg(default_value_t = 2)]
        version: u32,
    },

    /// Print the field diff between two schema versions
    Diff {
        #[arg(default_value_t = 1)]
        from: u32,

        #[arg(default_value_t = 2)]
        to: u32,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = ShimConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    // Initialize tracing
    let filter = args.log.clone().unwrap_or_else(|| config.log_filter.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with((!args.json_logs).then(|| tracing_subscriber::fmt::layer()))
        .with(args.json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .init();

    info!("Starting shim v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Migrate {
            input,
            output,
            target,
        } => {
            let output = output.unwrap_or_else(|| config.output.clone());
            let target = target.map(SchemaVersion).unwrap_or(config.target_version());
            run_migrate(&input, &output, target)
        }
        Command::Dump { input, json } => run_dump(&input, json),
        Command::Meta { input } => {
            let tree = io::read_tree(&input)?;
            print!("{}", inspect::outline(&tree));
            Ok(())
        }
        Command::Schema { version } => {
            let version = SchemaVersion(version);
            for kind in KINDS {
                let schema = schema_for(kind, version)
                    .with_context(|| format!("no {kind} schema for {version}"))?;
                print!("{schema}");
            }
            Ok(())
        }
        Command::Diff { from, to } => run_diff(SchemaVersion(from), SchemaVersion(to)),
    }
}

/// Create the object store and wire the device lifecycle hook
fn create_store() -> Arc<ObjectStore> {
    let store = ObjectStore::new();
    store.initialize(Arc::new(LoggingLifecycle));
    store
}

fn run_migrate(input: &Path, output: &Path, target: SchemaVersion) -> Result<()> {
    let mut session = ConfigSession::new(create_store());
    let ok = session.load(input)
        && session.parse()
        && session.migrate(target)
        && session.build()
        && session.save(output);
    if !ok {
        bail!(session.error().unwrap_or("unknown error").to_string());
    }
    if let Some(report) = session.report() {
        println!("{report}");
    }
    println!("written to {}", output.display());
    Ok(())
}

fn run_dump(input: &Path, json: bool) -> Result<()> {
    let mut session = ConfigSession::new(create_store());
    if !(session.load(input) && session.parse()) {
        bail!(session.error().unwrap_or("unknown error").to_string());
    }
    let store = session.store();
    if json {
        let snapshots: Vec<_> = store.ordered().iter().map(|e| e.snapshot()).collect();
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
    } else {
        print!("{}", store.dump());
    }
    Ok(())
}

fn run_diff(from: SchemaVersion, to: SchemaVersion) -> Result<()> {
    for kind in KINDS {
        let (Some(source), Some(target)) = (schema_for(kind, from), schema_for(kind, to)) else {
            bail!("no {kind} schema for {from} or {to}");
        };
        println!("{kind} {from} -> {to}:");
        for line in Migrator::diff(source, target).to_string().lines() {
            println!("  {line}");
        }
    }
    Ok(())
}
