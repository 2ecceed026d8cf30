//! bkt CLI - Command line interface for bkindex
//!
//! Each invocation opens the journal, runs one command and prints a single
//! JSON document. Commitments for new values are BLAKE3 over their hex text.

use bkindex::{Digest, Error, Fingerprint, Genesis, Index, NodeId, TreeConfig};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bkt")]
#[command(about = "A Hamming-distance BK-tree index for content fingerprints")]
#[command(version)]
struct Cli {
    /// Path to the index file
    #[arg(short, long, default_value = "fingerprints.bkt")]
    database: PathBuf,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new index from a genesis value
    Init {
        /// Root fingerprint (hex)
        #[arg(short, long)]
        root: Fingerprint,
        /// Fingerprint width in bits
        #[arg(short, long, default_value = "128")]
        width: u16,
        /// Opaque tree-wide constant stored in the index
        #[arg(short, long, default_value = "42")]
        scalar: u64,
    },

    /// Show where a value is indexed, or where it would attach
    Find {
        /// Fingerprint (hex)
        value: Fingerprint,
    },

    /// Add one or more values
    Add {
        /// Fingerprints (hex)
        #[arg(required = true)]
        values: Vec<Fingerprint>,
    },

    /// Add every value listed in a file, one hex fingerprint per line
    Import {
        /// File to read
        file: PathBuf,
    },

    /// Find all values within a Hamming radius
    Query {
        /// Fingerprint (hex)
        value: Fingerprint,
        /// Maximum Hamming distance
        #[arg(short, long, default_value = "10")]
        radius: u32,
    },

    /// Get a node by ID
    Get {
        /// The node ID
        id: u64,
    },

    /// Show index status
    Status,

    /// Check the tree's structural invariants
    Verify,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("BKT_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        output(
            &cli.format,
            &serde_json::json!({
                "status": "error",
                "message": format!("{:#}", e)
            }),
        );
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Init {
            root,
            width,
            scalar,
        } => {
            let config = TreeConfig::new(*width, *scalar);
            let index = Index::create(&cli.database, Genesis::new(*root, config))?;
            index.sync()?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "message": format!("Created index at {}", cli.database.display()),
                    "root": root.to_hex_width(*width),
                    "width": width,
                    "config_scalar": scalar
                }),
            );
        }

        Commands::Find { value } => {
            let index = open_index(&cli.database)?;
            let width = index.config().width;
            let found = index.find_path(value)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "value": value.to_hex_width(width),
                    "path": found.path,
                    "distances": found.distances,
                    "terminal": found.terminal
                }),
            );
        }

        Commands::Add { values } => {
            let index = open_index(&cli.database)?;
            let items = values
                .iter()
                .map(|v| add_one(&index, v))
                .collect::<anyhow::Result<Vec<_>>>()?;
            index.sync()?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "count": items.len(),
                    "results": items
                }),
            );
        }

        Commands::Import { file } => {
            let index = open_index(&cli.database)?;
            let values = read_values(file)?;
            let mut added = 0usize;
            let mut duplicates = 0usize;
            for v in &values {
                match index.insert_value(*v, commitment(&index, v)) {
                    Ok(_) => added += 1,
                    Err(Error::DuplicateValue { .. }) => duplicates += 1,
                    Err(e) => return Err(e.into()),
                }
            }
            index.sync()?;
            tracing::info!(added, duplicates, "import finished");
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "added": added,
                    "duplicates": duplicates,
                    "nodes": index.len()
                }),
            );
        }

        Commands::Query { value, radius } => {
            let index = open_index(&cli.database)?;
            let width = index.config().width;
            let matches = index.within(value, *radius)?;
            let items: Vec<_> = matches
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "id": m.node,
                        "value": m.value.to_hex_width(width),
                        "distance": m.distance
                    })
                })
                .collect();
            output(
                &cli.format,
                &serde_json::json!({
                    "query": value.to_hex_width(width),
                    "radius": radius,
                    "count": items.len(),
                    "matches": items
                }),
            );
        }

        Commands::Get { id } => {
            let index = open_index(&cli.database)?;
            let width = index.config().width;
            let node = index.node(NodeId(*id))?;
            output(
                &cli.format,
                &serde_json::json!({
                    "id": node.id,
                    "value": node.value.to_hex_width(width),
                    "commitment": node.commitment.to_hex(),
                    "parent": node.parent,
                    "label": node.label,
                    "children": node.children
                }),
            );
        }

        Commands::Status => {
            let index = open_index(&cli.database)?;
            let config = index.config();
            output(
                &cli.format,
                &serde_json::json!({
                    "database": cli.database.display().to_string(),
                    "width": config.width,
                    "config_scalar": config.config_scalar,
                    "nodes": index.len(),
                    "height": index.height()
                }),
            );
        }

        Commands::Verify => {
            let index = open_index(&cli.database)?;
            index.verify()?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "nodes": index.len()
                }),
            );
        }
    }

    Ok(())
}

fn open_index(path: &Path) -> anyhow::Result<Index> {
    if !path.exists() {
        anyhow::bail!(
            "No index at {} (run `bkt init --root <hex>` first)",
            path.display()
        );
    }
    Ok(Index::open(path)?)
}

fn commitment(index: &Index, value: &Fingerprint) -> Digest {
    Digest::commit(value, index.config().width)
}

fn add_one(index: &Index, value: &Fingerprint) -> anyhow::Result<serde_json::Value> {
    let width = index.config().width;
    let hex = value.to_hex_width(width);
    match index.insert_value(*value, commitment(index, value)) {
        Ok(id) => {
            let node = index.node(id)?;
            Ok(serde_json::json!({
                "value": hex,
                "status": "added",
                "id": id,
                "parent": node.parent,
                "label": node.label
            }))
        }
        Err(Error::DuplicateValue { node, .. }) => Ok(serde_json::json!({
            "value": hex,
            "status": "exists",
            "id": node
        })),
        Err(e) => Err(e.into()),
    }
}

fn read_values(file: &Path) -> anyhow::Result<Vec<Fingerprint>> {
    let text = std::fs::read_to_string(file)?;
    text.lines()
        .enumerate()
        .map(|(n, line)| (n, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| {
            Fingerprint::from_hex(line)
                .map_err(|e| anyhow::anyhow!("{}:{}: {}", file.display(), n + 1, e))
        })
        .collect()
}

fn output(format: &OutputFormat, value: &serde_json::Value) {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string(value),
        OutputFormat::Text => serde_json::to_string_pretty(value),
    };
    match rendered {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("failed to render output: {}", e),
    }
}

