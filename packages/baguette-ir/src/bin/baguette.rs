//! Baguette CLI
//!
//! Compile a JSON trace report into a behavior graph and print its statistics.
//!
//! # Usage
//!
//! ```bash
//! # Compile with the default configuration
//! baguette compile report.json
//!
//! # Prune with filters, applied in order
//! baguette compile report.json --filter effectless-calls --filter data-nodes
//!
//! # List filters / print the default configuration
//! baguette filters
//! baguette config
//! ```

use baguette_ir::{open_report, BuildConfig, Builder, FilterRegistry, Toolchain};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "baguette")]
#[command(about = "Behavior graphs from sandbox execution traces", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a trace report
    Compile {
        /// JSON trace report
        trace: PathBuf,

        /// Versioned YAML build configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Filter to apply to the compiled graph (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// List available filters
    Filters,

    /// Print the default configuration as YAML
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("baguette_ir=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compile {
            trace,
            config,
            filters,
            pretty,
        } => compile(trace, config, filters, pretty)?,
        Commands::Filters => {
            for name in FilterRegistry::standard().names() {
                println!("{}", name);
            }
        }
        Commands::Config => print!("{}", BuildConfig::default().to_yaml()?),
    }
    Ok(())
}

fn compile(
    trace: PathBuf,
    config: Option<PathBuf>,
    filters: Vec<String>,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config {
        Some(path) => BuildConfig::from_yaml(path)?,
        None => BuildConfig::default(),
    };
    let report = open_report(&trace)?;
    let mut baguette = Builder::new(Toolchain::global(), config).build(&report)?;
    let compiled = baguette.stats()?;

    let names: Vec<&str> = filters.iter().map(String::as_str).collect();
    let filtered = if names.is_empty() {
        None
    } else {
        let pruned = FilterRegistry::standard().chain(&mut baguette.store, baguette.graph, &names)?;
        Some(baguette.store.stats(pruned)?)
    };

    let output = json!({
        "trace": trace.display().to_string(),
        "build_id": baguette.build_id.to_string(),
        "platform": format!("{:?}", baguette.platform),
        "calls": baguette.ordered_calls.len(),
        "compiled": compiled,
        "filters": names,
        "filtered": filtered,
    });
    let rendered = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", rendered);
    Ok(())
}
