//! Dictionary Register CLI
//!
//! Registers (or validates with a dry run) generated JSON Schemas with the
//! Synapse schema service and writes a Markdown log of the run.
//!
//! Usage:
//!   SYNAPSE_AUTH_TOKEN=... dictionary-register register
//!   dictionary-register validate --include BiospecimenTemplate.json

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use nf_dictionary::synapse::{register_schema, select_schema_files, RegistrationReport};
use nf_dictionary::{DictionaryConfig, HttpSynapseClient, JobPolling};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dictionary-register")]
#[command(about = "Register generated JSON Schemas with Synapse")]
struct Cli {
    /// Config file (default: dictionary.toml discovery)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create new schema versions
    Register(Selection),
    /// Submit every schema as a dry run
    Validate(Selection),
}

#[derive(Args)]
struct Selection {
    /// Generated JSON Schema directory
    #[arg(short, long)]
    dir: Option<PathBuf>,
    /// Only these file names (overrides --exclude)
    #[arg(short, long, value_delimiter = ',')]
    include: Vec<String>,
    /// Skip these file names
    #[arg(short, long, value_delimiter = ',')]
    exclude: Vec<String>,
    /// Markdown log file
    #[arg(short, long)]
    log: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn load_schema(path: &Path) -> nf_dictionary::Result<Value> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = DictionaryConfig::load_from(cli.config.as_deref())?;
    let (selection, dry_run) = match cli.command {
        Commands::Register(selection) => (selection, false),
        Commands::Validate(selection) => (selection, true),
    };

    let dir = selection.dir.unwrap_or_else(|| config.paths.output_dir.clone());
    let log = selection.log.unwrap_or_else(|| config.paths.registration_log.clone());

    let chosen = select_schema_files(&dir, &selection.include, &selection.exclude)?;
    let client = HttpSynapseClient::from_config(&config.synapse)?;
    let polling = JobPolling::from_config(&config.synapse);

    println!(
        "🚀 {} {} schema(s) from {}",
        if dry_run { "Validating" } else { "Registering" },
        chosen.files.len(),
        dir.display()
    );

    let mut report = RegistrationReport::new(dry_run, &selection.include, &selection.exclude);
    for name in &chosen.missing {
        println!("   ⚠️  {} not found", name);
    }

    for path in &chosen.files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let result = load_schema(path).and_then(|schema| register_schema(&client, &schema, dry_run, polling));

        match &result {
            Ok(_) => println!("   ✅ {}", name),
            Err(e) => println!("   ❌ {}: {}", name, e),
        }
        report.record(name, &result);
    }

    report.write(&log)?;
    println!("📝 Log written to {}", log.display());

    println!("\n📊 {} passed, {} failed", report.passed(), report.failed());
    if report.failed() > 0 {
        std::process::exit(1);
    }

    Ok(())
}
