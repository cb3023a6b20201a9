//! Dictionary Check CLI
//!
//! Pre-registration checks against Synapse limits and the class hierarchy.
//!
//! Exit codes for `enums` and `limits`:
//!   0 all within limits
//!   1 a limit is exceeded
//!   2 a limit is approached (with --strict)

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nf_dictionary::limits::{check_enum_sizes, LimitsReport, ReportFormat};
use nf_dictionary::{ClassHierarchy, DictionaryConfig, SchemaDocument};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dictionary-check")]
#[command(about = "Check the dictionary against Synapse limits")]
struct Cli {
    /// Config file (default: dictionary.toml discovery)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count permissible values per enum
    Enums {
        /// Modules directory
        #[arg(short, long)]
        modules_dir: Option<PathBuf>,
        /// Output format (markdown, json, text)
        #[arg(short, long, default_value = "markdown")]
        format: ReportFormat,
        /// Include safe enums in the report
        #[arg(short, long)]
        verbose: bool,
        /// Exit 2 when an enum approaches the limit
        #[arg(long)]
        strict: bool,
        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Enum sizes, value lengths and estimated row sizes
    Limits {
        /// Modules directory
        #[arg(short, long)]
        modules_dir: Option<PathBuf>,
        /// Generated JSON Schema directory
        #[arg(short, long)]
        schemas_dir: Option<PathBuf>,
        /// Output format (markdown, json)
        #[arg(short, long, default_value = "markdown")]
        format: ReportFormat,
        /// Exit non-zero on exceeded or approached limits
        #[arg(long)]
        strict: bool,
        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate is_a and mixin references
    Hierarchy {
        /// Master LinkML schema
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },
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

fn emit(report: &str, output: Option<PathBuf>) -> std::io::Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(&path, report)?;
            eprintln!("📝 Report written to {}", path.display());
        }
        None => println!("{}", report),
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = DictionaryConfig::load_from(cli.config.as_deref())?;

    match cli.command {
        Commands::Enums {
            modules_dir,
            format,
            verbose,
            strict,
            output,
        } => {
            let modules_dir = modules_dir.unwrap_or_else(|| config.paths.modules_dir.clone());
            let report = check_enum_sizes(&modules_dir, &config.limits)?;

            emit(&report.render(format, verbose)?, output)?;
            std::process::exit(report.exit_code(strict));
        }

        Commands::Limits {
            modules_dir,
            schemas_dir,
            format,
            strict,
            output,
        } => {
            let modules_dir = modules_dir.unwrap_or_else(|| config.paths.modules_dir.clone());
            let schemas_dir = schemas_dir.unwrap_or_else(|| config.paths.output_dir.clone());
            let report = LimitsReport::run(&modules_dir, &schemas_dir, &config.limits)?;

            emit(&report.render(format)?, output)?;
            std::process::exit(report.exit_code(strict));
        }

        Commands::Hierarchy { schema } => {
            let schema = schema.unwrap_or_else(|| config.paths.schema.clone());
            println!("🔍 Checking class hierarchy in {}", schema.display());

            let doc = SchemaDocument::load(&schema)?;
            let issues = ClassHierarchy::build(&doc).validate();
            if issues.is_empty() {
                println!("✅ {} classes, no hierarchy issues", doc.classes.len());
            } else {
                for issue in &issues {
                    println!("   ❌ {}", issue);
                }
                eprintln!("❌ {} hierarchy issue(s)", issues.len());
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
