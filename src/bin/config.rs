//! Dictionary Config CLI
//!
//! Usage:
//!   dictionary-config show
//!   dictionary-config init -o dictionary.toml
//!   dictionary-config validate --config ci.toml

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use nf_dictionary::DictionaryConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dictionary-config")]
#[command(about = "Inspect and initialize dictionary tool configuration")]
struct Cli {
    /// Config file (default: dictionary.toml discovery)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as TOML
    Show,

    /// Write the default configuration
    Init {
        #[arg(short, long, default_value = "dictionary.toml")]
        output: PathBuf,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Report settings that cannot work together
    Validate,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Show => {
            let config = DictionaryConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
            println!("{}", toml::to_string_pretty(&config)?);
        }

        Commands::Init { output, force } => {
            if output.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", output.display());
            }
            let path = output.to_string_lossy();
            DictionaryConfig::default()
                .save(&path)
                .with_context(|| format!("writing {}", path))?;
            println!("✅ Wrote default configuration to {}", path);
        }

        Commands::Validate => {
            let config = DictionaryConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
            let problems = config.problems();
            if problems.is_empty() {
                println!("✅ Configuration is valid");
            } else {
                for problem in &problems {
                    println!("   ❌ {}", problem);
                }
                eprintln!("❌ {} configuration problem(s)", problems.len());
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
