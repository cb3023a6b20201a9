//! Dictionary Sync CLI
//!
//! Keeps the LinkML modules in step with external sources: the NF Tools
//! table, ontology synonyms, and the template mapping table.
//!
//! Usage:
//!   dictionary-sync model-systems --dry-run
//!   dictionary-sync inject-synonyms synonyms.csv modules/Sample/CellLineModel.yaml
//!   dictionary-sync extract-synonyms modules/Assay/Assay.yaml -o synonyms.csv
//!   dictionary-sync template-table

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nf_dictionary::sync::{fetch_resources, rooted, SyncPlan};
use nf_dictionary::synonyms::{extract_synonyms, inject_synonyms, load_synonyms_csv, write_synonyms_csv, OntologySynonymSource};
use nf_dictionary::templates::{template_mapping, write_mapping, DEFAULT_BASE};
use nf_dictionary::{DictionaryConfig, HttpSynapseClient, JobPolling, SchemaDocument};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dictionary-sync")]
#[command(about = "Sync dictionary modules with external sources")]
struct Cli {
    /// Config file (default: dictionary.toml discovery)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Regenerate model system enums from the NF Tools table
    ModelSystems {
        /// Tools table id (default from config)
        #[arg(short, long)]
        table: Option<String>,
        /// Print the files that would be written
        #[arg(long)]
        dry_run: bool,
        /// Repository root the module directories are relative to
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Skip the filtered subset enums
        #[arg(long)]
        no_subsets: bool,
    },

    /// Add synonyms from a CSV (Term, Synonyms) as enum value aliases
    InjectSynonyms {
        /// CSV with Term and Synonyms columns
        csv: PathBuf,
        /// LinkML module to update
        yaml: PathBuf,
        /// Write here instead of updating in place
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Similarity ratio at which a synonym counts as a duplicate
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Look up exact synonyms for enum values with ontology meanings
    ExtractSynonyms {
        /// LinkML module to read
        yaml: PathBuf,
        /// Output CSV
        #[arg(short, long, default_value = "synonyms.csv")]
        output: PathBuf,
    },

    /// Write the template → data type / assay mapping table
    TemplateTable {
        /// Modules directory
        #[arg(short, long)]
        modules_dir: Option<PathBuf>,
        /// Base template class
        #[arg(short, long, default_value = DEFAULT_BASE)]
        base: String,
        /// Output Markdown file
        #[arg(short, long)]
        output: Option<PathBuf>,
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

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = DictionaryConfig::load_from(cli.config.as_deref())?;

    match cli.command {
        Commands::ModelSystems {
            table,
            dry_run,
            root,
            no_subsets,
        } => {
            if let Some(table) = table {
                config.sync.tools_table = table;
            }
            if no_subsets {
                config.sync.create_subsets = false;
            }
            let sync = rooted(&config.sync, &root);

            println!("🔍 Querying {}", sync.tools_table);
            let client = HttpSynapseClient::from_config(&config.synapse)?;
            let resources = fetch_resources(
                &client,
                &sync.tools_table,
                config.synapse.query_page_size,
                JobPolling::from_config(&config.synapse),
            )?;
            for (kind, rows) in &resources.by_kind {
                println!("   📊 {}: {}", kind.resource_type(), rows.len());
            }

            let plan = SyncPlan::build(&resources, &sync);
            let paths = plan.apply(dry_run)?;
            for path in &paths {
                println!("   {} {}", if dry_run { "📝 would write" } else { "✅" }, path.display());
            }
            println!(
                "\n{} {} base enums, {} subsets",
                if dry_run { "🔍 Dry run:" } else { "✅ Wrote" },
                plan.base.len(),
                plan.subsets.len()
            );
        }

        Commands::InjectSynonyms {
            csv,
            yaml,
            output,
            threshold,
        } => {
            let threshold = threshold.unwrap_or(config.sync.synonym_threshold);
            let synonyms = load_synonyms_csv(&csv)?;
            println!("📂 Loaded synonyms for {} terms", synonyms.len());

            let mut doc = SchemaDocument::load(&yaml)?;
            let added = inject_synonyms(&mut doc, &synonyms, threshold);

            let output = output.unwrap_or(yaml);
            doc.save(&output)?;
            println!("✅ Added {} aliases → {}", added, output.display());
        }

        Commands::ExtractSynonyms { yaml, output } => {
            let doc = SchemaDocument::load(&yaml)?;
            let source = OntologySynonymSource::new()?;

            println!("🔍 Looking up synonyms for {}", yaml.display());
            let rows = extract_synonyms(&doc, &source);
            write_synonyms_csv(&output, &rows)?;
            println!("✅ {} terms with synonyms → {}", rows.len(), output.display());
        }

        Commands::TemplateTable {
            modules_dir,
            base,
            output,
        } => {
            let modules_dir = modules_dir.unwrap_or_else(|| config.paths.modules_dir.clone());
            let output = output.unwrap_or_else(|| config.paths.template_mapping.clone());

            let doc = SchemaDocument::load_modules(&modules_dir)?;
            let templates = template_mapping(&doc, &base)?;
            write_mapping(&output, &templates, &base)?;
            println!(
                "✅ Mapped {} templates → {}",
                templates.iter().filter(|t| !t.is_abstract).count(),
                output.display()
            );
        }
    }

    Ok(())
}
