//! Dictionary Build CLI
//!
//! Merges LinkML modules, writes per-class projections and generates the
//! post-processed JSON Schemas with their manifest.
//!
//! Usage:
//!   dictionary-build merge
//!   dictionary-build build --class BiospecimenTemplate
//!   dictionary-build deref raw.json -o resolved.json

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nf_dictionary::linkml::write_projections;
use nf_dictionary::postprocess::{dereference_with, drop_definitions, RefSiblings};
use nf_dictionary::{
    BuildManifest, BuildOptions, Checksum, DictionaryConfig, GenJsonSchemaCli, PostProcessor, SchemaBuilder,
    SchemaDocument,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dictionary-build")]
#[command(about = "Generate Synapse-ready JSON Schemas from the LinkML dictionary")]
struct Cli {
    /// Config file (default: dictionary.toml discovery)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge modules/**/*.yaml into the master schema
    Merge {
        /// Modules directory
        #[arg(short, long)]
        modules_dir: Option<PathBuf>,
        /// Output schema file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate JSON Schemas for every class or the given ones
    Build {
        /// Master LinkML schema
        #[arg(short, long)]
        schema: Option<PathBuf>,
        /// Only build these classes
        #[arg(long = "class")]
        classes: Vec<String>,
        /// Output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Feed the master schema to the generator instead of projections
        #[arg(long)]
        no_projections: bool,
        /// Generate closed schemas (no additional properties)
        #[arg(long)]
        closed: bool,
        /// Release version appended to every $id
        #[arg(long)]
        release: Option<String>,
        /// Skip the jsonschema compile check
        #[arg(long)]
        no_validate: bool,
        /// Exit 1 when any class fails
        #[arg(long)]
        strict: bool,
    },

    /// Write per-class LinkML projections
    Project {
        /// Master LinkML schema
        #[arg(short, long)]
        schema: Option<PathBuf>,
        /// Classes to project
        #[arg(long = "class", required = true)]
        classes: Vec<String>,
        /// Output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Resolve local $refs in a JSON Schema file
    Deref {
        /// Input JSON Schema
        input: PathBuf,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also drop $defs/definitions
        #[arg(long)]
        drop_defs: bool,
        /// Keep keys next to each $ref, laid over the target
        #[arg(long)]
        merge_siblings: bool,
    },

    /// Verify generated schemas against checksums in manifest.json
    Verify {
        /// Schema directory
        #[arg(short, long)]
        dir: Option<PathBuf>,
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
        Commands::Merge { modules_dir, output } => {
            let modules_dir = modules_dir.unwrap_or_else(|| config.paths.modules_dir.clone());
            let output = output.unwrap_or_else(|| config.paths.schema.clone());

            println!("📂 Merging modules from {}", modules_dir.display());
            let doc = SchemaDocument::rebuild_master(&modules_dir, &output)?;
            doc.save(&output)?;

            println!(
                "✅ Wrote {} ({} classes, {} slots, {} enums)",
                output.display(),
                doc.classes.len(),
                doc.slots.len(),
                doc.enums.len()
            );
        }

        Commands::Build {
            schema,
            classes,
            output_dir,
            no_projections,
            closed,
            release,
            no_validate,
            strict,
        } => {
            if release.is_some() {
                config.postprocess.release_version = release;
            }
            let schema = schema.unwrap_or_else(|| config.paths.schema.clone());

            println!("📂 Loading {}", schema.display());
            let doc = SchemaDocument::load(&schema)?;
            let source_checksum = Checksum::from_bytes(&fs::read(&schema)?);

            let mut options = BuildOptions::from_config(&config);
            if !classes.is_empty() {
                options.classes = classes;
            }
            if let Some(dir) = output_dir {
                options.output_dir = dir;
            }
            if no_projections {
                options.projections_dir = None;
            }
            if no_validate {
                options.validate_output = false;
            }
            let out = options.output_dir.clone();
            let partial = !options.classes.is_empty();

            let generator = GenJsonSchemaCli::from_config(&config.generator).closed(config.generator.closed || closed);
            let processor = PostProcessor::from_config(&config.postprocess)?;
            let previous = BuildManifest::load(&out)?;

            println!("🔨 Generating JSON Schemas into {}", out.display());
            let report = SchemaBuilder::new(generator, processor, options).build(&doc, &schema)?;

            for generated in &report.generated {
                println!("   ✅ {} → {}", generated.class, generated.path.display());
            }
            for failure in &report.failures {
                println!("   ❌ {}: {}", failure.class, failure.reason);
            }
            if !report.skipped.is_empty() {
                println!("   ⏭️  Skipped {} abstract/mixin classes", report.skipped.len());
            }

            let mut manifest = report.to_manifest(&schema, source_checksum, config.postprocess.release_version.clone());
            // A class-restricted build keeps the rest of the previous manifest
            if let Some(previous) = previous.as_ref().filter(|_| partial) {
                manifest = manifest.carry_over(previous, &out);
            }
            manifest.write(&out)?;
            println!("📝 Wrote manifest ({} schemas)", manifest.schemas.len());

            if let Some(previous) = previous {
                let diff = manifest.diff(&previous);
                if diff.is_empty() {
                    println!("📊 No changes since the previous build");
                } else {
                    println!("📊 Changes since the previous build:");
                    for class in &diff.added {
                        println!("   + {}", class);
                    }
                    for class in &diff.removed {
                        println!("   - {}", class);
                    }
                    for class in &diff.changed {
                        println!("   ~ {}", class);
                    }
                    for (class, old, new) in &diff.id_changed {
                        println!("   ⚠️  {} $id changed: {} → {} (existing bindings will break)", class, old, new);
                    }
                }
            }

            println!(
                "\n{} Generated {} schemas, {} failed",
                if report.is_success() { "✅" } else { "⚠️" },
                report.generated.len(),
                report.failures.len()
            );
            if strict && !report.is_success() {
                std::process::exit(1);
            }
        }

        Commands::Project {
            schema,
            classes,
            output_dir,
        } => {
            let schema = schema.unwrap_or_else(|| config.paths.schema.clone());
            let output_dir = output_dir.unwrap_or_else(|| config.paths.projections_dir.clone());

            let doc = SchemaDocument::load(&schema)?;
            for path in write_projections(&doc, &classes, &output_dir)? {
                println!("✅ {}", path.display());
            }
        }

        Commands::Deref {
            input,
            output,
            drop_defs,
            merge_siblings,
        } => {
            let siblings = if merge_siblings {
                RefSiblings::Overlay
            } else {
                config.postprocess.ref_siblings
            };
            let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&input)?)?;
            let mut resolved = dereference_with(&raw, siblings)?;
            if drop_defs {
                drop_definitions(&mut resolved);
            }
            let text = serde_json::to_string_pretty(&resolved)?;

            match output {
                Some(path) => {
                    fs::write(&path, text)?;
                    println!("✅ Wrote {}", path.display());
                }
                None => println!("{}", text),
            }
        }

        Commands::Verify { dir } => {
            let dir = dir.unwrap_or_else(|| config.paths.output_dir.clone());
            println!("🔍 Verifying schemas in {}", dir.display());

            let Some(manifest) = BuildManifest::load(&dir)? else {
                eprintln!("❌ No manifest.json in {}", dir.display());
                std::process::exit(1);
            };
            let mismatched = manifest.verify(&dir)?;
            if mismatched.is_empty() {
                println!("✅ All {} checksums valid", manifest.schemas.len());
            } else {
                for file in &mismatched {
                    println!("   ❌ {}", file);
                }
                eprintln!("❌ {} schema(s) changed since the build", mismatched.len());
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
