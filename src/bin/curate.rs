//! Dictionary Curate CLI
//!
//! Sets up Synapse curation for an upload folder: schema binding, a file
//! view with one column per schema property, and a curation task. Record
//! based tasks get a RecordSet and a grid session instead of a view.
//!
//! Usage:
//!   dictionary-curate task --folder-id syn123 --template ImagingAssayTemplate
//!   dictionary-curate recordset --folder-id syn123 --recordset-name YIA_Smith_2025 --template DataLandscape
//!   dictionary-curate view registered-json-schemas/BiospecimenTemplate.json --parent syn1 --scope syn2
//!   dictionary-curate view org.synapse.nf-biospecimentemplate --parent syn1
//!   dictionary-curate bind syn123 org.synapse.nf-biospecimentemplate

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use nf_dictionary::synapse::{
    bind_schema, columns_from_schema, create_curation_task, create_entity_view, create_recordset_task,
    fetch_registered_schema, ColumnDefaults, CurationTaskRequest, RecordSetTaskRequest,
};
use nf_dictionary::{DictionaryConfig, HttpSynapseClient, JobPolling, SchemaUri};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dictionary-curate")]
#[command(about = "Create Synapse curation tasks, file views and schema bindings")]
struct Cli {
    /// Config file (default: dictionary.toml discovery)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Github,
}

#[derive(Subcommand)]
enum Commands {
    /// Bind the template, create a file view and a curation task
    Task {
        /// Upload folder
        #[arg(long)]
        folder_id: String,
        /// Template class name or registered schema URL
        #[arg(long)]
        template: String,
        /// Instructions shown to contributors
        #[arg(long)]
        instructions: Option<String>,
        /// Do not bind the schema to the folder
        #[arg(long)]
        no_bind_schema: bool,
        /// Local template schema directory
        #[arg(long)]
        schema_dir: Option<PathBuf>,
        /// Result format
        #[arg(long, value_enum, default_value = "json")]
        output_format: OutputFormat,
    },

    /// Create a RecordSet, a record-based task and a grid session
    Recordset {
        /// Folder that holds the RecordSet
        #[arg(long)]
        folder_id: String,
        /// RecordSet name
        #[arg(long)]
        recordset_name: String,
        /// Template class name or registered schema URL
        #[arg(long)]
        template: String,
        /// RecordSet description
        #[arg(long)]
        description: Option<String>,
        /// Task name (default: RecordSet name)
        #[arg(long)]
        task_name: Option<String>,
        /// Fields that identify a record
        #[arg(long, num_args = 1..)]
        upsert_keys: Vec<String>,
        /// Instructions shown to contributors
        #[arg(long)]
        instructions: Option<String>,
        /// Do not bind the schema to the RecordSet
        #[arg(long)]
        no_bind_schema: bool,
        /// Local template schema directory
        #[arg(long)]
        schema_dir: Option<PathBuf>,
        /// Result format
        #[arg(long, value_enum, default_value = "json")]
        output_format: OutputFormat,
    },

    /// Create a file view whose columns follow a JSON Schema
    View {
        /// JSON Schema file, or a registered schema name or URL
        schema: String,
        /// View name (default: schema title)
        #[arg(short, long)]
        name: Option<String>,
        /// Project or folder that holds the view
        #[arg(short, long)]
        parent: String,
        /// Containers the view covers (default: parent)
        #[arg(short, long, value_delimiter = ',')]
        scope: Vec<String>,
    },

    /// Bind a registered schema to an entity
    Bind {
        /// Entity id
        entity: String,
        /// Schema `$id` or registered name
        schema_id: String,
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
    let config = DictionaryConfig::load_from(cli.config.as_deref())?;
    let client = HttpSynapseClient::from_config(&config.synapse)?;
    let defaults = ColumnDefaults::from_config(&config.synapse);

    match cli.command {
        Commands::Task {
            folder_id,
            template,
            instructions,
            no_bind_schema,
            schema_dir,
            output_format,
        } => {
            let mut request = CurationTaskRequest::new(folder_id, template);
            request.bind_schema = !no_bind_schema;
            request.schema_dir = schema_dir.unwrap_or_else(|| config.paths.output_dir.clone());
            if let Some(instructions) = instructions {
                request.instructions = instructions;
            }

            let result = create_curation_task(&client, &request, defaults)?;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                OutputFormat::Github => match std::env::var_os("GITHUB_OUTPUT") {
                    Some(path) => {
                        result.append_github_output(&PathBuf::from(path))?;
                        eprintln!("✅ Task {} written to GITHUB_OUTPUT", result.task_id);
                    }
                    None => print!("{}", result.github_output()),
                },
            }
        }

        Commands::Recordset {
            folder_id,
            recordset_name,
            template,
            description,
            task_name,
            upsert_keys,
            instructions,
            no_bind_schema,
            schema_dir,
            output_format,
        } => {
            let mut request = RecordSetTaskRequest::new(folder_id, recordset_name, template);
            request.description = description;
            request.task_name = task_name;
            request.upsert_keys = upsert_keys;
            request.bind_schema = !no_bind_schema;
            request.schema_dir = schema_dir.unwrap_or_else(|| config.paths.output_dir.clone());
            if let Some(instructions) = instructions {
                request.instructions = instructions;
            }

            let result = create_recordset_task(&client, &request, JobPolling::from_config(&config.synapse))?;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                OutputFormat::Github => match std::env::var_os("GITHUB_OUTPUT") {
                    Some(path) => {
                        result.append_github_output(&PathBuf::from(path))?;
                        eprintln!("✅ RecordSet {} written to GITHUB_OUTPUT", result.recordset_id);
                    }
                    None => print!("{}", result.github_output()),
                },
            }
        }

        Commands::View {
            schema,
            name,
            parent,
            scope,
        } => {
            let body = if Path::new(&schema).is_file() {
                serde_json::from_str::<Value>(&fs::read_to_string(&schema)?)?
            } else {
                println!("🔍 Fetching registered schema {}", schema);
                fetch_registered_schema(&client, &SchemaUri::parse(&schema)?)?
            };
            let columns = columns_from_schema(&body, defaults)?;
            let name = name
                .or_else(|| body.get("title").and_then(|t| t.as_str()).map(str::to_string))
                .unwrap_or_else(|| "FileView".to_string());
            let scope = if scope.is_empty() { vec![parent.clone()] } else { scope };

            let id = create_entity_view(&client, &name, &parent, &scope, &columns)?;
            println!("✅ Created view {} ({}) with {} schema columns", name, id, columns.len());
        }

        Commands::Bind { entity, schema_id } => {
            bind_schema(&client, &entity, &schema_id)?;
            println!("✅ Bound {} to {}", schema_id, entity);
        }
    }

    Ok(())
}
