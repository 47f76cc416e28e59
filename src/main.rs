use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use rust_sqlproc::{load_catalog, LoadOptions, ProcedureInstance};

#[derive(Parser)]
#[command(name = "rust-sqlproc")]
#[command(author, version, about = "Typed, validated SQL Server stored procedure calls")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CatalogArgs {
    /// Path to the catalog JSON document
    #[arg(short, long)]
    catalog: PathBuf,

    /// Path to the app.config file holding connection strings
    #[arg(long)]
    config: PathBuf,
}

impl CatalogArgs {
    fn options(&self) -> LoadOptions {
        LoadOptions {
            catalog_path: self.catalog.clone(),
            config_path: self.config.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the procedures in a catalog
    List {
        #[command(flatten)]
        catalog: CatalogArgs,
    },

    /// Show a procedure's flags and parameters
    Describe {
        #[command(flatten)]
        catalog: CatalogArgs,

        /// Procedure name, e.g. open.POST_PERSON
        #[arg(short, long)]
        procedure: String,
    },

    /// Bind input to a procedure and check it without executing
    Validate {
        #[command(flatten)]
        catalog: CatalogArgs,

        /// Procedure name, e.g. open.POST_PERSON
        #[arg(short, long)]
        procedure: String,

        /// JSON document to bind
        #[arg(long)]
        json: Option<String>,

        /// Query parameter to bind (name=value, repeatable)
        #[arg(short, long = "query", value_parser = parse_pair)]
        query: Vec<(String, String)>,
    },
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn describe(instance: &ProcedureInstance) {
    let template = instance.template();
    let flags = template.flags();
    println!("{} ({})", template.name(), template.routine_type());
    println!(
        "  json: {}  single: {}  non-query: {}  always encrypted: {}",
        flags.returns_json, flags.single_result, flags.non_query, flags.always_encrypted
    );
    println!("  connection: {}", template.connection().name);

    for parameter in template.parameters() {
        let mut details = vec![
            parameter.direction().to_string(),
            parameter.data_type().to_string(),
        ];
        if !parameter.is_nullable() {
            details.push("not null".to_string());
        }
        if let Some(max_length) = parameter.max_length().filter(|max| *max >= 0) {
            details.push(format!("max length {}", max_length));
        }
        if parameter.minimum().is_some() || parameter.maximum().is_some() {
            let bound = |limit: Option<i64>| limit.map(|l| l.to_string()).unwrap_or_default();
            details.push(format!(
                "range {}..{}",
                bound(parameter.minimum()),
                bound(parameter.maximum())
            ));
        }
        if let Some(pattern) = parameter.pattern() {
            details.push(format!("pattern {}", pattern));
        }
        if let Some(type_name) = parameter.structured_type_name() {
            details.push(format!("table {}", type_name));
        }
        println!("  {:<24} {}", parameter.name(), details.join(", "));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::List { catalog } => {
            let catalog = load_catalog(&catalog.options())?;
            for name in catalog.procedure_names() {
                println!("{}", name);
            }
        }
        Commands::Describe { catalog, procedure } => {
            let catalog = load_catalog(&catalog.options())?;
            let instance = catalog.procedure(&procedure)?;
            describe(&instance);
        }
        Commands::Validate {
            catalog,
            procedure,
            json,
            query,
        } => {
            let catalog = load_catalog(&catalog.options())?;
            let mut instance = catalog.procedure(&procedure)?;

            if let Some(json) = json {
                instance
                    .load_from_json(&json)
                    .context("JSON input rejected")?;
            }
            if !query.is_empty() {
                instance
                    .load_from_query(query)
                    .context("Query input rejected")?;
            }
            instance.validate().context("Input incomplete")?;

            println!("{} accepts the input", instance.name());
            for parameter in instance.parameters() {
                if let Some(value) = parameter.value() {
                    println!("  {:<24} {}", parameter.name(), value);
                }
            }
        }
    }

    Ok(())
}
