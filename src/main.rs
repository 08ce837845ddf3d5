use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{EnvFilter, fmt};

use interaction::schema;
use interaction::{Definition, Interaction, Record, ValidationError};

#[derive(Parser)]
#[command(
    name = "interaction",
    version,
    about = "Validate records against a field schema."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a JSON record and print it filtered to the declared fields
    Check {
        /// JSON file mapping field names to rules
        #[arg(short, long)]
        schema: PathBuf,

        /// JSON object to check (read from stdin when omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
    /// List the fields a schema declares
    Fields {
        /// JSON file mapping field names to rules
        #[arg(short, long)]
        schema: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    match cli.command {
        Command::Check { schema, input } => handle_check(&schema, input).await,
        Command::Fields { schema } => handle_fields(&schema),
    }
}

async fn handle_check(schema_path: &Path, input: Option<String>) -> anyhow::Result<ExitCode> {
    let inputs = schema::load(schema_path)?;
    let check = Interaction::define(
        "check",
        Definition::new(|data: Record, done| {
            done.resolve(Value::Object(data));
            Ok(())
        })
        .inputs(inputs),
    )?;

    let raw = match input {
        Some(raw) => raw,
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("failed to read input from stdin")?;
            raw
        }
    };
    let record = match serde_json::from_str::<Value>(&raw).context("input is not valid JSON")? {
        Value::Object(record) => record,
        other => bail!("input must be a JSON object, got {}", other),
    };

    match check.call(record).await {
        Ok(filtered) => {
            println!("{}", serde_json::to_string_pretty(&filtered)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => match ValidationError::from_error(&err) {
            Some(invalid) => {
                println!("{}", serde_json::to_string_pretty(invalid)?);
                Ok(ExitCode::FAILURE)
            }
            None => Err(err),
        },
    }
}

fn handle_fields(schema_path: &Path) -> anyhow::Result<ExitCode> {
    let inputs = schema::load(schema_path)?;
    for (field, rule) in &inputs {
        let required = if rule.required { " (required)" } else { "" };
        println!("{}{}", field, required);
    }
    Ok(ExitCode::SUCCESS)
}
