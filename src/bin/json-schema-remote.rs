//! json-schema-remote CLI
//!
//! Validates a JSON document against a JSON Schema, either of which may be a
//! URL or a local file.

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use json_schema_remote::{
    is_url, RemoteValidator, ValidateError, ValidatorOptions, DEFAULT_MAX_ROUNDS,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "json-schema-remote")]
#[command(about = "Validate JSON data against a JSON Schema, fetching referenced schemas on demand")]
#[command(version)]
struct Cli {
    /// Data to validate: URL or path to a JSON file
    data: String,

    /// Schema to validate against: URL or path to a JSON file
    schema: String,

    /// Timeout for each remote fetch, in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Give up after this many resolve-and-retry rounds
    #[arg(long, default_value_t = DEFAULT_MAX_ROUNDS)]
    max_rounds: usize,

    /// Output results as JSON (for automation)
    #[arg(long)]
    json: bool,

    /// Log every remote fetch
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(()) => {
            if cli.json {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("✓ Successfully validated");
            }
            ExitCode::SUCCESS
        }
        Err(failure) => {
            failure.report(cli.json);
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// A failed run: either a validation error or a problem reading arguments.
enum Failure {
    Validate(ValidateError),
    Argument(String),
}

impl Failure {
    fn report(&self, json_output: bool) {
        let (message, errors) = match self {
            Failure::Validate(e) => (e.to_string(), e.errors()),
            Failure::Argument(message) => (message.clone(), &[][..]),
        };

        if json_output {
            let output = serde_json::json!({
                "valid": false,
                "error": message,
                "errors": errors,
            });
            println!("{}", output);
        } else {
            eprintln!("{}", message);
            if !errors.is_empty() {
                match serde_json::to_string(errors) {
                    Ok(encoded) => eprintln!("{}", encoded),
                    Err(e) => eprintln!("Error serializing details: {}", e),
                }
            }
        }
    }
}

async fn run(cli: &Cli) -> Result<(), Failure> {
    let data = argument_value(&cli.data)?;
    let schema = argument_value(&cli.schema)?;

    let options = ValidatorOptions::new()
        .timeout(Duration::from_secs(cli.timeout))
        .max_rounds(cli.max_rounds);
    let validator = RemoteValidator::builder()
        .options(options)
        .build()
        .map_err(|e| Failure::Argument(format!("Error: cannot create HTTP client: {}", e)))?;

    validator
        .validate(data, schema)
        .await
        .map_err(Failure::Validate)
}

/// URLs pass through as strings; existing files are read and parsed.
/// Anything else is passed through and rejected by the validator.
fn argument_value(arg: &str) -> Result<Value, Failure> {
    if is_url(arg) {
        return Ok(Value::String(arg.to_string()));
    }

    let path = Path::new(arg);
    if !path.is_file() {
        return Ok(Value::String(arg.to_string()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Failure::Argument(format!("Error: cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content).map_err(|e| {
        Failure::Argument(format!("Error: invalid JSON in {}: {}", path.display(), e))
    })
}
