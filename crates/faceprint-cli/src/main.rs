mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use faceprint_aws::AwsBackends;
use faceprint_core::{ApiRequest, HttpResponse, Indexer, Searcher};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "faceprint", about = "Index and search faces with Rekognition")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the images named by an S3 object-created notification
    Index {
        /// Notification JSON file, or "-" for stdin
        #[arg(short, long)]
        event: PathBuf,
    },
    /// Search the collection with a query image
    Search {
        /// API request JSON file with a base64 body, or "-" for stdin
        #[arg(short, long, required_unless_present = "image", conflicts_with = "image")]
        request: Option<PathBuf>,
        /// Local JPEG or PNG file to search with
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// Print the effective configuration
    Info,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;

    let default_filter = if config.debug_mode { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Index { event } => {
            let event: serde_json::Value = serde_json::from_str(&read_input(&event)?)
                .context("notification is not valid JSON")?;
            let backends = backends(&config).await;
            let indexer = Indexer::new(
                backends.engine,
                backends.store,
                backends.objects,
                config.recognition_params(),
            );

            let response = indexer.handle(&event).await;
            print_json(&response)?;
            if response.status_code != 200 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Search { request, image } => {
            let request = match (request, image) {
                (_, Some(image)) => {
                    let bytes = std::fs::read(&image)
                        .with_context(|| format!("cannot read {}", image.display()))?;
                    ApiRequest::from_image(&bytes)
                }
                (Some(request), None) => serde_json::from_str(&read_input(&request)?)
                    .context("search request is not valid JSON")?,
                (None, None) => anyhow::bail!("either --request or --image is required"),
            };
            let backends = backends(&config).await;
            let searcher = Searcher::new(backends.engine, backends.store, config.recognition_params());

            print_json(&searcher.handle(&request).await)?;
        }
        Commands::Info => {
            print_json(&HttpResponse::json(200, &config)?)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn backends(config: &Config) -> AwsBackends {
    let sdk = faceprint_aws::sdk_config(config.aws_region.as_deref()).await;
    tracing::info!(
        table = %config.table_id,
        collection = %config.collection_id,
        "using AWS backends"
    );
    AwsBackends::new(&sdk, &config.table_id)
}

/// Read a payload from a file, or from stdin when the path is "-".
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("cannot read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
