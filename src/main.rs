use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use appraiser::Appraiser;
use clap::{Parser, Subcommand};
use config::{initialize_config, UserConfig, GLOBAL_CONFIG};
use decoration::{render_json, render_text, Format};
use document::Document;
use registry::Registry;
use tracing::{error, info};

mod appraiser;
mod config;
mod decoration;
mod document;
mod registry;

#[derive(Subcommand, Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Command {
    /// Compare every dependency requirement with the versions on the registry
    #[default]
    Check,
    /// Print the parsed dependency records as JSON, without network access
    Parse,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Manifest to inspect, may be given more than once
    #[arg(short, long, default_value = "Cargo.toml")]
    manifest_path: Vec<PathBuf>,
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Registry API endpoint, overrides the config file
    #[arg(short, long)]
    endpoint: Option<String>,
    /// "text" or "json"
    #[arg(short, long, value_enum, default_value = "text")]
    format: Format,
    /// Report pre-releases newer than the best stable match
    #[arg(long)]
    allow_prerelease: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

fn run_parse(documents: &[Document]) -> anyhow::Result<String> {
    let records: Vec<_> = documents
        .iter()
        .map(|doc| {
            serde_json::json!({
                "manifest": doc.path.display().to_string(),
                "lineCount": doc.lines.len(),
                "dependencies": doc.dependencies,
            })
        })
        .collect();
    serde_json::to_string_pretty(&records).context("failed to serialize records")
}

async fn run_check(documents: &[Document], format: Format) -> anyhow::Result<String> {
    let config = GLOBAL_CONFIG.read().clone();
    let registry = Arc::new(Registry::new(&config.registry)?);
    let appraiser = Appraiser::new(
        registry,
        config.registry.max_concurrent_fetches,
        config.allow_prerelease,
    );
    let appraisals = appraiser.appraise(documents).await;

    match format {
        Format::Text => Ok(render_text(&appraisals, &config.decoration_formatter)),
        Format::Json => render_json(&appraisals, &config.decoration_formatter)
            .context("failed to serialize report"),
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = UserConfig::load(args.config.as_deref())?;
    if let Some(endpoint) = args.endpoint {
        config.registry.endpoint = endpoint;
    }
    config.allow_prerelease |= args.allow_prerelease;
    initialize_config(config)?;

    let documents = args
        .manifest_path
        .iter()
        .map(|path| Document::read(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let output = match args.command.unwrap_or_default() {
        Command::Parse => run_parse(&documents)?,
        Command::Check => run_check(&documents, args.format).await?,
    };
    print!("{}", output);
    if !output.ends_with('\n') {
        println!();
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    //logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        error!("failed to install rustls crypto provider");
    }

    info!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    if let Err(e) = run(args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
