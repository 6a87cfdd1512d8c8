mod display;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use imagescan_core::scan::fetch_findings;
use imagescan_core::{
    EcrClient, ImageIdentifier, Orchestrator, RegistryConfig, ScanRequestBuilder, ScanSpec,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "imagescan",
    version,
    about = "imagescan — trigger container image vulnerability scans",
    long_about = "Start vulnerability scans for the images in an Amazon ECR registry and collect the findings.\n\nWithout a subcommand every image of every repository is scanned."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// AWS region of the registry (defaults to AWS_REGION, then us-east-2)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Registry (account) id, defaults to the caller's registry
    #[arg(long, global = true)]
    registry_id: Option<String>,

    /// Registry API endpoint override
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true, env = "IMAGESCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Re-fetch findings up to N times while a scan is still running
    #[arg(long, global = true)]
    wait: Option<u32>,

    /// Log registry calls (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan every image of every repository in the registry
    Run,

    /// Scan selected tags of one repository (all tagged images if no tag is given)
    Scan {
        /// Repository name
        #[arg(short, long)]
        repository: String,

        /// Tag to scan, may be repeated
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Show the scan findings of one image
    Findings {
        /// Repository name
        #[arg(short, long)]
        repository: String,

        /// Image tag
        #[arg(short, long, required_unless_present = "digest", conflicts_with = "digest")]
        tag: Option<String>,

        /// Image digest
        #[arg(short, long)]
        digest: Option<String>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    let client = EcrClient::new(config.clone()).context("Failed to create registry client")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run(&client, &config, cli.format).await,
        Commands::Scan { repository, tags } => {
            cmd_scan(&client, &config, &repository, tags, cli.format).await
        }
        Commands::Findings {
            repository,
            tag,
            digest,
        } => {
            let image = ImageIdentifier {
                image_digest: digest,
                image_tag: tag,
            };
            cmd_findings(&client, &config, &repository, &image, cli.format).await
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "imagescan=info,imagescan_core=info",
        1 => "imagescan=debug,imagescan_core=debug",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Defaults, then the config file, then the environment, then flags.
fn load_config(cli: &Cli) -> Result<RegistryConfig> {
    let mut config = match &cli.config {
        Some(path) => RegistryConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RegistryConfig::default(),
    }
    .apply_env();

    if let Some(region) = &cli.region {
        config.region = region.clone();
    }
    if let Some(registry_id) = &cli.registry_id {
        config.registry_id = Some(registry_id.clone());
    }
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = Some(endpoint.clone());
    }
    if let Some(attempts) = cli.wait {
        config.findings.poll_attempts = attempts;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn cmd_run(client: &EcrClient, config: &RegistryConfig, format: OutputFormat) -> Result<()> {
    let report = Orchestrator::new(client, config)
        .run()
        .await
        .context("Image scan run aborted")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => display::print_run_report(&report),
    }
    Ok(())
}

async fn cmd_scan(
    client: &EcrClient,
    config: &RegistryConfig,
    repository: &str,
    tags: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    let spec = ScanSpec::new(
        &config.region,
        config.registry_id.as_deref(),
        repository,
        tags,
    );

    let outcomes = ScanRequestBuilder::new(client)
        .start(&spec)
        .await
        .with_context(|| format!("Failed to scan repository '{}'", repository))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcomes)?),
        OutputFormat::Text => display::print_scan_outcomes(&spec, &outcomes),
    }
    Ok(())
}

async fn cmd_findings(
    client: &EcrClient,
    config: &RegistryConfig,
    repository: &str,
    image: &ImageIdentifier,
    format: OutputFormat,
) -> Result<()> {
    let findings = fetch_findings(
        client,
        config.registry_id.as_deref(),
        repository,
        image,
        &config.findings,
    )
    .await
    .with_context(|| {
        format!(
            "Failed to fetch findings for {}:{}",
            repository,
            image.display_name()
        )
    })?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&findings)?),
        OutputFormat::Text => display::print_findings(repository, image, &findings),
    }
    Ok(())
}
