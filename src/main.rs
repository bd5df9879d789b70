//! # pagechain CLI
//!
//! Runs the pipeline stages either behind an HTTP server (the way they are
//! deployed) or one-shot from the command line.
//!
//! - `serve`: HTTP surface for push-delivered triggers
//! - `scrape`: fetch and store one page
//! - `process`: extract from one stored page
//! - `extract`: run the extraction engine on a local file, no side effects
//!
//! Settings come from the environment; the global flags override them.

mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use pagechain::config::PipelineConfig;
use pagechain::extraction::{
    domain_of, extract_links_with_base, DomainRules, Extraction, ExtractionEngine, ExtractionMode,
    LinkExtraction,
};
use pagechain::keys::KeyStrategy;
use pagechain::pipeline::Pipeline;
use pagechain::storage::{ObjectRef, StorageBackend};
use tracing::{info, instrument};
use url::Url;

#[derive(Parser)]
#[command(author, version, about = "Two-stage scrape and extract pipeline", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Overrides for the environment configuration
#[derive(Args, Debug)]
struct Settings {
    /// Bucket receiving raw HTML
    #[arg(long, global = true, env = "RAW_DATA_BUCKET")]
    raw_bucket: Option<String>,

    /// Bucket receiving extraction JSON
    #[arg(long, global = true, env = "PROCESSED_DATA_BUCKET")]
    processed_bucket: Option<String>,

    /// Topic for next-page crawl requests
    #[arg(long, global = true, env = "CRAWL_QUEUE_TOPIC")]
    topic: Option<String>,

    /// Per-domain selector rules file
    #[arg(long, global = true, env = "SCRAPER_CONFIG")]
    rules: Option<PathBuf>,

    /// Object store backend (local|gcs|memory)
    #[arg(long, global = true, env = "STORAGE_BACKEND")]
    storage: Option<StorageBackend>,

    /// Root directory of the local object store
    #[arg(long, global = true, env = "LOCAL_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,

    /// Extraction output (links|headings)
    #[arg(long, global = true, env = "EXTRACTION_MODE")]
    mode: Option<ExtractionMode>,

    /// Raw key derivation (deterministic|randomized)
    #[arg(long, global = true, env = "KEY_STRATEGY")]
    keys: Option<KeyStrategy>,
}

impl Settings {
    fn apply(self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(bucket) = self.raw_bucket {
            config.raw_bucket = Some(bucket);
        }
        if let Some(bucket) = self.processed_bucket {
            config.processed_bucket = Some(bucket);
        }
        if let Some(topic) = self.topic {
            config.crawl_topic = Some(topic);
        }
        if let Some(rules) = self.rules {
            config.rules_path = rules;
        }
        if let Some(storage) = self.storage {
            config.storage_backend = storage;
        }
        if let Some(root) = self.storage_root {
            config.local_storage_root = root;
        }
        if let Some(mode) = self.mode {
            config.extraction_mode = mode;
        }
        if let Some(keys) = self.keys {
            config.key_strategy = keys;
        }
        config
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the stages over HTTP
    Serve(ServeArgs),

    /// Fetch one page and store its raw HTML
    Scrape(ScrapeArgs),

    /// Extract from one stored page and write the JSON result
    Process(ProcessArgs),

    /// Run the extraction engine on a local HTML file and print the result
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on
    #[arg(short, long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    addr: String,
}

#[derive(Args, Debug)]
struct ScrapeArgs {
    /// URL to scrape (default: TARGET_URL)
    url: Option<String>,
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// Bucket holding the raw page
    #[arg(required = true)]
    bucket: String,

    /// Object name of the raw page
    #[arg(required = true)]
    name: String,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// HTML file to extract from
    #[arg(required = true)]
    file: PathBuf,

    /// Domain used for rule lookup and link resolution
    /// (default: the first component of the file path)
    #[arg(short, long)]
    domain: Option<String>,

    /// Resolve relative links against this URL instead of the domain
    #[arg(short, long, conflicts_with = "headings")]
    base_url: Option<String>,

    /// Extract level 1-3 headings instead of links
    #[arg(long)]
    headings: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _otel = telemetry::init_tracing_subscriber()?;

    let config = cli.settings.apply(PipelineConfig::from_env()?);

    match cli.command {
        Some(Commands::Serve(args)) => serve_command(args, config).await?,
        Some(Commands::Scrape(args)) => scrape_command(args, config).await?,
        Some(Commands::Process(args)) => process_command(args, config).await?,
        Some(Commands::Extract(args)) => extract_command(args, config).await?,
        None => {
            // If no command is provided, show help
            let _ = Cli::parse_from(["pagechain", "--help"]);
        }
    }

    Ok(())
}

async fn serve_command(args: ServeArgs, config: PipelineConfig) -> anyhow::Result<()> {
    let pipeline = Arc::new(Pipeline::from_config(config)?);

    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("Failed to bind {}", args.addr))?;

    pagechain::server::serve(
        listener,
        pipeline.clone(),
        pagechain::server::shutdown_signal(),
    )
    .await
    .context("HTTP server error")?;

    if let Ok(pipeline) = Arc::try_unwrap(pipeline) {
        pipeline.shutdown();
    }
    Ok(())
}

#[instrument(skip(config))]
async fn scrape_command(args: ScrapeArgs, config: PipelineConfig) -> anyhow::Result<()> {
    let url = args
        .url
        .or_else(|| config.target_url.clone())
        .ok_or_else(|| anyhow!("No URL given and TARGET_URL is not set"))?;

    let pipeline = Pipeline::from_config(config)?;
    let outcome = pipeline.scrape.scrape(&url).await?;

    println!(
        "Successfully scraped {} and uploaded to gs://{} ({} bytes)",
        outcome.url, outcome.object, outcome.bytes
    );
    pipeline.shutdown();
    Ok(())
}

#[instrument(skip(config))]
async fn process_command(args: ProcessArgs, config: PipelineConfig) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let object = ObjectRef::new(args.bucket, args.name);
    let outcome = pipeline.process.process(&object).await?;

    println!("{}", outcome.extraction.to_json_pretty()?);
    info!(
        "Wrote gs://{} ({}, {} items)",
        outcome.destination,
        outcome.policy,
        outcome.extraction.item_count()
    );
    pipeline.shutdown();
    Ok(())
}

#[instrument(skip(config))]
async fn extract_command(args: ExtractArgs, config: PipelineConfig) -> anyhow::Result<()> {
    let html = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let source_file = args.file.to_string_lossy().to_string();
    let rules = DomainRules::load(&config.rules_path);

    let extraction = match args.base_url {
        Some(base_url) => {
            let base = Url::parse(&base_url).with_context(|| format!("Invalid base URL {}", base_url))?;
            let domain = args
                .domain
                .or_else(|| base.host_str().map(str::to_string))
                .unwrap_or_default();
            let rule = rules.lookup(&domain).map(|(_, rule)| rule);
            let (next_page_url, result_urls) = extract_links_with_base(&html, &base, rule);

            Extraction::Links(LinkExtraction {
                source_file,
                next_page_url,
                result_urls,
            })
        }
        None => {
            let mode = if args.headings {
                ExtractionMode::Headings
            } else {
                config.extraction_mode
            };
            let engine = ExtractionEngine::new(mode, config.base_url_scheme.clone());
            let domain = args
                .domain
                .unwrap_or_else(|| domain_of(&source_file).to_string());

            let extracted = engine.extract_with_domain(&html, &source_file, &domain, &rules);
            info!("Extraction policy: {}", extracted.policy);
            extracted.extraction
        }
    };

    println!("{}", extraction.to_json_pretty()?);
    Ok(())
}
