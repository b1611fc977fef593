//! passport-score CLI: refresh a score, fetch weights, project platform points.

use clap::{Args, Parser, Subcommand};
use passport_score::{
    Cache, FetchConfig, Fetcher, PlatformCatalog, RefreshConfig, ScoreClient, ScoreContext,
    SubmissionState,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let state = match cli.command {
        Command::Refresh(args) => run_refresh(args)?,
        Command::Weights(args) => run_weights(args)?,
        Command::Platforms(args) => run_platforms(args)?,
    };
    if state == SubmissionState::Error {
        std::process::exit(1);
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "passport-score")]
#[command(author = "gorusys <goru.connector@outlook.com>")]
#[command(about = "Refresh Passport scores and project stamp weights onto platforms")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the scorer until the address's score settles and print the result.
    Refresh(RefreshArgs),
    /// Fetch stamp weights (or read them from the cache when offline).
    Weights(WeightsArgs),
    /// Fetch weights, refresh the score, and print per-platform points.
    Platforms(PlatformsArgs),
}

#[derive(Args)]
struct ScorerArgs {
    /// Ceramic cache endpoint; defaults to PASSPORT_CERAMIC_CACHE_ENDPOINT or the public scorer.
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long, default_value = "./data/cache")]
    cache_dir: PathBuf,
    #[arg(long)]
    offline: bool,
    #[arg(long, default_value_t = RefreshConfig::default().max_attempts)]
    max_attempts: u32,
}

#[derive(Parser)]
struct RefreshArgs {
    #[arg(long)]
    address: String,
    /// Bearer token for the ceramic cache.
    #[arg(long)]
    token: String,
    #[command(flatten)]
    scorer: ScorerArgs,
}

#[derive(Parser)]
struct WeightsArgs {
    #[command(flatten)]
    scorer: ScorerArgs,
}

#[derive(Parser)]
struct PlatformsArgs {
    #[arg(long)]
    address: String,
    #[arg(long)]
    token: String,
    /// Platform catalog JSON; defaults to PASSPORT_PLATFORMS_PATH or ./config/platforms.json.
    #[arg(long)]
    catalog: Option<PathBuf>,
    #[command(flatten)]
    scorer: ScorerArgs,
}

fn cache_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("weights.sqlite")
}

fn fetcher(args: &ScorerArgs) -> Result<Arc<Fetcher>, Box<dyn std::error::Error>> {
    let cache = Cache::open(cache_path(&args.cache_dir))?;
    let mut config = FetchConfig::from_env();
    if let Some(url) = &args.base_url {
        config.base_url = url.clone();
    }
    config.offline = args.offline;
    Ok(Arc::new(Fetcher::new(config, Some(cache))?))
}

fn refresh_config(args: &ScorerArgs) -> RefreshConfig {
    RefreshConfig {
        max_attempts: args.max_attempts,
        ..Default::default()
    }
}

fn run_refresh(args: RefreshArgs) -> Result<SubmissionState, Box<dyn std::error::Error>> {
    let fetcher = fetcher(&args.scorer)?;
    let ctx = ScoreContext::new(
        fetcher.clone(),
        PlatformCatalog::default(),
        refresh_config(&args.scorer),
    );
    let rt = tokio::runtime::Runtime::new()?;
    let state = rt.block_on(ctx.refresh_score(&args.address, &args.token));
    let view = ctx.view(&args.address);
    info!(?state, requests = fetcher.request_count(), "refresh complete");
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(state)
}

fn run_weights(args: WeightsArgs) -> Result<SubmissionState, Box<dyn std::error::Error>> {
    let fetcher = fetcher(&args.scorer)?;
    let rt = tokio::runtime::Runtime::new()?;
    let weights = rt.block_on(fetcher.fetch_weights())?;
    info!(
        providers = weights.len(),
        requests = fetcher.request_count(),
        "weights complete"
    );
    println!("{}", serde_json::to_string_pretty(&weights)?);
    Ok(SubmissionState::Success)
}

fn run_platforms(args: PlatformsArgs) -> Result<SubmissionState, Box<dyn std::error::Error>> {
    let catalog = match &args.catalog {
        Some(path) => PlatformCatalog::load_from_path(path)?,
        None => PlatformCatalog::load(),
    };
    if catalog.is_empty() {
        warn!("platform catalog is empty");
    }
    let fetcher = fetcher(&args.scorer)?;
    let ctx = ScoreContext::new(fetcher.clone(), catalog, refresh_config(&args.scorer));
    let rt = tokio::runtime::Runtime::new()?;
    let state = rt.block_on(async {
        if let Err(e) = ctx.fetch_stamp_weights().await {
            warn!(error = %e, "continuing without stamp weights");
        }
        ctx.refresh_score(&args.address, &args.token).await
    });
    let view = ctx.view(&args.address);
    info!(
        ?state,
        platforms = view.scored_platforms.len(),
        requests = fetcher.request_count(),
        "platforms complete"
    );
    println!("{}", serde_json::to_string_pretty(&view.scored_platforms)?);
    if let Some(error) = &view.weights_error {
        warn!(error = %error, "platform points computed without stamp weights");
        return Ok(SubmissionState::Error);
    }
    Ok(state)
}
