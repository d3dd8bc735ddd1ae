use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use collector::{Collector, DataStore};
use infonet_core::{AppConfig, Category};
use network_graph::{NetworkAnalysis, ResultWriter};
use reddit_client::RedditClient;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use visualizer::Visualizer;

const DEFAULT_LOG_FILTER: &str =
    "infonet=info,collector=info,reddit_client=info,network_graph=info,visualizer=info";

#[derive(Parser)]
#[command(name = "infonet", version, about = "Compare misinformation and factual subreddit networks")]
struct Cli {
    /// TOML configuration file; built-in defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download submissions and comments for the configured subreddits.
    Collect {
        /// Only collect one category (misinformation or factual).
        #[arg(long)]
        category: Option<Category>,
    },
    /// Build both networks, write every result table and render the plots.
    Analyze {
        #[arg(long)]
        skip_plots: bool,
    },
    /// Rebuild the analysis and write only the text report.
    Report,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::resolve(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Collect { category } => collect(&config, category).await,
        Command::Analyze { skip_plots } => analyze(&config, skip_plots),
        Command::Report => report(&config),
    }
}

async fn collect(config: &AppConfig, only: Option<Category>) -> Result<()> {
    config.require_credentials()?;

    let client = RedditClient::new(&config.reddit, config.collection.max_attempts)?;
    let collector = Collector::new(client, config);

    for category in Category::ALL {
        if only.is_some_and(|c| c != category) {
            continue;
        }
        let Some(group) = config.group(category) else {
            warn!("No subreddits configured for {}", category);
            continue;
        };
        info!("Collecting {} subreddits", category.label());
        let summary = collector
            .run(group)
            .await
            .with_context(|| format!("collecting {} data", category))?;
        info!(
            "Finished {}: {} of {} subreddits collected",
            category,
            summary.collected_subreddits(),
            group.subreddits.len()
        );
    }
    Ok(())
}

fn load_analysis(config: &AppConfig) -> Result<NetworkAnalysis> {
    let store = DataStore::new(config.collection.data_dir.clone());
    let misinformation = store
        .load_group(Category::Misinformation)
        .context("loading misinformation data; run `infonet collect` first")?;
    let factual = store
        .load_group(Category::Factual)
        .context("loading factual data; run `infonet collect` first")?;
    info!(
        "Loaded {} misinformation and {} factual records",
        misinformation.len(),
        factual.len()
    );
    if misinformation.is_empty() && factual.is_empty() {
        bail!("no records found under {}", store.root().display());
    }

    Ok(NetworkAnalysis::run(&misinformation, &factual, &config.analysis)?)
}

fn analyze(config: &AppConfig, skip_plots: bool) -> Result<()> {
    let analysis = load_analysis(config)?;

    let writer = ResultWriter::new(config.analysis.results_dir.clone());
    let written = writer.write_all(&analysis, &config.analysis)?;
    info!("Wrote {} result files to {}", written.len(), writer.dir().display());

    if skip_plots || !config.visualization.enabled {
        info!("Skipping plots");
        return Ok(());
    }
    let visualizer = Visualizer::new(config.visualization.clone(), config.analysis.results_dir.clone());
    let figures = visualizer.render_all(&analysis)?;
    info!("Rendered {} figures", figures.len());
    Ok(())
}

fn report(config: &AppConfig) -> Result<()> {
    let analysis = load_analysis(config)?;
    let path = ResultWriter::new(config.analysis.results_dir.clone())
        .write_report(&analysis, config.analysis.top_n)?;
    info!("Report written to {}", path.display());
    Ok(())
}
