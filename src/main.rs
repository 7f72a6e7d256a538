use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use tracing::info;

mod cache;
mod classify;
mod fetch;
mod filter;
mod models;
mod openreview;
mod pipeline;
mod report;
mod scores;
mod venue;

use cache::CacheStore;
use classify::{ControversyConfig, DEFAULT_LOW_SCORE_THRESHOLD, DEFAULT_MEAN_THRESHOLD};
use filter::{MatchPolicy, TopicFilter};
use openreview::{OpenReviewClient, DEFAULT_BASE_URL};
use pipeline::PipelineConfig;
use scores::ScoreBasis;
use venue::Venue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Console,
    Csv,
    Both,
}

#[derive(Parser)]
#[command(name = "rebuttal-finder")]
#[command(about = "Find controversial accepted papers with successful rebuttals", long_about = None)]
struct Cli {
    /// Conference year
    #[arg(long, default_value = "2025")]
    year: String,
    /// Conference name as used in venue ids, e.g. ICLR
    #[arg(long, default_value = "ICLR")]
    conference: String,
    /// Topic keywords matched against title and abstract
    #[arg(
        long,
        num_args = 1..,
        default_values_t = ["diffusion", "language", "text", "transformer", "llm", "token"].map(String::from)
    )]
    keywords: Vec<String>,
    /// How keywords combine
    #[arg(long, value_enum, default_value_t = MatchPolicy::Any)]
    match_policy: MatchPolicy,
    /// Any score at or below this marks a paper controversial
    #[arg(long, default_value_t = DEFAULT_LOW_SCORE_THRESHOLD)]
    low_score_threshold: i64,
    /// A mean score below this marks a paper controversial
    #[arg(long, default_value_t = DEFAULT_MEAN_THRESHOLD)]
    mean_threshold: f64,
    /// Which review score feeds the classifier
    #[arg(long, value_enum, default_value_t = ScoreBasis::Final)]
    score_basis: ScoreBasis,
    /// Recover initial scores from each review's edit history
    #[arg(long)]
    check_edits: bool,
    /// Process at most this many accepted, on-topic papers
    #[arg(long)]
    limit: Option<usize>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Both)]
    format: OutputFormat,
    /// CSV destination, defaults to rebuttal_candidates_<conference>_<year>.csv
    #[arg(long)]
    output: Option<PathBuf>,
    /// Print the distinct venue ids and labels of all submissions, then exit
    #[arg(long)]
    inspect_venues: bool,
    #[arg(long, env = "OPENREVIEW_CACHE_DIR", default_value = "cache")]
    cache_dir: PathBuf,
    #[arg(long, env = "OPENREVIEW_BASEURL", default_value = DEFAULT_BASE_URL)]
    base_url: String,
    #[arg(long, env = "OPENREVIEW_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let venue = Venue::new(&cli.conference, &cli.year);
    let cache = CacheStore::open(&cli.cache_dir)?;
    let client = OpenReviewClient::new(&cli.base_url, cli.token.clone())
        .context("failed to initialize review platform client")?;

    info!(
        "Using {} (cache at {})",
        venue.domain(),
        cache.root().display()
    );

    if cli.inspect_venues {
        let notes = fetch::fetch_submissions(&client, &cache, &venue).await?;
        print!("{}", report::build_venue_inventory(&notes));
        return Ok(());
    }

    let config = PipelineConfig {
        topic: TopicFilter::new(&cli.keywords, cli.match_policy),
        controversy: ControversyConfig {
            mean_threshold: cli.mean_threshold,
            low_score_threshold: cli.low_score_threshold,
        },
        basis: cli.score_basis,
        check_edits: cli.check_edits,
        limit: cli.limit,
    };

    let summary = pipeline::run(&client, &cache, &venue, &config).await?;
    for (reason, count) in summary.skip_counts() {
        info!("Skipped {count} papers: {reason}");
    }

    let mut results = summary.into_candidates();
    report::sort_results(&mut results);
    info!("Found {} candidate papers", results.len());

    if matches!(cli.format, OutputFormat::Console | OutputFormat::Both) {
        print!(
            "{}",
            report::build_report(&venue, config.topic.keywords(), Utc::now(), &results)
        );
    }

    if matches!(cli.format, OutputFormat::Csv | OutputFormat::Both) {
        let out = cli.output.unwrap_or_else(|| {
            PathBuf::from(format!(
                "rebuttal_candidates_{}_{}.csv",
                venue.conference, venue.year
            ))
        });
        report::write_csv(&out, &results)?;
        info!("Results written to {}", out.display());
    }

    Ok(())
}
