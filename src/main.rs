use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use m3u_prober::{
    config::Config,
    ingestor::read_inputs,
    models::CandidateEntry,
    services::{ProbeOrchestrator, ProbeReport},
    sources::preset_urls,
};

#[derive(Parser)]
#[command(name = "m3u-prober")]
#[command(version)]
#[command(about = "Filter M3U/HLS playlists down to streams that actually answer")]
#[command(long_about = None)]
struct Cli {
    /// Local M3U files, text files with one URL per line, or URLs
    #[arg(short, long, num_args = 0.., value_name = "ITEM")]
    input: Vec<String>,

    /// Output playlist path; unavailable.csv and report.json are written next to it
    #[arg(short, long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(short, long, value_name = "SECONDS")]
    timeout: Option<f64>,

    /// Maximum concurrent probes
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Add public playlists (all, cn, us, sports, news)
    #[arg(long, num_args = 0.., value_name = "PRESET")]
    discover: Vec<String>,

    /// Accept manifests that are valid even when no segment can be confirmed
    #[arg(long)]
    allow_playlist_only: bool,

    /// GitHub code search keywords used to discover playlists
    #[arg(long, num_args = 0.., value_name = "QUERY")]
    github_search: Vec<String>,

    /// GitHub access token for higher search rate limits
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Seed pages to crawl for .m3u/.m3u8 links
    #[arg(long, num_args = 0.., value_name = "URL")]
    crawl: Vec<String>,

    /// Repeat the run every N minutes until interrupted
    #[arg(long, value_name = "MINUTES")]
    interval_minutes: Option<u64>,

    /// Retry count for manifest and segment requests
    #[arg(long)]
    retries: Option<u32>,

    /// Concurrent probes per host (0 = same as --concurrency)
    #[arg(long)]
    per_host_limit: Option<usize>,

    /// Maximum entries to probe after deduplication (0 = unlimited)
    #[arg(long)]
    max_items: Option<usize>,

    /// Configuration file path
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration
    fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(out) = &self.out {
            config.output.path = out.clone();
        }
        if let Some(timeout) = self.timeout {
            config.probe.timeout = Duration::try_from_secs_f64(timeout)
                .map_err(|e| anyhow::anyhow!("Invalid --timeout {timeout}: {e}"))?;
        }
        if let Some(concurrency) = self.concurrency {
            config.probe.concurrency = concurrency;
        }
        if self.allow_playlist_only {
            config.probe.strict_segment = false;
        }
        if let Some(retries) = self.retries {
            config.probe.retries = retries;
        }
        if let Some(per_host_limit) = self.per_host_limit {
            config.probe.per_host_limit = per_host_limit;
        }
        if let Some(max_items) = self.max_items {
            config.probe.max_items = max_items;
        }
        if let Some(minutes) = self.interval_minutes {
            config.schedule.interval =
                (minutes > 0).then(|| Duration::from_secs(minutes.saturating_mul(60)));
        }

        config.discovery.presets.extend(self.discover.iter().cloned());
        config.discovery.github_queries.extend(self.github_search.iter().cloned());
        config.discovery.crawl_urls.extend(self.crawl.iter().cloned());
        if let Some(token) = self.github_token.as_ref().filter(|t| !t.is_empty()) {
            config.discovery.github_token = Some(token.clone());
        }
        Ok(())
    }
}

async fn run_once(
    orchestrator: &ProbeOrchestrator,
    candidates: &[CandidateEntry],
    config: &Config,
) -> Result<()> {
    let started = Instant::now();
    let batch = orchestrator.run_batch(candidates).await;
    let summary = ProbeReport::from_batch(&batch).write(&config.output).await?;
    info!(
        "Run complete: {}/{} available, written to {} in {:.1}s",
        summary.available,
        summary.checked,
        config.output.path.display(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Flag that flips to `true` once Ctrl-C has been received
///
/// The listener is installed immediately, so an interrupt that arrives while a
/// batch is running is still seen afterwards.
fn ctrl_c_flag() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(true);
            }
            Err(e) => warn!("Could not listen for Ctrl+C: {}", e),
        }
    });
    rx
}

/// Run `batch` repeatedly, `interval` apart, until `shutdown` turns true
///
/// A running batch always completes; the flag is checked after it and during the sleep.
async fn run_every<F, Fut>(interval: Duration, mut shutdown: watch::Receiver<bool>, mut batch: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    loop {
        if let Err(e) = batch().await {
            error!("Run failed: {:#}", e);
        }
        if *shutdown.borrow_and_update() {
            break;
        }
        tokio::select! {
            Ok(()) = shutdown.changed() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    info!("Interval mode stopped");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("m3u_prober={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting m3u-prober v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    cli.apply_to(&mut config)?;
    config.validate()?;

    info!(
        "Probe settings: timeout={}, concurrency={}, per_host={}, retries={}, strict_segment={}",
        humantime::format_duration(config.probe.timeout),
        config.probe.concurrency,
        config.probe.effective_per_host_limit(),
        config.probe.retries,
        config.probe.strict_segment
    );

    let mut candidates = read_inputs(&cli.input).await?;
    candidates.extend(
        preset_urls(&config.discovery.presets)
            .into_iter()
            .map(CandidateEntry::bare),
    );

    let has_remote_discovery =
        !config.discovery.github_queries.is_empty() || !config.discovery.crawl_urls.is_empty();
    if candidates.is_empty() && !has_remote_discovery {
        bail!("No input sources given. Example: m3u-prober -i seeds/urls.txt --discover cn");
    }
    info!("Loaded {} candidate entries", candidates.len());

    let orchestrator = ProbeOrchestrator::from_config(&config)?;

    let Some(interval) = config.schedule.interval else {
        return run_once(&orchestrator, &candidates, &config).await;
    };

    info!(
        "Interval mode: running every {}, press Ctrl+C to stop",
        humantime::format_duration(interval)
    );
    run_every(interval, ctrl_c_flag(), || {
        run_once(&orchestrator, &candidates, &config)
    })
    .await;

    Ok(())
}
