use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::{duration, option_duration};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub probe: ProbeConfig,
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub discovery: DiscoveryConfig,
    pub output: OutputConfig,
    pub schedule: ScheduleConfig,
}

/// Per-batch probing parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    /// Timeout applied to every individual HTTP request
    #[serde(with = "duration")]
    pub timeout: Duration,
    /// Maximum probes in flight across all hosts
    pub concurrency: usize,
    /// Maximum probes in flight against one host; 0 means `concurrency`
    pub per_host_limit: usize,
    /// Extra attempts for manifest and segment fetches
    pub retries: u32,
    /// Cap on probed entries after deduplication; 0 means unlimited
    pub max_items: usize,
    /// Require media bytes for manifests; when false a valid manifest is enough
    pub strict_segment: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub accept_invalid_certs: bool,
    /// Defaults to the probe timeout when unset
    #[serde(
        with = "option_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub connect_timeout: Option<Duration>,
}

/// Linear backoff between fetch attempts: `min(backoff_step * attempt, max_backoff)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(with = "duration")]
    pub backoff_step: Duration,
    #[serde(with = "duration")]
    pub max_backoff: Duration,
}

/// Where extra candidate URLs are discovered
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Named iptv-org playlists (`all`, `cn`, `us`, `sports`, `news`)
    pub presets: Vec<String>,
    /// GitHub code search keywords
    pub github_queries: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    pub github_max: usize,
    /// Code search endpoint
    pub github_search_url: String,
    /// Pages scanned for playlist links
    pub crawl_urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Playlist of working entries; the CSV and JSON reports go next to it
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Repeat the whole run this often; unset runs once
    #[serde(
        with = "option_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub interval: Option<Duration>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            per_host_limit: DEFAULT_PER_HOST_LIMIT,
            retries: DEFAULT_RETRIES,
            max_items: DEFAULT_MAX_ITEMS,
            strict_segment: DEFAULT_STRICT_SEGMENT,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_invalid_certs: DEFAULT_ACCEPT_INVALID_CERTS,
            connect_timeout: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_step: Duration::from_millis(DEFAULT_BACKOFF_STEP_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            presets: Vec::new(),
            github_queries: Vec::new(),
            github_token: None,
            github_max: DEFAULT_GITHUB_MAX,
            github_search_url: GITHUB_SEARCH_URL.to_string(),
            crawl_urls: Vec::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_OUTPUT_PATH),
        }
    }
}

/// Per-host slot count: 0 means `concurrency`, anything larger is capped at it
pub fn per_host_slots(concurrency: usize, per_host_limit: usize) -> usize {
    if per_host_limit == 0 {
        concurrency
    } else {
        per_host_limit.min(concurrency)
    }
}

impl ProbeConfig {
    /// Effective per-host slot count, never above the global limit
    pub fn effective_per_host_limit(&self) -> usize {
        per_host_slots(self.concurrency, self.per_host_limit)
    }
}

impl OutputConfig {
    pub fn unavailable_path(&self) -> PathBuf {
        self.sibling(UNAVAILABLE_FILE_NAME)
    }

    pub fn report_path(&self) -> PathBuf {
        self.sibling(REPORT_FILE_NAME)
    }

    fn sibling(&self, file_name: &str) -> PathBuf {
        match self.path.parent() {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when it does not exist
    pub fn load_from_file(config_file: impl AsRef<Path>) -> AppResult<Self> {
        let path = config_file.as_ref();
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        } else {
            debug!(
                "Config file {} not found, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Render the configuration as TOML, e.g. to seed a config file
    pub fn to_toml_string(&self) -> AppResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings that would make every probe fail or hang
    pub fn validate(&self) -> AppResult<()> {
        if self.probe.concurrency == 0 {
            return Err(AppError::configuration("probe.concurrency must be at least 1"));
        }
        if self.probe.timeout.is_zero() {
            return Err(AppError::configuration("probe.timeout must be greater than zero"));
        }
        if self.retry.max_backoff < self.retry.backoff_step {
            return Err(AppError::configuration(
                "retry.max_backoff must not be shorter than retry.backoff_step",
            ));
        }
        Ok(())
    }

    /// Connect timeout for the shared HTTP client
    pub fn connect_timeout(&self) -> Duration {
        self.http.connect_timeout.unwrap_or(self.probe.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_cli_defaults() {
        let config = Config::default();
        assert_eq!(config.probe.timeout, Duration::from_secs(6));
        assert_eq!(config.probe.concurrency, 50);
        assert_eq!(config.probe.per_host_limit, 8);
        assert_eq!(config.probe.retries, 2);
        assert_eq!(config.probe.max_items, 0);
        assert!(config.probe.strict_segment);
        assert!(config.http.accept_invalid_certs);
        assert_eq!(config.retry.backoff_step, Duration::from_millis(500));
        assert_eq!(config.retry.max_backoff, Duration::from_secs(2));
        assert_eq!(config.discovery.github_max, 30);
        assert_eq!(config.output.path, PathBuf::from("output/working.m3u"));
        assert!(config.schedule.interval.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_partial_toml_with_human_durations() {
        let config: Config = toml::from_str(
            r#"
            [probe]
            timeout = "10s"
            concurrency = 4

            [retry]
            backoff_step = "100ms"
            max_backoff = 1

            [schedule]
            interval = "15m"

            [discovery]
            presets = ["news"]
            "#,
        )
        .unwrap();

        assert_eq!(config.probe.timeout, Duration::from_secs(10));
        assert_eq!(config.probe.concurrency, 4);
        assert_eq!(config.probe.per_host_limit, 8);
        assert_eq!(config.retry.backoff_step, Duration::from_millis(100));
        assert_eq!(config.retry.max_backoff, Duration::from_secs(1));
        assert_eq!(config.schedule.interval, Some(Duration::from_secs(900)));
        assert_eq!(config.discovery.presets, vec!["news".to_string()]);
    }

    #[test]
    fn toml_round_trip_keeps_values() {
        let mut config = Config::default();
        config.schedule.interval = Some(Duration::from_secs(60));
        config.http.connect_timeout = Some(Duration::from_secs(3));
        let rendered = config.to_toml_string().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn load_from_file_reads_existing_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[probe]\nretries = 5").unwrap();
        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.probe.retries, 5);
    }

    #[test]
    fn load_from_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn validate_rejects_zero_concurrency_and_timeout() {
        let mut config = Config::default();
        config.probe.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.probe.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn effective_per_host_limit_is_capped() {
        let mut probe = ProbeConfig::default();
        assert_eq!(probe.effective_per_host_limit(), 8);
        probe.per_host_limit = 0;
        assert_eq!(probe.effective_per_host_limit(), 50);
        probe.per_host_limit = 500;
        assert_eq!(probe.effective_per_host_limit(), 50);
    }

    #[test]
    fn report_paths_sit_next_to_playlist() {
        let output = OutputConfig {
            path: PathBuf::from("out/dir/working.m3u"),
        };
        assert_eq!(output.unavailable_path(), PathBuf::from("out/dir/unavailable.csv"));
        assert_eq!(output.report_path(), PathBuf::from("out/dir/report.json"));

        let bare = OutputConfig {
            path: PathBuf::from("working.m3u"),
        };
        assert_eq!(bare.report_path(), PathBuf::from("report.json"));
    }
}
