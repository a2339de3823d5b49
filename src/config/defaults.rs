/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Probe defaults
pub const DEFAULT_TIMEOUT_SECS: u64 = 6;
pub const DEFAULT_CONCURRENCY: usize = 50;
pub const DEFAULT_PER_HOST_LIMIT: usize = 8;
pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_MAX_ITEMS: usize = 0;
pub const DEFAULT_STRICT_SEGMENT: bool = true;

// HTTP client defaults
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";
pub const DEFAULT_ACCEPT_INVALID_CERTS: bool = true;

// Retry backoff defaults
pub const DEFAULT_BACKOFF_STEP_MS: u64 = 500;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 2000;

// Range probe
pub const RANGE_HEADER_VALUE: &str = "bytes=0-2048";

// Discovery defaults
pub const DEFAULT_GITHUB_MAX: usize = 30;
pub const GITHUB_SEARCH_URL: &str = "https://api.github.com/search/code";
pub const GITHUB_PER_PAGE: u32 = 50;
pub const GITHUB_MAX_PAGES: u32 = 5;

// Output defaults
pub const DEFAULT_OUTPUT_PATH: &str = "output/working.m3u";
pub const UNAVAILABLE_FILE_NAME: &str = "unavailable.csv";
pub const REPORT_FILE_NAME: &str = "report.json";
