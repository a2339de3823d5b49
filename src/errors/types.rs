//! Error type definitions for the M3U prober
//!
//! Two families live here. `AppError` covers failures of the run itself
//! (configuration, I/O while writing reports, building the HTTP client).
//! `FetchError` and `ProbeFailure` describe why a single URL could not be
//! confirmed; their `Display` output is the reason string written to the
//! unavailable report, so the wording here is part of the output format.

use std::error::Error as StdError;

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// File system errors while reading inputs or writing reports
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Configuration serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Invalid configuration values
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// HTTP client construction or request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// CSV report writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Failure of a single HTTP fetch (after any retries)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server answered with an unexpected status code
    #[error("HTTP {0}")]
    Status(u16),

    /// Connection, DNS, TLS or body read failure
    #[error("{0}")]
    Transport(String),

    /// Every attempt timed out or failed without recording any detail
    #[error("unknown error")]
    Unknown,
}

impl FetchError {
    /// Build a transport error from a reqwest error, keeping the cause chain
    ///
    /// A timed-out request records no detail and maps to `Unknown`.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Unknown;
        }
        let detail = describe_reqwest_error(err);
        if detail.is_empty() {
            Self::Unknown
        } else {
            Self::Transport(detail)
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

/// Render a reqwest error without its URL, followed by its source chain
fn describe_reqwest_error(err: reqwest::Error) -> String {
    let err = err.without_url();
    let mut parts = vec![err.to_string()];
    let mut source = StdError::source(&err);
    while let Some(cause) = source {
        let text = cause.to_string();
        if !text.is_empty() && !parts.contains(&text) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.retain(|p| !p.is_empty());
    parts.join(": ")
}

/// Why a probed URL was judged unavailable
///
/// The `Display` strings are the machine-readable reasons of the report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// The manifest itself could not be fetched
    #[error("fetch fail: {0}")]
    ManifestFetch(FetchError),

    /// The manifest body does not start with `#EXTM3U`
    #[error("not m3u8 header")]
    NotManifest,

    /// The first variant playlist answered with a non-200 status
    #[error("nested HTTP {0}")]
    NestedStatus(u16),

    /// The first variant playlist could not be fetched
    #[error("nested fetch error: {0}")]
    NestedFetch(String),

    /// The variant playlist lists no media (strict mode)
    #[error("nested no segment")]
    NestedNoSegment,

    /// The manifest lists neither variants nor media (strict mode)
    #[error("no segment")]
    NoSegment,

    /// The last segment attempt answered with a status other than 200/206
    #[error("segment HTTP {0}")]
    SegmentStatus(u16),

    /// The last segment attempt failed at the transport level
    #[error("segment error: {0}")]
    SegmentError(String),

    /// Direct stream answered with a status other than 200/206
    #[error("HTTP {0}")]
    Status(u16),

    /// Direct stream request failed at the transport level
    #[error("{0}")]
    Transport(String),

    /// The probe task itself died before producing a result
    #[error("probe task failed: {0}")]
    TaskFailed(String),
}

impl ProbeFailure {
    /// Map the last segment fetch error into a segment failure
    pub fn from_segment_error(err: FetchError) -> Self {
        match err {
            FetchError::Status(code) => Self::SegmentStatus(code),
            other => Self::SegmentError(other.to_string()),
        }
    }

    /// Map a single-attempt direct stream fetch error into a failure
    pub fn from_direct_error(err: FetchError) -> Self {
        match err {
            FetchError::Status(code) => Self::Status(code),
            other => Self::Transport(other.to_string()),
        }
    }

    /// Map a nested manifest fetch error into a failure
    pub fn from_nested_error(err: FetchError) -> Self {
        match err {
            FetchError::Status(code) => Self::NestedStatus(code),
            other => Self::NestedFetch(other.to_string()),
        }
    }
}
