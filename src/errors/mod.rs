//! Centralized error handling for the M3U prober
//!
//! Run-level failures surface as [`AppError`]. Per-URL failures never abort a
//! batch; they are carried as [`ProbeFailure`] values and rendered into the
//! reason column of the report.
//!
//! # Usage
//!
//! ```rust
//! use m3u_prober::errors::{AppResult, FetchError, ProbeFailure};
//!
//! fn example() -> AppResult<String> {
//!     let failure = ProbeFailure::ManifestFetch(FetchError::Status(404));
//!     Ok(failure.to_string())
//! }
//!
//! assert_eq!(example().unwrap(), "fetch fail: HTTP 404");
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for fetch Results
pub type FetchResult<T> = Result<T, FetchError>;
