//! Utility modules for the m3u-prober application
//!
//! This module contains reusable utilities that can be used
//! across different parts of the system.

pub mod http_client;
pub mod retry;
pub mod url;

pub use http_client::{FetchClient, FetchedText};
pub use retry::RetryPolicy;
