//! Candidate sources beyond the inputs given on the command line

pub mod discovery;

pub use discovery::{DiscoveryService, preset_urls};
