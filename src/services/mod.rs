//! Service layer for the probing pipeline
//!
//! - [`connection_limiter`]: global and per-host concurrency slots
//! - [`stream_prober`]: liveness checks for manifests and direct streams
//! - [`orchestrator`]: one batch from raw candidates to paired results
//! - [`reporter`]: playlist, CSV and JSON output

pub mod connection_limiter;
pub mod orchestrator;
pub mod reporter;
pub mod stream_prober;

pub use connection_limiter::{HostLimiter, ProbePermit};
pub use orchestrator::ProbeOrchestrator;
pub use reporter::{ProbeReport, ReportSummary};
pub use stream_prober::{Probe, ProbeSettings, StreamProber};
