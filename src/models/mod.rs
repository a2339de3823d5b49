//! Core data types shared by the probing pipeline

use serde::{Deserialize, Serialize};

use crate::errors::ProbeFailure;

/// A playlist entry waiting to be probed
///
/// `metadata` is the raw `#EXTINF` line that preceded the URL, if any. It is
/// carried through untouched and written back out for available entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEntry {
    pub metadata: Option<String>,
    pub url: String,
}

impl CandidateEntry {
    pub fn new(metadata: Option<String>, url: impl Into<String>) -> Self {
        Self {
            metadata,
            url: url.into(),
        }
    }

    /// Entry with no metadata, as produced by text lists and discovery
    pub fn bare(url: impl Into<String>) -> Self {
        Self::new(None, url)
    }

    /// Copy of this entry pointing at a different URL
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self::new(self.metadata.clone(), url)
    }
}

/// Structured result of probing one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Media bytes were confirmed
    Ok,
    /// A valid manifest without confirmable media, accepted in relaxed mode
    PlaylistOnly,
    /// The URL is considered unavailable
    Failed(ProbeFailure),
}

impl ProbeOutcome {
    pub fn is_ok(&self) -> bool {
        !matches!(self, ProbeOutcome::Failed(_))
    }
}

impl From<ProbeFailure> for ProbeOutcome {
    fn from(failure: ProbeFailure) -> Self {
        ProbeOutcome::Failed(failure)
    }
}

/// Reportable `(ok, reason)` pair for one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub ok: bool,
    pub reason: String,
}

impl ProbeResult {
    pub const OK_REASON: &'static str = "ok";
    pub const PLAYLIST_ONLY_REASON: &'static str = "playlist only";

    pub fn ok() -> Self {
        Self {
            ok: true,
            reason: Self::OK_REASON.to_string(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: reason.into(),
        }
    }
}

impl From<ProbeOutcome> for ProbeResult {
    fn from(outcome: ProbeOutcome) -> Self {
        match outcome {
            ProbeOutcome::Ok => ProbeResult::ok(),
            ProbeOutcome::PlaylistOnly => ProbeResult {
                ok: true,
                reason: ProbeResult::PLAYLIST_ONLY_REASON.to_string(),
            },
            ProbeOutcome::Failed(failure) => ProbeResult::failed(failure.to_string()),
        }
    }
}

/// Every probed entry of one batch, paired positionally with its result
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub entries: Vec<(CandidateEntry, ProbeResult)>,
}

impl BatchOutcome {
    pub fn checked(&self) -> usize {
        self.entries.len()
    }

    pub fn available(&self) -> usize {
        self.entries.iter().filter(|(_, r)| r.ok).count()
    }

    pub fn unavailable(&self) -> usize {
        self.checked() - self.available()
    }
}
