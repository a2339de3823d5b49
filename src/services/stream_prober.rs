//! Stream liveness probing
//!
//! A probe never returns an error: every failure is classified into a
//! [`ProbeFailure`] so one bad URL cannot abort a batch.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::ProbeConfig;
use crate::errors::ProbeFailure;
use crate::models::ProbeOutcome;
use crate::streaming::classification::{
    ManifestTarget, StreamKind, classify_url, first_media_reference, has_manifest_header,
    scan_manifest,
};
use crate::utils::http_client::FetchClient;
use crate::utils::url::UrlUtils;

/// Decides whether one URL is alive
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// Parameters applied uniformly to every probe of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub timeout: Duration,
    pub retries: u32,
    /// When false, a manifest without a confirmable segment is accepted as "playlist only"
    pub strict_segment: bool,
}

impl From<&ProbeConfig> for ProbeSettings {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            timeout: config.timeout,
            retries: config.retries,
            strict_segment: config.strict_segment,
        }
    }
}

/// HTTP prober for HLS manifests and direct media URLs
#[derive(Debug, Clone)]
pub struct StreamProber {
    client: FetchClient,
    settings: ProbeSettings,
}

impl StreamProber {
    pub fn new(client: FetchClient, settings: ProbeSettings) -> Self {
        Self { client, settings }
    }

    /// Outcome when a manifest is valid but no media could be located
    fn without_media(&self, strict_failure: ProbeFailure) -> ProbeOutcome {
        if self.settings.strict_segment {
            ProbeOutcome::Failed(strict_failure)
        } else {
            ProbeOutcome::PlaylistOnly
        }
    }

    /// Fetch the manifest, then confirm its first variant or segment
    pub async fn probe_manifest(&self, url: &str) -> ProbeOutcome {
        let ProbeSettings {
            timeout, retries, ..
        } = self.settings;

        let manifest = match self.client.fetch_text(url, timeout, retries).await {
            Ok(fetched) => fetched,
            Err(e) => return ProbeFailure::ManifestFetch(e).into(),
        };

        if !has_manifest_header(&manifest.text) {
            return ProbeFailure::NotManifest.into();
        }

        match scan_manifest(&manifest.text, &manifest.final_url) {
            Some(ManifestTarget::Variant(variant_url)) => self.probe_variant(&variant_url).await,
            Some(ManifestTarget::Segment(segment_url)) => self.probe_segment(&segment_url).await,
            None => self.without_media(ProbeFailure::NoSegment),
        }
    }

    async fn probe_variant(&self, variant_url: &str) -> ProbeOutcome {
        debug!("Following variant {}", UrlUtils::obfuscate_credentials(variant_url));
        let variant = match self
            .client
            .fetch_text_once(variant_url, self.settings.timeout)
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => return ProbeFailure::from_nested_error(e).into(),
        };

        match first_media_reference(&variant.text, &variant.final_url) {
            Some(segment_url) => self.probe_segment(&segment_url).await,
            None => self.without_media(ProbeFailure::NestedNoSegment),
        }
    }

    async fn probe_segment(&self, segment_url: &str) -> ProbeOutcome {
        debug!("Probing segment {}", UrlUtils::obfuscate_credentials(segment_url));
        match self
            .client
            .probe_segment(segment_url, self.settings.timeout, self.settings.retries)
            .await
        {
            Ok(_) => ProbeOutcome::Ok,
            Err(e) => ProbeFailure::from_segment_error(e).into(),
        }
    }

    /// Exploratory HEAD, then one ranged GET; no retries
    pub async fn probe_direct(&self, url: &str) -> ProbeOutcome {
        let timeout = self.settings.timeout;

        // HEAD result is informational only
        match self.client.head(url, timeout).await {
            Ok(status) => debug!("HEAD {} -> {}", UrlUtils::obfuscate_credentials(url), status),
            Err(e) => debug!("HEAD {} failed: {}", UrlUtils::obfuscate_credentials(url), e),
        }

        match self.client.fetch_range_direct(url, timeout).await {
            Ok(_) => ProbeOutcome::Ok,
            Err(e) => ProbeFailure::from_direct_error(e).into(),
        }
    }
}

#[async_trait]
impl Probe for StreamProber {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        match classify_url(url) {
            StreamKind::Manifest => self.probe_manifest(url).await,
            StreamKind::Direct => self.probe_direct(url).await,
        }
    }
}
