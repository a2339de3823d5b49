//! Probe Orchestrator Service
//!
//! Runs one batch: merge candidates with discovered URLs, expand remote `.m3u`
//! playlists, normalize and deduplicate, cap the batch size, then probe every
//! entry in its own task behind the two-tier limiter.

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use futures::future::join_all;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::config::{Config, DiscoveryConfig, ProbeConfig};
use crate::errors::{AppResult, ProbeFailure};
use crate::ingestor::parse_m3u_entries;
use crate::models::{BatchOutcome, CandidateEntry, ProbeOutcome, ProbeResult};
use crate::services::connection_limiter::HostLimiter;
use crate::services::stream_prober::{Probe, ProbeSettings, StreamProber};
use crate::sources::discovery::DiscoveryService;
use crate::utils::http_client::FetchClient;
use crate::utils::url::UrlUtils;

/// Whether a candidate is a remote playlist to be replaced by its entries
pub fn is_expandable(url: &str) -> bool {
    UrlUtils::is_url(url) && url.to_lowercase().ends_with(".m3u")
}

/// Append discovered URLs (without metadata) after the given candidates
pub fn merge_candidates(
    candidates: &[CandidateEntry],
    discovered: Vec<String>,
) -> Vec<CandidateEntry> {
    candidates
        .iter()
        .cloned()
        .chain(discovered.into_iter().map(CandidateEntry::bare))
        .collect()
}

/// Normalize every URL, drop empty ones and keep the first entry per normalized URL
pub fn normalize_and_dedup(entries: Vec<CandidateEntry>) -> Vec<CandidateEntry> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(entries.len());

    for entry in entries {
        let normalized = UrlUtils::normalize(&entry.url);
        if normalized.is_empty() || !seen.insert(normalized.clone()) {
            continue;
        }
        unique.push(entry.with_url(normalized));
    }

    unique
}

/// Keep at most `max_items` entries; 0 keeps everything
pub fn truncate_batch(entries: &mut Vec<CandidateEntry>, max_items: usize) {
    if max_items > 0 {
        entries.truncate(max_items);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

fn join_failure(err: JoinError) -> ProbeOutcome {
    let detail = if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        err.to_string()
    };
    ProbeFailure::TaskFailed(detail).into()
}

/// Drives one probe batch from raw candidates to paired results
pub struct ProbeOrchestrator {
    client: FetchClient,
    prober: Arc<dyn Probe>,
    probe_config: ProbeConfig,
    discovery: DiscoveryConfig,
}

impl ProbeOrchestrator {
    pub fn new(
        client: FetchClient,
        prober: Arc<dyn Probe>,
        probe_config: ProbeConfig,
        discovery: DiscoveryConfig,
    ) -> Self {
        Self {
            client,
            prober,
            probe_config,
            discovery,
        }
    }

    /// Orchestrator with the HTTP stream prober, sharing one client
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let client = FetchClient::from_config(config)?;
        let prober = StreamProber::new(client.clone(), ProbeSettings::from(&config.probe));
        Ok(Self::new(
            client,
            Arc::new(prober),
            config.probe.clone(),
            config.discovery.clone(),
        ))
    }

    /// Run discovery, expansion, deduplication and probing for one batch
    pub async fn run_batch(&self, candidates: &[CandidateEntry]) -> BatchOutcome {
        let started = Instant::now();

        let discovered = DiscoveryService::new(&self.client, &self.discovery)
            .discover(self.probe_config.timeout)
            .await;
        if !discovered.is_empty() {
            info!("Discovered {} additional playlist URLs", discovered.len());
        }

        let merged = merge_candidates(candidates, discovered);
        let expanded = self.expand_playlists(merged).await;
        let mut unique = normalize_and_dedup(expanded);
        truncate_batch(&mut unique, self.probe_config.max_items);
        info!("Probing {} unique entries", unique.len());

        let outcome = self.probe_all(unique).await;
        info!(
            "Batch finished: {}/{} available in {:.1}s",
            outcome.available(),
            outcome.checked(),
            started.elapsed().as_secs_f64()
        );
        outcome
    }

    /// Replace each remote `.m3u` candidate by the entries of the playlist it points to
    ///
    /// Playlists are fetched concurrently but their entries keep the input
    /// order. A playlist that cannot be fetched stays in the list as-is.
    pub async fn expand_playlists(&self, entries: Vec<CandidateEntry>) -> Vec<CandidateEntry> {
        let timeout = self.probe_config.timeout;
        let retries = self.probe_config.retries;
        let fetch_width = self.probe_config.concurrency.max(1);

        let expanded: Vec<Vec<CandidateEntry>> = futures::stream::iter(entries)
            .map(|entry| async move {
                if !is_expandable(&entry.url) {
                    return vec![entry];
                }
                match self.client.fetch_text(&entry.url, timeout, retries).await {
                    Ok(fetched) => {
                        let children = parse_m3u_entries(&fetched.text);
                        debug!(
                            "Expanded {} into {} entries",
                            UrlUtils::obfuscate_credentials(&entry.url),
                            children.len()
                        );
                        children
                    }
                    Err(e) => {
                        warn!(
                            "Could not expand playlist {}: {}",
                            UrlUtils::obfuscate_credentials(&entry.url),
                            e
                        );
                        vec![entry]
                    }
                }
            })
            .buffered(fetch_width)
            .collect()
            .await;

        expanded.into_iter().flatten().collect()
    }

    /// Probe every entry concurrently, one task each, and pair results by position
    pub async fn probe_all(&self, entries: Vec<CandidateEntry>) -> BatchOutcome {
        let limiter = Arc::new(HostLimiter::for_hosts(
            self.probe_config.concurrency,
            self.probe_config.per_host_limit,
            entries.iter().map(|entry| UrlUtils::host_key(&entry.url)),
        ));

        let handles: Vec<_> = entries
            .iter()
            .map(|entry| {
                let limiter = limiter.clone();
                let prober = self.prober.clone();
                let url = entry.url.clone();
                tokio::spawn(async move {
                    let host = UrlUtils::host_key(&url);
                    let _permit = match limiter.acquire(&host).await {
                        Ok(permit) => permit,
                        Err(e) => {
                            return ProbeOutcome::Failed(ProbeFailure::TaskFailed(e.to_string()));
                        }
                    };
                    let outcome = prober.probe(&url).await;
                    debug!(
                        "Probed {}: {:?}",
                        UrlUtils::obfuscate_credentials(&url),
                        outcome
                    );
                    outcome
                })
            })
            .collect();

        let joined = join_all(handles).await;

        let entries = entries
            .into_iter()
            .zip(joined)
            .map(|(entry, result)| {
                let outcome = result.unwrap_or_else(join_failure);
                (entry, ProbeResult::from(outcome))
            })
            .collect();

        BatchOutcome { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expandable_urls() {
        assert!(is_expandable("http://h/list.m3u"));
        assert!(is_expandable("https://h/LIST.M3U"));
        assert!(!is_expandable("http://h/live.m3u8"));
        assert!(!is_expandable("/local/list.m3u"));
        assert!(!is_expandable("http://h/list.m3u?x=1"));
    }

    #[test]
    fn merge_appends_discovered_without_metadata() {
        let candidates = vec![CandidateEntry::new(Some("#EXTINF:-1,A".into()), "http://a/1")];
        let merged = merge_candidates(&candidates, vec!["http://b/list.m3u".into()]);
        assert_eq!(
            merged,
            vec![
                CandidateEntry::new(Some("#EXTINF:-1,A".into()), "http://a/1"),
                CandidateEntry::bare("http://b/list.m3u"),
            ]
        );
    }

    #[test]
    fn dedup_keeps_first_seen_metadata_and_order() {
        let entries = vec![
            CandidateEntry::new(Some("#EXTINF:-1,First".into()), "HTTP://Example.com/a.m3u8#x"),
            CandidateEntry::bare("  "),
            CandidateEntry::bare("http://example.com/b.ts"),
            CandidateEntry::new(Some("#EXTINF:-1,Second".into()), "http://example.com/a.m3u8"),
        ];
        let unique = normalize_and_dedup(entries);
        assert_eq!(
            unique,
            vec![
                CandidateEntry::new(
                    Some("#EXTINF:-1,First".into()),
                    "http://example.com/a.m3u8"
                ),
                CandidateEntry::bare("http://example.com/b.ts"),
            ]
        );
    }

    #[test]
    fn truncation_respects_zero_as_unlimited() {
        let mut entries: Vec<_> = (0..5)
            .map(|i| CandidateEntry::bare(format!("http://h/{i}")))
            .collect();
        truncate_batch(&mut entries, 0);
        assert_eq!(entries.len(), 5);
        truncate_batch(&mut entries, 2);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].url, "http://h/1");
    }

    #[tokio::test]
    async fn join_failure_carries_panic_message() {
        let handle = tokio::spawn(async { panic!("boom") });
        let err = handle.await.unwrap_err();
        assert_eq!(
            ProbeResult::from(join_failure(err)),
            ProbeResult::failed("probe task failed: boom")
        );
    }
}
