//! Candidate ingestion from local files and command-line URLs

pub mod m3u_parser;

use std::path::Path;

use tracing::{debug, warn};

use crate::errors::AppResult;
use crate::models::CandidateEntry;
use crate::utils::url::UrlUtils;

pub use m3u_parser::parse_m3u_entries;

/// Decode file contents as UTF-8, falling back to Latin-1 for legacy playlists
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Candidates from a plain text list: one URL per non-blank, non-comment line
pub fn parse_url_list(text: &str) -> Vec<CandidateEntry> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(CandidateEntry::bare)
        .collect()
}

/// Read every input item into an ordered candidate list
///
/// Existing files are read (`.m3u` files parsed as playlists, anything else as a
/// URL list); other items are kept when they are http(s) URLs.
pub async fn read_inputs<S: AsRef<str>>(items: &[S]) -> AppResult<Vec<CandidateEntry>> {
    let mut candidates = Vec::new();

    for item in items {
        let item = item.as_ref();
        let path = Path::new(item);
        if tokio::fs::metadata(path).await.is_ok_and(|meta| meta.is_file()) {
            let bytes = tokio::fs::read(path).await?;
            let content = decode_text(&bytes);
            let entries = if item.to_lowercase().ends_with(".m3u") {
                parse_m3u_entries(&content)
            } else {
                parse_url_list(&content)
            };
            debug!("Read {} candidates from {}", entries.len(), path.display());
            candidates.extend(entries);
        } else if UrlUtils::is_url(item) {
            candidates.push(CandidateEntry::bare(item));
        } else {
            warn!("Ignoring input '{}': not a file or http(s) URL", item);
        }
    }

    Ok(candidates)
}
