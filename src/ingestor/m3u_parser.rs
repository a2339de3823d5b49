//! Line-oriented M3U playlist parser
//!
//! Only `#EXTINF` lines are kept, as opaque metadata for the URL that follows
//! them. Other directives are ignored and malformed lines never fail the parse.

use crate::models::CandidateEntry;

const EXTINF_TAG: &str = "#EXTINF";

/// Parse playlist text into ordered `(metadata, url)` entries
///
/// Metadata is sticky until consumed: blank lines and other comments between an
/// `#EXTINF` line and its URL do not clear it, a newer `#EXTINF` replaces it, and
/// the next URL line takes it.
///
/// ```rust
/// use m3u_prober::ingestor::m3u_parser::parse_m3u_entries;
///
/// let entries = parse_m3u_entries("#EXTM3U\n#EXTINF:-1,News\nhttp://x/news.m3u8\n");
/// assert_eq!(entries.len(), 1);
/// assert_eq!(entries[0].metadata.as_deref(), Some("#EXTINF:-1,News"));
/// ```
pub fn parse_m3u_entries(text: &str) -> Vec<CandidateEntry> {
    let mut entries = Vec::new();
    let mut pending_metadata: Option<String> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with(EXTINF_TAG) {
            pending_metadata = Some(line.to_string());
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        entries.push(CandidateEntry::new(pending_metadata.take(), line));
    }

    entries
}
