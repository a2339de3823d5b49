/*!
 * Stream Classification Module
 * ============================
 *
 * Purpose:
 *   Pure, network-free helpers used by the prober to pick a probing strategy
 *   and to find what to fetch next inside an HLS manifest.
 *
 * Strategy:
 *   1. URL heuristic: anything mentioning `m3u8` is treated as a manifest,
 *      everything else as a direct media stream.
 *   2. Manifest scan: one ordered pass over trimmed, non-blank lines.
 *        * `#EXT-X-STREAM-INF` => the next non-comment line is a variant
 *          playlist (first variant wins, no bandwidth selection).
 *        * A non-comment line that looks like a `.ts`, `.aac` or `.mp4`
 *          segment => media segment.
 *      Whichever comes first in line order is the target.
 *   3. Variant playlist: its first non-comment line is the segment, whatever
 *      its extension.
 *
 * References are resolved against the URL the manifest was actually served
 * from (after redirects).
 */

use crate::utils::url::UrlUtils;

/// Probing strategy for a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// HLS manifest, probed by reading it and following its first media reference
    Manifest,
    /// Progressive or raw media, probed with a ranged GET
    Direct,
}

/// First fetchable reference found in a manifest, already absolutized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestTarget {
    /// Variant playlist listed under `#EXT-X-STREAM-INF`
    Variant(String),
    /// Media segment listed directly
    Segment(String),
}

const MANIFEST_HEADER: &str = "#EXTM3U";
const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF";
const SEGMENT_SUFFIXES: [&str; 3] = [".ts", ".aac", ".mp4"];
const SEGMENT_QUERY_MARKERS: [&str; 3] = [".ts?", ".aac?", ".mp4?"];

/// Classify a URL by its text alone
pub fn classify_url(url: &str) -> StreamKind {
    if url.to_lowercase().contains("m3u8") {
        StreamKind::Manifest
    } else {
        StreamKind::Direct
    }
}

/// Whether a body starts (after leading whitespace) with the `#EXTM3U` header
pub fn has_manifest_header(text: &str) -> bool {
    text.trim_start().starts_with(MANIFEST_HEADER)
}

/// Whether a manifest line references a media segment we know how to probe
pub fn looks_like_segment(line: &str) -> bool {
    let lower = line.to_lowercase();
    SEGMENT_SUFFIXES.iter().any(|ext| lower.ends_with(ext))
        || SEGMENT_QUERY_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn content_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Find the first variant or segment of a manifest, resolved against `base_url`
pub fn scan_manifest(text: &str, base_url: &str) -> Option<ManifestTarget> {
    let lines: Vec<&str> = content_lines(text).collect();

    for (idx, line) in lines.iter().enumerate() {
        if line.starts_with(STREAM_INF_TAG) {
            let variant = lines[idx + 1..]
                .iter()
                .find(|candidate| !candidate.starts_with('#'));
            if let Some(reference) = variant {
                return Some(ManifestTarget::Variant(UrlUtils::resolve(
                    base_url, reference,
                )));
            }
        } else if !line.starts_with('#') && looks_like_segment(line) {
            return Some(ManifestTarget::Segment(UrlUtils::resolve(base_url, line)));
        }
    }

    None
}

/// First non-comment line of a variant playlist, resolved against `base_url`
pub fn first_media_reference(text: &str, base_url: &str) -> Option<String> {
    content_lines(text)
        .find(|line| !line.starts_with('#'))
        .map(|line| UrlUtils::resolve(base_url, line))
}
