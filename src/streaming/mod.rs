/**
 * streaming/mod.rs
 * =================
 * Public module entrypoint for stream inspection.
 *
 * Currently exposes:
 *   - classification: decide whether a URL is probed as an HLS manifest or as a
 *     direct media stream, and locate the first variant or media segment a
 *     manifest lists.
 */
pub mod classification;

pub use classification::{ManifestTarget, StreamKind, classify_url};
