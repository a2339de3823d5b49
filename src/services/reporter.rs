//! Result reporting
//!
//! Turns a finished batch into the three output artifacts: the playlist of
//! working entries, `unavailable.csv` and `report.json`.

use std::path::Path;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::OutputConfig;
use crate::errors::AppResult;
use crate::models::{BatchOutcome, CandidateEntry};

const PLAYLIST_HEADER: &str = "#EXTM3U";
const DEFAULT_METADATA: &str = "#EXTINF:-1,Unknown";
const UNKNOWN_NAME: &str = "Unknown";
const CSV_HEADER: &str = "url,reason\n";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Channel title of an `#EXTINF` line: the trimmed text after its last comma
///
/// ```rust
/// use m3u_prober::services::reporter::display_name;
///
/// assert_eq!(display_name(Some("#EXTINF:-1 tvg-name=\"a,b\",  News HD ")), "News HD");
/// assert_eq!(display_name(None), "Unknown");
/// ```
pub fn display_name(metadata: Option<&str>) -> &str {
    metadata
        .and_then(|meta| meta.rsplit_once(','))
        .map(|(_, title)| title.trim())
        .filter(|title| !title.is_empty())
        .unwrap_or(UNKNOWN_NAME)
}

/// Counts written to `report.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub timestamp: String,
    pub checked: usize,
    pub available: usize,
    pub unavailable: usize,
}

/// A URL that failed its probe and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnavailableEntry {
    pub url: String,
    pub reason: String,
}

/// Partitioned view of a batch, ready to render
#[derive(Debug, Clone, Default)]
pub struct ProbeReport {
    /// Sorted by display name, then URL
    pub available: Vec<CandidateEntry>,
    /// In probe order
    pub unavailable: Vec<UnavailableEntry>,
}

impl ProbeReport {
    pub fn from_batch(batch: &BatchOutcome) -> Self {
        let mut report = Self::default();
        for (entry, result) in &batch.entries {
            if result.ok {
                report.available.push(entry.clone());
            } else {
                report.unavailable.push(UnavailableEntry {
                    url: entry.url.clone(),
                    reason: result.reason.clone(),
                });
            }
        }

        report.available.sort_by(|a, b| {
            display_name(a.metadata.as_deref())
                .cmp(display_name(b.metadata.as_deref()))
                .then_with(|| a.url.cmp(&b.url))
        });
        report
    }

    pub fn checked(&self) -> usize {
        self.available.len() + self.unavailable.len()
    }

    /// `#EXTM3U` followed by a metadata line and a URL line per working entry
    pub fn render_playlist(&self) -> String {
        let mut out = String::from(PLAYLIST_HEADER);
        out.push('\n');
        for entry in &self.available {
            out.push_str(entry.metadata.as_deref().unwrap_or(DEFAULT_METADATA));
            out.push('\n');
            out.push_str(&entry.url);
            out.push('\n');
        }
        out
    }

    /// `url,reason` header, then one fully quoted row per failed URL
    pub fn render_unavailable_csv(&self) -> AppResult<String> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .quote_style(csv::QuoteStyle::Always)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(CSV_HEADER.as_bytes().to_vec());

        for entry in &self.unavailable {
            writer.write_record([entry.url.as_str(), entry.reason.as_str()])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn summary(&self, timestamp: String) -> ReportSummary {
        ReportSummary {
            timestamp,
            checked: self.checked(),
            available: self.available.len(),
            unavailable: self.unavailable.len(),
        }
    }

    /// Write the playlist, the CSV and the JSON summary, creating the output directory
    pub async fn write(&self, output: &OutputConfig) -> AppResult<ReportSummary> {
        if let Some(dir) = output.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        write_file(&output.path, self.render_playlist()).await?;
        write_file(&output.unavailable_path(), self.render_unavailable_csv()?).await?;

        let summary = self.summary(Local::now().format(TIMESTAMP_FORMAT).to_string());
        write_file(&output.report_path(), serde_json::to_string_pretty(&summary)?).await?;

        info!(
            "Wrote {} available entries to {} ({} unavailable)",
            summary.available,
            output.path.display(),
            summary.unavailable
        );
        Ok(summary)
    }
}

async fn write_file(path: &Path, contents: String) -> AppResult<()> {
    tokio::fs::write(path, contents).await?;
    Ok(())
}
