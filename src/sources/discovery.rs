//! Playlist discovery
//!
//! Finds extra playlist URLs from three places: named iptv-org presets, GitHub
//! code search and links on seed web pages. Discovery is best effort. A failed
//! request skips that item or stops that query and never fails the run.

use std::collections::HashSet;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::DiscoveryConfig;
use crate::config::defaults::{GITHUB_MAX_PAGES, GITHUB_PER_PAGE};
use crate::utils::http_client::FetchClient;
use crate::utils::url::UrlUtils;

const PRESETS: [(&str, &str); 5] = [
    ("all", "https://iptv-org.github.io/iptv/index.m3u"),
    ("cn", "https://iptv-org.github.io/iptv/countries/cn.m3u"),
    ("us", "https://iptv-org.github.io/iptv/countries/us.m3u"),
    ("sports", "https://iptv-org.github.io/iptv/categories/sports.m3u"),
    ("news", "https://iptv-org.github.io/iptv/categories/news.m3u"),
];

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const ATTRIBUTE_LINK_PATTERN: &str = r#"(?i)(?:href|src)=["']([^"']+)["']"#;
const BARE_URL_PATTERN: &str = r#"(?i)https?://[^\s"']+"#;

/// Playlist URLs for the given preset names, in order; unknown names are skipped
pub fn preset_urls<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    names
        .iter()
        .filter_map(|name| {
            let name = name.as_ref();
            let found = PRESETS
                .iter()
                .find(|(preset, _)| *preset == name)
                .map(|(_, url)| (*url).to_string());
            if found.is_none() {
                warn!("Unknown discovery preset '{}'", name);
            }
            found
        })
        .collect()
}

/// Whether a link points at an M3U or M3U8 playlist
pub fn is_playlist_link(link: &str) -> bool {
    let lower = link.to_lowercase();
    lower.ends_with(".m3u")
        || lower.ends_with(".m3u8")
        || lower.contains(".m3u8?")
        || lower.contains(".m3u?")
}

/// Playlist links in an HTML page: attribute values resolved against `base_url`,
/// then bare URLs in the text, without duplicates
pub fn extract_playlist_links(html: &str, base_url: &str) -> Vec<String> {
    let mut found = Vec::new();

    if let Ok(attribute_re) = Regex::new(ATTRIBUTE_LINK_PATTERN) {
        for captures in attribute_re.captures_iter(html) {
            let link = captures[1].trim();
            if link.is_empty() {
                continue;
            }
            let absolute = UrlUtils::resolve(base_url, link);
            if is_playlist_link(&absolute) {
                found.push(absolute);
            }
        }
    }

    if let Ok(bare_re) = Regex::new(BARE_URL_PATTERN) {
        found.extend(
            bare_re
                .find_iter(html)
                .map(|m| m.as_str().trim().to_string())
                .filter(|link| is_playlist_link(link)),
        );
    }

    dedup_preserving_order(found)
}

fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    /// Contents API URL of the matched file
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentMeta {
    download_url: Option<String>,
}

/// Runs GitHub search and page crawling with one shared client
pub struct DiscoveryService<'a> {
    client: &'a FetchClient,
    config: &'a DiscoveryConfig,
}

impl<'a> DiscoveryService<'a> {
    pub fn new(client: &'a FetchClient, config: &'a DiscoveryConfig) -> Self {
        Self { client, config }
    }

    /// GitHub results followed by crawl results
    pub async fn discover(&self, timeout: Duration) -> Vec<String> {
        let mut urls = Vec::new();
        if !self.config.github_queries.is_empty() {
            urls.extend(self.search_github(timeout).await);
        }
        if !self.config.crawl_urls.is_empty() {
            urls.extend(self.crawl_pages(timeout).await);
        }
        urls
    }

    fn github_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![("Accept", GITHUB_ACCEPT.to_string())];
        if let Some(token) = self.config.github_token.as_deref().filter(|t| !t.is_empty()) {
            headers.push(("Authorization", format!("Bearer {token}")));
        }
        headers
    }

    fn search_page_url(&self, query: &str, page: u32) -> Option<String> {
        let q = format!("(extension:m3u OR extension:m3u8) {query}");
        Url::parse_with_params(
            &self.config.github_search_url,
            &[
                ("q", q.trim().to_string()),
                ("per_page", GITHUB_PER_PAGE.to_string()),
                ("page", page.to_string()),
            ],
        )
        .map(String::from)
        .ok()
    }

    /// Raw `.m3u` download URLs found through GitHub code search, at most `github_max`
    pub async fn search_github(&self, timeout: Duration) -> Vec<String> {
        let owned_headers = self.github_headers();
        let headers: Vec<(&str, &str)> = owned_headers
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();
        let max = self.config.github_max;
        let mut urls = Vec::new();

        for query in &self.config.github_queries {
            let mut page = 1;
            while urls.len() < max && page <= GITHUB_MAX_PAGES {
                let Some(api_url) = self.search_page_url(query, page) else {
                    warn!("Invalid GitHub search endpoint {}", self.config.github_search_url);
                    return urls;
                };
                let response: SearchResponse =
                    match self.client.fetch_json(&api_url, timeout, &headers).await {
                        Ok(response) => response,
                        Err(e) => {
                            warn!("GitHub search for '{}' stopped: {}", query, e);
                            break;
                        }
                    };
                if response.items.is_empty() {
                    break;
                }

                for item in response.items {
                    if urls.len() >= max {
                        break;
                    }
                    let Some(content_api) = item.url else {
                        continue;
                    };
                    let meta: ContentMeta =
                        match self.client.fetch_json(&content_api, timeout, &headers).await {
                            Ok(meta) => meta,
                            Err(e) => {
                                debug!("Skipping search result {}: {}", content_api, e);
                                continue;
                            }
                        };
                    if let Some(download_url) = meta.download_url
                        && download_url.to_lowercase().ends_with(".m3u")
                    {
                        urls.push(download_url);
                    }
                }
                page += 1;
            }
        }

        debug!("GitHub search found {} playlists", urls.len());
        urls
    }

    /// Playlist links found on the configured seed pages
    pub async fn crawl_pages(&self, timeout: Duration) -> Vec<String> {
        let mut found = Vec::new();

        for page in &self.config.crawl_urls {
            match self.client.fetch_text_once(page, timeout).await {
                Ok(fetched) => {
                    let links = extract_playlist_links(&fetched.text, &fetched.final_url);
                    debug!("Found {} playlist links on {}", links.len(), page);
                    found.extend(links);
                }
                Err(e) => warn!("Could not crawl {}: {}", UrlUtils::obfuscate_credentials(page), e),
            }
        }

        dedup_preserving_order(found)
    }
}
