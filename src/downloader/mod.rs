//! Domain list downloader
//!
//! Fetches plain-text allow and block sources, one entry per line, and turns
//! them into two deduplicated, disjoint domain sets. Entries keep the order in
//! which they were first seen across sources.

pub mod normalize;

pub use normalize::{is_valid_domain, normalize_line};

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RetryConfig;
use crate::error::DownloadError;
use crate::sync::RetryManager;

/// Default per-request timeout for list sources
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Allow and block entries for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSets {
    /// Entries never blocked
    pub allow: Vec<String>,
    /// Entries to block, none of which appear in `allow`
    pub block: Vec<String>,
}

/// Insertion-ordered set of domains
#[derive(Debug, Default)]
struct OrderedSet {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl OrderedSet {
    fn insert(&mut self, domain: String) -> bool {
        if self.seen.contains(&domain) {
            return false;
        }
        self.seen.insert(domain.clone());
        self.items.push(domain);
        true
    }
}

/// Downloads and normalizes domain list sources
#[derive(Debug, Clone)]
pub struct BlocklistDownloader {
    client: Client,
    retry: RetryManager,
}

impl BlocklistDownloader {
    /// Create a downloader with its own HTTP client
    pub fn new(retry: RetryConfig, timeout: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DownloadError::Client(e.to_string()))?;
        Ok(Self::with_client(client, retry))
    }

    /// Create a downloader around an existing reqwest `Client`
    pub fn with_client(client: Client, retry: RetryConfig) -> Self {
        Self {
            client,
            retry: RetryManager::new(retry),
        }
    }

    /// Fetch all sources and build the allow and block sets
    ///
    /// Allow sources are fetched first, then block sources, one at a time.
    /// Any failed source aborts the whole download. Entries present in the
    /// allow set are removed from the block set.
    pub async fn download_and_process(
        &self,
        allow_urls: &[String],
        block_urls: &[String],
        cancel: &CancellationToken,
    ) -> Result<DomainSets, DownloadError> {
        let mut allow = OrderedSet::default();
        let mut block = OrderedSet::default();

        if !allow_urls.is_empty() {
            info!(sources = allow_urls.len(), "Downloading allowlist sources");
        }
        for (i, url) in allow_urls.iter().enumerate() {
            info!(source = i + 1, total = allow_urls.len(), url = %url, "Fetching allowlist");
            self.fetch_into(url, &mut allow, cancel).await?;
        }

        if !block_urls.is_empty() {
            info!(sources = block_urls.len(), "Downloading blocklist sources");
        }
        for (i, url) in block_urls.iter().enumerate() {
            info!(source = i + 1, total = block_urls.len(), url = %url, "Fetching blocklist");
            self.fetch_into(url, &mut block, cancel).await?;
        }

        let before = block.items.len();
        let allow_seen = &allow.seen;
        block.items.retain(|domain| !allow_seen.contains(domain));
        let overlap = before - block.items.len();
        if overlap > 0 {
            info!(removed = overlap, "Removed allowlisted entries from blocklist");
        }

        info!(
            allow = allow.items.len(),
            block = block.items.len(),
            "Domain lists processed"
        );

        Ok(DomainSets {
            allow: allow.items,
            block: block.items,
        })
    }

    /// Download one source and add its valid entries to `dest`
    async fn fetch_into(
        &self,
        url: &str,
        dest: &mut OrderedSet,
        cancel: &CancellationToken,
    ) -> Result<usize, DownloadError> {
        let body = self
            .retry
            .execute(cancel, || self.fetch_once(url))
            .await
            .map_err(|e| {
                warn!(url = url, error = %e, "Download failed");
                e
            })?;

        let mut added = 0;
        let mut skipped = 0;
        for line in body.lines() {
            match normalize::parse_line(line) {
                Some(domain) => {
                    if dest.insert(domain) {
                        added += 1;
                    }
                }
                None => skipped += 1,
            }
        }

        debug!(url = url, skipped = skipped, "Skipped comment or invalid lines");
        info!(url = url, added = added, "Added unique domains from source");
        Ok(added)
    }

    async fn fetch_once(&self, url: &str) -> Result<String, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.text().await.map_err(|e| DownloadError::Read {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
