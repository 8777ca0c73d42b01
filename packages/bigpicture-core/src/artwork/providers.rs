//! Artwork URL resolution.
//!
//! An [`ArtworkChain`] asks its providers in order and takes the first
//! non-empty answer:
//!
//! 1. **Static** ([`StaticArtworkProvider`]): configured URI/id → URL overrides
//! 2. **Item** ([`ItemArtworkProvider`]): largest image of the item's own artwork set
//! 3. **Default** ([`DefaultArtworkProvider`]): configured default URL for local files
//! 4. **External** ([`ExternalLookupProvider`]): best-effort search on a public catalog
//!
//! If nobody answers, the chain yields the [`BLANK`] sentinel.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::protocol_constants::{BLANK, ITUNES_SEARCH_URL};
use crate::remote::models::{Image, PlayingItem};

/// One step of the artwork fallback chain.
#[async_trait]
pub trait ArtworkProvider: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Returns an artwork URL for `item`, if this provider knows one.
    async fn lookup(&self, item: &PlayingItem) -> Option<String>;
}

/// Ordered list of providers; first non-empty result wins.
pub struct ArtworkChain {
    providers: Vec<Box<dyn ArtworkProvider>>,
}

impl ArtworkChain {
    pub fn new(providers: Vec<Box<dyn ArtworkProvider>>) -> Self {
        Self { providers }
    }

    /// Resolves the artwork URL of `item`, or [`BLANK`] if no provider has one.
    pub async fn resolve(&self, item: &PlayingItem) -> String {
        for provider in &self.providers {
            if let Some(url) = provider.lookup(item).await.filter(|u| !u.is_empty()) {
                log::trace!("[Artwork] {} provided {}", provider.name(), url);
                return url;
            }
        }
        BLANK.to_string()
    }

    /// Number of providers in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn item_keys(item: &PlayingItem) -> Vec<&str> {
    match item {
        PlayingItem::Track(t) => std::iter::once(t.uri.as_str())
            .chain(t.id.as_deref())
            .collect(),
        PlayingItem::Episode(e) => vec![e.uri.as_str(), e.id.as_str()],
        PlayingItem::Unsupported => Vec::new(),
    }
}

/// Picks the image with the largest pixel area.
///
/// Ties (including sets without reported dimensions) go to the earliest entry.
fn largest(images: &[Image]) -> Option<&Image> {
    images.iter().rev().max_by_key(|i| i.area())
}

// ─────────────────────────────────────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────────────────────────────────────

/// Manual overrides for items whose service artwork is missing or wrong.
pub struct StaticArtworkProvider {
    urls: HashMap<String, String>,
}

impl StaticArtworkProvider {
    /// Creates a provider keyed by item URI or id.
    pub fn new(urls: HashMap<String, String>) -> Self {
        Self { urls }
    }
}

#[async_trait]
impl ArtworkProvider for StaticArtworkProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn lookup(&self, item: &PlayingItem) -> Option<String> {
        item_keys(item)
            .into_iter()
            .find_map(|key| self.urls.get(key).cloned())
    }
}

/// The service's own artwork: album images for tracks, episode (then show)
/// images for episodes.
pub struct ItemArtworkProvider;

#[async_trait]
impl ArtworkProvider for ItemArtworkProvider {
    fn name(&self) -> &'static str {
        "item"
    }

    async fn lookup(&self, item: &PlayingItem) -> Option<String> {
        let image = match item {
            PlayingItem::Track(t) => t.album.as_ref().and_then(|a| largest(&a.images)),
            PlayingItem::Episode(e) => largest(&e.images)
                .or_else(|| e.show.as_ref().and_then(|s| largest(&s.images))),
            PlayingItem::Unsupported => None,
        };
        image.map(|i| i.url.clone())
    }
}

/// Configured default artwork for local files, which never carry images.
pub struct DefaultArtworkProvider {
    url: Option<String>,
}

impl DefaultArtworkProvider {
    pub fn new(url: Option<String>) -> Self {
        Self { url }
    }
}

#[async_trait]
impl ArtworkProvider for DefaultArtworkProvider {
    fn name(&self) -> &'static str {
        "default"
    }

    async fn lookup(&self, item: &PlayingItem) -> Option<String> {
        match item {
            PlayingItem::Track(t) if t.is_local => self.url.clone(),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    #[serde(default)]
    artwork_url100: Option<String>,
}

/// Best-effort lookup on the iTunes Search API by artist and title.
///
/// Any failure is logged and treated as "no result".
pub struct ExternalLookupProvider {
    http: Client,
    search_url: String,
}

impl ExternalLookupProvider {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            search_url: ITUNES_SEARCH_URL.to_string(),
        }
    }

    async fn search(&self, term: &str, entity: &str) -> Result<Option<String>, reqwest::Error> {
        let response: SearchResponse = self
            .http
            .get(&self.search_url)
            .query(&[("term", term), ("entity", entity), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .results
            .into_iter()
            .find_map(|r| r.artwork_url100)
            .map(|url| url.replace("100x100", "600x600")))
    }
}

#[async_trait]
impl ArtworkProvider for ExternalLookupProvider {
    fn name(&self) -> &'static str {
        "external"
    }

    async fn lookup(&self, item: &PlayingItem) -> Option<String> {
        let (term, entity) = match item {
            PlayingItem::Track(t) => (
                format!("{} {}", t.artist_names().join(" "), t.name),
                "song",
            ),
            PlayingItem::Episode(e) => (
                e.show.as_ref().map_or_else(|| e.name.clone(), |s| s.name.clone()),
                "podcast",
            ),
            PlayingItem::Unsupported => return None,
        };
        if term.trim().is_empty() {
            return None;
        }

        match self.search(&term, entity).await {
            Ok(url) => url,
            Err(e) => {
                log::warn!("[Artwork] External lookup for '{}' failed: {}", term, e);
                None
            }
        }
    }
}
