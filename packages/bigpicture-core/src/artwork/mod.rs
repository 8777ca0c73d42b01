//! Artwork resolution and color extraction.
//!
//! - [`ArtworkChain`]: item → artwork URL, through the provider fallback chain
//! - [`ArtworkColorCache`]: artwork URL → [`ArtworkColors`](crate::model::ArtworkColors), memoized
//!
//! Apps pass raw configuration values via [`ArtworkConfig`]; core builds the
//! chain so the precedence order lives in one place.

mod cache;
mod palette;
mod providers;

use std::collections::HashMap;

use reqwest::Client;
use serde::{Deserialize, Serialize};

pub use cache::{ArtworkColorCache, ArtworkError, HttpImageSource, ImageSource};
pub use palette::{analyze, Bucket};
pub use providers::{
    ArtworkChain, ArtworkProvider, DefaultArtworkProvider, ExternalLookupProvider,
    ItemArtworkProvider, StaticArtworkProvider,
};

/// Configuration for artwork resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtworkConfig {
    /// Item URI or id → artwork URL overrides (highest precedence).
    pub overrides: HashMap<String, String>,

    /// Artwork used for local files.
    pub default_url: Option<String>,

    /// Whether to search a public catalog for items still lacking artwork.
    pub external_lookup: bool,
}

impl Default for ArtworkConfig {
    fn default() -> Self {
        Self {
            overrides: HashMap::new(),
            default_url: None,
            external_lookup: true,
        }
    }
}

impl ArtworkConfig {
    /// Builds the provider chain.
    ///
    /// Precedence:
    /// 1. `overrides` → [`StaticArtworkProvider`] (skipped when empty)
    /// 2. Item's own images → [`ItemArtworkProvider`]
    /// 3. `default_url` for local files → [`DefaultArtworkProvider`] (skipped when unset)
    /// 4. Catalog search → [`ExternalLookupProvider`] (when `external_lookup`)
    #[must_use]
    pub fn build_chain(&self, http: Client) -> ArtworkChain {
        let mut providers: Vec<Box<dyn ArtworkProvider>> = Vec::new();

        if !self.overrides.is_empty() {
            log::info!("[Artwork] {} static overrides configured", self.overrides.len());
            providers.push(Box::new(StaticArtworkProvider::new(self.overrides.clone())));
        }

        providers.push(Box::new(ItemArtworkProvider));

        if let Some(url) = self.default_url.as_ref().filter(|u| !u.is_empty()) {
            log::info!("[Artwork] Using default artwork for local files: {}", url);
            providers.push(Box::new(DefaultArtworkProvider::new(Some(url.clone()))));
        }

        if self.external_lookup {
            providers.push(Box::new(ExternalLookupProvider::new(http)));
        }

        ArtworkChain::new(providers)
    }
}
