//! Memoized artwork color extraction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use reqwest::Client;
use thiserror::Error;

use super::palette;
use crate::error::ErrorCode;
use crate::model::ArtworkColors;
use crate::protocol_constants::BLANK;

/// Errors local to artwork analysis. Logged, never propagated.
#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("Artwork request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Artwork request returned HTTP {0}")]
    Status(u16),

    #[error("Failed to decode artwork: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Artwork analysis task failed: {0}")]
    Task(String),
}

/// Fetches raw artwork bytes.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, ArtworkError>;
}

/// [`ImageSource`] over plain HTTP(S).
pub struct HttpImageSource {
    http: Client,
}

impl HttpImageSource {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> Result<Bytes, ArtworkError> {
        let res = self.http.get(url).send().await?;
        if !res.status().is_success() {
            return Err(ArtworkError::Status(res.status().as_u16()));
        }
        Ok(res.bytes().await?)
    }
}

/// Artwork URL → colors, memoized for the process lifetime.
///
/// Entries are never evicted; memory grows with the number of distinct
/// artworks seen. A URL whose image cannot be decoded is memoized with the
/// fallback colors so it is not fetched again. Fetch failures are not
/// memoized and are retried on the next lookup.
pub struct ArtworkColorCache {
    source: Arc<dyn ImageSource>,
    memo: DashMap<String, ArtworkColors>,
    analyses: AtomicUsize,
}

impl ArtworkColorCache {
    pub fn new(source: Arc<dyn ImageSource>) -> Self {
        Self {
            source,
            memo: DashMap::new(),
            analyses: AtomicUsize::new(0),
        }
    }

    /// Returns the colors of the artwork at `url`.
    ///
    /// The first lookup of a URL fetches and decodes the image (off the async
    /// runtime); later lookups are plain map reads.
    pub async fn colors_for(&self, url: &str) -> ArtworkColors {
        if url.is_empty() || url == BLANK {
            return ArtworkColors::FALLBACK;
        }
        if let Some(colors) = self.memo.get(url) {
            return *colors;
        }

        let bytes = match self.source.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("[Artwork] Failed to fetch {} ({}): {}", url, e.code(), e);
                return ArtworkColors::FALLBACK;
            }
        };

        self.analyses.fetch_add(1, Ordering::Relaxed);
        let analyzed = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes)
                .map(|img| palette::analyze(&img))
                .map_err(ArtworkError::from)
        })
        .await
        .map_err(|e| ArtworkError::Task(e.to_string()));

        let colors = match analyzed {
            Ok(Ok(colors)) => {
                log::debug!(
                    "[Artwork] {} -> primary {} secondary {} brightness {:.2}",
                    url,
                    colors.primary.to_hex(),
                    colors.secondary.to_hex(),
                    colors.brightness
                );
                colors
            }
            Ok(Err(e)) => {
                log::warn!("[Artwork] {} ({}): {}", url, e.code(), e);
                ArtworkColors::FALLBACK
            }
            Err(e) => {
                log::error!("[Artwork] {}: {}", url, e);
                return ArtworkColors::FALLBACK;
            }
        };

        self.memo.insert(url.to_string(), colors);
        colors
    }

    /// Number of memoized URLs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }

    /// Number of decode-and-analyze runs performed so far.
    #[must_use]
    pub fn analysis_count(&self) -> usize {
        self.analyses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Rgb;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(color: [u8; 4]) -> Bytes {
        let img = RgbaImage::from_pixel(16, 16, Rgba(color));
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        Bytes::from(buffer)
    }

    struct MockSource {
        body: Option<Bytes>,
        fetches: AtomicUsize,
    }

    impl MockSource {
        fn serving(body: Option<Bytes>) -> Arc<Self> {
            Arc::new(Self {
                body,
                fetches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ImageSource for MockSource {
        async fn fetch(&self, _url: &str) -> Result<Bytes, ArtworkError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.body.clone().ok_or(ArtworkError::Status(404))
        }
    }

    #[tokio::test]
    async fn lookups_are_idempotent_and_analyze_once() {
        let source = MockSource::serving(Some(png([0, 0, 200, 255])));
        let cache = ArtworkColorCache::new(source.clone());

        let first = cache.colors_for("https://i/cover").await;
        let second = cache.colors_for("https://i/cover").await;

        assert_eq!(first, second);
        assert_eq!(first.primary, Rgb::new(0, 0, 255));
        assert_eq!(cache.analysis_count(), 1);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn blank_url_skips_fetching() {
        let source = MockSource::serving(Some(png([0, 0, 200, 255])));
        let cache = ArtworkColorCache::new(source.clone());

        assert_eq!(cache.colors_for(BLANK).await, ArtworkColors::FALLBACK);
        assert_eq!(cache.colors_for("").await, ArtworkColors::FALLBACK);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetch_failures_fall_back_and_are_retried() {
        let source = MockSource::serving(None);
        let cache = ArtworkColorCache::new(source.clone());

        assert_eq!(cache.colors_for("https://i/gone").await, ArtworkColors::FALLBACK);
        assert_eq!(cache.colors_for("https://i/gone").await, ArtworkColors::FALLBACK);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn undecodable_images_are_memoized_as_fallback() {
        let source = MockSource::serving(Some(Bytes::from_static(b"not an image")));
        let cache = ArtworkColorCache::new(source.clone());

        assert_eq!(cache.colors_for("https://i/bad").await, ArtworkColors::FALLBACK);
        assert_eq!(cache.colors_for("https://i/bad").await, ArtworkColors::FALLBACK);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.analysis_count(), 1);
    }
}
