//! Playback snapshot data model.
//!
//! A single [`PlaybackSnapshot`] type serves both as the *full* representation
//! (every field populated) and as the *diff* representation (only changed
//! fields present). An absent field always means "unchanged since the last
//! event the client received"; a field that genuinely becomes empty is sent as
//! the [`BLANK`](crate::protocol_constants::BLANK) sentinel instead.

use serde::{Deserialize, Serialize, Serializer};

use crate::protocol_constants::FALLBACK_BRIGHTNESS;

/// Repeat mode of the remote player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    Context,
    Track,
}

impl RepeatMode {
    /// Parses the remote service's `repeat_state` value, treating unknown values as off.
    #[must_use]
    pub fn from_remote(value: &str) -> Self {
        match value {
            "context" => Self::Context,
            "track" => Self::Track,
            _ => Self::Off,
        }
    }
}

/// What kind of collection the current item is playing from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextType {
    Album,
    Ep,
    Single,
    Compilation,
    Playlist,
    Artist,
    Podcast,
    Search,
    QueueInAlbum,
    Favorites,
    Fallback,
}

/// An 8-bit RGB color. Serialized as a `#rrggbb` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Perceived brightness in `0.0..=1.0`.
    ///
    /// Uses the weighted-luminance formula `sqrt(0.299·r² + 0.587·g² + 0.114·b²) / 255`.
    #[must_use]
    pub fn brightness(self) -> f64 {
        let (r, g, b) = (f64::from(self.r), f64::from(self.g), f64::from(self.b));
        (0.299 * r * r + 0.587 * g * g + 0.114 * b * b).sqrt() / 255.0
    }

    /// Saturation-like measure in `0.0..=1.0` (HSV saturation).
    #[must_use]
    pub fn colorfulness(self) -> f64 {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        if max == 0 {
            return 0.0;
        }
        f64::from(max - min) / f64::from(max)
    }

    /// Scales the color so its largest channel becomes 255.
    ///
    /// Hue and saturation are preserved while the HSV value is maxed out.
    /// Pure black has no hue and becomes white.
    #[must_use]
    pub fn with_max_value(self) -> Self {
        let max = self.r.max(self.g).max(self.b);
        if max == 0 {
            return Self::WHITE;
        }
        let factor = 255.0 / f64::from(max);
        Self::new(
            scale_channel(self.r, factor),
            scale_channel(self.g, factor),
            scale_channel(self.b, factor),
        )
    }

    /// Formats as `#rrggbb`.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Multiplies every channel by `factor` (clamped to `0.0..=1.0`).
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        let factor = factor.clamp(0.0, 1.0);
        Self::new(
            scale_channel(self.r, factor),
            scale_channel(self.g, factor),
            scale_channel(self.b, factor),
        )
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

fn scale_channel(value: u8, factor: f64) -> u8 {
    (f64::from(value) * factor).round().clamp(0.0, 255.0) as u8
}

/// Colors derived from an artwork image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArtworkColors {
    /// Foreground color, always at maximum brightness.
    pub primary: Rgb,
    /// Background/accent color.
    pub secondary: Rgb,
    /// Estimated average brightness of the whole image (`0.0..=1.0`).
    pub brightness: f64,
}

impl ArtworkColors {
    /// Reported when the artwork is missing or cannot be analyzed.
    pub const FALLBACK: ArtworkColors = ArtworkColors {
        primary: Rgb::WHITE,
        secondary: Rgb::WHITE,
        brightness: FALLBACK_BRIGHTNESS,
    };
}

/// One entry of a context's track listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTrack {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub artists: Vec<String>,
    pub title: String,
    pub length_ms: u64,
}

/// The observed playback state at one instant, or the changed subset of it.
///
/// Field order matches the order in which the diff engine compares fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    /// Whether every field is populated (full representation).
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub full: bool,

    // Identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    // Transport
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuffle: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    // Context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_type: Option<ContextType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_description: Option<String>,

    // Track data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artists: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disc_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_total: Option<u64>,

    // Progress
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_current: Option<u64>,

    // Visuals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_colors: Option<ArtworkColors>,

    // List context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing: Option<Vec<ListTrack>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_index: Option<i32>,

    // Server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_time: Option<u64>,
}

impl PlaybackSnapshot {
    /// Returns the snapshot tagged as a full representation.
    #[must_use]
    pub fn into_full(mut self) -> Self {
        self.full = true;
        self
    }
}
