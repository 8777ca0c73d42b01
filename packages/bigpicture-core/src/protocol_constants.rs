//! Fixed constants shared across the mirror.
//!
//! Tunable values (intervals, tolerances, retry policy) live in
//! [`Config`](crate::state::Config); their defaults are defined here so the
//! config, the services and the tests agree on one number.

// ─────────────────────────────────────────────────────────────────────────────
// Remote Calls
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum attempts for a single remote call before it is surfaced as fatal.
pub const MAX_REMOTE_ATTEMPTS: u32 = 10;

/// Constant term added to every rate-limit backoff (milliseconds).
pub const RATE_LIMIT_BASE_DELAY_MS: u64 = 1000;

/// Backoff applied after any other transient failure (seconds).
pub const GENERIC_BACKOFF_SECS: u64 = 60;

/// Retry-After assumed when a 429 response omits the header (seconds).
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Timeout for a single HTTP request to the remote service (seconds).
pub const REMOTE_TIMEOUT_SECS: u64 = 10;

/// Base URL of the vendor Web API.
pub const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Token endpoint of the vendor accounts service.
pub const ACCOUNTS_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Largest page size the Web API accepts for track listings.
pub const MAX_PAGE_SIZE: u32 = 50;

// ─────────────────────────────────────────────────────────────────────────────
// Scheduling and Diffing
// ─────────────────────────────────────────────────────────────────────────────

/// Default interval between poll ticks (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default interval between heartbeat events (seconds).
///
/// Stays below the common 30 s idle timeout of reverse proxies.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 25;

/// Default deviation from the extrapolated progress that forces it into a diff (milliseconds).
pub const DEFAULT_PROGRESS_TOLERANCE_MS: u64 = 3000;

/// Default capacity of each subscriber's outgoing event queue.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 32;

// ─────────────────────────────────────────────────────────────────────────────
// Context Resolution
// ─────────────────────────────────────────────────────────────────────────────

/// Number of playlist tracks fetched for the listing.
pub const PLAYLIST_PREFIX_SIZE: usize = 200;

/// Albums up to this many tracks are served from the first page alone.
pub const ALBUM_IMMEDIATE_FETCH_LIMIT: usize = 50;

/// A "single" release with more tracks than this is labelled an EP.
pub const SINGLE_MAX_TRACKS: usize = 3;

/// A "single" release running longer than this is labelled an EP (milliseconds).
pub const SINGLE_MAX_DURATION_MS: u64 = 10 * 60 * 1000;

/// Display name of the saved-tracks collection.
pub const FAVORITES_NAME: &str = "Liked Songs";

/// Prefix for albums whose current track is not part of the album listing.
pub const QUEUE_PREFIX: &str = "QUEUE ⋅ ";

// ─────────────────────────────────────────────────────────────────────────────
// Sentinels
// ─────────────────────────────────────────────────────────────────────────────

/// Explicit "empty" value; an absent field always means "unchanged".
pub const BLANK: &str = "BLANK";

/// Release year of local files.
pub const LOCAL_RELEASE: &str = "LOCAL";

/// Listing index of an item that is not part of the listing.
pub const NOT_IN_LISTING: i32 = -1;

// ─────────────────────────────────────────────────────────────────────────────
// Artwork
// ─────────────────────────────────────────────────────────────────────────────

/// Search endpoint used by the external artwork lookup.
pub const ITUNES_SEARCH_URL: &str = "https://itunes.apple.com/search";

/// Brightness reported when an artwork cannot be analyzed.
pub const FALLBACK_BRIGHTNESS: f64 = 0.5;
