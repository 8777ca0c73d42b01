//! Events published to subscribers.

use serde::Serialize;

use crate::model::PlaybackSnapshot;

/// Outcome of one diff computation, and the unit of broadcast.
///
/// Serialized with a `type` tag; a `DATA` event carries the changed snapshot
/// fields flattened next to the tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffEvent {
    /// Nothing changed. Never broadcast.
    Empty,
    /// Payload-free keep-alive for idle push connections.
    Heartbeat,
    /// Changed fields (or every field, for a full snapshot).
    Data(PlaybackSnapshot),
}

impl DiffEvent {
    /// Event name used on the push stream.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Heartbeat => "HEARTBEAT",
            Self::Data(_) => "DATA",
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[must_use]
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }

    /// Returns the snapshot payload of a `DATA` event.
    #[must_use]
    pub fn snapshot(&self) -> Option<&PlaybackSnapshot> {
        match self {
            Self::Data(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}
