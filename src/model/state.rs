//! Per-session state owned by the bridge

use super::timeline::TimelineAnchor;
use super::track::{PlaybackState, TrackIdentity};

/// Tracks whether artwork for the current album has been delivered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArtworkCacheState {
    pub last_album_id: String,
    pub sent: bool,
    pub in_flight: bool,
}

impl ArtworkCacheState {
    /// Record the album currently playing. Returns true if it differs
    /// from the previous one, in which case artwork becomes eligible again.
    pub fn observe_album(&mut self, album_id: &str) -> bool {
        if album_id == self.last_album_id {
            return false;
        }
        self.last_album_id = album_id.to_string();
        self.sent = false;
        true
    }

    /// At most one job per session may be running.
    pub fn should_start(&self, has_thumbnail: bool) -> bool {
        has_thumbnail && !self.sent && !self.in_flight
    }
}

/// Everything the bridge knows about the attached session.
///
/// Reset wholesale whenever the session changes.
#[derive(Debug, Default)]
pub struct BridgeState {
    pub track: Option<TrackIdentity>,
    pub playback: Option<PlaybackState>,
    pub anchor: Option<TimelineAnchor>,
    pub artwork: ArtworkCacheState,
    /// Bumped on every session change so late artwork results can be told apart
    pub generation: u64,
}

impl BridgeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.track = None;
        self.playback = None;
        self.anchor = None;
        self.artwork = ArtworkCacheState::default();
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_some_and(PlaybackState::is_playing)
    }
}
