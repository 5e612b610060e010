//! Track identity and playback status

use crate::provider::MediaProperties;

/// The dedup key for "track changed": trimmed title, artist and album.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TrackIdentity {
    pub title: String,
    pub artist: String,
    pub album: String,
}

impl TrackIdentity {
    pub fn new(title: &str, artist: &str, album: &str) -> Self {
        Self {
            title: title.trim().to_string(),
            artist: artist.trim().to_string(),
            album: album.trim().to_string(),
        }
    }

    pub fn from_properties(props: &MediaProperties) -> Self {
        Self::new(&props.title, &props.artist, &props.album)
    }

    /// Providers report empty title and artist while switching tracks.
    pub fn is_ready(&self) -> bool {
        !(self.title.is_empty() && self.artist.is_empty())
    }

    /// Key used to decide whether artwork must be sent again
    pub fn album_id(&self) -> &str {
        &self.album
    }
}

/// Playback status as reported by the provider. Discriminants are the
/// codes sent in PLAYBACK_STATE frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PlaybackState {
    Closed = 0,
    Opened = 1,
    Changing = 2,
    Stopped = 3,
    Playing = 4,
    Paused = 5,
}

impl PlaybackState {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Closed),
            1 => Some(Self::Opened),
            2 => Some(Self::Changing),
            3 => Some(Self::Stopped),
            4 => Some(Self::Playing),
            5 => Some(Self::Paused),
            _ => None,
        }
    }

    pub fn is_playing(self) -> bool {
        self == Self::Playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_trimmed() {
        let id = TrackIdentity::new("  Song ", "Artist\n", " ");
        assert_eq!(id, TrackIdentity::new("Song", "Artist", ""));
        assert_eq!(id.album_id(), "");
    }

    #[test]
    fn test_identity_readiness() {
        assert!(!TrackIdentity::new(" ", "", "Album").is_ready());
        assert!(TrackIdentity::new("", "Artist", "").is_ready());
        assert!(TrackIdentity::new("Title", "", "").is_ready());
    }

    #[test]
    fn test_playback_codes_roundtrip() {
        for code in 0..=5 {
            let state = PlaybackState::from_code(code).unwrap();
            assert_eq!(state.code(), code);
        }
        assert_eq!(PlaybackState::from_code(6), None);
        assert!(PlaybackState::Playing.is_playing());
        assert!(!PlaybackState::Paused.is_playing());
    }
}
