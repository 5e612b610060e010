//! Model module - Bridge state and data types
//!
//! - `track`: Track identity and playback status
//! - `timeline`: Timeline snapshot, anchor and extrapolation
//! - `state`: Artwork cache and the per-session bridge state

mod track;
mod timeline;
mod state;

pub use track::{PlaybackState, TrackIdentity};
pub use timeline::{TimelineAnchor, TimelineSnapshot};
pub use state::{ArtworkCacheState, BridgeState};
