//! Provider module - The host's media-session API as seen by the bridge
//!
//! - `relay`: Hands provider notifications over to the bridge task
//! - `subscription`: Detachable change-notification registrations
//! - `windows`: Global System Media Transport Controls (Windows only)

mod relay;
mod subscription;
#[cfg(windows)]
pub mod windows;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{PlaybackState, TimelineSnapshot};

pub use relay::{event_relay, BridgeEvent, EventRelay, RelayReceiver};
pub use subscription::{SessionSubscriptions, Subscription};

/// Change notifications a session can raise
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionEventKind {
    MediaProperties,
    PlaybackInfo,
    Timeline,
}

impl SessionEventKind {
    pub const ALL: [SessionEventKind; 3] = [
        SessionEventKind::MediaProperties,
        SessionEventKind::PlaybackInfo,
        SessionEventKind::Timeline,
    ];
}

/// Raw access to album art bytes
#[async_trait]
pub trait Thumbnail: Send + Sync {
    async fn read_bytes(&self) -> Result<Vec<u8>>;
}

/// Media properties of the current item
#[derive(Clone, Default)]
pub struct MediaProperties {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub thumbnail: Option<Arc<dyn Thumbnail>>,
}

impl fmt::Debug for MediaProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaProperties")
            .field("title", &self.title)
            .field("artist", &self.artist)
            .field("album", &self.album)
            .field("thumbnail", &self.thumbnail.is_some())
            .finish()
    }
}

/// One controllable media-playing application
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Identifier of the application owning the session
    fn source_app_id(&self) -> String;

    async fn media_properties(&self) -> Result<MediaProperties>;

    fn playback_status(&self) -> Result<PlaybackState>;

    fn timeline(&self) -> Result<TimelineSnapshot>;

    /// Forward `kind` notifications to `relay` until the subscription is detached
    fn watch(&self, kind: SessionEventKind, relay: EventRelay) -> Result<Subscription>;
}

/// Session manager of the host OS
#[async_trait]
pub trait MediaProvider: Send + Sync {
    async fn current_session(&self) -> Result<Option<Arc<dyn MediaSession>>>;

    /// Forward "current session changed" notifications to `relay`
    fn watch_current_session(&self, relay: EventRelay) -> Result<Subscription>;
}

/// Create the provider for the platform we're running on.
#[cfg(windows)]
pub async fn platform_provider() -> Result<Arc<dyn MediaProvider>> {
    let provider = windows::WindowsMediaProvider::connect().await?;
    Ok(Arc::new(provider))
}

#[cfg(not(windows))]
pub async fn platform_provider() -> Result<Arc<dyn MediaProvider>> {
    Err(anyhow::anyhow!(
        "no media session provider is available on this platform"
    ))
}
