//! Change detection for session notifications.
//!
//! Every handler swallows provider errors after logging them: a single
//! racing or malformed response must not take the event loop down.

use tokio::time::Instant;

use crate::model::{TimelineAnchor, TrackIdentity};
use crate::protocol::messages;
use crate::provider::MediaSession;

use super::Bridge;

/// When to replace the timeline anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AnchorRefresh {
    /// Only if the reported position moved
    IfMoved,
    /// Track change or playback start: the capture time must be reset
    Always,
}

impl Bridge {
    pub(crate) async fn on_media_properties_changed(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };

        let props = match session.media_properties().await {
            Ok(props) => props,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch media properties");
                return;
            }
        };

        let identity = TrackIdentity::from_properties(&props);
        if !identity.is_ready() {
            tracing::debug!("Metadata not ready");
            return;
        }

        if self.state.track.as_ref() != Some(&identity) {
            tracing::info!(
                title = %identity.title,
                artist = %identity.artist,
                album = %identity.album,
                "Now playing"
            );
            self.queue
                .push(messages::meta(&identity.title, &identity.artist, &identity.album));
            self.refresh_anchor(session.as_ref(), AnchorRefresh::Always);
            self.state.track = Some(identity.clone());
        } else {
            tracing::trace!("Track unchanged");
        }

        if self.state.artwork.observe_album(identity.album_id()) {
            tracing::debug!(album = %identity.album, "Album changed, artwork pending");
        }

        if self.state.artwork.should_start(props.thumbnail.is_some()) {
            if let Some(thumbnail) = props.thumbnail {
                self.start_artwork_job(thumbnail, identity.album);
            }
        }
    }

    pub(crate) fn on_playback_info_changed(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };

        let status = match session.playback_status() {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch playback info");
                return;
            }
        };

        // Fires far more often than the status actually changes
        if self.state.playback == Some(status) {
            return;
        }

        tracing::info!(?status, "Playback status changed");
        self.state.playback = Some(status);
        self.queue.push(messages::playback_state(status.code()));

        if status.is_playing() {
            self.refresh_anchor(session.as_ref(), AnchorRefresh::Always);
        }
    }

    /// Seeks and skips show up here well before the next tick
    pub(crate) fn on_timeline_changed(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        self.refresh_anchor(session.as_ref(), AnchorRefresh::IfMoved);
    }

    pub(crate) fn refresh_anchor(&mut self, session: &dyn MediaSession, mode: AnchorRefresh) {
        let snapshot = match session.timeline() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch timeline");
                return;
            }
        };

        let moved = self
            .state
            .anchor
            .is_none_or(|anchor| anchor.position() != snapshot.position);
        if !moved && mode == AnchorRefresh::IfMoved {
            tracing::trace!("Timeline position unchanged");
            return;
        }

        tracing::debug!(
            position_s = snapshot.position.as_secs(),
            duration_s = snapshot.duration.as_secs(),
            "Timeline anchored"
        );
        self.state.anchor = Some(TimelineAnchor::capture(snapshot, Instant::now()));
        self.queue
            .push(messages::timeline(snapshot.position, snapshot.duration));
    }
}
