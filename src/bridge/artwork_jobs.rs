//! Single-flight artwork encoding.
//!
//! Jobs run outside the bridge task and report back through a channel.
//! They get their inputs by value and never touch bridge state; the
//! outcome is integrated by the bridge task itself.

use std::sync::Arc;

use anyhow::Result;

use crate::artwork;
use crate::protocol::Frame;
use crate::provider::Thumbnail;

use super::Bridge;

#[derive(Debug)]
pub(crate) struct ArtworkOutcome {
    pub generation: u64,
    pub album_id: String,
    pub result: Result<Vec<Frame>>,
}

impl Bridge {
    pub(crate) fn start_artwork_job(&mut self, thumbnail: Arc<dyn Thumbnail>, album_id: String) {
        self.state.artwork.in_flight = true;

        let generation = self.state.generation;
        let spec = self.settings.artwork;
        let tx = self.art_tx.clone();
        tracing::debug!(album = %album_id, "Artwork job started");

        tokio::spawn(async move {
            let result: Result<Vec<Frame>> = async {
                let bytes = thumbnail.read_bytes().await?;
                tracing::debug!(bytes = bytes.len(), "Thumbnail received");
                Ok(artwork::encode_artwork_offloaded(bytes, spec).await?)
            }
            .await;

            let _ = tx.send(ArtworkOutcome {
                generation,
                album_id,
                result,
            });
        });
    }

    pub(crate) async fn finish_artwork(&mut self, outcome: ArtworkOutcome) {
        if outcome.generation != self.state.generation {
            tracing::debug!(album = %outcome.album_id, "Dropping artwork from a previous session");
            return;
        }
        self.state.artwork.in_flight = false;

        // The album moved on while we were encoding: whatever was skipped
        // in the meantime gets its turn now.
        if outcome.album_id != self.state.artwork.last_album_id {
            tracing::debug!(album = %outcome.album_id, "Artwork superseded");
            self.on_media_properties_changed().await;
            return;
        }

        match outcome.result {
            Ok(frames) => {
                tracing::info!(album = %outcome.album_id, frames = frames.len(), "Artwork queued");
                self.queue.push_all(frames);
                self.state.artwork.sent = true;
            }
            Err(e) => {
                tracing::warn!(album = %outcome.album_id, error = %e, "Artwork failed");
            }
        }
    }
}
