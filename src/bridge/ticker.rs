//! Periodic position updates derived from the last anchor.
//!
//! No provider calls happen here, only arithmetic over the anchor.

use std::time::Duration;

use tokio::time::Instant;

use crate::protocol::messages;

use super::Bridge;

impl Bridge {
    /// Emit the extrapolated position if playing. Returns what was sent.
    pub(crate) fn tick(&mut self, now: Instant) -> Option<Duration> {
        if !self.state.is_playing() {
            return None;
        }
        let anchor = self.state.anchor?;
        let position = anchor.extrapolate(now);

        tracing::trace!(position_s = position.as_secs(), "Timeline tick");
        self.queue.push(messages::timeline(position, anchor.duration()));
        Some(position)
    }
}
