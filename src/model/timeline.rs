//! Timeline anchor and position extrapolation

use std::time::Duration;
use tokio::time::Instant;

/// Position and duration as reported by the provider
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimelineSnapshot {
    pub position: Duration,
    pub duration: Duration,
}

impl TimelineSnapshot {
    pub fn new(position: Duration, duration: Duration) -> Self {
        Self { position, duration }
    }
}

/// A timeline snapshot plus the monotonic instant it was taken.
///
/// Replaced wholesale on every refresh, never mutated.
#[derive(Clone, Copy, Debug)]
pub struct TimelineAnchor {
    snapshot: TimelineSnapshot,
    captured_at: Instant,
}

impl TimelineAnchor {
    pub fn capture(snapshot: TimelineSnapshot, now: Instant) -> Self {
        Self {
            snapshot,
            captured_at: now,
        }
    }

    pub fn position(&self) -> Duration {
        self.snapshot.position
    }

    pub fn duration(&self) -> Duration {
        self.snapshot.duration
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Position at `now` assuming playback kept running since capture,
    /// clamped to `[0, duration]`.
    pub fn extrapolate(&self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.captured_at);
        self.snapshot
            .position
            .saturating_add(elapsed)
            .min(self.snapshot.duration)
    }
}
