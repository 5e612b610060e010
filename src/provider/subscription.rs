//! Detachable change-notification registrations

use std::fmt;

use super::SessionEventKind;

type DetachFn = Box<dyn FnOnce() + Send>;

/// A live registration with the provider.
///
/// `detach` unregisters it and is idempotent. Dropping detaches too.
pub struct Subscription {
    detach: Option<DetachFn>,
}

impl Subscription {
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.detach.is_some()
    }

    pub fn detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// One slot per session notification kind
#[derive(Debug, Default)]
pub struct SessionSubscriptions {
    media: Option<Subscription>,
    playback: Option<Subscription>,
    timeline: Option<Subscription>,
}

impl SessionSubscriptions {
    fn slot(&mut self, kind: SessionEventKind) -> &mut Option<Subscription> {
        match kind {
            SessionEventKind::MediaProperties => &mut self.media,
            SessionEventKind::PlaybackInfo => &mut self.playback,
            SessionEventKind::Timeline => &mut self.timeline,
        }
    }

    /// Store `sub`, detaching whatever occupied the slot before.
    pub fn set(&mut self, kind: SessionEventKind, sub: Subscription) {
        if let Some(mut old) = self.slot(kind).replace(sub) {
            old.detach();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.media.is_none() && self.playback.is_none() && self.timeline.is_none()
    }

    /// Safe to call on empty slots
    pub fn detach_all(&mut self) {
        for kind in SessionEventKind::ALL {
            if let Some(mut sub) = self.slot(kind).take() {
                sub.detach();
            }
        }
    }
}
