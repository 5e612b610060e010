//! Relay from provider callbacks into the bridge task.
//!
//! Provider callbacks fire on threads we don't own. They only push a
//! notification here; all state is touched by the bridge task.
//!
//! Notifications coalesce: while an event is queued and not yet received,
//! repeating it adds nothing. Handlers re-fetch state when they run, so one
//! pending copy per event is all the bridge needs, and no distinct event is
//! ever dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use super::SessionEventKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BridgeEvent {
    SessionChanged,
    /// Tagged with the session generation that registered the callback
    Session { kind: SessionEventKind, generation: u64 },
}

type Pending = Arc<Mutex<HashSet<BridgeEvent>>>;

fn lock(pending: &Pending) -> MutexGuard<'_, HashSet<BridgeEvent>> {
    // The set holds plain values, a panicking holder can't leave it torn
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Debug)]
pub struct EventRelay {
    tx: mpsc::UnboundedSender<BridgeEvent>,
    pending: Pending,
    generation: u64,
}

/// Bridge-side end of the relay
#[derive(Debug)]
pub struct RelayReceiver {
    rx: mpsc::UnboundedReceiver<BridgeEvent>,
    pending: Pending,
}

pub fn event_relay() -> (EventRelay, RelayReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Pending::default();
    (
        EventRelay {
            tx,
            pending: pending.clone(),
            generation: 0,
        },
        RelayReceiver { rx, pending },
    )
}

impl EventRelay {
    /// A relay whose session notifications carry `generation`
    pub fn tagged(&self, generation: u64) -> Self {
        Self {
            tx: self.tx.clone(),
            pending: self.pending.clone(),
            generation,
        }
    }

    pub fn notify_session(&self, kind: SessionEventKind) {
        self.notify(BridgeEvent::Session {
            kind,
            generation: self.generation,
        });
    }

    /// Never blocks. An event already waiting to be received is not queued twice.
    pub fn notify(&self, event: BridgeEvent) {
        let mut pending = lock(&self.pending);
        if !pending.insert(event) {
            tracing::trace!(?event, "Notification already pending");
            return;
        }
        if self.tx.send(event).is_err() {
            pending.remove(&event);
            tracing::trace!("Relay closed");
        }
    }
}

impl RelayReceiver {
    /// Next notification. Once returned, the same event can be queued again.
    pub async fn recv(&mut self) -> Option<BridgeEvent> {
        let event = self.rx.recv().await?;
        lock(&self.pending).remove(&event);
        Some(event)
    }

    pub fn try_recv(&mut self) -> Option<BridgeEvent> {
        let event = self.rx.try_recv().ok()?;
        lock(&self.pending).remove(&event);
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut RelayReceiver) -> Vec<BridgeEvent> {
        std::iter::from_fn(|| rx.try_recv()).collect()
    }

    #[tokio::test]
    async fn test_notify_from_foreign_thread() {
        let (relay, mut rx) = event_relay();
        std::thread::spawn(move || relay.notify(BridgeEvent::SessionChanged))
            .join()
            .unwrap();

        assert_eq!(rx.recv().await, Some(BridgeEvent::SessionChanged));
    }

    #[test]
    fn test_repeated_notifications_coalesce() {
        let (relay, mut rx) = event_relay();
        for _ in 0..100 {
            relay.notify(BridgeEvent::SessionChanged);
        }

        assert_eq!(drain(&mut rx), vec![BridgeEvent::SessionChanged]);
    }

    #[test]
    fn test_burst_of_one_kind_does_not_starve_others() {
        let (relay, mut rx) = event_relay();
        let session = relay.tagged(3);
        for _ in 0..500 {
            session.notify_session(SessionEventKind::Timeline);
        }
        session.notify_session(SessionEventKind::MediaProperties);
        relay.notify(BridgeEvent::SessionChanged);

        assert_eq!(
            drain(&mut rx),
            vec![
                BridgeEvent::Session {
                    kind: SessionEventKind::Timeline,
                    generation: 3,
                },
                BridgeEvent::Session {
                    kind: SessionEventKind::MediaProperties,
                    generation: 3,
                },
                BridgeEvent::SessionChanged,
            ]
        );
    }

    #[test]
    fn test_received_event_can_be_queued_again() {
        let (relay, mut rx) = event_relay();
        relay.notify_session(SessionEventKind::PlaybackInfo);
        assert!(rx.try_recv().is_some());

        relay.notify_session(SessionEventKind::PlaybackInfo);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_generations_are_distinct_events() {
        let (relay, mut rx) = event_relay();
        relay.tagged(1).notify_session(SessionEventKind::Timeline);
        relay.tagged(2).notify_session(SessionEventKind::Timeline);

        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[tokio::test]
    async fn test_tagged_relay_stamps_generation() {
        let (relay, mut rx) = event_relay();
        relay.tagged(7).notify_session(SessionEventKind::Timeline);

        assert_eq!(
            rx.recv().await,
            Some(BridgeEvent::Session {
                kind: SessionEventKind::Timeline,
                generation: 7,
            })
        );
    }

    #[test]
    fn test_notify_after_receiver_dropped() {
        let (relay, rx) = event_relay();
        drop(rx);
        relay.notify(BridgeEvent::SessionChanged);
        relay.notify(BridgeEvent::SessionChanged);
        assert!(lock(&relay.pending).is_empty());
    }
}
