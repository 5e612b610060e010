//! Bridge module - Turns media-session notifications into display frames
//!
//! The bridge runs as a single task that owns all per-session state, so
//! nothing here needs a lock. It is organized into submodules by
//! responsibility:
//!
//! - `session`: Waiting for, attaching to and detaching from sessions
//! - `handlers`: Change detection for properties, playback and timeline
//! - `artwork_jobs`: Single-flight artwork encoding off the event loop
//! - `ticker`: Periodic position extrapolation while playing

mod session;
mod handlers;
mod artwork_jobs;
mod ticker;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use crate::artwork::ArtworkSpec;
use crate::model::BridgeState;
use crate::provider::{
    event_relay, BridgeEvent, EventRelay, MediaProvider, MediaSession, SessionEventKind,
    RelayReceiver, SessionSubscriptions, Subscription,
};
use crate::transport::OutboundQueue;

pub(crate) use artwork_jobs::ArtworkOutcome;

#[derive(Debug, Clone, Copy)]
pub struct BridgeSettings {
    pub artwork: ArtworkSpec,
    pub tick_interval: Duration,
    /// How often to look for a session while none exists
    pub session_poll: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            artwork: ArtworkSpec::default(),
            tick_interval: Duration::from_secs(1),
            session_poll: Duration::from_secs(2),
        }
    }
}

pub struct Bridge {
    provider: Arc<dyn MediaProvider>,
    session: Option<Arc<dyn MediaSession>>,
    subscriptions: SessionSubscriptions,
    /// "Current session changed" stays registered for the bridge's lifetime
    session_watch: Option<Subscription>,
    state: BridgeState,
    queue: OutboundQueue,
    relay: EventRelay,
    events: RelayReceiver,
    art_tx: mpsc::UnboundedSender<ArtworkOutcome>,
    art_rx: mpsc::UnboundedReceiver<ArtworkOutcome>,
    settings: BridgeSettings,
}

/// Request shutdown once `signal` fires. If it can't be listened for, the
/// sender is kept alive forever: dropping it would read as a shutdown.
pub async fn shutdown_on<F>(signal: F, shutdown: watch::Sender<bool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::warn!(error = %e, "Could not listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Ctrl+C received, shutting down");
    let _ = shutdown.send(true);
}

impl Bridge {
    pub fn new(
        provider: Arc<dyn MediaProvider>,
        queue: OutboundQueue,
        settings: BridgeSettings,
    ) -> Self {
        let (relay, events) = event_relay();
        let (art_tx, art_rx) = mpsc::unbounded_channel();
        Self {
            provider,
            session: None,
            subscriptions: SessionSubscriptions::default(),
            session_watch: None,
            state: BridgeState::new(),
            queue,
            relay,
            events,
            art_tx,
            art_rx,
            settings,
        }
    }

    /// Run until `shutdown` flips to true (or its sender is dropped).
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let Some(session) = self.wait_for_session(&mut shutdown).await else {
            tracing::info!("Shutdown requested before a media session appeared");
            return Ok(());
        };

        if !self.watch_sessions(&mut shutdown).await {
            tracing::info!("Shutdown requested before session changes were watched");
            return Ok(());
        }
        self.attach(session).await;

        let mut ticker = tokio::time::interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("Listening for media changes");
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                Some(event) = self.events.recv() => self.dispatch(event).await,
                Some(outcome) = self.art_rx.recv() => self.finish_artwork(outcome).await,
                _ = ticker.tick() => {
                    self.tick(Instant::now());
                }
            }
        }

        self.detach_session();
        if let Some(mut watch) = self.session_watch.take() {
            watch.detach();
        }
        tracing::info!("Bridge stopped");
        Ok(())
    }

    pub(crate) async fn dispatch(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::SessionChanged => self.on_session_changed().await,
            BridgeEvent::Session { kind, generation } if generation != self.state.generation => {
                tracing::trace!(?kind, generation, "Ignoring event from a detached session");
            }
            BridgeEvent::Session { kind, .. } => match kind {
                SessionEventKind::MediaProperties => self.on_media_properties_changed().await,
                SessionEventKind::PlaybackInfo => self.on_playback_info_changed(),
                SessionEventKind::Timeline => self.on_timeline_changed(),
            },
        }
    }
}
