//! Session attachment

use std::sync::Arc;

use tokio::sync::watch;

use crate::provider::{MediaSession, SessionEventKind};

use super::Bridge;

impl Bridge {
    /// Poll until the provider reports a session. `None` on shutdown.
    pub(crate) async fn wait_for_session(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<Arc<dyn MediaSession>> {
        loop {
            match self.provider.current_session().await {
                Ok(Some(session)) => return Some(session),
                Ok(None) => tracing::info!("Waiting for a media session..."),
                Err(e) => tracing::warn!(error = %e, "Failed to query current session"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.session_poll) => {}
                _ = shutdown.changed() => return None,
            }
        }
    }

    /// Register for "current session changed", retrying until it sticks.
    /// `false` on shutdown.
    pub(crate) async fn watch_sessions(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
        loop {
            match self.provider.watch_current_session(self.relay.clone()) {
                Ok(sub) => {
                    self.session_watch = Some(sub);
                    return true;
                }
                Err(e) => tracing::warn!(error = %e, "Failed to watch session changes, retrying"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.session_poll) => {}
                _ = shutdown.changed() => return false,
            }
        }
    }

    /// Subscribe to `session` and push a complete update for it right away.
    pub(crate) async fn attach(&mut self, session: Arc<dyn MediaSession>) {
        tracing::info!(app = %session.source_app_id(), "Attached to media session");

        let relay = self.relay.tagged(self.state.generation);
        for kind in SessionEventKind::ALL {
            match session.watch(kind, relay.clone()) {
                Ok(sub) => self.subscriptions.set(kind, sub),
                Err(e) => tracing::warn!(?kind, error = %e, "Failed to subscribe"),
            }
        }
        self.session = Some(session);

        self.on_media_properties_changed().await;
        self.on_playback_info_changed();
        self.on_timeline_changed();
    }

    /// Drop subscriptions and forget everything about the current session.
    pub(crate) fn detach_session(&mut self) {
        self.subscriptions.detach_all();
        self.session = None;
        self.state.reset();
    }

    pub(crate) async fn on_session_changed(&mut self) {
        self.detach_session();

        match self.provider.current_session().await {
            Ok(Some(session)) => self.attach(session).await,
            Ok(None) => tracing::info!("No active media session"),
            Err(e) => tracing::error!(error = %e, "Failed to fetch new session"),
        }
    }
}
