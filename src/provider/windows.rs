//! Global System Media Transport Controls provider

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::executor::block_on;
use windows::Foundation::{TimeSpan, TypedEventHandler};
use windows::Media::Control::{
    GlobalSystemMediaTransportControlsSession as Session,
    GlobalSystemMediaTransportControlsSessionManager as SessionManager,
    GlobalSystemMediaTransportControlsSessionPlaybackStatus as Status,
};
use windows::Storage::Streams::{DataReader, IRandomAccessStreamReference, InputStreamOptions};
use windows::Win32::System::Com::{CoInitializeEx, COINIT_MULTITHREADED};

use super::{
    EventRelay, MediaProperties, MediaProvider, MediaSession, SessionEventKind, Subscription,
    Thumbnail,
};
use crate::model::{PlaybackState, TimelineSnapshot};

const THUMBNAIL_READ_CHUNK: u32 = 64 * 1024;

fn block_on_operation<O, T>(operation: O) -> windows::core::Result<T>
where
    O: IntoFuture<Output = windows::core::Result<T>>,
{
    block_on(operation.into_future())
}

/// TimeSpan counts 100ns ticks and may be negative for some players
fn span_to_duration(span: TimeSpan) -> Duration {
    Duration::from_nanos(span.Duration.max(0) as u64 * 100)
}

fn map_status(status: Status) -> PlaybackState {
    match status {
        Status::Closed => PlaybackState::Closed,
        Status::Opened => PlaybackState::Opened,
        Status::Changing => PlaybackState::Changing,
        Status::Stopped => PlaybackState::Stopped,
        Status::Playing => PlaybackState::Playing,
        Status::Paused => PlaybackState::Paused,
        _ => PlaybackState::Closed,
    }
}

pub struct WindowsMediaProvider {
    manager: SessionManager,
}

impl WindowsMediaProvider {
    pub async fn connect() -> Result<Self> {
        tokio::task::spawn_blocking(|| -> Result<Self> {
            // Already-initialized apartments are fine
            let _ = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
            let manager = block_on_operation(SessionManager::RequestAsync()?)
                .context("requesting media session manager")?;
            tracing::info!("Connected to media session manager");
            Ok(Self { manager })
        })
        .await?
    }
}

#[async_trait]
impl MediaProvider for WindowsMediaProvider {
    async fn current_session(&self) -> Result<Option<Arc<dyn MediaSession>>> {
        match self.manager.GetCurrentSession() {
            Ok(session) => Ok(Some(Arc::new(WindowsSession { session }))),
            Err(e) => {
                tracing::trace!(error = %e, "No current session");
                Ok(None)
            }
        }
    }

    fn watch_current_session(&self, relay: EventRelay) -> Result<Subscription> {
        let token = self
            .manager
            .CurrentSessionChanged(&TypedEventHandler::new(move |_, _| {
                relay.notify(super::BridgeEvent::SessionChanged);
                Ok(())
            }))?;
        let manager = self.manager.clone();
        Ok(Subscription::new(move || {
            let _ = manager.RemoveCurrentSessionChanged(token);
        }))
    }
}

struct WindowsSession {
    session: Session,
}

#[async_trait]
impl MediaSession for WindowsSession {
    fn source_app_id(&self) -> String {
        self.session
            .SourceAppUserModelId()
            .map(|id| id.to_string_lossy())
            .unwrap_or_default()
    }

    async fn media_properties(&self) -> Result<MediaProperties> {
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || -> Result<_> {
            let props = block_on_operation(session.TryGetMediaPropertiesAsync()?)?;
            let thumbnail = props
                .Thumbnail()
                .ok()
                .map(|reference| Arc::new(WindowsThumbnail { reference }) as Arc<dyn Thumbnail>);
            Ok(MediaProperties {
                title: props.Title()?.to_string_lossy(),
                artist: props.Artist()?.to_string_lossy(),
                album: props.AlbumTitle()?.to_string_lossy(),
                thumbnail,
            })
        })
        .await?
    }

    fn playback_status(&self) -> Result<PlaybackState> {
        let status = self.session.GetPlaybackInfo()?.PlaybackStatus()?;
        Ok(map_status(status))
    }

    fn timeline(&self) -> Result<TimelineSnapshot> {
        let props = self.session.GetTimelineProperties()?;
        Ok(TimelineSnapshot::new(
            span_to_duration(props.Position()?),
            span_to_duration(props.EndTime()?),
        ))
    }

    fn watch(&self, kind: SessionEventKind, relay: EventRelay) -> Result<Subscription> {
        let session = self.session.clone();
        let sub = match kind {
            SessionEventKind::MediaProperties => {
                let token = self
                    .session
                    .MediaPropertiesChanged(&TypedEventHandler::new(move |_, _| {
                        relay.notify_session(kind);
                        Ok(())
                    }))?;
                Subscription::new(move || {
                    let _ = session.RemoveMediaPropertiesChanged(token);
                })
            }
            SessionEventKind::PlaybackInfo => {
                let token = self
                    .session
                    .PlaybackInfoChanged(&TypedEventHandler::new(move |_, _| {
                        relay.notify_session(kind);
                        Ok(())
                    }))?;
                Subscription::new(move || {
                    let _ = session.RemovePlaybackInfoChanged(token);
                })
            }
            SessionEventKind::Timeline => {
                let token = self
                    .session
                    .TimelinePropertiesChanged(&TypedEventHandler::new(move |_, _| {
                        relay.notify_session(kind);
                        Ok(())
                    }))?;
                Subscription::new(move || {
                    let _ = session.RemoveTimelinePropertiesChanged(token);
                })
            }
        };
        Ok(sub)
    }
}

struct WindowsThumbnail {
    reference: IRandomAccessStreamReference,
}

#[async_trait]
impl Thumbnail for WindowsThumbnail {
    async fn read_bytes(&self) -> Result<Vec<u8>> {
        let reference = self.reference.clone();
        tokio::task::spawn_blocking(move || -> Result<_> {
            let stream = block_on_operation(reference.OpenReadAsync()?)?;
            let input = stream.GetInputStreamAt(0)?;
            let reader = DataReader::CreateDataReader(&input)?;
            reader.SetInputStreamOptions(InputStreamOptions::Partial)?;

            let mut buffer = Vec::new();
            loop {
                let loaded = block_on_operation(reader.LoadAsync(THUMBNAIL_READ_CHUNK)?)?;
                if loaded == 0 {
                    break;
                }
                let mut chunk = vec![0u8; loaded as usize];
                reader.ReadBytes(&mut chunk)?;
                buffer.extend_from_slice(&chunk);
                if loaded < THUMBNAIL_READ_CHUNK {
                    break;
                }
            }
            Ok(buffer)
        })
        .await?
    }
}
