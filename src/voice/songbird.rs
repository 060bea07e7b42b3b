//! Songbird-backed implementations of the audio and voice seams.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};
use url::Url;

use super::VoiceGateway;
use crate::{
    audio::transport::{
        AudioTransport, CompletionSignal, PlaybackEnd, SharedConnection, VoiceConnection,
    },
    error::{TransportError, VoiceConnectionError},
};

/// Streams stream URLs over HTTP into songbird.
///
/// `HttpRequest` resumes with range requests when the connection drops, which
/// covers transient network errors mid-track.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        // No overall timeout: a track can stream for an hour.
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl AudioTransport for HttpTransport {
    type Source = Input;

    async fn open(&self, stream_url: &str) -> Result<Input, TransportError> {
        let parsed = Url::parse(stream_url)
            .map_err(|_| TransportError::InvalidUrl(stream_url.to_string()))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TransportError::InvalidUrl(stream_url.to_string()));
        }

        debug!("🔗 Opening stream: {}", parsed.host_str().unwrap_or_default());
        Ok(HttpRequest::new(self.client.clone(), stream_url.to_string()).into())
    }
}

/// One guild's songbird `Call` plus the handle of the track it is playing.
pub struct SongbirdConnection {
    call: Arc<tokio::sync::Mutex<Call>>,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdConnection {
    fn new(call: Arc<tokio::sync::Mutex<Call>>) -> Self {
        Self {
            call,
            current: Mutex::new(None),
        }
    }

    fn current(&self) -> Result<TrackHandle, TransportError> {
        self.current.lock().clone().ok_or(TransportError::NoActiveSource)
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    type Source = Input;

    async fn play(&self, source: Input, finished: CompletionSignal) -> Result<(), TransportError> {
        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(source)
        };

        let notifier = TrackEndNotifier::new(finished);
        handle
            .add_event(Event::Track(TrackEvent::End), notifier.clone())
            .map_err(|e| TransportError::Playback(e.to_string()))?;
        handle
            .add_event(Event::Track(TrackEvent::Error), notifier)
            .map_err(|e| TransportError::Playback(e.to_string()))?;

        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn pause(&self) -> Result<(), TransportError> {
        self.current()?
            .pause()
            .map_err(|e| TransportError::Control(e.to_string()))
    }

    async fn resume(&self) -> Result<(), TransportError> {
        self.current()?
            .play()
            .map_err(|e| TransportError::Control(e.to_string()))
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let handle = self.current.lock().take().ok_or(TransportError::NoActiveSource)?;
        handle
            .stop()
            .map_err(|e| TransportError::Control(e.to_string()))
    }
}

/// Resolves a track's completion signal on whichever of End/Error arrives
/// first.
#[derive(Clone)]
struct TrackEndNotifier {
    signal: Arc<Mutex<Option<CompletionSignal>>>,
}

impl TrackEndNotifier {
    fn new(signal: CompletionSignal) -> Self {
        Self {
            signal: Arc::new(Mutex::new(Some(signal))),
        }
    }
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(error) => Some(format!("{error:?}")),
                _ => None,
            }),
            _ => None,
        };

        if let Some(signal) = self.signal.lock().take() {
            signal.fire(match error {
                Some(reason) => PlaybackEnd::Errored(reason),
                None => PlaybackEnd::Finished,
            });
        }

        // One-shot: unregister.
        Some(Event::Cancel)
    }
}

/// Voice gateway over the shared songbird manager.
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
    connections: DashMap<GuildId, Arc<SongbirdConnection>>,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self {
            manager,
            connections: DashMap::new(),
        }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    type Source = Input;

    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<SharedConnection<Input>, VoiceConnectionError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| VoiceConnectionError::Join(e.to_string()))?;

        call.lock()
            .await
            .deafen(true)
            .await
            .map_err(|e| VoiceConnectionError::Deafen(e.to_string()))?;

        // A move keeps the same `Call`; keep the same wrapper so the handle of
        // the playing track survives it.
        let connection = {
            let mut entry = self
                .connections
                .entry(guild_id)
                .or_insert_with(|| Arc::new(SongbirdConnection::new(Arc::clone(&call))));
            if !Arc::ptr_eq(&entry.call, &call) {
                *entry = Arc::new(SongbirdConnection::new(Arc::clone(&call)));
            }
            Arc::clone(&*entry)
        };

        info!(guild_id = %guild_id, "🎧 Voice call ready (deafened)");
        Ok(connection as SharedConnection<Input>)
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), VoiceConnectionError> {
        self.manager
            .remove(guild_id)
            .await
            .map_err(|e| VoiceConnectionError::Leave(e.to_string()))?;
        self.connections.remove(&guild_id);
        Ok(())
    }
}
