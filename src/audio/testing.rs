//! In-memory stand-ins for songbird used by the unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

use super::{
    player::PlayerEvent,
    track::Track,
    transport::{AudioTransport, CompletionSignal, PlaybackEnd, VoiceConnection},
};
use crate::error::TransportError;

pub fn track(title: &str) -> Track {
    Track::new(
        format!("https://cdn.test/{title}"),
        title,
        format!("https://page.test/{title}"),
    )
}

/// A track whose stream URL the fake transport refuses to open.
pub fn broken_track(title: &str) -> Track {
    Track::new(
        format!("https://cdn.test/broken/{title}"),
        title,
        format!("https://page.test/{title}"),
    )
}

#[derive(Debug)]
pub struct FakeSource {
    pub url: String,
}

pub struct FakeTransport;

#[async_trait]
impl AudioTransport for FakeTransport {
    type Source = FakeSource;

    async fn open(&self, stream_url: &str) -> Result<FakeSource, TransportError> {
        if stream_url.contains("/broken/") {
            return Err(TransportError::Unavailable(format!("cannot open {stream_url}")));
        }
        Ok(FakeSource {
            url: stream_url.to_string(),
        })
    }
}

#[derive(Default)]
pub struct FakeConnection {
    state: Mutex<FakeConnectionState>,
}

#[derive(Default)]
struct FakeConnectionState {
    played: Vec<String>,
    active: Option<CompletionSignal>,
    paused: bool,
    overlapping_plays: usize,
    stops: usize,
}

impl FakeConnection {
    /// Titles in the order they were started.
    pub fn played_titles(&self) -> Vec<String> {
        self.state
            .lock()
            .played
            .iter()
            .map(|url| url.rsplit('/').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Times `play` was called while another source was still active.
    pub fn overlapping_plays(&self) -> usize {
        self.state.lock().overlapping_plays
    }

    pub fn stops(&self) -> usize {
        self.state.lock().stops
    }

    /// Ends the active source as if the stream ran out.
    pub fn finish_current(&self) -> bool {
        self.end_current(PlaybackEnd::Finished)
    }

    pub fn fail_current(&self, reason: &str) -> bool {
        self.end_current(PlaybackEnd::Errored(reason.to_string()))
    }

    fn end_current(&self, end: PlaybackEnd) -> bool {
        let signal = self.state.lock().active.take();
        match signal {
            Some(signal) => {
                signal.fire(end);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    type Source = FakeSource;

    async fn play(&self, source: FakeSource, finished: CompletionSignal) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.active.is_some() {
            state.overlapping_plays += 1;
        }
        state.active = Some(finished);
        state.played.push(source.url);
        state.paused = false;
        Ok(())
    }

    async fn pause(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.active.is_none() {
            return Err(TransportError::NoActiveSource);
        }
        state.paused = true;
        Ok(())
    }

    async fn resume(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.active.is_none() {
            return Err(TransportError::NoActiveSource);
        }
        state.paused = false;
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let signal = {
            let mut state = self.state.lock();
            state.stops += 1;
            state.paused = false;
            state.active.take()
        };
        if let Some(signal) = signal {
            signal.fire(PlaybackEnd::Finished);
        }
        Ok(())
    }
}

pub async fn next_event(events: &mut broadcast::Receiver<PlayerEvent>) -> PlayerEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for a player event")
        .expect("player event channel closed")
}

/// Skips events until `title` starts playing.
pub async fn wait_started(events: &mut broadcast::Receiver<PlayerEvent>, title: &str) {
    loop {
        if let PlayerEvent::TrackStarted(track) = next_event(events).await {
            if track.title() == title {
                return;
            }
        }
    }
}
