//! Seams between the player loop and whatever actually moves audio.
//!
//! The loop only needs two things: something that turns a stream URL into a
//! playable source, and a voice connection that can start/pause/resume/stop
//! that source and tell us once when it is done.

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::TransportError;

/// How a playback attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// Natural end of stream or an explicit stop (skip)
    Finished,
    /// The driver gave up on the source mid-stream
    Errored(String),
}

/// Single-use "track finished" notification.
///
/// Consumed by value, so a connection can resolve it at most once per
/// playback attempt.
#[derive(Debug)]
pub struct CompletionSignal(oneshot::Sender<PlaybackEnd>);

impl CompletionSignal {
    pub fn channel() -> (Self, oneshot::Receiver<PlaybackEnd>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    pub fn fire(self, end: PlaybackEnd) {
        // Receiver gone means the loop was cancelled; nobody is waiting.
        let _ = self.0.send(end);
    }
}

/// Builds playable sources from stream URLs.
#[async_trait]
pub trait AudioTransport: Send + Sync {
    type Source: Send + 'static;

    async fn open(&self, stream_url: &str) -> Result<Self::Source, TransportError>;
}

/// A live voice connection for one guild.
///
/// Writes (`play`, `pause`, `resume`, `stop`) come only from that guild's
/// player.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    type Source: Send + 'static;

    /// Starts `source`, replacing anything already playing. `finished` must be
    /// fired when playback ends for any reason.
    async fn play(
        &self,
        source: Self::Source,
        finished: CompletionSignal,
    ) -> Result<(), TransportError>;

    async fn pause(&self) -> Result<(), TransportError>;

    async fn resume(&self) -> Result<(), TransportError>;

    /// Stops the current source; fires its completion signal.
    async fn stop(&self) -> Result<(), TransportError>;
}

/// Connection handle shared between the voice manager and a guild player.
pub type SharedConnection<S> = std::sync::Arc<dyn VoiceConnection<Source = S>>;
