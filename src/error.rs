//! Error taxonomy for the music core.
//!
//! Resolution, transport and voice failures each get their own enum so the
//! player loop and the command layer can decide how to react: resolution and
//! voice errors go back to whoever issued the command, transport errors are
//! published as player events and the loop moves on.

use thiserror::Error;

/// A query did not yield a playable track.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Nothing to search for
    #[error("the search query is empty")]
    EmptyQuery,

    /// The search ran but matched nothing
    #[error("no results found for '{0}'")]
    NoResults(String),

    /// Age or region restriction reported by the extractor
    #[error("media is restricted ({0})")]
    Restricted(String),

    /// Network failure while talking to the media site
    #[error("network error while resolving: {0}")]
    Network(String),

    /// The extractor did not answer in time
    #[error("resolution timed out")]
    Timeout,

    /// Extractor failed for any other reason (missing binary, bad output, ...)
    #[error("extractor failed: {0}")]
    Extractor(String),

    /// Metadata came back without a streamable URL
    #[error("no stream URL available for '{0}'")]
    MissingStreamUrl(String),
}

/// An audio source could not be built or driven.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid stream URL '{0}'")]
    InvalidUrl(String),

    #[error("audio transport unavailable: {0}")]
    Unavailable(String),

    #[error("no voice connection to play on")]
    NotConnected,

    #[error("no active audio source")]
    NoActiveSource,

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("playback control failed: {0}")]
    Control(String),
}

/// Joining, moving or leaving a voice channel failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoiceConnectionError {
    #[error("failed to join voice channel: {0}")]
    Join(String),

    #[error("failed to deafen: {0}")]
    Deafen(String),

    #[error("failed to leave voice channel: {0}")]
    Leave(String),

    #[error("not connected to a voice channel")]
    NotConnected,
}

/// Failures surfaced to the command layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MusicError {
    #[error("You need to be in a voice channel to use this command.")]
    NotInVoiceChannel,

    #[error("Nothing is playing.")]
    NothingPlaying,

    #[error("Nothing is paused.")]
    NothingPaused,

    #[error("Not connected to any voice channel.")]
    NotConnected,

    #[error("Could not get audio: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Audio error: {0}")]
    Transport(#[from] TransportError),

    #[error("Voice connection error: {0}")]
    Voice(#[from] VoiceConnectionError),

    /// Should never happen; logged loudly and reported as a generic failure.
    #[error("internal error: {0}")]
    InvariantViolation(String),
}
