use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::{
    audio::{
        player::PlayerEvent,
        queue::QueuePreview,
        registry::GuildPlayerRegistry,
        track::Track,
        transport::{AudioTransport, SharedConnection},
    },
    error::{MusicError, VoiceConnectionError},
    sources::TrackResolver,
    voice::{VoiceConnectionManager, VoiceGateway, VoiceStateChange, VoiceStateOutcome},
};

/// Who issued a command, and where they are.
///
/// Built the same way from a prefixed message and from a slash interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    pub guild_id: GuildId,
    pub user_id: UserId,
    /// The invoker's current voice channel, if any
    pub voice_channel: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayOutcome {
    pub track: Track,
    /// 1-based place in play order, counting the track now playing
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueView {
    pub now_playing: Option<Track>,
    pub preview: QueuePreview,
}

/// Command semantics over the player registry, the voice manager and the
/// resolver. Returns values; rendering is left to the caller.
pub struct MusicService<S> {
    players: GuildPlayerRegistry<S>,
    voice: VoiceConnectionManager<S>,
    resolver: Arc<dyn TrackResolver>,
    queue_display_limit: usize,
    /// Serializes queue commits against `stop` and voice-state resets
    guild_locks: DashMap<GuildId, Arc<Mutex<()>>>,
}

impl<S: Send + 'static> MusicService<S> {
    pub fn new(
        transport: Arc<dyn AudioTransport<Source = S>>,
        gateway: Arc<dyn VoiceGateway<Source = S>>,
        resolver: Arc<dyn TrackResolver>,
        queue_display_limit: usize,
    ) -> Self {
        Self {
            players: GuildPlayerRegistry::new(transport),
            voice: VoiceConnectionManager::new(gateway),
            resolver,
            queue_display_limit,
            guild_locks: DashMap::new(),
        }
    }

    /// Player events for the guild, for posting announcements.
    pub fn subscribe(&self, guild_id: GuildId) -> broadcast::Receiver<PlayerEvent> {
        self.players.get(guild_id).subscribe()
    }

    /// Joins the invoker's channel, resolves `query` and queues the result.
    ///
    /// Nothing is queued unless both the join and the resolution succeed, and
    /// the connection joined for this request is still live afterwards.
    pub async fn play(&self, invocation: Invocation, query: &str) -> Result<PlayOutcome, MusicError> {
        let channel_id = invocation.voice_channel.ok_or(MusicError::NotInVoiceChannel)?;
        let guild_id = invocation.guild_id;

        let joined = self.ensure_connected(guild_id, channel_id).await?;
        let track = self.resolver.resolve(query).await?;

        let _guard = self.lock_guild(guild_id).await;
        let connection = self
            .voice
            .connection(guild_id)
            .filter(|live| Arc::ptr_eq(live, &joined))
            .ok_or_else(|| {
                debug!(guild_id = %guild_id, "Voice connection went away while resolving");
                MusicError::NotConnected
            })?;

        let player = self.players.get(guild_id);
        player.attach(connection).await;
        let position = player.enqueue(track.clone());

        info!(guild_id = %guild_id, position, "➕ Queued: {}", track.title());
        Ok(PlayOutcome { track, position })
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<(), MusicError> {
        match self.players.existing(guild_id) {
            Some(player) => player.pause().await,
            None => Err(MusicError::NothingPlaying),
        }
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<(), MusicError> {
        match self.players.existing(guild_id) {
            Some(player) => player.resume().await,
            None => Err(MusicError::NothingPaused),
        }
    }

    pub async fn skip(&self, guild_id: GuildId) -> Result<(), MusicError> {
        match self.players.existing(guild_id) {
            Some(player) => player.skip().await,
            None => Err(MusicError::NothingPlaying),
        }
    }

    /// Resets the player, then leaves voice. The player is reset even when
    /// there is no connection to leave.
    pub async fn stop(&self, guild_id: GuildId) -> Result<(), MusicError> {
        let _guard = self.lock_guild(guild_id).await;
        self.players.cleanup(guild_id).await;

        match self.voice.leave(guild_id).await {
            Ok(()) => Ok(()),
            Err(VoiceConnectionError::NotConnected) => Err(MusicError::NotConnected),
            Err(error) => Err(error.into()),
        }
    }

    pub fn queue(&self, guild_id: GuildId) -> QueueView {
        let snapshot = self
            .players
            .existing(guild_id)
            .map(|player| player.snapshot())
            .unwrap_or_default();

        QueueView {
            preview: snapshot.preview(self.queue_display_limit),
            now_playing: snapshot.now_playing,
        }
    }

    pub fn now_playing(&self, guild_id: GuildId) -> Option<Track> {
        self.players
            .existing(guild_id)
            .and_then(|player| player.now_playing())
    }

    /// 24/7 mode: join the invoker's channel and keep it as the reconnect
    /// target.
    pub async fn enable_persistent_mode(&self, invocation: Invocation) -> Result<ChannelId, MusicError> {
        let channel_id = invocation.voice_channel.ok_or(MusicError::NotInVoiceChannel)?;
        let guild_id = invocation.guild_id;

        let connection = self.ensure_connected(guild_id, channel_id).await?;
        let _guard = self.lock_guild(guild_id).await;
        self.players.get(guild_id).attach(connection).await;

        info!(guild_id = %guild_id, channel_id = %channel_id, "🔒 24/7 mode enabled");
        Ok(channel_id)
    }

    /// Feeds the gateway's voice-state stream through the reconnect rules.
    /// Losing our own connection also resets the guild's player.
    pub async fn handle_voice_state(
        &self,
        change: VoiceStateChange,
        bot_user_id: UserId,
    ) -> VoiceStateOutcome {
        let outcome = self.voice.handle_voice_state(change, bot_user_id).await;

        match outcome {
            VoiceStateOutcome::Disconnected { guild_id, .. } => {
                let _guard = self.lock_guild(guild_id).await;
                self.players.cleanup(guild_id).await;
            }
            VoiceStateOutcome::Reconnected { guild_id, .. } => {
                let _guard = self.lock_guild(guild_id).await;
                if let (Some(player), Some(connection)) =
                    (self.players.existing(guild_id), self.voice.connection(guild_id))
                {
                    player.attach(connection).await;
                }
            }
            VoiceStateOutcome::ReconnectFailed { guild_id, .. } => {
                warn!(guild_id = %guild_id, "Staying disconnected until the next member joins");
            }
            VoiceStateOutcome::Moved { .. } | VoiceStateOutcome::Ignored => {}
        }

        outcome
    }

    pub fn last_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.voice.last_channel(guild_id)
    }

    async fn lock_guild(&self, guild_id: GuildId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.guild_locks.entry(guild_id).or_default().value());
        lock.lock_owned().await
    }

    async fn ensure_connected(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<SharedConnection<S>, MusicError> {
        if self.voice.current_channel(guild_id) == Some(channel_id) {
            if let Some(connection) = self.voice.connection(guild_id) {
                debug!(guild_id = %guild_id, "Reusing voice connection");
                return Ok(connection);
            }
        }

        Ok(self.voice.join(guild_id, channel_id).await?)
    }
}
