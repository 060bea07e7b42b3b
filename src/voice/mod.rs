//! # Voice Module
//!
//! Join/move/leave bookkeeping per guild, plus the "last known channel"
//! record that drives auto-reconnect and 24/7 mode.
//!
//! The actual gateway work sits behind [`VoiceGateway`]; [`songbird`] holds
//! the production implementation.

pub mod songbird;

use async_trait::async_trait;
use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{audio::transport::SharedConnection, error::VoiceConnectionError};

/// Platform primitives for voice channels.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    type Source: Send + 'static;

    /// Connects to `channel_id`, or moves an existing connection there, with
    /// incoming audio deafened.
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<SharedConnection<Self::Source>, VoiceConnectionError>;

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), VoiceConnectionError>;
}

/// One voice-state update from the gateway, reduced to what we act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceStateChange {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub is_bot: bool,
    pub before: Option<ChannelId>,
    pub after: Option<ChannelId>,
}

/// What the manager did in response to a voice-state update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceStateOutcome {
    Ignored,
    /// We were dropped from `channel_id`; it is now the reconnect target
    Disconnected { guild_id: GuildId, channel_id: ChannelId },
    /// We were moved by someone else
    Moved { guild_id: GuildId, channel_id: ChannelId },
    Reconnected { guild_id: GuildId, channel_id: ChannelId },
    /// Auto-reconnect was attempted and swallowed an error
    ReconnectFailed { guild_id: GuildId, channel_id: ChannelId },
}

struct ActiveConnection<S> {
    channel_id: ChannelId,
    connection: SharedConnection<S>,
}

pub struct VoiceConnectionManager<S> {
    gateway: Arc<dyn VoiceGateway<Source = S>>,
    connections: DashMap<GuildId, ActiveConnection<S>>,
    last_channels: DashMap<GuildId, ChannelId>,
}

impl<S: Send + 'static> VoiceConnectionManager<S> {
    pub fn new(gateway: Arc<dyn VoiceGateway<Source = S>>) -> Self {
        Self {
            gateway,
            connections: DashMap::new(),
            last_channels: DashMap::new(),
        }
    }

    /// Connects or moves to `channel_id` and remembers it as the guild's last
    /// channel. On failure nothing is recorded.
    pub async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<SharedConnection<S>, VoiceConnectionError> {
        let connection = self.gateway.connect(guild_id, channel_id).await?;

        let moved = self
            .connections
            .insert(
                guild_id,
                ActiveConnection {
                    channel_id,
                    connection: Arc::clone(&connection),
                },
            )
            .is_some_and(|previous| previous.channel_id != channel_id);
        self.last_channels.insert(guild_id, channel_id);

        if moved {
            info!(guild_id = %guild_id, channel_id = %channel_id, "🔀 Moved voice connection");
        } else {
            info!(guild_id = %guild_id, channel_id = %channel_id, "🔊 Connected to voice channel");
        }
        Ok(connection)
    }

    /// Disconnects, then forgets the connection. A failed disconnect keeps it
    /// recorded, since the call may still be live.
    pub async fn leave(&self, guild_id: GuildId) -> Result<(), VoiceConnectionError> {
        if !self.is_connected(guild_id) {
            return Err(VoiceConnectionError::NotConnected);
        }
        self.gateway.disconnect(guild_id).await?;
        self.connections.remove(&guild_id);
        info!(guild_id = %guild_id, "👋 Left voice channel");
        Ok(())
    }

    pub fn is_connected(&self, guild_id: GuildId) -> bool {
        self.connections.contains_key(&guild_id)
    }

    pub fn connection(&self, guild_id: GuildId) -> Option<SharedConnection<S>> {
        self.connections
            .get(&guild_id)
            .map(|active| Arc::clone(&active.connection))
    }

    pub fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.connections.get(&guild_id).map(|active| active.channel_id)
    }

    pub fn last_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.last_channels.get(&guild_id).map(|channel| *channel)
    }

    /// Feeds one voice-state update through the reconnect rules.
    ///
    /// Reconnect failures are logged and reported as an outcome only; no
    /// command is in flight to hand them to.
    pub async fn handle_voice_state(
        &self,
        change: VoiceStateChange,
        bot_user_id: UserId,
    ) -> VoiceStateOutcome {
        let guild_id = change.guild_id;

        if change.user_id == bot_user_id {
            return self.track_own_state(change);
        }

        if change.is_bot || self.is_connected(guild_id) {
            return VoiceStateOutcome::Ignored;
        }

        let Some(last_channel) = self.last_channel(guild_id) else {
            return VoiceStateOutcome::Ignored;
        };
        if change.after != Some(last_channel) {
            return VoiceStateOutcome::Ignored;
        }

        debug!(guild_id = %guild_id, user_id = %change.user_id, "Member joined last channel, reconnecting");
        match self.join(guild_id, last_channel).await {
            Ok(_) => {
                info!(guild_id = %guild_id, channel_id = %last_channel, "🔄 Auto-reconnected");
                VoiceStateOutcome::Reconnected {
                    guild_id,
                    channel_id: last_channel,
                }
            }
            Err(error) => {
                warn!(guild_id = %guild_id, "Auto-reconnect failed: {}", error);
                VoiceStateOutcome::ReconnectFailed {
                    guild_id,
                    channel_id: last_channel,
                }
            }
        }
    }

    fn track_own_state(&self, change: VoiceStateChange) -> VoiceStateOutcome {
        let guild_id = change.guild_id;

        match (change.before, change.after) {
            (Some(vacated), None) => {
                self.connections.remove(&guild_id);
                self.last_channels.insert(guild_id, vacated);
                info!(guild_id = %guild_id, channel_id = %vacated, "🔌 Disconnected from voice");
                VoiceStateOutcome::Disconnected {
                    guild_id,
                    channel_id: vacated,
                }
            }
            (Some(before), Some(after)) if before != after => {
                if let Some(mut active) = self.connections.get_mut(&guild_id) {
                    active.channel_id = after;
                }
                self.last_channels.insert(guild_id, after);
                VoiceStateOutcome::Moved {
                    guild_id,
                    channel_id: after,
                }
            }
            _ => VoiceStateOutcome::Ignored,
        }
    }
}
