//! # Bot Module
//!
//! Discord glue for the music core.
//!
//! This module contains:
//! - Command parsing for prefixed messages and slash interactions
//! - The [`service::MusicService`] that implements command semantics
//! - Per-guild announcers that post "now playing" and failure notices
//! - Voice-state forwarding for auto-reconnect
//!
//! ## Architecture
//!
//! [`MusicBot`] implements Serenity's [`EventHandler`]. Both command paths
//! build the same [`service::Invocation`] and go through
//! [`handlers::dispatch`], so text and slash variants behave identically.
//!
//! ## Example
//!
//! ```rust,ignore
//! let service = MusicService::new(transport, gateway, resolver, config.queue_display_limit);
//! let bot = MusicBot::new(config, Arc::new(service));
//! ```

use dashmap::DashMap;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Message, Ready, VoiceState},
    async_trait,
};
use songbird::input::Input;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub mod commands;
pub mod events;
pub mod handlers;
pub mod service;

use crate::{
    config::Config,
    voice::{VoiceStateChange, VoiceStateOutcome},
};
use service::MusicService;

/// Main Discord event handler.
pub struct MusicBot {
    /// Bot configuration loaded from environment variables
    config: Arc<Config>,
    service: Arc<MusicService<Input>>,
    /// Text channel that last issued `play`, per guild
    announce_channels: Arc<DashMap<GuildId, ChannelId>>,
    announcers: DashMap<GuildId, JoinHandle<()>>,
}

impl MusicBot {
    pub fn new(config: Config, service: Arc<MusicService<Input>>) -> Self {
        Self {
            config: Arc::new(config),
            service,
            announce_channels: Arc::new(DashMap::new()),
            announcers: DashMap::new(),
        }
    }

    /// Routes the guild's player announcements to `channel_id`, starting the
    /// announcer on first use.
    fn announce_to(&self, ctx: &Context, guild_id: GuildId, channel_id: ChannelId) {
        self.announce_channels.insert(guild_id, channel_id);

        let mut announcer = self.announcers.entry(guild_id).or_insert_with(|| {
            events::spawn_announcer(
                ctx.http.clone(),
                guild_id,
                self.service.subscribe(guild_id),
                Arc::clone(&self.announce_channels),
            )
        });
        if announcer.is_finished() {
            *announcer = events::spawn_announcer(
                ctx.http.clone(),
                guild_id,
                self.service.subscribe(guild_id),
                Arc::clone(&self.announce_channels),
            );
        }
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if let Err(e) = handlers::handle_message(&ctx, &msg, self).await {
            error!("Error handling message command: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error handling command: {:?}", e);
            }
        }
    }

    /// Feeds voice-state updates to the reconnect rules. Our own disconnect
    /// resets the guild's player; a member joining the last channel brings
    /// us back.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let bot_user_id = ctx.cache.current_user().id;

        let is_bot = new
            .member
            .as_ref()
            .map(|member| member.user.bot)
            .or_else(|| ctx.cache.user(new.user_id).map(|user| user.bot))
            .unwrap_or(false);

        let change = VoiceStateChange {
            guild_id,
            user_id: new.user_id,
            is_bot,
            before: old.and_then(|state| state.channel_id),
            after: new.channel_id,
        };

        let outcome = self.service.handle_voice_state(change, bot_user_id).await;

        if let VoiceStateOutcome::Reconnected { channel_id, .. } = outcome {
            let announce = self.announce_channels.get(&guild_id).map(|channel| *channel);
            if let Some(text_channel) = announce {
                if let Err(e) = text_channel
                    .say(&ctx.http, events::render_reconnected(channel_id))
                    .await
                {
                    error!(guild_id = %guild_id, "Error announcing reconnect: {:?}", e);
                }
            }
        }
    }
}
