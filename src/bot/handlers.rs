use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        channel::Message,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{error, info, warn};

use super::{
    commands::{help_text, Command},
    service::{Invocation, MusicService, PlayOutcome, QueueView},
    MusicBot,
};
use crate::{audio::track::Track, config::Config, error::MusicError};

/// What to send back for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Public(String),
    /// Ephemeral where the platform supports it
    Private(String),
    /// Post the text as the bot, acknowledging the invoker privately
    Say(String),
    /// Show the owner's profile; needs a user lookup first
    Owner(UserId),
}

impl Reply {
    fn into_content(self) -> String {
        match self {
            Self::Public(content) | Self::Private(content) | Self::Say(content) => content,
            Self::Owner(owner_id) => format!("👑 **Bot Owner:** <@{owner_id}>"),
        }
    }
}

/// Runs one command against the service and renders the result.
pub async fn dispatch<S: Send + 'static>(
    service: &MusicService<S>,
    config: &Config,
    invocation: Invocation,
    command: Command,
) -> Reply {
    let guild_id = invocation.guild_id;
    let prefix = &config.command_prefix;

    let result = match command {
        Command::Play(query) if query.is_empty() => {
            return Reply::Private(format!("❌ Usage: `{prefix}play <query>`"));
        }
        Command::Play(query) => service
            .play(invocation, &query)
            .await
            .map(|outcome| render_queued(&outcome)),
        Command::Pause => service
            .pause(guild_id)
            .await
            .map(|()| "⏸️ Music has been paused".to_string()),
        Command::Resume => service
            .resume(guild_id)
            .await
            .map(|()| "▶️ Music has been resumed".to_string()),
        Command::Skip => service
            .skip(guild_id)
            .await
            .map(|()| "⏭️ Skipped to the next song".to_string()),
        Command::Stop => service
            .stop(guild_id)
            .await
            .map(|()| "⏹️ Music stopped and disconnected from voice channel".to_string()),
        Command::Queue => Ok(render_queue(&service.queue(guild_id))),
        Command::NowPlaying => Ok(render_now_playing(service.now_playing(guild_id).as_ref())),
        Command::Persistent => service
            .enable_persistent_mode(invocation)
            .await
            .map(render_persistent),
        Command::Say(text) => return say(config, invocation.user_id, text),
        Command::Owner => {
            return match config.owner_id {
                Some(owner_id) => Reply::Owner(owner_id),
                None => Reply::Private("❌ No bot owner is configured.".into()),
            };
        }
        Command::Help => Ok(help_text(prefix)),
    };

    match result {
        Ok(content) => Reply::Public(content),
        Err(error) => Reply::Public(render_error(guild_id, &error)),
    }
}

fn say(config: &Config, user_id: UserId, text: String) -> Reply {
    if config.owner_id != Some(user_id) {
        return Reply::Private("❌ Access Denied: only the bot owner can use this command.".into());
    }
    if text.is_empty() {
        return Reply::Private(format!("❌ Usage: `{}say <message>`", config.command_prefix));
    }
    Reply::Say(text)
}

/// Fills in replies that need a platform lookup.
async fn complete_reply(ctx: &Context, reply: Reply) -> Reply {
    let Reply::Owner(owner_id) = reply else {
        return reply;
    };

    match ctx.http.get_user(owner_id).await {
        Ok(owner) => Reply::Public(render_owner(owner.display_name(), &owner.name, owner_id)),
        Err(why) => {
            warn!("Could not fetch owner {}: {:?}", owner_id, why);
            Reply::Private(format!("❌ Could not fetch owner details: {why}"))
        }
    }
}

fn render_owner(display_name: &str, username: &str, owner_id: UserId) -> String {
    format!(
        "👑 **Bot Owner**\n**Name:** {display_name}\n**Username:** @{username}\n**Owner ID:** {owner_id}"
    )
}

fn render_queued(outcome: &PlayOutcome) -> String {
    format!(
        "✅ Added to Queue: **{}** (position #{})",
        outcome.track.title(),
        outcome.position
    )
}

pub fn render_queue(view: &QueueView) -> String {
    let mut text = String::from("🎵 **Music Queue**\n");

    match &view.now_playing {
        Some(track) => text.push_str(&format!("**Now Playing:** {}\n", track.title())),
        None => text.push_str("**Now Playing:** Nothing playing\n"),
    }

    if view.preview.entries.is_empty() {
        text.push_str("📋 Queue is empty");
        return text;
    }

    text.push_str("📋 **Queue:**");
    for (position, track) in &view.preview.entries {
        text.push_str(&format!("\n{}. {}", position, track.title()));
    }
    if view.preview.hidden > 0 {
        text.push_str(&format!("\n... and {} more", view.preview.hidden));
    }
    text
}

fn render_now_playing(track: Option<&Track>) -> String {
    match track {
        Some(track) => format!("🎵 **Now Playing:** **{}**\n🔗 <{}>", track.title(), track.page_url()),
        None => "❌ No music is currently playing.".to_string(),
    }
}

fn render_persistent(channel_id: ChannelId) -> String {
    format!(
        "🔒 24/7 mode enabled: staying in <#{channel_id}> and rejoining when someone joins it"
    )
}

fn render_error(guild_id: GuildId, error: &MusicError) -> String {
    if let MusicError::InvariantViolation(detail) = error {
        error!(guild_id = %guild_id, "Invariant violated: {}", detail);
        return "❌ Something went wrong, please try again.".to_string();
    }
    format!("❌ {error}")
}

/// The voice channel `user_id` currently sits in, from the cache.
pub fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

/// Handles a prefixed text command.
pub async fn handle_message(ctx: &Context, msg: &Message, bot: &MusicBot) -> Result<()> {
    if msg.author.bot {
        return Ok(());
    }
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let Some(command) = Command::parse_prefixed(&msg.content, &bot.config.command_prefix) else {
        return Ok(());
    };

    info!(
        "📝 Command {}{} used by {} in guild {}",
        bot.config.command_prefix,
        command.name(),
        msg.author.name,
        guild_id
    );

    let invocation = Invocation {
        guild_id,
        user_id: msg.author.id,
        voice_channel: user_voice_channel(ctx, guild_id, msg.author.id),
    };
    if matches!(command, Command::Play(_)) {
        bot.announce_to(ctx, guild_id, msg.channel_id);
    }

    let reply = dispatch(&*bot.service, &bot.config, invocation, command).await;
    let content = complete_reply(ctx, reply).await.into_content();
    msg.channel_id.say(&ctx.http, content).await?;

    Ok(())
}

/// Handles a slash command.
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Command used outside of a guild"))?;

    let argument = command
        .data
        .options
        .iter()
        .find_map(|option| option.value.as_str());

    let Some(parsed) = Command::from_slash(&command.data.name, argument) else {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("❌ Unknown command")
                        .ephemeral(true),
                ),
            )
            .await?;
        return Ok(());
    };

    info!(
        "📝 Command /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    // Resolution and voice joins can outlast the interaction deadline
    let deferred = parsed.is_slow();
    if deferred {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
            )
            .await?;
    }

    let invocation = Invocation {
        guild_id,
        user_id: command.user.id,
        voice_channel: user_voice_channel(ctx, guild_id, command.user.id),
    };
    if matches!(parsed, Command::Play(_)) {
        bot.announce_to(ctx, guild_id, command.channel_id);
    }

    let reply = dispatch(&*bot.service, &bot.config, invocation, parsed).await;
    let reply = complete_reply(ctx, reply).await;

    if deferred {
        let content = reply.into_content();
        command
            .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
            .await?;
        return Ok(());
    }

    let (message, said) = match reply {
        Reply::Say(text) => (
            CreateInteractionResponseMessage::new()
                .content("✅ Message sent!")
                .ephemeral(true),
            Some(text),
        ),
        Reply::Private(content) => (
            CreateInteractionResponseMessage::new()
                .content(content)
                .ephemeral(true),
            None,
        ),
        public => (
            CreateInteractionResponseMessage::new().content(public.into_content()),
            None,
        ),
    };

    command
        .create_response(&ctx.http, CreateInteractionResponse::Message(message))
        .await?;

    if let Some(text) = said {
        command.channel_id.say(&ctx.http, text).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{
            queue::QueuePreview,
            testing::{track, FakeTransport},
        },
        sources::MockTrackResolver,
        voice::testing::FakeGateway,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const GUILD: GuildId = GuildId::new(100);
    const OWNER: UserId = UserId::new(7);
    const MEMBER: UserId = UserId::new(2);
    const CHANNEL: ChannelId = ChannelId::new(10);

    fn config() -> Config {
        Config {
            discord_token: "token".into(),
            owner_id: Some(OWNER),
            ..Config::default()
        }
    }

    fn service() -> MusicService<crate::audio::testing::FakeSource> {
        let mut resolver = MockTrackResolver::new();
        resolver
            .expect_resolve()
            .returning(|query: &str| Ok(track(query)));
        MusicService::new(
            Arc::new(FakeTransport),
            Arc::new(FakeGateway::default()),
            Arc::new(resolver),
            10,
        )
    }

    fn invocation(user_id: UserId, voice_channel: Option<ChannelId>) -> Invocation {
        Invocation {
            guild_id: GUILD,
            user_id,
            voice_channel,
        }
    }

    #[tokio::test]
    async fn test_play_replies() {
        let service = service();
        let config = config();

        let reply = dispatch(&service, &config, invocation(MEMBER, None), Command::Play("a".into())).await;
        assert_eq!(
            reply,
            Reply::Public("❌ You need to be in a voice channel to use this command.".into())
        );

        let reply = dispatch(&service, &config, invocation(MEMBER, Some(CHANNEL)), Command::Play("a".into())).await;
        assert_eq!(reply, Reply::Public("✅ Added to Queue: **a** (position #1)".into()));

        let reply = dispatch(&service, &config, invocation(MEMBER, Some(CHANNEL)), Command::Play(String::new())).await;
        assert_eq!(reply, Reply::Private("❌ Usage: `r!play <query>`".into()));
    }

    #[tokio::test]
    async fn test_idle_control_replies() {
        let service = service();
        let config = config();
        let member = invocation(MEMBER, Some(CHANNEL));

        assert_eq!(
            dispatch(&service, &config, member, Command::Skip).await,
            Reply::Public("❌ Nothing is playing.".into())
        );
        assert_eq!(
            dispatch(&service, &config, member, Command::Resume).await,
            Reply::Public("❌ Nothing is paused.".into())
        );
        assert_eq!(
            dispatch(&service, &config, member, Command::Stop).await,
            Reply::Public("❌ Not connected to any voice channel.".into())
        );
        assert_eq!(
            dispatch(&service, &config, member, Command::NowPlaying).await,
            Reply::Public("❌ No music is currently playing.".into())
        );
    }

    #[tokio::test]
    async fn test_say_is_owner_only() {
        let service = service();
        let config = config();

        assert_eq!(
            dispatch(&service, &config, invocation(OWNER, None), Command::Say("hi".into())).await,
            Reply::Say("hi".into())
        );
        assert!(matches!(
            dispatch(&service, &config, invocation(MEMBER, None), Command::Say("hi".into())).await,
            Reply::Private(_)
        ));

        let no_owner = Config { owner_id: None, ..config };
        assert!(matches!(
            dispatch(&service, &no_owner, invocation(OWNER, None), Command::Say("hi".into())).await,
            Reply::Private(_)
        ));
    }

    #[tokio::test]
    async fn test_owner_needs_configured_owner() {
        let service = service();
        let config = config();

        assert_eq!(
            dispatch(&service, &config, invocation(MEMBER, None), Command::Owner).await,
            Reply::Owner(OWNER)
        );

        let no_owner = Config { owner_id: None, ..config };
        assert_eq!(
            dispatch(&service, &no_owner, invocation(MEMBER, None), Command::Owner).await,
            Reply::Private("❌ No bot owner is configured.".into())
        );
    }

    #[test]
    fn test_render_owner() {
        assert_eq!(
            render_owner("Rick", "rick_astley", OWNER),
            "👑 **Bot Owner**\n**Name:** Rick\n**Username:** @rick_astley\n**Owner ID:** 7"
        );
        assert_eq!(Reply::Owner(OWNER).into_content(), "👑 **Bot Owner:** <@7>");
    }

    #[test]
    fn test_render_queue() {
        let view = QueueView {
            now_playing: Some(track("Song A")),
            preview: QueuePreview {
                entries: vec![(1, track("Song B")), (2, track("Song C"))],
                hidden: 4,
            },
        };

        assert_eq!(
            render_queue(&view),
            "🎵 **Music Queue**\n**Now Playing:** Song A\n📋 **Queue:**\n1. Song B\n2. Song C\n... and 4 more"
        );
    }

    #[test]
    fn test_render_empty_queue() {
        let view = QueueView {
            now_playing: None,
            preview: QueuePreview { entries: vec![], hidden: 0 },
        };

        assert_eq!(
            render_queue(&view),
            "🎵 **Music Queue**\n**Now Playing:** Nothing playing\n📋 Queue is empty"
        );
    }

    #[test]
    fn test_invariant_violations_are_not_shown() {
        let text = render_error(GUILD, &MusicError::InvariantViolation("two loops".into()));
        assert!(!text.contains("two loops"));
    }
}
