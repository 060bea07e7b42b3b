use dashmap::DashMap;
use serenity::{
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tokio::{
    sync::broadcast::{error::RecvError, Receiver},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::audio::player::PlayerEvent;

/// Text posted for a player event, if it is worth announcing.
pub fn render_event(event: &PlayerEvent) -> Option<String> {
    match event {
        PlayerEvent::TrackStarted(track) => Some(format!(
            "🎵 **Now Playing:** **{}**\n🔗 <{}>",
            track.title(),
            track.page_url()
        )),
        PlayerEvent::TrackFailed { track, error } => Some(format!(
            "❌ Error playing track **{}**: {}",
            track.title(),
            error
        )),
        PlayerEvent::TrackEnded(_) => None,
    }
}

pub fn render_reconnected(channel_id: ChannelId) -> String {
    format!("🔄 Auto-Reconnected: rejoined <#{channel_id}> automatically")
}

/// Posts a guild's player events to whichever text channel last issued
/// `play`. Runs until the player's event channel closes.
pub fn spawn_announcer(
    http: Arc<Http>,
    guild_id: GuildId,
    mut events: Receiver<PlayerEvent>,
    channels: Arc<DashMap<GuildId, ChannelId>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(guild_id = %guild_id, "📣 Announcer started");

        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(guild_id = %guild_id, "Announcer lagged, skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if let PlayerEvent::TrackStarted(track) = &event {
                info!(guild_id = %guild_id, "▶️ Now playing: {}", track.title());
            }

            let Some(text) = render_event(&event) else {
                continue;
            };
            let Some(channel_id) = channels.get(&guild_id).map(|channel| *channel) else {
                continue;
            };

            if let Err(e) = channel_id.say(&http, text).await {
                error!(guild_id = %guild_id, "Error sending announcement: {:?}", e);
            }
        }

        debug!(guild_id = %guild_id, "Announcer stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audio::testing::track, error::TransportError};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_event() {
        assert_eq!(
            render_event(&PlayerEvent::TrackStarted(track("Song A"))),
            Some("🎵 **Now Playing:** **Song A**\n🔗 <https://page.test/Song A>".to_string())
        );
        assert_eq!(render_event(&PlayerEvent::TrackEnded(track("Song A"))), None);

        let failed = PlayerEvent::TrackFailed {
            track: track("Song B"),
            error: TransportError::Unavailable("cannot open".into()),
        };
        let text = render_event(&failed).unwrap();
        assert!(text.starts_with("❌ Error playing track **Song B**"));
        assert!(text.contains("cannot open"));
    }
}
