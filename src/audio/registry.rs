use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::info;

use super::{player::GuildPlayer, transport::AudioTransport};

/// Owns one [`GuildPlayer`] per guild.
///
/// Players are created lazily on first access and never removed; `cleanup`
/// resets a player in place so later commands reuse the same instance.
pub struct GuildPlayerRegistry<S> {
    players: DashMap<GuildId, Arc<GuildPlayer<S>>>,
    transport: Arc<dyn AudioTransport<Source = S>>,
}

impl<S: Send + 'static> GuildPlayerRegistry<S> {
    pub fn new(transport: Arc<dyn AudioTransport<Source = S>>) -> Self {
        Self {
            players: DashMap::new(),
            transport,
        }
    }

    /// Returns the guild's player, creating it under the shard lock so two
    /// racing commands can never end up with different instances.
    pub fn get(&self, guild_id: GuildId) -> Arc<GuildPlayer<S>> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                info!(guild_id = %guild_id, "🎛️ Creating player");
                Arc::new(GuildPlayer::new(guild_id, Arc::clone(&self.transport)))
            })
            .clone()
    }

    pub fn existing(&self, guild_id: GuildId) -> Option<Arc<GuildPlayer<S>>> {
        self.players.get(&guild_id).map(|player| player.clone())
    }

    /// Resets the guild's player if one exists.
    pub async fn cleanup(&self, guild_id: GuildId) {
        if let Some(player) = self.existing(guild_id) {
            player.stop().await;
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{track, FakeSource, FakeTransport};

    fn registry() -> Arc<GuildPlayerRegistry<FakeSource>> {
        Arc::new(GuildPlayerRegistry::new(Arc::new(FakeTransport)))
    }

    #[tokio::test]
    async fn test_same_guild_reuses_player() {
        let registry = registry();
        let first = registry.get(GuildId::new(1));
        let second = registry.get(GuildId::new(1));
        let other = registry.get(GuildId::new(2));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_creates_one_player() {
        let registry = registry();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.get(GuildId::new(42)) })
            })
            .collect();

        let players: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|result| result.unwrap())
            .collect();

        assert_eq!(registry.len(), 1);
        assert!(players.iter().all(|player| Arc::ptr_eq(player, &players[0])));
    }

    #[tokio::test]
    async fn test_cleanup_resets_but_keeps_entry() {
        let registry = registry();
        let player = registry.get(GuildId::new(9));
        player.enqueue(track("a"));
        player.enqueue(track("b"));

        registry.cleanup(GuildId::new(9)).await;

        assert_eq!(registry.len(), 1);
        assert!(registry.get(GuildId::new(9)).snapshot().pending.is_empty());
        assert!(Arc::ptr_eq(&player, &registry.get(GuildId::new(9))));

        // Unknown guilds are a no-op.
        registry.cleanup(GuildId::new(10)).await;
        assert!(registry.existing(GuildId::new(10)).is_none());
    }
}
