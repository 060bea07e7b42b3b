//! # Audio Module
//!
//! Per-guild playback for the bot.
//!
//! ## Architecture
//!
//! ### [`track`] - Track
//! - Immutable stream URL + title + page URL produced by a resolver
//!
//! ### [`queue`] - Queue
//! - Strict FIFO of pending tracks with read-only snapshots for display
//!
//! ### [`player`] - Guild Player
//! - One queue, one now-playing slot and one long-lived loop per guild
//! - Pause/resume/skip/stop are safe to call while the loop runs
//! - Transport failures are published as events and never stop the loop
//!
//! ### [`registry`] - Player Registry
//! - Guild → player map with atomic create-on-first-use
//!
//! ### [`transport`] - Seams
//! - `AudioTransport` builds sources, `VoiceConnection` plays them and
//!   resolves a one-shot completion signal when playback ends
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let registry = GuildPlayerRegistry::new(Arc::new(HttpTransport::new(timeout)?));
//! let player = registry.get(guild_id);
//! player.attach(connection).await;
//!
//! let position = player.enqueue(track);
//! player.pause().await?;
//! player.resume().await?;
//! player.skip().await?;
//! player.stop().await;
//! ```

pub mod player;
pub mod queue;
pub mod registry;
pub mod track;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
