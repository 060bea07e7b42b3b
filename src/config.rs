use anyhow::{Context, Result};
use serenity::model::id::UserId;
use std::time::Duration;

pub const DEFAULT_PREFIX: &str = "r!";

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub owner_id: Option<UserId>, // Gate for owner-only commands
    pub command_prefix: String,

    // Display
    pub queue_display_limit: usize,

    // Resolution
    pub ytdlp_path: String,
    pub resolve_timeout: Duration,

    // Streaming
    pub http_connect_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// Missing or blank optional values fall back to the defaults; present but
    /// malformed values are errors naming the offending variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let owner_id = match get("OWNER_ID") {
            Some(raw) => {
                let id: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("OWNER_ID is not a user id: {raw}"))?;
                if id == 0 {
                    anyhow::bail!("OWNER_ID cannot be 0");
                }
                Some(UserId::new(id))
            }
            None => None,
        };

        Ok(Self {
            // Discord
            discord_token: get("DISCORD_TOKEN").context("DISCORD_TOKEN must be set")?,
            owner_id,
            command_prefix: get("COMMAND_PREFIX").unwrap_or(defaults.command_prefix),

            // Display
            queue_display_limit: match get("QUEUE_DISPLAY_LIMIT") {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("QUEUE_DISPLAY_LIMIT is not a number: {raw}"))?,
                None => defaults.queue_display_limit,
            },

            // Resolution
            ytdlp_path: get("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            resolve_timeout: match get("RESOLVE_TIMEOUT") {
                Some(raw) => humantime::parse_duration(raw.trim())
                    .with_context(|| format!("RESOLVE_TIMEOUT is not a duration: {raw}"))?,
                None => defaults.resolve_timeout,
            },

            // Streaming
            http_connect_timeout: match get("HTTP_CONNECT_TIMEOUT") {
                Some(raw) => humantime::parse_duration(raw.trim())
                    .with_context(|| format!("HTTP_CONNECT_TIMEOUT is not a duration: {raw}"))?,
                None => defaults.http_connect_timeout,
            },
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Token and prefix must not be blank
    /// - The queue display limit must be greater than 0
    /// - Both timeouts must be greater than 0
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN cannot be empty");
        }

        if self.command_prefix.trim().is_empty() {
            anyhow::bail!("Command prefix cannot be empty");
        }

        if self.queue_display_limit == 0 {
            anyhow::bail!("Queue display limit must be greater than 0");
        }

        if self.resolve_timeout.is_zero() {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if self.http_connect_timeout.is_zero() {
            anyhow::bail!("HTTP connect timeout must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Never includes the token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: prefix '{}' (Owner: {})\n  \
            Queue: {} entries shown\n  \
            Resolver: {} ({} timeout)\n  \
            Streaming: {} connect timeout",
            self.command_prefix,
            self.owner_id.map_or("none".to_string(), |id| id.to_string()),
            self.queue_display_limit,
            self.ytdlp_path,
            humantime::format_duration(self.resolve_timeout),
            humantime::format_duration(self.http_connect_timeout),
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no default token - must be provided)
            discord_token: String::new(),
            owner_id: None,
            command_prefix: DEFAULT_PREFIX.to_string(),

            queue_display_limit: 10,

            ytdlp_path: "yt-dlp".to_string(),
            resolve_timeout: Duration::from_secs(30),

            http_connect_timeout: Duration::from_secs(10),
        }
    }
}
