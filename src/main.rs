use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{input::Input, SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod voice;

use crate::bot::{service::MusicService, MusicBot};
use crate::config::Config;
use crate::sources::YtDlpResolver;
use crate::voice::songbird::{HttpTransport, SongbirdGateway};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_dj=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting guild-dj v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("{}", config.summary());

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    // Minimal intents: guild cache, voice states and prefixed messages
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let manager = Songbird::serenity();
    let transport = Arc::new(HttpTransport::new(config.http_connect_timeout)?);
    let gateway = Arc::new(SongbirdGateway::new(Arc::clone(&manager)));
    let resolver = Arc::new(YtDlpResolver::new(
        config.ytdlp_path.clone(),
        config.resolve_timeout,
    )?);

    let service: MusicService<Input> =
        MusicService::new(transport, gateway, resolver, config.queue_display_limit);
    let handler = MusicBot::new(config.clone(), Arc::new(service));

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(manager)
        .await?;

    // Graceful shutdown
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("⚠️ Shutdown signal received, closing...");
                shard_manager.shutdown_all().await;
            }
            Err(e) => error!("Could not listen for Ctrl+C: {:?}", e),
        }
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    let yt_dlp = async_process::Command::new(&config.ytdlp_path)
        .arg("--version")
        .output()
        .await?;

    if yt_dlp.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("{} is not usable", config.ytdlp_path);
    }
}
