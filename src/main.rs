use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};

use channel_music::{
    audio::player::MusicPlayer,
    bot::MusicBot,
    config::Config,
    sources::{SourceManager, YouTubeProvider},
    storage::LocalTrackStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("channel_music=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting Channel Music v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    let youtube = Arc::new(YouTubeProvider::new(config.ytdlp_path.clone(), config.max_playlist_size));

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&youtube).await;
    }

    let provider = Arc::new(SourceManager::new(youtube.clone()));
    let store = Arc::new(LocalTrackStore::new(config.music_dir.clone()));
    info!("📁 Music directory: {}", store.music_dir().display());

    let player = Arc::new(MusicPlayer::new(&config, provider, store));

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = MusicBot::new(config.clone(), player, youtube);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("⚠️ Shutdown signal received, closing...");
                shard_manager.shutdown_all().await;
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {:?}", e),
        }
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

async fn health_check(youtube: &YouTubeProvider) -> Result<()> {
    match youtube.version().await {
        Ok(version) => {
            println!("OK (yt-dlp {})", version);
            Ok(())
        }
        Err(e) => anyhow::bail!("Missing dependency: {}", e),
    }
}
