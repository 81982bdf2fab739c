//! # Bot Module
//!
//! Discord glue around the playback orchestrator.
//!
//! This module contains:
//! - Slash command registration ([`commands`]) and handling ([`handlers`])
//! - The songbird voice transport ([`events`])
//! - Background maintenance (yt-dlp self-update)
//!
//! ## Architecture
//!
//! [`MusicBot`] implements Serenity's [`EventHandler`] trait. Every command is
//! answered through its [`MusicPlayer`]; sessions are keyed by the caller's
//! voice channel, and each voice channel gets one set of [`PlaybackSinks`]
//! (songbird transport plus "now playing" message) for its lifetime.

use anyhow::Result;
use dashmap::DashMap;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready},
    async_trait,
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{
    audio::{driver::PlaybackSinks, player::MusicPlayer},
    config::Config,
    sources::YouTubeProvider,
    ui::embeds::EmbedStatusBoard,
};
use events::SongbirdTransport;

/// How often yt-dlp updates itself.
const YTDLP_UPDATE_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

pub struct MusicBot {
    config: Arc<Config>,
    pub player: Arc<MusicPlayer>,
    youtube: Arc<YouTubeProvider>,
    /// Voice transport and status message per voice channel
    sinks: DashMap<ChannelId, PlaybackSinks>,
}

impl MusicBot {
    pub fn new(config: Arc<Config>, player: Arc<MusicPlayer>, youtube: Arc<YouTubeProvider>) -> Self {
        Self {
            config,
            player,
            youtube,
            sinks: DashMap::new(),
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// Guild commands (when `GUILD_ID` is set) propagate in about a second,
    /// global ones can take up to an hour.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Failed to register guild commands: {:?}", e);
                    anyhow::anyhow!(
                        "Could not register guild commands. Check that the bot has the 'applications.commands' scope in that guild."
                    )
                })?;
                info!("✅ Guild commands registered for: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Failed to register global commands: {:?}", e);
                    anyhow::anyhow!("Could not register global commands.")
                })?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }

    /// Sinks of `voice_channel`, created on first use. Status messages go to
    /// the text channel where playback was first requested.
    pub async fn sinks_for(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
    ) -> Result<PlaybackSinks> {
        if let Some(sinks) = self.sinks.get(&voice_channel) {
            return Ok(sinks.clone());
        }

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird is not initialised"))?;

        let sinks = self
            .sinks
            .entry(voice_channel)
            .or_insert_with(|| PlaybackSinks {
                transport: Arc::new(SongbirdTransport::new(
                    manager,
                    guild_id,
                    voice_channel,
                    self.config.music_dir.clone(),
                )),
                status: Arc::new(EmbedStatusBoard::new(ctx.http.clone(), text_channel)),
            })
            .clone();

        Ok(sinks)
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guild(s)", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Failed to register commands: {:?}", e);
        }

        let youtube = self.youtube.clone();
        tokio::spawn(async move {
            maintenance_tasks(youtube).await;
        });
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Failed to handle command: {:?}", e);
            }
        }
    }
}

/// Keeps yt-dlp current: updates once at startup, then every
/// [`YTDLP_UPDATE_INTERVAL`].
async fn maintenance_tasks(youtube: Arc<YouTubeProvider>) {
    let mut interval = tokio::time::interval(YTDLP_UPDATE_INTERVAL);

    loop {
        interval.tick().await;
        youtube.update().await;

        if let Err(e) = youtube.version().await {
            warn!("⚠️ yt-dlp is not usable: {}", e);
        }
    }
}
