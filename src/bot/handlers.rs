use anyhow::Result;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{error, info, warn};

use crate::{
    audio::player::{PlayOutcome, PlayRequest},
    bot::MusicBot,
    error::MusicError,
    ui::embeds,
};

/// Dispatches a slash command.
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return reply(ctx, &command, "❌ This command only works inside a server.").await;
    };

    info!(
        "📝 /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await,
        "remove" => handle_remove(ctx, &command, bot, guild_id).await,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await,
        "loop" => handle_loop(ctx, &command, bot, guild_id).await,
        _ => reply(ctx, &command, "❌ Unknown command").await,
    }
}

async fn handle_play(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .unwrap_or_default()
        .to_string();

    let voice_channel_id = match user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel_id) => channel_id,
        Err(e) => return reply(ctx, command, &e.user_message()).await,
    };

    // Downloading the first track can take a while
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new().ephemeral(true)),
        )
        .await?;

    let outcome = match bot.sinks_for(ctx, guild_id, voice_channel_id, command.channel_id).await {
        Ok(sinks) => bot.player.play(voice_channel_id, PlayRequest::Query(query), sinks).await,
        Err(e) => Err(voice_unavailable(voice_channel_id, &e)),
    };

    if let Err(e) = &outcome {
        warn!("⚠️ /play failed in {}: {}", voice_channel_id, e);
    }

    let edit = play_response(outcome);
    command.edit_response(&ctx.http, edit).await?;
    Ok(())
}

async fn handle_remove(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let index = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "index")
        .and_then(|opt| opt.value.as_i64())
        .unwrap_or(-1);

    let message = match user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel_id) => match bot.player.remove(channel_id, index).await {
            Ok(track) => format!("🗑️ Removed: **#{}** - {}", index, track.title),
            Err(e) => e.user_message(),
        },
        Err(e) => e.user_message(),
    };

    reply(ctx, command, &message).await
}

async fn handle_queue(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let channel_id = match user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel_id) => channel_id,
        Err(e) => return reply(ctx, command, &e.user_message()).await,
    };

    let tracks = bot.player.list_queue(channel_id).await;
    let mut title = "📋 Queue".to_string();
    if bot.player.session(channel_id).is_loop_enabled().await {
        title.push_str(" 🔁");
    }

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_info_embed(&title, &embeds::format_queue(&tracks)))
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

async fn handle_pause(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let message = match user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel_id) => match bot.player.pause(channel_id).await {
            Ok(()) => "⏯️ Toggled pause.".to_string(),
            Err(e) => e.user_message(),
        },
        Err(e) => e.user_message(),
    };

    reply(ctx, command, &message).await
}

async fn handle_skip(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let message = match user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel_id) => match bot.player.skip(channel_id).await {
            Ok(()) => "⏭️ Skipped.".to_string(),
            Err(e) => e.user_message(),
        },
        Err(e) => e.user_message(),
    };

    reply(ctx, command, &message).await
}

async fn handle_loop(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let message = match user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel_id) => {
            if bot.player.toggle_loop(channel_id).await {
                "🔁 Loop enabled.".to_string()
            } else {
                "➡️ Loop disabled.".to_string()
            }
        }
        Err(e) => e.user_message(),
    };

    reply(ctx, command, &message).await
}

// Helpers

/// Final text of a deferred `/play`; failures become an error embed.
fn play_response(outcome: Result<PlayOutcome, MusicError>) -> EditInteractionResponse {
    match outcome {
        Ok(outcome) => {
            let mut text = format!("🎵 Added **{}** to the queue.", outcome.first.title);
            if outcome.queued > 1 {
                text.push_str(&format!("\n📋 {} more song(s) are on their way.", outcome.queued - 1));
            }
            EditInteractionResponse::new().content(text)
        }
        Err(e) => EditInteractionResponse::new().embed(embeds::create_error_embed(&e.user_message())),
    }
}

fn voice_unavailable(channel_id: ChannelId, e: &anyhow::Error) -> MusicError {
    error!("❌ No voice connection for {}: {:?}", channel_id, e);
    MusicError::TransportJoinFailed(e.to_string())
}

async fn reply(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

/// Voice channel of the caller; queue commands act on that channel's session.
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<ChannelId, MusicError> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or(MusicError::NotInVoiceChannel)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or(MusicError::NotInVoiceChannel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::{Track, TrackId, TrackKind};

    fn rendered(edit: &EditInteractionResponse) -> String {
        serde_json::to_string(edit).unwrap()
    }

    #[test]
    fn missing_voice_support_still_answers_play() {
        let failure = voice_unavailable(ChannelId::new(5), &anyhow::anyhow!("Songbird is not initialised"));

        let text = rendered(&play_response(Err(failure)));

        assert!(text.contains("Failed to join the voice channel"), "{text}");
    }

    #[test]
    fn playlist_reply_mentions_remaining_tracks() {
        let first = Track::new(TrackId::from("a"), "Opening", "https://example.com/a", TrackKind::YouTube);
        let outcome = PlayOutcome {
            first,
            queued: 3,
            started: true,
        };

        let text = rendered(&play_response(Ok(outcome)));

        assert!(text.contains("Opening"), "{text}");
        assert!(text.contains("2 more song(s)"), "{text}");
    }
}
