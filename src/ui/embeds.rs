use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::{
    all::{ChannelId, MessageId},
    builder::{CreateEmbed, CreateEmbedFooter, CreateMessage, EditMessage},
    http::Http,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    audio::{track::Track, transport::StatusBoard},
    error::MusicError,
};

/// Embed colours
pub mod colors {
    use serenity::all::Colour;

    pub const NOW_PLAYING: Colour = Colour::new(0x9f7fed);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
}

const STANDARD_FOOTER: &str = "🎵 Channel Music";

/// Discord caps message content at 2000 characters.
const MAX_MESSAGE_LEN: usize = 2000;

pub fn create_now_playing_embed(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Now Playing")
        .description(format!("**{}**", track.title))
        .color(colors::NOW_PLAYING)
        .field("🔗 Source", track.kind.as_str(), true)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
}

pub fn create_error_embed(message: &str) -> CreateEmbed {
    CreateEmbed::default()
        .description(message)
        .color(colors::ERROR_RED)
}

pub fn create_info_embed(title: &str, message: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .description(message)
        .color(colors::INFO_BLUE)
}

/// Text of `/queue`. Numbers match the indices `/remove` accepts: the playing
/// track is #0, the next one #1.
pub fn format_queue(tracks: &[Track]) -> String {
    let Some((current, upcoming)) = tracks.split_first() else {
        return "📭 The queue is empty!".to_string();
    };

    let mut text = format!("▶️ **Now playing** - {}\n", current.title);
    if !upcoming.is_empty() {
        text.push_str("\n📋 **Up next:**\n");
    }

    for (position, track) in upcoming.iter().enumerate() {
        let line = format!("**#{}** - {}\n", position + 1, track.title);
        if text.len() + line.len() > MAX_MESSAGE_LEN - 32 {
            text.push_str(&format!("... and {} more", upcoming.len() - position));
            break;
        }
        text.push_str(&line);
    }

    text
}

/// "Now playing" message of one text channel.
///
/// The first track sends a new message, later tracks edit it in place and
/// clearing deletes it.
pub struct EmbedStatusBoard {
    http: Arc<Http>,
    channel_id: ChannelId,
    message: Mutex<Option<MessageId>>,
}

impl EmbedStatusBoard {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self {
            http,
            channel_id,
            message: Mutex::new(None),
        }
    }

    async fn send(&self, track: &Track) -> Result<(), MusicError> {
        let message = self
            .channel_id
            .send_message(&self.http, CreateMessage::new().embed(create_now_playing_embed(track)))
            .await
            .map_err(|e| MusicError::Stream(format!("failed to send status: {}", e)))?;

        *self.message.lock() = Some(message.id);
        Ok(())
    }
}

#[async_trait]
impl StatusBoard for EmbedStatusBoard {
    async fn show(&self, track: &Track) -> Result<(), MusicError> {
        let existing = *self.message.lock();

        let Some(message_id) = existing else {
            return self.send(track).await;
        };

        let edit = EditMessage::new().embed(create_now_playing_embed(track));
        match self.channel_id.edit_message(&self.http, message_id, edit).await {
            Ok(_) => {
                debug!(channel = %self.channel_id, "📝 Status updated: {}", track.title);
                Ok(())
            }
            Err(e) => {
                warn!(channel = %self.channel_id, "⚠️ Could not edit status, sending a new one: {}", e);
                self.send(track).await
            }
        }
    }

    async fn clear(&self) -> Result<(), MusicError> {
        let Some(message_id) = self.message.lock().take() else {
            return Ok(());
        };

        self.channel_id
            .delete_message(&self.http, message_id)
            .await
            .map_err(|e| MusicError::Stream(format!("failed to delete status: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::{TrackId, TrackKind};
    use pretty_assertions::assert_eq;

    fn track(name: &str) -> Track {
        Track::new(TrackId::from(name), name, format!("https://example.com/{name}"), TrackKind::YouTube)
    }

    #[test]
    fn empty_queue_text() {
        assert_eq!(format_queue(&[]), "📭 The queue is empty!");
    }

    #[test]
    fn queue_numbers_match_remove_indices() {
        let text = format_queue(&[track("playing"), track("next"), track("later")]);

        assert_eq!(
            text,
            "▶️ **Now playing** - playing\n\n📋 **Up next:**\n**#1** - next\n**#2** - later\n"
        );
    }

    #[test]
    fn long_queues_are_truncated() {
        let tracks: Vec<_> = (0..500).map(|i| track(&format!("a fairly long track title {i}"))).collect();

        let text = format_queue(&tracks);

        assert!(text.len() <= MAX_MESSAGE_LEN);
        assert!(text.contains("more"));
    }

    #[test]
    fn now_playing_uses_status_colour() {
        assert_eq!(colors::NOW_PLAYING.0, 0x9f7fed);
    }
}
