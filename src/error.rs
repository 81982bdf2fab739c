//! Error taxonomy for the playback orchestrator.
//!
//! Queue-shape errors and signal timeouts are surfaced straight to the user,
//! so every variant carries a chat-ready message through
//! [`MusicError::user_message`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MusicError {
    /// Nothing queued (or nothing playing, for signal based operations)
    #[error("queue is empty")]
    EmptyQueue,

    #[error("index cannot be negative")]
    IndexNegative,

    #[error("index {index} is out of range (queue length {len})")]
    IndexOutOfRange { index: i64, len: usize },

    /// Index 0 addresses the track currently being streamed
    #[error("index 0 is the current track")]
    CurrentTrack,

    /// The driver did not take the signal in time. The outcome is unknown.
    #[error("signal timeout")]
    SignalTimeout,

    #[error("acquisition failed: {0}")]
    AcquisitionFailed(String),

    #[error("failed to join voice channel: {0}")]
    TransportJoinFailed(String),

    #[error("user is not in a voice channel")]
    NotInVoiceChannel,

    #[error("stream error: {0}")]
    Stream(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MusicError {
    /// Text shown to the user who issued the command.
    pub fn user_message(&self) -> String {
        match self {
            MusicError::EmptyQueue => "❌ The queue is empty.".to_string(),
            MusicError::IndexNegative => "❌ The index cannot be negative.".to_string(),
            MusicError::IndexOutOfRange { len, .. } => format!(
                "❌ Invalid index! (Queue length: {})",
                len.saturating_sub(1)
            ),
            MusicError::CurrentTrack => {
                "❌ That track is playing right now, use `/skip` instead.".to_string()
            }
            MusicError::SignalTimeout => {
                "⏰ The player did not respond in time, please try again.".to_string()
            }
            MusicError::AcquisitionFailed(reason) => {
                format!("❌ Could not load the requested music: {}", reason)
            }
            MusicError::TransportJoinFailed(_) => {
                "❌ Failed to join the voice channel.".to_string()
            }
            MusicError::NotInVoiceChannel => {
                "❌ You must be in a voice channel to use this command.".to_string()
            }
            MusicError::Stream(_) | MusicError::Io(_) => {
                "❌ Something went wrong while playing music.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, MusicError>;
