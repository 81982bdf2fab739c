//! Collaborators of the playback orchestrator.
//!
//! The orchestrator decides *when* to stream, download, release or show
//! something; implementations of these traits decide *how*.

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::track::{Track, TrackId};
use crate::error::MusicError;

/// How an audio stream reported that it stopped (or hiccuped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// Natural end of stream
    Finished,
    /// Voice connection dropped. Recoverable: the stream stays open.
    ConnectionClosed,
    /// Fatal stream error, handled like end of stream
    Failed(String),
}

/// An open audio stream for one track.
#[async_trait]
pub trait AudioStream: Send {
    fn set_paused(&mut self, paused: bool) -> Result<(), MusicError>;

    /// Ends the stream early.
    fn stop(&mut self) -> Result<(), MusicError>;

    /// Waits for the next completion report.
    ///
    /// Must be cancel safe: the driver races it against control signals and
    /// drops the future whenever a signal wins.
    async fn next_event(&mut self) -> StreamEnd;
}

/// Voice connection of one channel.
#[async_trait]
pub trait AudioTransport: Send + Sync {
    /// Joins the voice channel. Must be idempotent.
    async fn connect(&self) -> Result<(), MusicError>;

    async fn open_stream(&self, track: &Track) -> Result<Box<dyn AudioStream>, MusicError>;

    async fn disconnect(&self) -> Result<(), MusicError>;
}

/// "Now playing" presentation of one channel.
#[async_trait]
pub trait StatusBoard: Send + Sync {
    async fn show(&self, track: &Track) -> Result<(), MusicError>;

    async fn clear(&self) -> Result<(), MusicError>;
}

/// Local audio files, one per track id.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Makes the audio of `track` available locally. No-op if it already is.
    async fn ensure_downloaded(&self, track: &Track) -> Result<(), MusicError>;

    /// Deletes the audio of `id`. Best effort, callers only log failures.
    async fn release(&self, id: &TrackId) -> Result<(), MusicError>;
}

/// Turns a user query or URL into tracks.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TrackProvider: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Vec<Track>, MusicError>;
}
