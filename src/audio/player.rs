use serenity::model::id::ChannelId;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

use super::{
    acquisition::AcquisitionPipeline,
    driver::{PlaybackDriver, PlaybackSinks, ReconnectPolicy},
    session::{PlaybackSession, SessionRegistry},
    track::Track,
    transport::{ResourceStore, TrackProvider},
};
use crate::{
    config::Config,
    error::Result,
};

/// What `/play` asked for.
#[derive(Debug, Clone)]
pub enum PlayRequest {
    /// Free text or URL, resolved through the track provider
    Query(String),
    /// Tracks that are already resolved
    Tracks(Vec<Track>),
}

/// Result of a successful play request.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayOutcome {
    /// First track that became ready
    pub first: Track,
    /// Number of tracks resolved for the request
    pub queued: usize,
    /// Whether the request started playback on an idle session
    pub started: bool,
}

/// Public surface of the orchestrator: every chat command maps to one method.
pub struct MusicPlayer {
    sessions: SessionRegistry,
    provider: Arc<dyn TrackProvider>,
    store: Arc<dyn ResourceStore>,
    acquisition: AcquisitionPipeline,
    signal_timeout: Duration,
    reconnect: ReconnectPolicy,
}

impl MusicPlayer {
    pub fn new(config: &Config, provider: Arc<dyn TrackProvider>, store: Arc<dyn ResourceStore>) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            provider,
            acquisition: AcquisitionPipeline::new(store.clone(), config.acquisition_delay()),
            store,
            signal_timeout: config.signal_timeout(),
            reconnect: ReconnectPolicy::from(config),
        }
    }

    pub fn session(&self, channel_id: ChannelId) -> Arc<PlaybackSession> {
        self.sessions.get(channel_id)
    }

    /// Joins the channel, resolves the request and queues the results.
    ///
    /// Returns once the first track is downloaded and queued; the rest of a
    /// playlist keeps arriving in the background. If nothing could be queued
    /// and the session is idle, the channel is left again.
    pub async fn play(&self, channel_id: ChannelId, request: PlayRequest, sinks: PlaybackSinks) -> Result<PlayOutcome> {
        let session = self.session(channel_id);
        let was_playing = session.is_playing().await;

        sinks.transport.connect().await?;

        let (first, queued) = match self.queue_request(&session, request, sinks.clone()).await {
            Ok(ready) => ready,
            Err(e) => {
                if !session.is_playing().await {
                    if let Err(leave) = sinks.transport.disconnect().await {
                        warn!(channel = %channel_id, "⚠️ Failed to leave voice after {}: {}", e, leave);
                    }
                }
                return Err(e);
            }
        };

        info!(channel = %channel_id, "🎶 {} track(s) requested, first: {}", queued, first.title);

        Ok(PlayOutcome {
            first,
            queued,
            started: !was_playing,
        })
    }

    /// Resolves `request` and acquires its tracks; returns the first ready
    /// track and how many were resolved.
    async fn queue_request(
        &self,
        session: &Arc<PlaybackSession>,
        request: PlayRequest,
        sinks: PlaybackSinks,
    ) -> Result<(Track, usize)> {
        let channel_id = session.channel_id();
        let tracks = match request {
            PlayRequest::Query(query) => {
                info!(channel = %channel_id, "🔍 Resolving: {}", query);
                self.provider.resolve(&query).await.map_err(|e| {
                    error!(channel = %channel_id, "❌ Could not resolve {}: {}", query, e);
                    e
                })?
            }
            PlayRequest::Tracks(tracks) => tracks,
        };
        let queued = tracks.len();

        let driver = PlaybackDriver::new(session.clone(), sinks, self.store.clone(), self.reconnect);
        let first = self.acquisition.acquire(session.clone(), tracks, driver).await?;
        Ok((first, queued))
    }

    pub async fn remove(&self, channel_id: ChannelId, index: i64) -> Result<Track> {
        self.session(channel_id).remove(index).await
    }

    /// Queue in play order; the first entry is the playing track.
    pub async fn list_queue(&self, channel_id: ChannelId) -> Vec<Track> {
        self.session(channel_id).tracks().await
    }

    /// Toggles pause on the playing track.
    pub async fn pause(&self, channel_id: ChannelId) -> Result<()> {
        self.session(channel_id).send_pause(self.signal_timeout).await
    }

    pub async fn skip(&self, channel_id: ChannelId) -> Result<()> {
        self.session(channel_id).send_skip(self.signal_timeout).await
    }

    /// Flips loop mode and returns the new state.
    pub async fn toggle_loop(&self, channel_id: ChannelId) -> bool {
        self.session(channel_id).toggle_loop().await
    }

    pub async fn is_playing(&self, channel_id: ChannelId) -> bool {
        self.session(channel_id).is_playing().await
    }
}
