//! The playback loop of a session.
//!
//! One driver task runs per playing session. It streams the front track,
//! reacts to control signals while the stream is open, then advances the
//! queue and repeats until the queue is empty.

use std::{pin::Pin, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::Sleep};
use tracing::{debug, error, info, warn};

use super::{
    session::PlaybackSession,
    signal::{ControlSignal, SignalReceiver},
    track::{Track, TrackId},
    transport::{AudioStream, AudioTransport, ResourceStore, StatusBoard, StreamEnd},
};
use crate::config::Config;

/// How long to wait for a dropped voice connection to come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_backoff: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Backoff before resuming after the `attempt`-th disconnect during the
    /// same track (1-based). Doubles each time; `None` once the attempts are
    /// exhausted.
    pub fn backoff_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }

        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.base_backoff.saturating_mul(factor))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_backoff: Duration::from_secs(2),
            max_attempts: 5,
        }
    }
}

impl From<&Config> for ReconnectPolicy {
    fn from(config: &Config) -> Self {
        Self {
            base_backoff: Duration::from_millis(config.reconnect_backoff_ms),
            max_attempts: config.reconnect_max_attempts,
        }
    }
}

/// Where a driver sends audio and status updates.
#[derive(Clone)]
pub struct PlaybackSinks {
    pub transport: Arc<dyn AudioTransport>,
    pub status: Arc<dyn StatusBoard>,
}

#[derive(Clone)]
pub struct PlaybackDriver {
    session: Arc<PlaybackSession>,
    sinks: PlaybackSinks,
    store: Arc<dyn ResourceStore>,
    reconnect: ReconnectPolicy,
}

impl PlaybackDriver {
    pub fn new(
        session: Arc<PlaybackSession>,
        sinks: PlaybackSinks,
        store: Arc<dyn ResourceStore>,
        reconnect: ReconnectPolicy,
    ) -> Self {
        Self {
            session,
            sinks,
            store,
            reconnect,
        }
    }

    /// Spawns the playback loop unless the session already has one or has
    /// nothing to play.
    pub async fn start(&self) -> Option<JoinHandle<()>> {
        let first = self.session.begin_playback().await?;
        let driver = self.clone();
        Some(tokio::spawn(async move { driver.run(first).await }))
    }

    async fn run(self, first: Track) {
        let channel = self.session.channel_id();
        let mut signals = self.session.signal_receiver().await;
        let mut current = Some(first);

        info!(channel = %channel, "▶️ Playback started");

        loop {
            let Some(track) = current.take() else {
                self.tear_down().await;
                match self.session.finish_playback().await {
                    // Something was queued while tearing down
                    Some(track) => {
                        current = Some(track);
                        continue;
                    }
                    None => break,
                }
            };

            self.play_track(&track, &mut signals).await;

            let advance = self.session.advance().await;
            if let Some(id) = advance.release {
                self.release(&id).await;
            }
            current = advance.next;
        }

        info!(channel = %channel, "⏹️ Playback finished, queue is empty");
    }

    /// Deletes the audio of `id` unless it was queued again meanwhile.
    async fn release(&self, id: &TrackId) {
        let channel = self.session.channel_id();
        let _lock = self.session.lock_track(id).await;

        if self.session.is_track_referenced(id) {
            debug!(channel = %channel, "♻️ Keeping {}, queued again", id);
            return;
        }

        if let Err(e) = self.store.release(id).await {
            warn!(channel = %channel, "⚠️ Failed to release {}: {}", id, e);
        }
    }

    async fn play_track(&self, track: &Track, signals: &mut SignalReceiver<'_>) {
        let channel = self.session.channel_id();
        info!(channel = %channel, "🎵 Now playing: {}", track.title);

        if let Err(e) = self.sinks.status.show(track).await {
            warn!(channel = %channel, "⚠️ Failed to update status: {}", e);
        }

        match self.sinks.transport.open_stream(track).await {
            Ok(stream) => self.stream_until_end(track, stream, signals).await,
            Err(e) => error!(channel = %channel, "❌ Failed to open stream for {}: {}", track.title, e),
        }
    }

    /// Waits for the stream to end while applying pause and skip signals.
    async fn stream_until_end(
        &self,
        track: &Track,
        mut stream: Box<dyn AudioStream>,
        signals: &mut SignalReceiver<'_>,
    ) {
        let channel = self.session.channel_id();
        let mut paused = false;
        let mut disconnects = 0u32;
        let mut backoff: Option<Pin<Box<Sleep>>> = None;

        loop {
            tokio::select! {
                Some(envelope) = signals.recv() => {
                    let signal = envelope.signal();
                    if !envelope.acknowledge() {
                        debug!(channel = %channel, "🗑️ Discarding stale {:?} signal", signal);
                        continue;
                    }

                    match signal {
                        ControlSignal::Pause => {
                            paused = !paused;
                            // While backing off the stream stays suspended
                            if backoff.is_none() {
                                set_paused(stream.as_mut(), paused);
                            }
                            if paused {
                                info!(channel = %channel, "⏸️ Paused: {}", track.title);
                            } else {
                                info!(channel = %channel, "▶️ Resumed: {}", track.title);
                            }
                        }
                        ControlSignal::Skip => {
                            set_paused(stream.as_mut(), true);
                            if let Err(e) = stream.stop() {
                                warn!(channel = %channel, "⚠️ Failed to stop stream: {}", e);
                            }
                            info!(channel = %channel, "⏭️ Skipped: {}", track.title);
                            return;
                        }
                    }
                }

                () = wait_for_backoff(&mut backoff) => {
                    backoff = None;
                    set_paused(stream.as_mut(), paused);
                    debug!(channel = %channel, "🔌 Resuming after reconnect backoff");
                }

                end = stream.next_event() => match end {
                    StreamEnd::Finished => {
                        debug!(channel = %channel, "✅ Finished: {}", track.title);
                        return;
                    }
                    StreamEnd::ConnectionClosed => {
                        disconnects += 1;
                        match self.reconnect.backoff_for(disconnects) {
                            Some(delay) => {
                                warn!(
                                    channel = %channel,
                                    "🔌 Voice connection closed, retrying in {} (attempt {}/{})",
                                    humantime::format_duration(delay),
                                    disconnects,
                                    self.reconnect.max_attempts
                                );
                                set_paused(stream.as_mut(), true);
                                backoff = Some(Box::pin(tokio::time::sleep(delay)));
                            }
                            None => {
                                error!(
                                    channel = %channel,
                                    "❌ Voice connection did not recover after {} attempts, dropping {}",
                                    self.reconnect.max_attempts,
                                    track.title
                                );
                                if let Err(e) = stream.stop() {
                                    warn!(channel = %channel, "⚠️ Failed to stop stream: {}", e);
                                }
                                return;
                            }
                        }
                    }
                    StreamEnd::Failed(reason) => {
                        error!(channel = %channel, "❌ Stream error on {}: {}", track.title, reason);
                        return;
                    }
                },
            }
        }
    }

    async fn tear_down(&self) {
        let channel = self.session.channel_id();

        if let Err(e) = self.sinks.transport.disconnect().await {
            warn!(channel = %channel, "⚠️ Failed to disconnect from voice: {}", e);
        }

        if let Err(e) = self.sinks.status.clear().await {
            warn!(channel = %channel, "⚠️ Failed to remove status message: {}", e);
        }
    }
}

/// Completes when the pending backoff elapses; never completes without one.
async fn wait_for_backoff(backoff: &mut Option<Pin<Box<Sleep>>>) {
    match backoff {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

fn set_paused(stream: &mut dyn AudioStream, paused: bool) {
    if let Err(e) = stream.set_paused(paused) {
        warn!("⚠️ Failed to set paused={}: {}", paused, e);
    }
}
