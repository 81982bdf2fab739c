use dashmap::DashMap;
use serenity::model::id::ChannelId;
use std::{sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{
    ledger::{TrackLedger, TrackLock},
    queue::TrackQueue,
    signal::{ControlSignal, SignalMailbox, SignalReceiver},
    track::{Track, TrackId},
};
use crate::error::{MusicError, Result};

#[derive(Debug, Default)]
struct SessionState {
    queue: TrackQueue,
    is_playing: bool,
    loop_enabled: bool,
}

/// Result of the driver's bookkeeping step after a track ended.
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    pub finished: Option<Track>,
    /// Set when no queue entry of any session references the finished track
    /// anymore. Confirm with [`PlaybackSession::is_track_referenced`] under
    /// [`PlaybackSession::lock_track`] before deleting its audio.
    pub release: Option<TrackId>,
    pub next: Option<Track>,
}

/// Playback state of one channel.
///
/// Every queue mutation goes through the same lock, so enqueue, remove, pop
/// and loop requeue are totally ordered within a session. The lock is never
/// held while audio is streaming.
#[derive(Debug)]
pub struct PlaybackSession {
    channel_id: ChannelId,
    state: RwLock<SessionState>,
    signals: SignalMailbox,
    ledger: Arc<TrackLedger>,
}

impl PlaybackSession {
    pub fn new(channel_id: ChannelId) -> Self {
        Self::with_ledger(channel_id, Arc::new(TrackLedger::new()))
    }

    /// A session whose queue entries are counted in a shared `ledger`.
    pub fn with_ledger(channel_id: ChannelId, ledger: Arc<TrackLedger>) -> Self {
        Self {
            channel_id,
            state: RwLock::new(SessionState::default()),
            signals: SignalMailbox::new(),
            ledger,
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Appends tracks and returns how many were queued before.
    pub async fn enqueue(&self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let mut state = self.state.write().await;
        let before = state.queue.len();
        let tracks: Vec<Track> = tracks.into_iter().collect();
        for track in &tracks {
            self.ledger.retain(&track.id);
        }
        state.queue.enqueue(tracks);
        before
    }

    pub async fn remove(&self, index: i64) -> Result<Track> {
        let mut state = self.state.write().await;
        let removed = state.queue.remove(index)?;
        self.ledger.forget(&removed.id);
        info!(channel = %self.channel_id, "🗑️ Removed #{}: {}", index, removed.title);
        Ok(removed)
    }

    pub async fn front(&self) -> Option<Track> {
        self.state.read().await.queue.front().cloned()
    }

    pub async fn pop_front(&self) -> Option<Track> {
        let popped = self.state.write().await.queue.pop_front();
        if let Some(track) = &popped {
            self.ledger.forget(&track.id);
        }
        popped
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.queue.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.queue.len()
    }

    /// Snapshot of the queue in play order.
    pub async fn tracks(&self) -> Vec<Track> {
        self.state.read().await.queue.tracks()
    }

    pub async fn toggle_loop(&self) -> bool {
        let mut state = self.state.write().await;
        state.loop_enabled = !state.loop_enabled;
        if state.loop_enabled {
            info!(channel = %self.channel_id, "🔁 Loop enabled");
        } else {
            info!(channel = %self.channel_id, "➡️ Loop disabled");
        }
        state.loop_enabled
    }

    pub async fn is_loop_enabled(&self) -> bool {
        self.state.read().await.loop_enabled
    }

    pub async fn is_playing(&self) -> bool {
        self.state.read().await.is_playing
    }

    /// Toggles pause on the running driver.
    pub async fn send_pause(&self, timeout: Duration) -> Result<()> {
        self.send_signal(ControlSignal::Pause, timeout).await
    }

    /// Ends the current track on the running driver.
    pub async fn send_skip(&self, timeout: Duration) -> Result<()> {
        self.send_signal(ControlSignal::Skip, timeout).await
    }

    async fn send_signal(&self, signal: ControlSignal, timeout: Duration) -> Result<()> {
        {
            let state = self.state.read().await;
            if !state.is_playing || state.queue.is_empty() {
                return Err(MusicError::EmptyQueue);
            }
        }

        debug!(channel = %self.channel_id, "📨 Sending {:?} signal", signal);
        self.signals.send_with_timeout(signal, timeout).await
    }

    /// Exclusive use of the audio file of `id`, shared with every session
    /// of the same registry.
    pub(crate) async fn lock_track(&self, id: &TrackId) -> TrackLock {
        self.ledger.lock(id).await
    }

    /// Whether any session of the same registry still queues `id`.
    pub(crate) fn is_track_referenced(&self, id: &TrackId) -> bool {
        self.ledger.is_referenced(id)
    }

    pub(crate) async fn signal_receiver(&self) -> SignalReceiver<'_> {
        self.signals.receiver().await
    }

    /// Claims the session for a new driver.
    ///
    /// Returns the track to start with, or `None` if a driver is already
    /// running or there is nothing to play.
    pub(crate) async fn begin_playback(&self) -> Option<Track> {
        let mut state = self.state.write().await;
        if state.is_playing {
            return None;
        }

        let first = state.queue.front().cloned()?;
        state.is_playing = true;
        Some(first)
    }

    /// Pops the finished track, requeues it in loop mode and works out whether
    /// its local audio can be released.
    pub(crate) async fn advance(&self) -> Advance {
        let mut state = self.state.write().await;

        let finished = state.queue.pop_front();
        if let Some(track) = &finished {
            if state.loop_enabled {
                debug!(channel = %self.channel_id, "🔁 Requeued: {}", track.title);
                state.queue.enqueue([track.clone()]);
            } else {
                self.ledger.forget(&track.id);
            }
        }

        let release = finished
            .as_ref()
            .filter(|track| !self.ledger.is_referenced(&track.id))
            .map(|track| track.id.clone());

        Advance {
            finished,
            release,
            next: state.queue.front().cloned(),
        }
    }

    /// Final step of a driver: goes idle if the queue is still empty,
    /// otherwise hands back the track that arrived in the meantime.
    pub(crate) async fn finish_playback(&self) -> Option<Track> {
        let mut state = self.state.write().await;
        let next = state.queue.front().cloned();
        if next.is_none() {
            state.is_playing = false;
        }
        next
    }
}

/// Sessions keyed by channel, created on first access and kept for the
/// lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<ChannelId, Arc<PlaybackSession>>>,
    ledger: Arc<TrackLedger>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session of `channel_id`, creating it if needed.
    ///
    /// Concurrent first calls for the same channel observe the same instance.
    pub fn get(&self, channel_id: ChannelId) -> Arc<PlaybackSession> {
        self.sessions
            .entry(channel_id)
            .or_insert_with(|| {
                debug!(channel = %channel_id, "🆕 New playback session");
                Arc::new(PlaybackSession::with_ledger(channel_id, self.ledger.clone()))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::TrackKind;
    use pretty_assertions::assert_eq;

    fn track(name: &str) -> Track {
        Track::new(TrackId::from(name), name, format!("https://example.com/{name}"), TrackKind::DirectUrl)
    }

    fn session() -> PlaybackSession {
        PlaybackSession::new(ChannelId::new(1))
    }

    #[tokio::test]
    async fn registry_returns_same_session_per_channel() {
        let registry = SessionRegistry::new();
        let a = registry.get(ChannelId::new(10));
        let b = registry.get(ChannelId::new(10));
        let c = registry.get(ChannelId::new(11));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_access_creates_one_session() {
        let registry = SessionRegistry::new();
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.get(ChannelId::new(42)) })
            })
            .collect();

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap());
        }

        assert_eq!(registry.len(), 1);
        assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
    }

    #[tokio::test]
    async fn begin_playback_claims_once() {
        let session = session();
        assert_eq!(session.begin_playback().await, None);

        session.enqueue([track("a")]).await;
        assert_eq!(session.begin_playback().await.map(|t| t.title), Some("a".to_string()));
        assert!(session.is_playing().await);
        assert_eq!(session.begin_playback().await, None);
    }

    #[tokio::test]
    async fn advance_without_loop_releases_finished_track() {
        let session = session();
        session.enqueue([track("a"), track("b")]).await;

        let advance = session.advance().await;

        assert_eq!(advance.finished.map(|t| t.title), Some("a".to_string()));
        assert_eq!(advance.release, Some(TrackId::from("a")));
        assert_eq!(advance.next.map(|t| t.title), Some("b".to_string()));
        assert_eq!(session.len().await, 1);
    }

    #[tokio::test]
    async fn advance_in_loop_mode_requeues_and_keeps_audio() {
        let session = session();
        session.enqueue([track("a"), track("b")]).await;
        assert!(session.toggle_loop().await);

        let advance = session.advance().await;

        assert_eq!(advance.release, None);
        let titles: Vec<_> = session.tracks().await.into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn advance_keeps_audio_of_duplicate_entries() {
        let session = session();
        session.enqueue([track("a"), track("b"), track("a")]).await;

        let advance = session.advance().await;

        assert_eq!(advance.release, None);
        assert_eq!(session.len().await, 2);
    }

    #[tokio::test]
    async fn finish_playback_goes_idle_only_when_empty() {
        let session = session();
        session.enqueue([track("a")]).await;
        session.begin_playback().await;

        session.advance().await;
        session.enqueue([track("late")]).await;
        assert_eq!(session.finish_playback().await.map(|t| t.title), Some("late".to_string()));
        assert!(session.is_playing().await);

        session.advance().await;
        assert_eq!(session.finish_playback().await, None);
        assert!(!session.is_playing().await);
    }

    #[tokio::test]
    async fn signals_need_a_playing_session() {
        let session = session();
        let result = session.send_pause(Duration::from_secs(3)).await;
        assert!(matches!(result, Err(MusicError::EmptyQueue)));

        let result = session.send_skip(Duration::from_secs(3)).await;
        assert!(matches!(result, Err(MusicError::EmptyQueue)));
    }

    #[tokio::test]
    async fn front_peeks_and_pop_front_takes() {
        let session = session();
        assert_eq!(session.front().await, None);
        assert_eq!(session.pop_front().await, None);

        session.enqueue([track("a"), track("b")]).await;
        assert_eq!(session.front().await.map(|t| t.title), Some("a".to_string()));
        assert_eq!(session.len().await, 2);

        assert_eq!(session.pop_front().await.map(|t| t.title), Some("a".to_string()));
        assert!(!session.is_track_referenced(&TrackId::from("a")));
        assert_eq!(session.front().await.map(|t| t.title), Some("b".to_string()));
    }

    #[tokio::test]
    async fn removed_entries_stop_referencing_audio() {
        let session = session();
        session.enqueue([track("a"), track("b")]).await;

        session.remove(1).await.unwrap();

        assert!(!session.is_track_referenced(&TrackId::from("b")));
        assert!(session.is_track_referenced(&TrackId::from("a")));
    }

    #[tokio::test]
    async fn audio_queued_in_another_channel_is_kept() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty());
        let first = registry.get(ChannelId::new(1));
        let second = registry.get(ChannelId::new(2));
        assert!(!registry.is_empty());

        first.enqueue([track("shared")]).await;
        second.enqueue([track("shared")]).await;

        let advance = first.advance().await;
        assert_eq!(advance.release, None);
        assert!(first.is_track_referenced(&TrackId::from("shared")));

        let advance = second.advance().await;
        assert_eq!(advance.release, Some(TrackId::from("shared")));
    }

    #[tokio::test]
    async fn toggle_loop_flips() {
        let session = session();
        assert!(!session.is_loop_enabled().await);
        assert!(session.toggle_loop().await);
        assert!(!session.toggle_loop().await);
    }
}
