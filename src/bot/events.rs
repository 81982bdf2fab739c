use serenity::{
    async_trait,
    model::id::{ChannelId, GuildId},
};
use songbird::{
    error::JoinError,
    input::{File, Input},
    tracks::TrackHandle,
    Call, CoreEvent, Event as VoiceEvent, EventContext, EventHandler as VoiceEventHandler, Songbird,
    TrackEvent,
};
use std::{
    path::PathBuf,
    sync::{Arc, Weak},
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        track::Track,
        transport::{AudioStream, AudioTransport, StreamEnd},
    },
    error::MusicError,
};

/// Forwards track events into the stream that registered them.
///
/// Cancels itself once that stream is gone.
struct StreamEventForwarder {
    guild_id: GuildId,
    kind: ForwardKind,
    sender: mpsc::UnboundedSender<StreamEnd>,
}

#[derive(Debug, Clone, Copy)]
enum ForwardKind {
    End,
    Error,
}

#[async_trait]
impl VoiceEventHandler for StreamEventForwarder {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        let end = match (self.kind, ctx) {
            (ForwardKind::End, _) => StreamEnd::Finished,
            (ForwardKind::Error, EventContext::Track(tracks)) => {
                let reason = tracks
                    .first()
                    .map(|(state, _)| format!("{:?}", state.playing))
                    .unwrap_or_else(|| "unknown track error".to_string());
                StreamEnd::Failed(reason)
            }
            (ForwardKind::Error, _) => StreamEnd::Failed("unknown track error".to_string()),
        };

        if self.sender.send(end).is_err() {
            debug!("Stream closed, removing {:?} handler in guild {}", self.kind, self.guild_id);
            return Some(VoiceEvent::Cancel);
        }

        None
    }
}

/// Stream that currently receives driver disconnects.
type DisconnectTarget = Arc<parking_lot::Mutex<Option<mpsc::UnboundedSender<StreamEnd>>>>;

/// Routes driver disconnects of one call to whichever stream is open.
///
/// Registered once per call and lives as long as the call does.
struct DisconnectForwarder {
    guild_id: GuildId,
    target: DisconnectTarget,
}

impl DisconnectForwarder {
    /// Returns whether an open stream was told.
    fn forward(&self) -> bool {
        match self.target.lock().as_ref() {
            Some(sender) => sender.send(StreamEnd::ConnectionClosed).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl VoiceEventHandler for DisconnectForwarder {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        warn!("🔌 Voice driver disconnected in guild {}", self.guild_id);
        if !self.forward() {
            debug!("No open stream in guild {} to notify", self.guild_id);
        }
        None
    }
}

/// A songbird track plus the events reported for it.
pub struct SongbirdStream {
    handle: TrackHandle,
    events: mpsc::UnboundedReceiver<StreamEnd>,
}

#[async_trait]
impl AudioStream for SongbirdStream {
    fn set_paused(&mut self, paused: bool) -> Result<(), MusicError> {
        let result = if paused {
            self.handle.pause()
        } else {
            self.handle.play()
        };
        result.map_err(|e| MusicError::Stream(e.to_string()))
    }

    fn stop(&mut self) -> Result<(), MusicError> {
        self.handle.stop().map_err(|e| MusicError::Stream(e.to_string()))
    }

    async fn next_event(&mut self) -> StreamEnd {
        self.events
            .recv()
            .await
            .unwrap_or_else(|| StreamEnd::Failed("track events closed".to_string()))
    }
}

/// Voice connection of one voice channel through songbird.
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    channel_id: ChannelId,
    music_dir: PathBuf,
    disconnects: DisconnectTarget,
    /// Call that already has a disconnect forwarder
    watched_call: parking_lot::Mutex<Option<Weak<Mutex<Call>>>>,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>, guild_id: GuildId, channel_id: ChannelId, music_dir: PathBuf) -> Self {
        Self {
            manager,
            guild_id,
            channel_id,
            music_dir,
            disconnects: DisconnectTarget::default(),
            watched_call: parking_lot::Mutex::new(None),
        }
    }

    async fn join(&self) -> Result<Arc<Mutex<Call>>, MusicError> {
        match self.manager.join(self.guild_id, self.channel_id).await {
            Ok(call) => {
                info!("🔊 Joined voice channel {} in guild {}", self.channel_id, self.guild_id);
                Ok(call)
            }
            Err(e) => {
                error!("❌ Failed to join voice channel {}: {:?}", self.channel_id, e);
                Err(MusicError::TransportJoinFailed(e.to_string()))
            }
        }
    }

    /// The active call, joining again if the connection was dropped.
    async fn call(&self) -> Result<Arc<Mutex<Call>>, MusicError> {
        let call = match self.joined_call().await {
            Some(call) => call,
            None => self.join().await?,
        };

        self.watch_disconnects(&call).await;
        Ok(call)
    }

    async fn joined_call(&self) -> Option<Arc<Mutex<Call>>> {
        let call = self.manager.get(self.guild_id)?;
        let joined = call.lock().await.current_channel().map(|c| c.0.get());
        (joined == Some(self.channel_id.get())).then_some(call)
    }

    /// Adds the disconnect forwarder to `call` unless it already has it.
    async fn watch_disconnects(&self, call: &Arc<Mutex<Call>>) {
        {
            let mut watched = self.watched_call.lock();
            if watched
                .as_ref()
                .is_some_and(|known| std::ptr::eq(known.as_ptr(), Arc::as_ptr(call)))
            {
                return;
            }
            *watched = Some(Arc::downgrade(call));
        }

        call.lock().await.add_global_event(
            VoiceEvent::Core(CoreEvent::DriverDisconnect),
            DisconnectForwarder {
                guild_id: self.guild_id,
                target: self.disconnects.clone(),
            },
        );
        debug!("👂 Watching voice disconnects in guild {}", self.guild_id);
    }
}

#[async_trait]
impl AudioTransport for SongbirdTransport {
    async fn connect(&self) -> Result<(), MusicError> {
        self.call().await.map(|_| ())
    }

    async fn open_stream(&self, track: &Track) -> Result<Box<dyn AudioStream>, MusicError> {
        let call = self.call().await?;
        let path = self.music_dir.join(track.id.as_str());
        let input: Input = File::new(path).into();

        let (sender, events) = mpsc::unbounded_channel();
        let forwarder = |kind| StreamEventForwarder {
            guild_id: self.guild_id,
            kind,
            sender: sender.clone(),
        };

        let handle = call.lock().await.play_input(input);
        *self.disconnects.lock() = Some(sender.clone());

        handle
            .add_event(VoiceEvent::Track(TrackEvent::End), forwarder(ForwardKind::End))
            .and_then(|_| handle.add_event(VoiceEvent::Track(TrackEvent::Error), forwarder(ForwardKind::Error)))
            .map_err(|e| {
                let _ = handle.stop();
                MusicError::Stream(e.to_string())
            })?;

        debug!("🎧 Streaming {} in guild {}", track.title, self.guild_id);
        Ok(Box::new(SongbirdStream { handle, events }))
    }

    async fn disconnect(&self) -> Result<(), MusicError> {
        match self.manager.remove(self.guild_id).await {
            Ok(()) | Err(JoinError::NoCall) => {
                info!("👋 Left voice channel {} in guild {}", self.channel_id, self.guild_id);
                Ok(())
            }
            Err(e) => Err(MusicError::Stream(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarder() -> DisconnectForwarder {
        DisconnectForwarder {
            guild_id: GuildId::new(1),
            target: DisconnectTarget::default(),
        }
    }

    #[test]
    fn disconnects_reach_the_latest_stream() {
        let forwarder = forwarder();
        let (first, mut first_events) = mpsc::unbounded_channel();
        let (second, mut second_events) = mpsc::unbounded_channel();

        *forwarder.target.lock() = Some(first);
        *forwarder.target.lock() = Some(second);

        assert!(forwarder.forward());
        assert!(first_events.try_recv().is_err());
        assert_eq!(second_events.try_recv().ok(), Some(StreamEnd::ConnectionClosed));
    }

    #[test]
    fn closed_streams_do_not_stop_forwarding() {
        let forwarder = forwarder();
        assert!(!forwarder.forward());

        let (closed, events) = mpsc::unbounded_channel();
        drop(events);
        *forwarder.target.lock() = Some(closed);
        assert!(!forwarder.forward());

        let (open, mut events) = mpsc::unbounded_channel();
        *forwarder.target.lock() = Some(open);
        assert!(forwarder.forward());
        assert_eq!(events.try_recv().ok(), Some(StreamEnd::ConnectionClosed));
    }
}
