use std::{sync::Arc, time::Duration};
use tokio::sync::oneshot;
use tracing::{error, info};

use super::{
    driver::PlaybackDriver,
    session::PlaybackSession,
    track::Track,
    transport::ResourceStore,
};
use crate::error::{MusicError, Result};

/// Downloads resolved tracks in order and feeds them into a session.
#[derive(Clone)]
pub struct AcquisitionPipeline {
    store: Arc<dyn ResourceStore>,
    delay: Duration,
}

impl AcquisitionPipeline {
    pub fn new(store: Arc<dyn ResourceStore>, delay: Duration) -> Self {
        Self { store, delay }
    }

    /// Requests every track in order and returns as soon as the first one is
    /// downloaded and queued. The rest keep arriving in the background, one
    /// every `delay`.
    ///
    /// `driver` is started after each enqueue, which is a no-op while the
    /// session is already playing.
    pub async fn acquire(
        &self,
        session: Arc<PlaybackSession>,
        tracks: Vec<Track>,
        driver: PlaybackDriver,
    ) -> Result<Track> {
        if tracks.is_empty() {
            return Err(MusicError::AcquisitionFailed("no results found".to_string()));
        }

        let (ready, first_ready) = oneshot::channel();
        let store = self.store.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            let mut ready = Some(ready);
            let mut last_error = None;

            for (position, track) in tracks.into_iter().enumerate() {
                if position > 0 {
                    tokio::time::sleep(delay).await;
                }

                // The file must not be released between the check and the enqueue
                let lock = session.lock_track(&track.id).await;
                if let Err(e) = store.ensure_downloaded(&track).await {
                    error!(channel = %session.channel_id(), "❌ Failed to download {}: {}", track.title, e);
                    last_error = Some(e);
                    continue;
                }

                session.enqueue([track.clone()]).await;
                drop(lock);
                driver.start().await;

                if let Some(ready) = ready.take() {
                    info!(channel = %session.channel_id(), "✅ First track ready: {}", track.title);
                    let _ = ready.send(Ok(track));
                }
            }

            if let Some(ready) = ready.take() {
                let reason = last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "nothing could be downloaded".to_string());
                let _ = ready.send(Err(MusicError::AcquisitionFailed(reason)));
            }
        });

        first_ready.await.unwrap_or_else(|_| {
            Err(MusicError::AcquisitionFailed(
                "acquisition task ended unexpectedly".to_string(),
            ))
        })
    }
}
