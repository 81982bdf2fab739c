use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use std::{path::PathBuf, sync::Arc};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, info};
use url::Url;

use crate::{
    audio::{
        track::{Track, TrackId},
        transport::ResourceStore,
    },
    error::MusicError,
};

/// Downloaded audio, one file per track id under the music directory.
pub struct LocalTrackStore {
    music_dir: PathBuf,
    client: reqwest::Client,
    // Serializes downloads and deletions of the same id
    in_flight: DashMap<TrackId, Arc<Mutex<()>>>,
}

impl LocalTrackStore {
    pub fn new(music_dir: impl Into<PathBuf>) -> Self {
        Self {
            music_dir: music_dir.into(),
            client: reqwest::Client::new(),
            in_flight: DashMap::new(),
        }
    }

    pub fn music_dir(&self) -> &PathBuf {
        &self.music_dir
    }

    /// Where the audio of `id` lives once downloaded.
    pub fn path_for(&self, id: &TrackId) -> PathBuf {
        self.music_dir.join(id.as_str())
    }

    fn partial_path_for(&self, id: &TrackId) -> PathBuf {
        self.music_dir.join(format!("{}.part", id.as_str()))
    }

    fn lock_for(&self, id: &TrackId) -> Arc<Mutex<()>> {
        self.in_flight.entry(id.clone()).or_default().clone()
    }

    async fn download(&self, track: &Track, url: Url) -> Result<(), MusicError> {
        let partial = self.partial_path_for(&track.id);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| MusicError::AcquisitionFailed(format!("{}: {}", track.title, e)))?;

        fs::create_dir_all(&self.music_dir).await?;
        let mut file = fs::File::create(&partial).await?;
        let mut stream = response.bytes_stream();
        let mut total = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    let _ = fs::remove_file(&partial).await;
                    return Err(MusicError::AcquisitionFailed(format!("{}: {}", track.title, e)));
                }
            };
            file.write_all(&chunk).await?;
            total += chunk.len() as u64;
        }

        file.flush().await?;
        drop(file);
        fs::rename(&partial, self.path_for(&track.id)).await?;

        info!("💾 Downloaded {} ({} bytes)", track.title, total);
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for LocalTrackStore {
    async fn ensure_downloaded(&self, track: &Track) -> Result<(), MusicError> {
        let lock = self.lock_for(&track.id);
        let _guard = lock.lock().await;

        if fs::try_exists(self.path_for(&track.id)).await? {
            debug!("💾 Already downloaded: {}", track.title);
            return Ok(());
        }

        let url = Url::parse(&track.source)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or_else(|| MusicError::AcquisitionFailed(format!("invalid source URL for {}", track.title)))?;

        self.download(track, url).await
    }

    async fn release(&self, id: &TrackId) -> Result<(), MusicError> {
        let lock = self.lock_for(id);
        let guard = lock.lock().await;
        let removed = fs::remove_file(self.path_for(id)).await;
        drop(guard);
        drop(lock);

        self.in_flight
            .remove_if(id, |_, lock| Arc::strong_count(lock) == 1);

        removed?;
        debug!("🧹 Released {}", id);
        Ok(())
    }
}
