pub mod youtube;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::{
    audio::{
        track::{Track, TrackId, TrackKind},
        transport::TrackProvider,
    },
    error::MusicError,
};

pub use youtube::YouTubeProvider;

/// Routes a `/play` query to the provider that understands it.
///
/// YouTube links and plain text go through yt-dlp; any other http(s) link is
/// treated as a direct audio file.
pub struct SourceManager {
    youtube: Arc<dyn TrackProvider>,
}

impl SourceManager {
    pub fn new(youtube: Arc<dyn TrackProvider>) -> Self {
        Self { youtube }
    }
}

/// Builds a track for a direct audio link, titled after the file name.
pub fn direct_url_track(url: &Url) -> Track {
    let title = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| url.host_str().unwrap_or("audio").to_string());

    Track::new(
        TrackId::hashed(TrackKind::DirectUrl, url.as_str()),
        title,
        url.as_str(),
        TrackKind::DirectUrl,
    )
}

#[async_trait]
impl TrackProvider for SourceManager {
    async fn resolve(&self, query: &str) -> Result<Vec<Track>, MusicError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MusicError::AcquisitionFailed("empty query".to_string()));
        }

        if !YouTubeProvider::is_youtube_url(query) {
            if let Some(url) = Url::parse(query)
                .ok()
                .filter(|url| matches!(url.scheme(), "http" | "https"))
            {
                debug!("🔗 Direct URL: {}", url);
                return Ok(vec![direct_url_track(&url)]);
            }
        }

        self.youtube.resolve(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::transport::MockTrackProvider;
    use pretty_assertions::assert_eq;

    fn youtube_track() -> Track {
        Track::new(
            TrackId::hashed(TrackKind::YouTube, "abc"),
            "From YouTube",
            "https://rr1.googlevideo.com/a",
            TrackKind::YouTube,
        )
    }

    #[tokio::test]
    async fn text_queries_go_to_youtube() {
        let mut youtube = MockTrackProvider::new();
        youtube
            .expect_resolve()
            .withf(|query| query.to_string() == "lofi beats")
            .times(1)
            .returning(|_| Ok(vec![youtube_track()]));
        let manager = SourceManager::new(Arc::new(youtube));

        let tracks = manager.resolve("  lofi beats ").await.unwrap();

        assert_eq!(tracks, vec![youtube_track()]);
    }

    #[tokio::test]
    async fn youtube_links_go_to_youtube() {
        let mut youtube = MockTrackProvider::new();
        youtube.expect_resolve().times(1).returning(|_| Ok(vec![youtube_track()]));
        let manager = SourceManager::new(Arc::new(youtube));

        let tracks = manager.resolve("https://youtu.be/dQw4w9WgXcQ").await.unwrap();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].kind, TrackKind::YouTube);
    }

    #[tokio::test]
    async fn other_links_are_direct_tracks() {
        let mut youtube = MockTrackProvider::new();
        youtube.expect_resolve().never();
        let manager = SourceManager::new(Arc::new(youtube));

        let tracks = manager.resolve("https://cdn.example.com/music/song.mp3").await.unwrap();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "song.mp3");
        assert_eq!(tracks[0].kind, TrackKind::DirectUrl);
        assert!(tracks[0].id.as_str().starts_with("URL:"));
        assert_eq!(tracks[0].source, "https://cdn.example.com/music/song.mp3");
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let mut youtube = MockTrackProvider::new();
        youtube.expect_resolve().never();
        let manager = SourceManager::new(Arc::new(youtube));

        let result = manager.resolve("   ").await;

        assert!(matches!(result, Err(MusicError::AcquisitionFailed(_))));
    }

    #[test]
    fn direct_track_ids_are_stable() {
        let url = Url::parse("https://cdn.example.com/").unwrap();
        let a = direct_url_track(&url);
        let b = direct_url_track(&url);
        assert_eq!(a.id, b.id);
        assert_eq!(a.title, "cdn.example.com");
    }
}
