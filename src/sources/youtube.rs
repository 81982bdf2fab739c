use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    audio::{
        track::{Track, TrackId, TrackKind},
        transport::TrackProvider,
    },
    error::MusicError,
};

/// Resolves YouTube videos, playlists and searches through yt-dlp.
pub struct YouTubeProvider {
    ytdlp_path: String,
    max_playlist_size: usize,
}

/// The part of a `--dump-json` line we use.
#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    id: String,
    title: String,
    /// Direct URL of the selected format
    url: Option<String>,
    thumbnail: Option<String>,
}

impl YouTubeProvider {
    pub fn new(ytdlp_path: impl Into<String>, max_playlist_size: usize) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            max_playlist_size,
        }
    }

    /// Whether `url` points at YouTube (video, short, playlist or music).
    pub fn is_youtube_url(url: &str) -> bool {
        Regex::new(r"^(https?://)?(www\.|m\.)?(youtube\.com/(watch\?v=|embed/|v/|shorts/|playlist\?)|youtu\.be/|music\.youtube\.com/)")
            .is_ok_and(|re| re.is_match(url))
    }

    pub fn is_playlist_url(url: &str) -> bool {
        Url::parse(url).is_ok_and(|url| {
            url.path() == "/playlist" || url.query_pairs().any(|(key, _)| key == "list")
        })
    }

    /// yt-dlp arguments for `query`: the URL itself, or a single search hit
    /// biased towards lyric uploads.
    fn args_for(&self, query: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--dump-json".into(),
            "--skip-download".into(),
            "--quiet".into(),
            "--no-warnings".into(),
            "--format".into(),
            "bestaudio/best".into(),
        ];

        if Self::is_youtube_url(query) {
            if Self::is_playlist_url(query) {
                args.push("--yes-playlist".into());
                args.push("--playlist-end".into());
                args.push(self.max_playlist_size.to_string());
            } else {
                args.push("--no-playlist".into());
            }
            args.push(query.to_string());
        } else {
            args.push(format!("ytsearch1:{} (Lyrics)", query));
        }

        args
    }

    async fn run(&self, args: &[String]) -> Result<String, MusicError> {
        let output = Command::new(&self.ytdlp_path)
            .args(args)
            .output()
            .await
            .map_err(|e| MusicError::AcquisitionFailed(format!("failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(MusicError::AcquisitionFailed(format!("yt-dlp error: {}", error.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Installed yt-dlp version, used by the startup health check.
    pub async fn version(&self) -> Result<String, MusicError> {
        let version = self.run(&["--version".to_string()]).await?;
        Ok(version.trim().to_string())
    }

    /// Runs `yt-dlp -U` and logs the version change.
    pub async fn update(&self) {
        info!("🔄 Updating yt-dlp...");

        let before = self.version().await.ok();
        match self.run(&["-U".to_string(), "--quiet".to_string(), "--no-warnings".to_string()]).await {
            Ok(_) => {
                let after = self.version().await.ok();
                if before == after {
                    info!("✅ yt-dlp is already up to date ({})", after.unwrap_or_default());
                } else {
                    info!(
                        "✅ yt-dlp updated: {} => {}",
                        before.unwrap_or_default(),
                        after.unwrap_or_default()
                    );
                }
            }
            Err(e) => warn!("⚠️ Could not update yt-dlp: {}", e),
        }
    }
}

/// Turns yt-dlp `--dump-json` output (one JSON object per line) into tracks.
///
/// Lines that do not parse, and entries without a usable audio URL, are
/// skipped.
fn parse_entries(stdout: &str) -> Vec<Track> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unparsable yt-dlp line: {}", e);
                None
            }
        })
        .filter_map(|entry| {
            let Some(audio_url) = entry.url.filter(|u| is_http_url(u)) else {
                warn!("⚠️ No valid audio URL for {}", entry.title);
                return None;
            };

            let track = Track::new(
                TrackId::hashed(TrackKind::YouTube, &entry.id),
                entry.title,
                audio_url,
                TrackKind::YouTube,
            );

            Some(match entry.thumbnail.filter(|t| is_http_url(t)) {
                Some(thumbnail) => track.with_thumbnail(thumbnail),
                None => track,
            })
        })
        .collect()
}

pub(crate) fn is_http_url(candidate: &str) -> bool {
    Url::parse(candidate).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

#[async_trait]
impl TrackProvider for YouTubeProvider {
    async fn resolve(&self, query: &str) -> Result<Vec<Track>, MusicError> {
        info!("🔍 Searching YouTube: {}", query);

        let stdout = self.run(&self.args_for(query)).await?;
        let mut tracks = parse_entries(&stdout);
        tracks.truncate(self.max_playlist_size);

        if tracks.is_empty() {
            return Err(MusicError::AcquisitionFailed("no results found".to_string()));
        }

        debug!("Resolved {} track(s) for {}", tracks.len(), query);
        Ok(tracks)
    }
}
