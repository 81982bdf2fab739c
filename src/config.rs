use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Registers commands on one guild instead of globally

    // Storage
    pub music_dir: PathBuf,
    pub ytdlp_path: String,

    // Playback
    pub signal_timeout_ms: u64,
    pub reconnect_backoff_ms: u64,
    pub reconnect_max_attempts: u32,

    // Acquisition
    pub acquisition_delay_ms: u64,
    pub max_playlist_size: usize,
}

fn env_or<T>(key: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("invalid value for {key}"))
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            application_id: std::env::var("APPLICATION_ID")
                .context("APPLICATION_ID is not set")?
                .parse()
                .context("APPLICATION_ID must be a number")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Storage
            music_dir: std::env::var("MUSIC_DIR")
                .unwrap_or_else(|_| "./.musicbot".to_string())
                .into(),
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),

            // Playback
            signal_timeout_ms: env_or("SIGNAL_TIMEOUT_MS", "3000")?,
            reconnect_backoff_ms: env_or("RECONNECT_BACKOFF_MS", "2000")?,
            reconnect_max_attempts: env_or("RECONNECT_MAX_ATTEMPTS", "5")?,

            // Acquisition
            acquisition_delay_ms: env_or("ACQUISITION_DELAY_MS", "1000")?,
            max_playlist_size: env_or("MAX_PLAYLIST_SIZE", "50")?,
        };

        // Create the music directory if it doesn't exist
        std::fs::create_dir_all(&config.music_dir)
            .with_context(|| format!("cannot create {}", config.music_dir.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Signal timeout must be greater than 0
    /// - At least one reconnect attempt is allowed
    /// - Playlists carry at least one entry
    /// - The yt-dlp path is not blank
    pub fn validate(&self) -> Result<()> {
        if self.signal_timeout_ms == 0 {
            anyhow::bail!("Signal timeout must be greater than 0");
        }

        if self.reconnect_max_attempts == 0 {
            anyhow::bail!("At least one reconnect attempt must be allowed");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.ytdlp_path.trim().is_empty() {
            anyhow::bail!("YTDLP_PATH cannot be empty");
        }

        Ok(())
    }

    pub fn signal_timeout(&self) -> Duration {
        Duration::from_millis(self.signal_timeout_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn acquisition_delay(&self) -> Duration {
        Duration::from_millis(self.acquisition_delay_ms)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Storage: {} (yt-dlp: {})\n  \
            Playback: {} signal timeout, {} backoff x{}\n  \
            Acquisition: {} between downloads, {} tracks per playlist",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.music_dir.display(),
            self.ytdlp_path,
            humantime::format_duration(self.signal_timeout()),
            humantime::format_duration(self.reconnect_backoff()),
            self.reconnect_max_attempts,
            humantime::format_duration(self.acquisition_delay()),
            self.max_playlist_size,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            music_dir: "./.musicbot".into(),
            ytdlp_path: "yt-dlp".to_string(),

            signal_timeout_ms: 3000,
            reconnect_backoff_ms: 2000,
            reconnect_max_attempts: 5,

            acquisition_delay_ms: 1000,
            max_playlist_size: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.signal_timeout(), Duration::from_secs(3));
        assert_eq!(config.reconnect_backoff(), Duration::from_secs(2));
        assert_eq!(config.acquisition_delay(), Duration::from_secs(1));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = Config {
            signal_timeout_ms: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_reconnect_attempts_are_rejected() {
        let config = Config {
            reconnect_max_attempts: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn summary_hides_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            application_id: 1234,
            ..Config::default()
        };
        let summary = config.summary();
        assert!(summary.contains("1234"));
        assert!(summary.contains("global"));
        assert!(!summary.contains("super-secret"));
    }
}
