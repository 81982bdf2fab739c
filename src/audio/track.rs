use sha2::{Digest, Sha256};
use std::fmt;

/// Content-addressed identifier of a track.
///
/// Two tracks share an id only if they come from the same source, so the id is
/// also the file name of the downloaded audio.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackId(String);

impl TrackId {
    /// Builds an id as `<prefix>:<sha256(key)>`.
    pub fn hashed(kind: TrackKind, key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        Self(format!("{}:{}", kind.id_prefix(), hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider that resolved a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    YouTube,
    DirectUrl,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::YouTube => "youtube",
            TrackKind::DirectUrl => "direct",
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            TrackKind::YouTube => "YT",
            TrackKind::DirectUrl => "URL",
        }
    }
}

/// Immutable metadata for one playable item.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    /// Where the audio bytes come from (usually a direct best-audio URL)
    pub source: String,
    pub thumbnail: Option<String>,
    pub kind: TrackKind,
}

impl Track {
    pub fn new(id: TrackId, title: impl Into<String>, source: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id,
            title: title.into(),
            source: source.into(),
            thumbnail: None,
            kind,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_ids_are_stable_and_prefixed() {
        let a = TrackId::hashed(TrackKind::YouTube, "dQw4w9WgXcQ");
        let b = TrackId::hashed(TrackKind::YouTube, "dQw4w9WgXcQ");
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("YT:"));
        // prefix + 64 hex chars
        assert_eq!(a.as_str().len(), 3 + 64);
    }

    #[test]
    fn different_sources_get_different_ids() {
        let a = TrackId::hashed(TrackKind::YouTube, "one");
        let b = TrackId::hashed(TrackKind::YouTube, "two");
        let c = TrackId::hashed(TrackKind::DirectUrl, "one");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
