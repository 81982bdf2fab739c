use std::collections::VecDeque;
use tracing::{debug, info};

use super::track::Track;
use crate::error::{MusicError, Result};

/// Ordered tracks of one channel. Insertion order is play order and the
/// front is the track being played (or about to be).
#[derive(Debug, Default, Clone)]
pub struct TrackQueue {
    items: VecDeque<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends tracks to the tail.
    pub fn enqueue(&mut self, tracks: impl IntoIterator<Item = Track>) {
        for track in tracks {
            info!("➕ Queued: {}", track.title);
            self.items.push_back(track);
        }
    }

    /// Removes the track at `index`.
    ///
    /// Index 0 is the current track and cannot be removed here; skipping is the
    /// way to drop it.
    pub fn remove(&mut self, index: i64) -> Result<Track> {
        if index < 0 {
            return Err(MusicError::IndexNegative);
        }

        if self.items.is_empty() {
            return Err(MusicError::EmptyQueue);
        }

        if index == 0 {
            return Err(MusicError::CurrentTrack);
        }

        let len = self.items.len();
        let position = usize::try_from(index)
            .ok()
            .filter(|position| *position < len)
            .ok_or(MusicError::IndexOutOfRange { index, len })?;

        let removed = self
            .items
            .remove(position)
            .ok_or(MusicError::IndexOutOfRange { index, len })?;
        debug!("❌ Removed track at position {}: {}", position, removed.title);
        Ok(removed)
    }

    /// Head of the queue, `None` if empty.
    pub fn front(&self) -> Option<&Track> {
        self.items.front()
    }

    /// Takes the head of the queue. Never fails, an empty queue yields `None`.
    pub fn pop_front(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Snapshot in play order.
    pub fn tracks(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::{TrackId, TrackKind};
    use pretty_assertions::assert_eq;

    fn track(name: &str) -> Track {
        Track::new(TrackId::from(name), name, format!("https://example.com/{name}"), TrackKind::DirectUrl)
    }

    fn ids(queue: &TrackQueue) -> Vec<String> {
        queue.tracks().into_iter().map(|t| t.id.to_string()).collect()
    }

    fn queue_of(names: &[&str]) -> TrackQueue {
        let mut queue = TrackQueue::new();
        queue.enqueue(names.iter().map(|n| track(n)));
        queue
    }

    #[test]
    fn remove_keeps_relative_order() {
        let mut queue = queue_of(&["a", "b", "c", "d"]);
        let removed = queue.remove(2).unwrap();
        assert_eq!(removed.id, TrackId::from("c"));
        assert_eq!(ids(&queue), vec!["a", "b", "d"]);
    }

    #[test]
    fn remove_rejects_negative_before_anything_else() {
        let mut empty = TrackQueue::new();
        assert!(matches!(empty.remove(-1), Err(MusicError::IndexNegative)));
        let mut queue = queue_of(&["a"]);
        assert!(matches!(queue.remove(-3), Err(MusicError::IndexNegative)));
    }

    #[test]
    fn remove_on_empty_queue() {
        let mut queue = TrackQueue::new();
        assert!(matches!(queue.remove(1), Err(MusicError::EmptyQueue)));
        assert!(matches!(queue.remove(0), Err(MusicError::EmptyQueue)));
    }

    #[test]
    fn remove_out_of_range() {
        let mut queue = queue_of(&["a", "b"]);
        assert!(matches!(
            queue.remove(2),
            Err(MusicError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(matches!(queue.remove(i64::MAX), Err(MusicError::IndexOutOfRange { .. })));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn remove_refuses_current_track() {
        let mut queue = queue_of(&["a", "b"]);
        assert!(matches!(queue.remove(0), Err(MusicError::CurrentTrack)));
        assert_eq!(ids(&queue), vec!["a", "b"]);
    }

    #[test]
    fn pop_front_on_empty_is_none() {
        let mut queue = queue_of(&["a"]);
        assert_eq!(queue.front().map(|t| t.title.as_str()), Some("a"));
        assert!(queue.pop_front().is_some());
        assert!(queue.pop_front().is_none());
        assert!(queue.front().is_none());
        assert!(queue.is_empty());
    }
}
