use std::collections::VecDeque;
use tracing::debug;

use super::track::Track;

/// Pending tracks for one guild, strict FIFO.
///
/// Only two mutations exist: `push` from `enqueue` and `pop_front` from the
/// player loop. Readers get a copy through [`TrackQueue::snapshot`].
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a track and returns the new pending length.
    pub fn push(&mut self, track: Track) -> usize {
        debug!("➕ Queued: {}", track.title());
        self.items.push_back(track);
        self.items.len()
    }

    pub fn pop_front(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Read-only copy of the pending tracks in play order.
    pub fn snapshot(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }
}

/// What a guild is playing and what is waiting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub now_playing: Option<Track>,
    pub pending: Vec<Track>,
}

impl QueueSnapshot {
    /// First `limit` pending entries numbered from 1, plus how many were left out.
    pub fn preview(&self, limit: usize) -> QueuePreview {
        let shown = self.pending.len().min(limit);

        QueuePreview {
            entries: self
                .pending
                .iter()
                .take(shown)
                .enumerate()
                .map(|(index, track)| (index + 1, track.clone()))
                .collect(),
            hidden: self.pending.len() - shown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePreview {
    pub entries: Vec<(usize, Track)>,
    pub hidden: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> Track {
        Track::new(format!("https://cdn.test/{title}"), title, format!("https://page.test/{title}"))
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TrackQueue::new();
        assert_eq!(queue.push(track("a")), 1);
        assert_eq!(queue.push(track("b")), 2);
        assert_eq!(queue.push(track("c")), 3);

        assert_eq!(queue.pop_front().map(|t| t.title().to_string()), Some("a".into()));
        assert_eq!(queue.pop_front().map(|t| t.title().to_string()), Some("b".into()));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_snapshot_does_not_drain() {
        let mut queue = TrackQueue::new();
        queue.push(track("a"));
        queue.push(track("b"));

        let snapshot = queue.snapshot();
        assert_eq!(snapshot, vec![track("a"), track("b")]);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_preview_truncates() {
        let snapshot = QueueSnapshot {
            now_playing: Some(track("current")),
            pending: (0..13).map(|i| track(&format!("song-{i}"))).collect(),
        };

        let preview = snapshot.preview(10);
        assert_eq!(preview.entries.len(), 10);
        assert_eq!(preview.entries[0], (1, track("song-0")));
        assert_eq!(preview.entries[9], (10, track("song-9")));
        assert_eq!(preview.hidden, 3);
    }

    #[test]
    fn test_preview_of_empty_queue() {
        let preview = QueueSnapshot::default().preview(10);
        assert!(preview.entries.is_empty());
        assert_eq!(preview.hidden, 0);
    }
}
