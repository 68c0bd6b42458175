use crate::error::QueueError;
use echoplay_core::{QueueMode, Track, TrackId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use tracing::debug;

/// Ordered tracks plus a play cursor.
///
/// The cursor is always inside `[0, len)` while the queue holds tracks. In
/// `ShuffledPlaylist` mode the cursor indexes the cached shuffle order, in
/// every other mode it indexes `base`.
pub struct Queue {
    base: Vec<Track>,
    shuffled: Option<Vec<Track>>,
    mode: Option<QueueMode>,
    cursor: usize,
    rng: StdRng,
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

impl Queue {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            base: Vec::new(),
            shuffled: None,
            mode: None,
            cursor: 0,
            rng,
        }
    }

    pub fn set_single(&mut self, track: Track) {
        self.base = vec![track];
        self.shuffled = None;
        self.mode = Some(QueueMode::Single);
        self.cursor = 0;
    }

    /// Replaces the playlist. A cached shuffle order survives only when the
    /// same list is loaded again in shuffled mode.
    pub fn set_playlist(&mut self, tracks: Vec<Track>, shuffle: bool) {
        if tracks.is_empty() {
            self.clear();
            return;
        }

        let same_base = self.mode == Some(QueueMode::ShuffledPlaylist)
            && same_ids(&self.base, &tracks);
        if !same_base || !shuffle {
            self.shuffled = None;
        }
        self.base = tracks;

        if shuffle {
            if self.shuffled.is_none() {
                self.shuffled = Some(shuffled_copy(&self.base, &mut self.rng));
            }
            self.mode = Some(QueueMode::ShuffledPlaylist);
        } else {
            self.mode = Some(QueueMode::LinearPlaylist);
        }
        self.cursor = 0;
    }

    /// Merges playlists, keeping the first occurrence of each track id, and
    /// shuffles the result. The queue is left untouched when nothing remains.
    pub fn set_fusion_mix(&mut self, playlists: &[Vec<Track>]) -> Result<(), QueueError> {
        let mut seen: HashSet<TrackId> = HashSet::new();
        let merged: Vec<Track> = playlists
            .iter()
            .flatten()
            .filter(|t| seen.insert(t.id))
            .cloned()
            .collect();
        if merged.is_empty() {
            return Err(QueueError::EmptyResult);
        }

        debug!(
            sources = playlists.len(),
            tracks = merged.len(),
            "fusion mix built"
        );
        self.base = shuffled_copy(&merged, &mut self.rng);
        self.shuffled = None;
        self.mode = Some(QueueMode::FusionMix);
        self.cursor = 0;
        Ok(())
    }

    pub fn advance(&mut self) -> Result<usize, QueueError> {
        let len = self.len();
        if len == 0 {
            return Err(QueueError::Empty);
        }
        self.cursor = (self.cursor + 1) % len;
        Ok(self.cursor)
    }

    pub fn retreat(&mut self) -> Result<usize, QueueError> {
        let len = self.len();
        if len == 0 {
            return Err(QueueError::Empty);
        }
        self.cursor = (self.cursor + len - 1) % len;
        Ok(self.cursor)
    }

    pub fn jump_to(&mut self, index: usize) -> Result<(), QueueError> {
        let len = self.len();
        if index >= len {
            return Err(QueueError::OutOfRange { index, len });
        }
        self.cursor = index;
        Ok(())
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks().get(self.cursor)
    }

    /// Switches a playlist between its linear and shuffled views. Enabling
    /// draws a fresh order and restarts the cursor at its head; disabling
    /// moves the cursor onto the current track's linear position.
    ///
    /// Returns whether the view changed.
    pub fn toggle_shuffle(&mut self, enabled: bool) -> bool {
        match (self.mode, enabled) {
            (Some(QueueMode::LinearPlaylist), true) => {
                self.shuffled = Some(shuffled_copy(&self.base, &mut self.rng));
                self.mode = Some(QueueMode::ShuffledPlaylist);
                self.cursor = 0;
                true
            }
            (Some(QueueMode::ShuffledPlaylist), false) => {
                let current_id = self.current().map(|t| t.id);
                self.cursor = current_id
                    .and_then(|id| self.base.iter().position(|t| t.id == id))
                    .unwrap_or(0);
                self.shuffled = None;
                self.mode = Some(QueueMode::LinearPlaylist);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.base.clear();
        self.shuffled = None;
        self.mode = None;
        self.cursor = 0;
    }

    /// Tracks in play order for the current mode.
    pub fn tracks(&self) -> &[Track] {
        match (&self.mode, &self.shuffled) {
            (Some(QueueMode::ShuffledPlaylist), Some(order)) => order,
            _ => &self.base,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mode(&self) -> Option<QueueMode> {
        self.mode
    }

    pub fn cursor(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.cursor)
        }
    }

    pub fn is_shuffled(&self) -> bool {
        self.mode == Some(QueueMode::ShuffledPlaylist)
    }
}

fn shuffled_copy(tracks: &[Track], rng: &mut StdRng) -> Vec<Track> {
    let mut order = tracks.to_vec();
    order.shuffle(rng);
    order
}

fn same_ids(a: &[Track], b: &[Track]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.id == y.id)
}
