use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    store::{write_flag, PreferenceStore},
    PlayerError, Result,
};

/// A single playable entry. Tracks are configured up front and never edited
/// by the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub source_uri: String,
}

impl Track {
    pub fn new(title: impl Into<String>, source_uri: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_uri: source_uri.into(),
        }
    }

    /// Title shown to the user, `Track N` when none was configured.
    pub fn display_title(&self, index: usize) -> String {
        if self.title.trim().is_empty() {
            format!("Track {}", index + 1)
        } else {
            self.title.clone()
        }
    }
}

/// One row of the rendered track list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackRow {
    pub number: String,
    pub title: String,
    pub source: String,
    pub active: bool,
}

/// Ordered tracks plus the cursor into them.
///
/// `current_index` always points at a valid track while the playlist is
/// non-empty. Every read on an empty playlist reports
/// [`PlayerError::EmptyPlaylist`].
#[derive(Debug)]
pub struct Playlist {
    tracks: Vec<Track>,
    current_index: usize,
    shuffle_enabled: bool,
    rng: StdRng,
}

impl Playlist {
    pub fn new(tracks: Vec<Track>, shuffle_enabled: bool) -> Self {
        Self::with_rng(tracks, shuffle_enabled, StdRng::from_os_rng())
    }

    /// Deterministic shuffle order, for tests and reproducible runs.
    pub fn with_seed(tracks: Vec<Track>, shuffle_enabled: bool, seed: u64) -> Self {
        Self::with_rng(tracks, shuffle_enabled, StdRng::seed_from_u64(seed))
    }

    fn with_rng(tracks: Vec<Track>, shuffle_enabled: bool, rng: StdRng) -> Self {
        Self {
            tracks,
            current_index: 0,
            shuffle_enabled,
            rng,
        }
    }

    /// Replaces the shuffle generator with a seeded one.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle_enabled
    }

    pub fn current_index(&self) -> Result<usize> {
        self.ensure_not_empty()?;
        Ok(self.current_index)
    }

    pub fn current_track(&self) -> Result<&Track> {
        self.ensure_not_empty()?;
        Ok(&self.tracks[self.current_index])
    }

    /// Advances to the following track and returns its index.
    ///
    /// In order mode this wraps around. In shuffle mode any track other than
    /// the current one is drawn uniformly; a single-track playlist repeats.
    pub fn next(&mut self) -> Result<usize> {
        self.ensure_not_empty()?;
        let len = self.tracks.len();
        let index = if self.shuffle_enabled {
            self.draw_other()
        } else {
            (self.current_index + 1) % len
        };
        self.current_index = index;
        Ok(index)
    }

    /// Steps back one track. Under shuffle direction has no meaning, so this
    /// draws exactly like [`Playlist::next`].
    pub fn previous(&mut self) -> Result<usize> {
        self.ensure_not_empty()?;
        let len = self.tracks.len();
        let index = if self.shuffle_enabled {
            self.draw_other()
        } else {
            (self.current_index + len - 1) % len
        };
        self.current_index = index;
        Ok(index)
    }

    /// Moves the cursor to `index`. Out-of-range values leave the cursor where
    /// it was and return it unchanged.
    pub fn select_index(&mut self, index: usize) -> Result<usize> {
        self.ensure_not_empty()?;
        if index < self.tracks.len() {
            self.current_index = index;
        } else {
            tracing::debug!(index, len = self.tracks.len(), "ignoring out-of-range selection");
        }
        Ok(self.current_index)
    }

    /// Flips shuffle mode and persists the new value under `key`. A failed
    /// write keeps the in-memory flip.
    pub fn toggle_shuffle(&mut self, store: &mut dyn PreferenceStore, key: &str) -> bool {
        self.shuffle_enabled = !self.shuffle_enabled;
        if let Err(err) = write_flag(store, key, self.shuffle_enabled) {
            tracing::warn!(%err, "could not persist shuffle mode");
        }
        tracing::info!(shuffle = self.shuffle_enabled, "shuffle toggled");
        self.shuffle_enabled
    }

    pub fn rows(&self) -> Vec<TrackRow> {
        self.tracks
            .iter()
            .enumerate()
            .map(|(index, track)| TrackRow {
                number: format!("#{:02}", index + 1),
                title: track.display_title(index),
                source: track.source_uri.clone(),
                active: index == self.current_index,
            })
            .collect()
    }

    fn draw_other(&mut self) -> usize {
        let len = self.tracks.len();
        if len == 1 {
            return 0;
        }
        loop {
            let candidate = self.rng.random_range(0..len);
            if candidate != self.current_index {
                return candidate;
            }
        }
    }

    fn ensure_not_empty(&self) -> Result<()> {
        if self.tracks.is_empty() {
            Err(PlayerError::EmptyPlaylist)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{read_flag, MemoryStore};

    fn tracks(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| Track::new(format!("T{i}"), format!("t{i}.mp3")))
            .collect()
    }

    #[test]
    fn in_order_next_cycles_back() {
        let mut playlist = Playlist::with_seed(tracks(5), false, 1);
        playlist.select_index(3).unwrap();
        for _ in 0..5 {
            playlist.next().unwrap();
        }
        assert_eq!(playlist.current_index().unwrap(), 3);
    }

    #[test]
    fn in_order_previous_wraps() {
        let mut playlist = Playlist::with_seed(tracks(3), false, 1);
        assert_eq!(playlist.previous().unwrap(), 2);
        assert_eq!(playlist.previous().unwrap(), 1);
    }

    #[test]
    fn shuffle_never_repeats_immediately() {
        let mut playlist = Playlist::with_seed(tracks(3), true, 42);
        let mut last = playlist.current_index().unwrap();
        for _ in 0..1000 {
            let next = playlist.next().unwrap();
            assert_ne!(next, last);
            last = next;
        }
        for _ in 0..200 {
            let prev = playlist.previous().unwrap();
            assert_ne!(prev, last);
            last = prev;
        }
    }

    #[test]
    fn shuffle_reaches_every_other_track() {
        let mut playlist = Playlist::with_seed(tracks(4), true, 7);
        let mut seen = [false; 4];
        for _ in 0..200 {
            seen[playlist.next().unwrap()] = true;
        }
        assert!(seen.iter().all(|hit| *hit));
    }

    #[test]
    fn single_track_shuffle_repeats() {
        let mut playlist = Playlist::with_seed(tracks(1), true, 3);
        assert_eq!(playlist.next().unwrap(), 0);
        assert_eq!(playlist.previous().unwrap(), 0);
    }

    #[test]
    fn out_of_range_selection_is_ignored() {
        let mut playlist = Playlist::with_seed(tracks(2), false, 1);
        playlist.select_index(1).unwrap();
        assert_eq!(playlist.select_index(2).unwrap(), 1);
        assert_eq!(playlist.select_index(usize::MAX).unwrap(), 1);
        assert_eq!(playlist.current_track().unwrap().title, "T1");
    }

    #[test]
    fn empty_playlist_reports_instead_of_panicking() {
        let mut playlist = Playlist::with_seed(Vec::new(), true, 1);
        assert!(matches!(playlist.current_track(), Err(PlayerError::EmptyPlaylist)));
        assert!(matches!(playlist.next(), Err(PlayerError::EmptyPlaylist)));
        assert!(matches!(playlist.previous(), Err(PlayerError::EmptyPlaylist)));
        assert!(matches!(playlist.select_index(0), Err(PlayerError::EmptyPlaylist)));
    }

    #[test]
    fn toggling_shuffle_persists() {
        let mut store = MemoryStore::new();
        let mut playlist = Playlist::with_seed(tracks(2), true, 1);

        assert!(!playlist.toggle_shuffle(&mut store, "trash-shuffle"));
        assert!(!read_flag(&store, "trash-shuffle", true));
        assert!(playlist.toggle_shuffle(&mut store, "trash-shuffle"));
        assert!(read_flag(&store, "trash-shuffle", false));
    }

    #[test]
    fn rows_mark_the_active_track() {
        let mut list = tracks(2);
        list[1].title = String::new();
        let mut playlist = Playlist::with_seed(list, false, 1);
        playlist.select_index(1).unwrap();

        let rows = playlist.rows();
        assert_eq!(rows[0].number, "#01");
        assert!(!rows[0].active);
        assert_eq!(rows[1].title, "Track 2");
        assert!(rows[1].active);
    }
}
