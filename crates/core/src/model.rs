use serde::{Deserialize, Serialize};

pub type TrackId = i64;

/// A song as served by the catalog API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub id: TrackId,
    #[serde(rename = "name")]
    pub title: String,
    pub artist: String,
    #[serde(rename = "cover", default)]
    pub cover_url: String,
    #[serde(rename = "file")]
    pub audio_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum QueueMode {
    Single,
    LinearPlaylist,
    ShuffledPlaylist,
    FusionMix,
}

impl QueueMode {
    /// Modes in which next/previous walk a list instead of stopping.
    pub fn is_multi_track(self) -> bool {
        !matches!(self, QueueMode::Single)
    }
}

/// Case-insensitive match on title or artist. An empty query keeps everything.
pub fn filter_tracks<'a>(tracks: &'a [Track], query: &str) -> Vec<&'a Track> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return tracks.iter().collect();
    }
    tracks
        .iter()
        .filter(|t| t.title.to_lowercase().contains(&q) || t.artist.to_lowercase().contains(&q))
        .collect()
}
