use async_trait::async_trait;
use echoplay_core::{Playlist, Track, TrackId, User};
use thiserror::Error;
use tracing::debug;

mod http;

pub use http::HttpCatalog;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid api base url {url}: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request to {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} answered with status {status}")]
    Status { path: String, status: u16 },
}

/// Read/write access to the song and playlist catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn users(&self) -> Result<Vec<User>, TransportError>;
    async fn tracks(&self) -> Result<Vec<Track>, TransportError>;
    async fn track(&self, id: TrackId) -> Result<Track, TransportError>;
    async fn playlists(&self, user_id: i64) -> Result<Vec<Playlist>, TransportError>;
    async fn create_playlist(&self, name: &str, user_id: i64) -> Result<Playlist, TransportError>;
    async fn delete_playlist(&self, playlist_id: i64) -> Result<(), TransportError>;
    async fn playlist_tracks(&self, playlist_id: i64) -> Result<Vec<Track>, TransportError>;
    async fn add_track_to_playlist(
        &self,
        playlist_id: i64,
        track_id: TrackId,
    ) -> Result<(), TransportError>;
    async fn remove_track_from_playlist(
        &self,
        playlist_id: i64,
        track_id: TrackId,
    ) -> Result<(), TransportError>;

    async fn search_tracks(&self, query: &str) -> Result<Vec<Track>, TransportError> {
        let all = self.tracks().await?;
        Ok(echoplay_core::filter_tracks(&all, query)
            .into_iter()
            .cloned()
            .collect())
    }
}

/// Fetches the track lists a fusion mix is built from, in the given order.
pub async fn load_fusion_sources(
    catalog: &dyn Catalog,
    playlist_ids: &[i64],
) -> Result<Vec<Vec<Track>>, TransportError> {
    let mut sources = Vec::with_capacity(playlist_ids.len());
    for id in playlist_ids {
        let tracks = catalog.playlist_tracks(*id).await?;
        debug!(playlist_id = id, tracks = tracks.len(), "fusion source loaded");
        sources.push(tracks);
    }
    Ok(sources)
}
