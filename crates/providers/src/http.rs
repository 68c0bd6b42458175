use crate::{Catalog, TransportError};
use async_trait::async_trait;
use echoplay_core::urls::direct_media_url;
use echoplay_core::{HttpConfig, Playlist, Track, TrackId, User};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePlaylistRequest<'a> {
    name: &'a str,
    user_id: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SongToAdd {
    song_id: TrackId,
}

/// REST client for the catalog API.
pub struct HttpCatalog {
    base: Url,
    client: Client,
}

impl HttpCatalog {
    pub fn new(base_url: &str, cfg: &HttpConfig) -> Result<Self, TransportError> {
        let base = parse_base(base_url)?;
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|source| TransportError::Request {
                path: base.to_string(),
                source,
            })?;
        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base.join(path).map_err(|source| TransportError::BaseUrl {
            url: format!("{}{}", self.base, path),
            source,
        })
    }

    async fn send(&self, path: &str, req: RequestBuilder) -> Result<reqwest::Response, TransportError> {
        debug!(path, "catalog request");
        let resp = req.send().await.map_err(|source| TransportError::Request {
            path: path.to_string(),
            source,
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let url = self.endpoint(path)?;
        let resp = self.send(path, self.client.get(url)).await?;
        resp.json::<T>().await.map_err(|source| TransportError::Request {
            path: path.to_string(),
            source,
        })
    }

    async fn get_tracks(&self, path: &str) -> Result<Vec<Track>, TransportError> {
        let tracks: Vec<Track> = self.get_json(path).await?;
        Ok(tracks.into_iter().map(with_direct_urls).collect())
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn users(&self) -> Result<Vec<User>, TransportError> {
        let users: Vec<User> = self.get_json("users").await?;
        Ok(users
            .into_iter()
            .map(|u| User {
                image: direct_media_url(&u.image),
                ..u
            })
            .collect())
    }

    async fn tracks(&self) -> Result<Vec<Track>, TransportError> {
        self.get_tracks("songs").await
    }

    async fn track(&self, id: TrackId) -> Result<Track, TransportError> {
        let track: Track = self.get_json(&format!("songs/{id}")).await?;
        Ok(with_direct_urls(track))
    }

    async fn playlists(&self, user_id: i64) -> Result<Vec<Playlist>, TransportError> {
        self.get_json(&format!("users/{user_id}/playlists")).await
    }

    async fn create_playlist(&self, name: &str, user_id: i64) -> Result<Playlist, TransportError> {
        let path = "playlists";
        let url = self.endpoint(path)?;
        let body = CreatePlaylistRequest { name, user_id };
        let resp = self.send(path, self.client.post(url).json(&body)).await?;
        resp.json::<Playlist>()
            .await
            .map_err(|source| TransportError::Request {
                path: path.to_string(),
                source,
            })
    }

    async fn delete_playlist(&self, playlist_id: i64) -> Result<(), TransportError> {
        let path = format!("playlists/{playlist_id}");
        let url = self.endpoint(&path)?;
        self.send(&path, self.client.delete(url)).await?;
        Ok(())
    }

    async fn playlist_tracks(&self, playlist_id: i64) -> Result<Vec<Track>, TransportError> {
        self.get_tracks(&format!("playlists/{playlist_id}/songs")).await
    }

    async fn add_track_to_playlist(
        &self,
        playlist_id: i64,
        track_id: TrackId,
    ) -> Result<(), TransportError> {
        let path = format!("playlists/{playlist_id}/songs");
        let url = self.endpoint(&path)?;
        let body = SongToAdd { song_id: track_id };
        self.send(&path, self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn remove_track_from_playlist(
        &self,
        playlist_id: i64,
        track_id: TrackId,
    ) -> Result<(), TransportError> {
        let path = format!("playlists/{playlist_id}/songs/{track_id}");
        let url = self.endpoint(&path)?;
        self.send(&path, self.client.delete(url)).await?;
        Ok(())
    }
}

fn with_direct_urls(track: Track) -> Track {
    Track {
        cover_url: direct_media_url(&track.cover_url),
        audio_url: direct_media_url(&track.audio_url),
        ..track
    }
}

// `Url::join` drops the last path segment unless the base ends with a slash.
fn parse_base(raw: &str) -> Result<Url, TransportError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&with_slash).map_err(|source| TransportError::BaseUrl {
        url: raw.to_string(),
        source,
    })
}
