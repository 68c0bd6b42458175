use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Loads cover art bytes. Implementations run off the playback path.
#[async_trait]
pub trait ArtSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpArtSource {
    client: reqwest::Client,
}

impl HttpArtSource {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .context("failed to build cover art http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtSource for HttpArtSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "fetching cover art");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("cover request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("cover request rejected: {url}"))?;
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("cover body unreadable: {url}"))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::{ArtSource, HttpArtSource};
    use std::time::Duration;

    #[tokio::test]
    async fn malformed_cover_url_is_an_error() {
        let source =
            HttpArtSource::new(Duration::from_millis(200), Duration::from_millis(500)).unwrap();
        let err = source.fetch("not a url").await.unwrap_err();
        assert!(err.to_string().contains("not a url"));
    }
}
