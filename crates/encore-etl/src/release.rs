//! Data release discovery and download.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::error::{ImportError, ImportResult};

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

/// Metadata of one published data release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseMetadata {
    /// The first asset named `<prefix>...<suffix>`. The suffix is compared
    /// case-insensitively.
    #[must_use]
    pub fn select_data_asset(&self, prefix: &str, suffix: &str) -> Option<&ReleaseAsset> {
        let suffix = suffix.to_lowercase();
        self.assets.iter().find(|asset| {
            asset.name.starts_with(prefix) && asset.name.to_lowercase().ends_with(&suffix)
        })
    }
}

/// Source of data releases.
#[async_trait]
pub trait ReleaseClient: Send + Sync {
    /// Fetch metadata for the newest published release.
    async fn fetch_latest_release(&self) -> ImportResult<ReleaseMetadata>;

    /// Download `asset` into the directory `dest`, returning the file path.
    async fn download(&self, asset: &ReleaseAsset, dest: &Path) -> ImportResult<PathBuf>;
}

/// [`ReleaseClient`] backed by the GitHub releases API.
#[derive(Debug, Clone)]
pub struct GithubReleaseClient {
    http: Client,
    api_base_url: String,
    repository: String,
}

impl GithubReleaseClient {
    /// Create a client for `repository` (`owner/name`).
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_base_url: &str, repository: &str) -> ImportResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("encore/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            repository: repository.to_string(),
        })
    }

    fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/releases/latest",
            self.api_base_url, self.repository
        )
    }

    async fn get(&self, url: &str) -> ImportResult<reqwest::Response> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    async fn fetch_once(&self) -> ImportResult<ReleaseMetadata> {
        let url = self.latest_release_url();
        let release = self.get(&url).await?.json::<ReleaseMetadata>().await?;
        Ok(release)
    }
}

#[async_trait]
impl ReleaseClient for GithubReleaseClient {
    async fn fetch_latest_release(&self) -> ImportResult<ReleaseMetadata> {
        let release = (|| self.fetch_once())
            .retry(ExponentialBuilder::default().with_max_times(3))
            .sleep(tokio::time::sleep)
            .when(ImportError::is_transient)
            .notify(|e, delay| {
                log::warn!("Release lookup failed ({}), retrying in {:?}", e, delay);
            })
            .await?;

        log::info!(
            "Latest release {} with {} assets",
            release.tag_name,
            release.assets.len()
        );
        Ok(release)
    }

    async fn download(&self, asset: &ReleaseAsset, dest: &Path) -> ImportResult<PathBuf> {
        let path = dest.join(&asset.name);
        log::info!("Downloading {} ({} bytes)", asset.name, asset.size);

        let mut response = self.get(&asset.download_url).await?;
        let mut file = tokio::fs::File::create(&path).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        log::debug!("Wrote {} bytes to {}", written, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn release(names: &[&str]) -> ReleaseMetadata {
        ReleaseMetadata {
            tag_name: "v2.0.0".to_string(),
            name: None,
            published_at: None,
            assets: names
                .iter()
                .map(|name| ReleaseAsset {
                    name: (*name).to_string(),
                    size: 10,
                    download_url: format!("https://example.test/{name}"),
                })
                .collect(),
        }
    }

    #[test]
    fn test_select_data_asset_first_match() {
        let release = release(&["checksums.txt", "data-v2.0.0.ZIP", "data-v2.0.0-alt.zip"]);
        let asset = release.select_data_asset("data", ".zip").unwrap();
        assert_eq!(asset.name, "data-v2.0.0.ZIP");
    }

    #[test]
    fn test_select_data_asset_none() {
        let release = release(&["source.zip", "data.tar.gz"]);
        assert!(release.select_data_asset("data", ".zip").is_none());
    }

    #[test]
    fn test_release_metadata_from_github_payload() {
        let release: ReleaseMetadata = serde_json::from_value(json!({
            "tag_name": "v2.0.0",
            "name": "Data 2.0.0",
            "published_at": "2024-03-01T12:00:00Z",
            "assets": [{
                "name": "data-v2.0.0.zip",
                "size": 1024,
                "browser_download_url": "https://example.test/data-v2.0.0.zip",
                "content_type": "application/zip"
            }]
        }))
        .unwrap();

        assert_eq!(release.tag_name, "v2.0.0");
        assert_eq!(release.assets[0].size, 1024);
        assert_eq!(
            release.assets[0].download_url,
            "https://example.test/data-v2.0.0.zip"
        );
    }

    #[test]
    fn test_client_creation() {
        let client = GithubReleaseClient::new("https://api.github.com/", "encore-app/encore-data");
        assert!(client.is_ok());
        assert_eq!(
            client.unwrap().latest_release_url(),
            "https://api.github.com/repos/encore-app/encore-data/releases/latest"
        );
    }
}
