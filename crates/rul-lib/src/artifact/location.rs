//! Artifact location resolution
//!
//! A location is either a local path or a remote URL with a local cache
//! file. Remote artifacts are downloaded once; later resolutions reuse the
//! cached copy.

use super::store::write_atomic;
use crate::error::{Result, RulError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Timeout for a remote artifact download
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Where an artifact lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    Local(PathBuf),
    Remote { url: Url, cache_path: PathBuf },
}

impl ArtifactLocation {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local(path.into())
    }

    pub fn remote(url: &str, cache_path: impl Into<PathBuf>) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| RulError::Config(format!("invalid artifact URL '{}': {}", url, e)))?;
        Ok(Self::Remote {
            url,
            cache_path: cache_path.into(),
        })
    }

    /// Local path the artifact is (or will be) read from
    pub fn path(&self) -> &Path {
        match self {
            Self::Local(path) => path,
            Self::Remote { cache_path, .. } => cache_path,
        }
    }

    /// Resolve to a readable local file, downloading remote artifacts if not cached
    pub async fn resolve(&self) -> Result<PathBuf> {
        match self {
            Self::Local(path) => Ok(path.clone()),
            Self::Remote { url, cache_path } => {
                if cache_path.exists() {
                    debug!(path = %cache_path.display(), "Using cached artifact");
                    return Ok(cache_path.clone());
                }
                download(url, cache_path).await?;
                Ok(cache_path.clone())
            }
        }
    }
}

async fn download(url: &Url, cache_path: &Path) -> Result<()> {
    let failed = |message: String| RulError::Download {
        url: url.to_string(),
        message,
    };

    info!(url = %url, path = %cache_path.display(), "Downloading model artifact");

    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|e| failed(e.to_string()))?;
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| failed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }
    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    if let Some(parent) = cache_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| RulError::io(parent, e))?;
    }
    let size = bytes.len();
    let target = cache_path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&target, &bytes))
        .await
        .map_err(|e| failed(format!("cache write task failed: {}", e)))??;

    info!(path = %cache_path.display(), size, "Artifact downloaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_resolves_to_itself() {
        let location = ArtifactLocation::local("outputs/model.json");
        assert_eq!(location.resolve().await.unwrap(), PathBuf::from("outputs/model.json"));
    }

    #[test]
    fn test_remote_requires_valid_url() {
        assert!(ArtifactLocation::remote("not a url", "cache.json").is_err());
        let location = ArtifactLocation::remote("https://example.com/model.json", "cache.json").unwrap();
        assert_eq!(location.path(), Path::new("cache.json"));
    }

    #[tokio::test]
    async fn test_remote_downloads_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/models/rf.json")
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("cache").join("rf.json");
        let location =
            ArtifactLocation::remote(&format!("{}/models/rf.json", server.url()), &cache).unwrap();

        assert_eq!(location.resolve().await.unwrap(), cache);
        assert_eq!(std::fs::read_to_string(&cache).unwrap(), "{}");
        // Second resolution hits the cache
        location.resolve().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_remote_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.json")
            .with_status(404)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("missing.json");
        let location =
            ArtifactLocation::remote(&format!("{}/missing.json", server.url()), &cache).unwrap();

        let err = location.resolve().await.unwrap_err();
        assert!(matches!(err, RulError::Download { .. }));
        assert!(!cache.exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_download_on_single_threaded_runtime() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/rf.json")
            .with_status(200)
            .with_body("{\"format_version\":1}")
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("rf.json");
        let location = ArtifactLocation::remote(&format!("{}/rf.json", server.url()), &cache).unwrap();

        location.resolve().await.unwrap();
        assert_eq!(std::fs::read_to_string(&cache).unwrap(), "{\"format_version\":1}");
        assert!(!cache.with_extension("tmp").exists());
    }
}
