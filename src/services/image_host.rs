use async_trait::async_trait;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

use super::storage::{BucketClient, StorageError};

/// Re-hosting of generated images on durable storage.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Fetch the image at `source_url`, store it, and return its public URL.
    async fn rehost(&self, source_url: &str) -> Result<String, ImageHostError>;
}

/// Object name derived from the source URL.
///
/// Equal URLs always map to the same name, so re-hosting an image twice
/// overwrites the earlier copy.
pub fn object_name(source_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_url.as_bytes());
    format!("image-{}.png", hex::encode(hasher.finalize()))
}

/// Download `source_url` (following redirects) into a fresh scratch file
/// in `dir` whose name starts with `name`.
///
/// Every call gets its own file, so concurrent downloads of one URL never
/// share a path. The file is removed when the returned handle drops.
pub async fn download_image(
    http: &Client,
    source_url: &str,
    dir: &Path,
    name: &str,
) -> Result<NamedTempFile, ImageHostError> {
    let response = http
        .get(source_url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(ImageHostError::Download)?;
    let bytes = response.bytes().await.map_err(ImageHostError::Download)?;

    let scratch = tempfile::Builder::new()
        .prefix(&format!("{name}."))
        .tempfile_in(dir)?;
    tokio::fs::write(scratch.path(), &bytes).await?;
    Ok(scratch)
}

/// Content type of an image, sniffed from its leading bytes.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    image::guess_format(data)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// [`ImageHost`] that downloads to a scratch directory and uploads to a bucket.
pub struct BucketImageHost {
    http: Client,
    storage: Arc<BucketClient>,
    scratch_dir: PathBuf,
}

impl BucketImageHost {
    pub fn new(storage: Arc<BucketClient>, scratch_dir: PathBuf) -> Self {
        Self {
            http: Client::new(),
            storage,
            scratch_dir,
        }
    }
}

#[async_trait]
impl ImageHost for BucketImageHost {
    async fn rehost(&self, source_url: &str) -> Result<String, ImageHostError> {
        let name = object_name(source_url);

        tracing::debug!(object = %name, "Downloading generated image");
        let scratch = download_image(&self.http, source_url, &self.scratch_dir, &name).await?;

        let data = tokio::fs::read(scratch.path()).await?;
        let content_type = sniff_content_type(&data);

        tracing::debug!(object = %name, bytes = data.len(), content_type, "Uploading image");
        let uploaded = self.storage.upload(&name, &data, content_type).await;

        let path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove scratch file");
        }
        uploaded?;

        Ok(self.storage.public_url(&name))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageHostError {
    #[error("Image download failed: {0}")]
    Download(reqwest::Error),

    #[error("Scratch file error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
