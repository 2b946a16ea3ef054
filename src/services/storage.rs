use s3::creds::Credentials;
use s3::{Bucket, Region};

/// Client for the image bucket on an S3-compatible object store.
pub struct BucketClient {
    bucket: Box<Bucket>,
    public_url_base: String,
}

impl BucketClient {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        public_url_base: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: region.to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self {
            bucket,
            public_url_base: public_url_base.trim_end_matches('/').to_string(),
        })
    }

    /// Upload bytes under `key`, replacing any existing object.
    pub async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError> {
        let response = self
            .bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(StorageError::S3)?;

        let code = response.status_code();
        if !(200..300).contains(&code) {
            return Err(StorageError::Rejected(code));
        }
        Ok(())
    }

    /// Public URL an uploaded object is served from.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_url_base, self.bucket.name(), key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage rejected upload with status {0}")]
    Rejected(u16),

    #[error("Storage configuration error: {0}")]
    Config(String),
}
