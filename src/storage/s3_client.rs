// S3 object storage for agent pictures, training files and generated
// images.

use crate::config::StorageConfig;
use crate::types::{AppError, AppResult};
use s3::creds::Credentials;
use s3::{Bucket, Region};

pub struct ObjectStorage {
    bucket: Box<Bucket>,
    bucket_name: String,
    region: String,
}

impl ObjectStorage {
    pub fn from_config(config: &StorageConfig) -> AppResult<Self> {
        let region = match &config.s3_endpoint {
            Some(endpoint) => Region::Custom {
                region: config.s3_region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .s3_region
                .parse()
                .map_err(|e| AppError::Internal(format!("invalid S3 region: {e}")))?,
        };

        let credentials = Credentials::new(
            config.s3_access_key_id.as_deref(),
            config.s3_secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Internal(format!("invalid S3 credentials: {e}")))?;

        let bucket = Bucket::new(&config.s3_bucket, region, credentials)
            .map_err(|e| AppError::Internal(format!("cannot configure S3 bucket: {e}")))?;

        Ok(Self {
            bucket: Box::new(bucket),
            bucket_name: config.s3_bucket.clone(),
            region: config.s3_region.clone(),
        })
    }

    /// Upload an object and return its public URL.
    pub async fn put_object(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> AppResult<String> {
        let response = self
            .bucket
            .put_object_with_content_type(key, bytes, content_type)
            .await
            .map_err(|e| AppError::external_transient("storage", format!("upload failed: {e}")))?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(AppError::external_transient(
                "storage",
                format!("upload of {key} returned status {status}"),
            ));
        }

        Ok(self.public_url(key))
    }

    /// Delete an object; missing keys are not an error.
    pub async fn delete_object(&self, key: &str) -> AppResult<()> {
        self.bucket
            .delete_object(key)
            .await
            .map_err(|e| AppError::external_transient("storage", format!("delete failed: {e}")))?;
        Ok(())
    }

    pub fn public_url(&self, key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket_name, self.region, key
        )
    }

    /// Extract the object key from a public URL previously returned by
    /// `public_url`.
    pub fn key_from_url(url: &str) -> Option<&str> {
        url.split_once(".com/").map(|(_, key)| key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_url() {
        let url = "https://my-bucket.s3.us-east-1.amazonaws.com/app-data/pic.png";
        assert_eq!(ObjectStorage::key_from_url(url), Some("app-data/pic.png"));
        assert_eq!(ObjectStorage::key_from_url("no-scheme"), None);
    }
}
