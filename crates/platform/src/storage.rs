//! Object storage for product and promo images.
//!
//! Objects are written with the service role key and read through the
//! bucket's public URL, which is what gets stored in `products.image_url`
//! and `promos.image_url`.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use crate::config::PlatformConfig;

/// Largest accepted image.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Request(String),

    #[error("storage API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("image is larger than 5 MB")]
    TooLarge,

    #[error("image is empty")]
    Empty,

    #[error("storage configuration error: {0}")]
    Config(String),
}

/// Storage REST client bound to one bucket.
#[derive(Clone)]
pub struct StorageClient {
    http: Client,
    base: Url,
    bucket: String,
    service_key: SecretString,
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("base", &self.base.as_str())
            .field("bucket", &self.bucket)
            .field("service_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl StorageClient {
    /// # Errors
    ///
    /// Returns `StorageError::Config` when the service role key was not
    /// loaded.
    pub fn new(config: &PlatformConfig) -> Result<Self, StorageError> {
        let key = config
            .service_role_key
            .clone()
            .ok_or_else(|| StorageError::Config("PLATFORM_SERVICE_ROLE_KEY is not set".into()))?;
        Ok(Self::with_base(
            config.url.clone(),
            config.storage_bucket.clone(),
            key,
        ))
    }

    #[must_use]
    pub fn with_base(base: Url, bucket: String, service_key: SecretString) -> Self {
        Self {
            http: Client::new(),
            base,
            bucket,
            service_key,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, StorageError> {
        self.base
            .join(&format!("storage/v1/{path}"))
            .map_err(|e| StorageError::Config(format!("invalid storage URL: {e}")))
    }

    /// Public URL for an object path inside the bucket.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Config` if the URL cannot be built.
    pub fn public_url(&self, path: &str) -> Result<String, StorageError> {
        Ok(self
            .endpoint(&format!("object/public/{}/{path}", self.bucket))?
            .to_string())
    }

    /// Inverse of [`Self::public_url`]; `None` for URLs outside this bucket
    /// (e.g. images hosted elsewhere).
    #[must_use]
    pub fn path_from_public_url(&self, url: &str) -> Option<String> {
        let prefix = self.public_url("").ok()?;
        url.strip_prefix(&prefix)
            .filter(|rest| !rest.is_empty())
            .map(str::to_owned)
    }

    /// Upload (or overwrite) an object and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Request` or `StorageError::Api`.
    #[instrument(skip(self, bytes), fields(bucket = %self.bucket, size = bytes.len()))]
    pub async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let url = self.endpoint(&format!("object/{}/{path}", self.bucket))?;
        let response = self
            .http
            .post(url)
            .bearer_auth(self.service_key.expose_secret())
            .header("apikey", self.service_key.expose_secret())
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        check(response).await?;

        debug!(path, "Object uploaded");
        self.public_url(path)
    }

    /// Delete objects by path. Missing objects are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Request` or `StorageError::Api`.
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn remove(&self, paths: &[String]) -> Result<(), StorageError> {
        if paths.is_empty() {
            return Ok(());
        }
        let url = self.endpoint(&format!("object/{}", self.bucket))?;
        let response = self
            .http
            .delete(url)
            .bearer_auth(self.service_key.expose_secret())
            .header("apikey", self.service_key.expose_secret())
            .json(&serde_json::json!({ "prefixes": paths }))
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        check(response).await?;
        debug!(count = paths.len(), "Objects removed");
        Ok(())
    }
}

async fn check(response: reqwest::Response) -> Result<(), StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
        .unwrap_or(body);
    Err(StorageError::Api {
        status: status.as_u16(),
        message,
    })
}

/// A validated image ready for upload.
#[derive(Debug)]
pub struct ImageUpload {
    bytes: Vec<u8>,
    content_type: &'static str,
    extension: &'static str,
}

impl ImageUpload {
    /// Accept JPEG, PNG or WebP up to [`MAX_IMAGE_BYTES`]. The declared
    /// content type wins; the file name extension is the fallback.
    ///
    /// # Errors
    ///
    /// Returns `Empty`, `TooLarge` or `UnsupportedType`.
    pub fn new(
        file_name: Option<&str>,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<Self, StorageError> {
        if bytes.is_empty() {
            return Err(StorageError::Empty);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(StorageError::TooLarge);
        }

        let from_type = content_type.and_then(|ct| match ct.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(("image/jpeg", "jpg")),
            "image/png" => Some(("image/png", "png")),
            "image/webp" => Some(("image/webp", "webp")),
            _ => None,
        });
        let from_name = || {
            let ext = file_name?.rsplit_once('.')?.1.to_ascii_lowercase();
            match ext.as_str() {
                "jpg" | "jpeg" => Some(("image/jpeg", "jpg")),
                "png" => Some(("image/png", "png")),
                "webp" => Some(("image/webp", "webp")),
                _ => None,
            }
        };

        let (content_type, extension) = from_type.or_else(from_name).ok_or_else(|| {
            StorageError::UnsupportedType(
                content_type
                    .or(file_name)
                    .unwrap_or("unknown")
                    .to_owned(),
            )
        })?;

        Ok(Self {
            bytes,
            content_type,
            extension,
        })
    }

    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Fresh object path under `folder`, e.g. `products/<uuid>.webp`.
    #[must_use]
    pub fn object_path(&self, folder: &str) -> String {
        format!("{folder}/{}.{}", Uuid::new_v4(), self.extension)
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str) -> StorageClient {
        StorageClient::with_base(
            Url::parse(base).expect("url"),
            "menu-images".into(),
            SecretString::from("service-key"),
        )
    }

    #[test]
    fn test_public_url_round_trips_to_path() {
        let client = client("https://platform.test/");
        let url = client.public_url("products/a.png").expect("url");
        assert_eq!(
            url,
            "https://platform.test/storage/v1/object/public/menu-images/products/a.png"
        );
        assert_eq!(
            client.path_from_public_url(&url).as_deref(),
            Some("products/a.png")
        );
        assert_eq!(client.path_from_public_url("https://cdn.test/a.png"), None);
    }

    #[test]
    fn test_image_validation() {
        let png = ImageUpload::new(Some("latte.PNG"), None, vec![1, 2, 3]).expect("png");
        assert_eq!(png.content_type(), "image/png");
        assert!(png.object_path("products").starts_with("products/"));
        assert!(png.object_path("products").ends_with(".png"));

        let webp = ImageUpload::new(None, Some("image/webp"), vec![1]).expect("webp");
        assert!(webp.object_path("promos").ends_with(".webp"));

        assert!(matches!(
            ImageUpload::new(Some("menu.pdf"), Some("application/pdf"), vec![1]),
            Err(StorageError::UnsupportedType(_))
        ));
        assert!(matches!(
            ImageUpload::new(Some("a.jpg"), None, Vec::new()),
            Err(StorageError::Empty)
        ));
        assert!(matches!(
            ImageUpload::new(Some("a.jpg"), None, vec![0; MAX_IMAGE_BYTES + 1]),
            Err(StorageError::TooLarge)
        ));
    }

    #[tokio::test]
    async fn test_upload_returns_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/menu-images/products/x.jpg"))
            .and(header("x-upsert", "true"))
            .and(header("content-type", "image/jpeg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Key": "menu-images/products/x.jpg"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&format!("{}/", server.uri()));
        let url = client
            .upload("products/x.jpg", vec![0xFF, 0xD8], "image/jpeg")
            .await
            .expect("upload");
        assert!(url.ends_with("/storage/v1/object/public/menu-images/products/x.jpg"));
    }

    #[tokio::test]
    async fn test_upload_error_surfaces_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(serde_json::json!({ "message": "new row violates policy" })),
            )
            .mount(&server)
            .await;

        let err = client(&format!("{}/", server.uri()))
            .upload("products/x.jpg", vec![1], "image/jpeg")
            .await
            .unwrap_err();
        assert!(
            matches!(err, StorageError::Api { status: 403, ref message } if message == "new row violates policy")
        );
    }

    #[tokio::test]
    async fn test_remove_skips_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        client(&format!("{}/", server.uri()))
            .remove(&[])
            .await
            .expect("noop");
    }
}
