use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::ImageUpload;
use crate::core::{CacheError, Result};

/// Upload endpoint configuration.
///
/// Defaults follow the unsigned-upload convention of the image host: the
/// file travels as the `file` form part, the preset name as `upload_preset`.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Full endpoint URL, e.g. `https://api.cloudinary.com/v1_1/<cloud>/image/upload`.
    pub endpoint: String,

    /// Unsigned upload preset name.
    pub preset: String,

    /// MIME type sent with the file part.
    pub mime: String,
}

impl UploadConfig {
    /// Configuration for an arbitrary endpoint.
    pub fn new(endpoint: impl Into<String>, preset: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            preset: preset.into(),
            mime: "image/*".to_string(),
        }
    }

    /// Configuration for a Cloudinary cloud by name.
    pub fn cloudinary(cloud_name: &str, preset: impl Into<String>) -> Self {
        Self::new(
            format!("https://api.cloudinary.com/v1_1/{cloud_name}/image/upload"),
            preset,
        )
    }

    /// Override the MIME type of the file part.
    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }
}

/// Body of a successful upload response. Only `secure_url` matters; a body
/// without it is treated as a failed upload.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    secure_url: Option<String>,
}

/// `ImageUpload` over an HTTPS multipart POST.
pub struct CloudinaryUploader {
    http: reqwest::Client,
    config: UploadConfig,
}

impl CloudinaryUploader {
    pub fn new(config: UploadConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Reuse an existing HTTP client (connection pooling across uploads).
    pub fn with_client(http: reqwest::Client, config: UploadConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl ImageUpload for CloudinaryUploader {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<String> {
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(&self.config.mime)
            .map_err(|e| CacheError::Upload(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.config.preset.clone());

        let response = self
            .http
            .post(&self.config.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CacheError::Upload(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::Upload(format!("endpoint returned {status}")));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| CacheError::Upload(e.to_string()))?;

        body.secure_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| CacheError::Upload("response missing secure_url".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloudinary_config_builds_endpoint() {
        let config = UploadConfig::cloudinary("demo", "unsigned");
        assert_eq!(
            config.endpoint,
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
        assert_eq!(config.preset, "unsigned");
        assert_eq!(config.mime, "image/*");
    }

    #[test]
    fn response_without_secure_url_is_rejected() {
        let body: UploadResponse = serde_json::from_str(r#"{"public_id": "x"}"#).unwrap();
        assert!(body.secure_url.is_none());

        let body: UploadResponse =
            serde_json::from_str(r#"{"secure_url": "https://x/1.jpg"}"#).unwrap();
        assert_eq!(body.secure_url.as_deref(), Some("https://x/1.jpg"));
    }
}
