pub mod cloudinary;

use async_trait::async_trait;

use crate::core::Result;

pub use cloudinary::{CloudinaryUploader, UploadConfig};

/// Image-hosting upload endpoint.
///
/// Failures are `CacheError::Upload`. The mutation pipeline treats them as
/// non-fatal: create falls back to an empty image URL, update keeps the
/// previous one.
#[async_trait]
pub trait ImageUpload: Send + Sync {
    /// Upload raw image bytes, returning the hosted secure URL.
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<String>;
}
