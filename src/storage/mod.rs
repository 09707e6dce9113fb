//! Object storage - reference photos, generated slides, manifests and archives

pub mod archive;
pub mod local;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::Result;

pub use archive::{package_archive, ArchiveEntry};
pub use local::LocalStorage;

/// Storage contract consumed by the generation client and the pipeline.
///
/// Uploading to an existing path overwrites it.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` at `path` and return a URL it can be fetched from
    async fn upload(&self, path: &str, data: &[u8], content_type: &str) -> Result<String>;

    /// Fetch the bytes stored at `path`
    async fn download(&self, path: &str) -> Result<Vec<u8>>;

    /// Public URL for `path`, whether or not it exists yet
    fn public_url(&self, path: &str) -> String;
}

/// Serialize `value` as pretty JSON and upload it
pub async fn upload_json<T: serde::Serialize + ?Sized>(
    storage: &dyn ObjectStorage,
    path: &str,
    value: &T,
) -> Result<String> {
    let data = serde_json::to_vec_pretty(value)?;
    storage.upload(path, &data, "application/json").await
}

/// SHA-256 hex digest of `data`
pub fn content_hash(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Detect image format from binary data using magic bytes
pub fn detect_image_format(data: &[u8]) -> Option<&'static str> {
    if data.len() < 8 {
        return None;
    }

    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("png");
    }

    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpeg");
    }

    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("gif");
    }

    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("webp");
    }

    None
}

/// MIME type for an image, preferring magic bytes over the path extension
pub fn image_mime_type(path: &str, data: &[u8]) -> &'static str {
    let format = detect_image_format(data).or_else(|| {
        let ext = path.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some("png"),
            "webp" => Some("webp"),
            "gif" => Some("gif"),
            _ => None,
        }
    });

    match format {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

/// Canonical storage layout for set outputs
pub mod paths {
    use super::Uuid;

    pub fn subject_reference(subject_id: Uuid, filename: &str) -> String {
        format!("subjects/{}/{}", subject_id, filename)
    }

    pub fn set_image(set_id: Uuid, filename: &str) -> String {
        format!("sets/{}/images/{}", set_id, filename)
    }

    pub fn set_model_image(set_id: Uuid) -> String {
        format!("sets/{}/model.png", set_id)
    }

    pub fn set_manifest(set_id: Uuid) -> String {
        format!("sets/{}/manifest.json", set_id)
    }

    pub fn set_archive(set_id: Uuid) -> String {
        format!("sets/{}/{}.zip", set_id, set_id)
    }

    /// File name of a slide image: zero-padded position plus a slug of the
    /// style name when there is one.
    pub fn slide_filename(position: u32, style_name: Option<&str>) -> String {
        let slug = style_name.map(slugify).unwrap_or_default();
        if slug.is_empty() {
            format!("{:03}.png", position)
        } else {
            format!("{:03}_{}.png", position, slug)
        }
    }

    fn slugify(name: &str) -> String {
        let mut slug = String::with_capacity(name.len());
        for c in name.chars().flat_map(char::to_lowercase) {
            if c.is_ascii_alphanumeric() {
                slug.push(c);
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        slug.trim_matches('-').to_string()
    }
}
