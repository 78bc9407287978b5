//! Display asset preparation
//!
//! An asset is the decoded-enough form of an item that the presentation
//! surface can show without further disk access.

use crate::error::{Error, Result};
use axum::body::Bytes;
use std::path::{Path, PathBuf};

/// Item bytes ready to be served
///
/// Cloning shares the content buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedAsset {
    pub path: PathBuf,
    /// MIME type sniffed from the content
    pub mime: &'static str,
    pub bytes: Bytes,
}

/// Turns an item path into a displayable asset
///
/// Called from the blocking pool; implementations may do synchronous I/O.
pub trait AssetLoader: Send + Sync {
    fn prepare(&self, path: &Path) -> Result<PreparedAsset>;
}

/// Reads image files from disk and checks their magic bytes
pub struct FileAssetLoader {
    max_bytes: u64,
}

impl FileAssetLoader {
    pub const DEFAULT_MAX_BYTES: u64 = 64 * 1024 * 1024;

    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    fn fail(path: &Path, reason: impl Into<String>) -> Error {
        Error::AssetPreparation {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

impl Default for FileAssetLoader {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_BYTES)
    }
}

impl AssetLoader for FileAssetLoader {
    fn prepare(&self, path: &Path) -> Result<PreparedAsset> {
        let metadata = std::fs::metadata(path).map_err(|e| Self::fail(path, e.to_string()))?;
        if metadata.len() > self.max_bytes {
            return Err(Self::fail(
                path,
                format!("{} bytes exceeds limit of {}", metadata.len(), self.max_bytes),
            ));
        }

        let bytes = std::fs::read(path).map_err(|e| Self::fail(path, e.to_string()))?;
        let kind = infer::get(&bytes).ok_or_else(|| Self::fail(path, "unrecognized file content"))?;
        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(Self::fail(path, format!("not an image ({})", kind.mime_type())));
        }

        tracing::trace!("Prepared {} ({}, {} bytes)", path.display(), kind.mime_type(), bytes.len());
        Ok(PreparedAsset {
            path: path.to_path_buf(),
            mime: kind.mime_type(),
            bytes: Bytes::from(bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// PNG signature followed by a complete 1x1 IHDR chunk
    const PNG_HEADER: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, // signature
        0, 0, 0, 0x0D, b'I', b'H', b'D', b'R', // IHDR length + type
        0, 0, 0, 1, 0, 0, 0, 1, 8, 6, 0, 0, 0, // 1x1 RGBA
        0x1F, 0x15, 0xC4, 0x89, // crc
    ];

    #[test]
    fn test_prepares_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, PNG_HEADER).unwrap();

        let asset = FileAssetLoader::default().prepare(&path).unwrap();
        assert_eq!(asset.mime, "image/png");
        assert_eq!(asset.bytes, PNG_HEADER);
    }

    #[test]
    fn test_cloned_asset_shares_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, PNG_HEADER).unwrap();

        let asset = FileAssetLoader::default().prepare(&path).unwrap();
        let served = asset.bytes.clone();
        assert_eq!(served.as_ptr(), asset.bytes.as_ptr());
        assert_eq!(served.len(), PNG_HEADER.len());
    }

    #[test]
    fn test_rejects_non_image_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.png");
        std::fs::write(&path, b"just some text").unwrap();

        let err = FileAssetLoader::default().prepare(&path).unwrap_err();
        assert!(matches!(err, Error::AssetPreparation { .. }));
    }

    #[test]
    fn test_rejects_oversize_and_missing_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.png");
        std::fs::write(&path, PNG_HEADER).unwrap();

        assert!(matches!(
            FileAssetLoader::new(4).prepare(&path),
            Err(Error::AssetPreparation { .. })
        ));
        assert!(matches!(
            FileAssetLoader::default().prepare(&dir.path().join("gone.png")),
            Err(Error::AssetPreparation { .. })
        ));
    }
}
