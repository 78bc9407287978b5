//! Image catalog scanner
//!
//! Recursive image discovery under the image root. The identity of each
//! item is derived from its path per the configured [`IdentityScheme`].

use crate::error::{Error, Result};
use crate::ranking::item::CatalogEntry;
use elopix_common::config::IdentityScheme;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Source of the items available for ranking
pub trait CatalogProvider: Send + Sync {
    /// Enumerate the catalog under `root`
    fn scan(&self, root: &Path) -> Result<Vec<CatalogEntry>>;
}

/// Folder scanner backed by `walkdir`
pub struct FolderCatalog {
    identity: IdentityScheme,
    ignore_patterns: Vec<String>,
}

impl Default for FolderCatalog {
    fn default() -> Self {
        Self::new(IdentityScheme::default())
    }
}

impl FolderCatalog {
    /// Create a scanner with default ignore patterns
    ///
    /// Ignores system files like .DS_Store, Thumbs.db, .git.
    pub fn new(identity: IdentityScheme) -> Self {
        Self {
            identity,
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
            ],
        }
    }

    fn should_process_entry(&self, entry: &DirEntry) -> bool {
        // The root itself is always walked, whatever its name
        if entry.depth() == 0 {
            return true;
        }
        let file_name = entry.file_name().to_string_lossy();
        !self.ignore_patterns.iter().any(|p| file_name == p.as_str())
    }

    fn identity_of(&self, root: &Path, path: &Path) -> Option<String> {
        match self.identity {
            IdentityScheme::FileName => path.file_name().map(|n| n.to_string_lossy().into_owned()),
            IdentityScheme::RelativePath => path.strip_prefix(root).ok().map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            }),
        }
    }
}

impl CatalogProvider for FolderCatalog {
    fn scan(&self, root: &Path) -> Result<Vec<CatalogEntry>> {
        if !root.exists() {
            return Err(Error::Scan(format!("Path not found: {}", root.display())));
        }
        if !root.is_dir() {
            return Err(Error::Scan(format!("Not a directory: {}", root.display())));
        }

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e));

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && is_image_extension(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                }
            }
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(files.len());
        for path in files {
            let Some(id) = self.identity_of(root, &path) else {
                continue;
            };
            if !seen.insert(id.clone()) {
                tracing::warn!(
                    "Duplicate identity {} at {}; keeping the first occurrence",
                    id,
                    path.display()
                );
                continue;
            }
            entries.push(CatalogEntry::new(id, path));
        }

        tracing::info!("Catalog scan of {} found {} images", root.display(), entries.len());
        Ok(entries)
    }
}

/// Check if the extension is a displayable image (case-insensitive)
fn is_image_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp"))
}
