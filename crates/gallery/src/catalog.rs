use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::photo::Photo;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog not found at {0}")]
    Missing(PathBuf),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("catalog validation failed: {0:?}")]
    Validation(Vec<String>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct CatalogFile {
    #[serde(default, rename = "photo")]
    photos: Vec<Photo>,
}

/// Photos declared in a catalog file, in file order.
#[derive(Debug, Clone, Default)]
pub struct PhotoCatalog {
    base_dir: PathBuf,
    photos: Vec<Photo>,
}

impl PhotoCatalog {
    /// Reads and validates the catalog at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CatalogError::Missing(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let catalog = Self::parse(&raw, base_dir)?;
        let issues = catalog.validate();
        if !issues.is_empty() {
            return Err(CatalogError::Validation(issues));
        }
        Ok(catalog)
    }

    /// Parses catalog text without validating it.
    pub fn parse(raw: &str, base_dir: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(raw)?;
        Ok(Self {
            base_dir: base_dir.into(),
            photos: file.photos,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn find(&self, slug: &str) -> Option<&Photo> {
        self.photos.iter().find(|photo| photo.slug == slug)
    }

    /// Human-readable problems with the catalog; empty when it is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();
        for photo in &self.photos {
            issues.extend(photo.issues());
            if !photo.slug.is_empty() && !seen.insert(photo.slug.as_str()) {
                issues.push(format!("duplicate slug '{}'", photo.slug));
            }
        }
        issues
    }

    /// Resolves a photo source against the catalog directory.
    pub fn resolve_source(&self, source: &str) -> String {
        if is_remote(source) || source.starts_with("file://") {
            return source.to_string();
        }
        let path = Path::new(source);
        if path.is_absolute() {
            source.to_string()
        } else {
            self.base_dir.join(path).to_string_lossy().into_owned()
        }
    }

    /// Color and depth sources of `photo`, resolved for loading.
    pub fn sources(&self, photo: &Photo) -> (String, String) {
        (
            self.resolve_source(&photo.src),
            self.resolve_source(&photo.depth_src),
        )
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
