use std::path::Path;

use anyhow::{bail, Context, Result};
use gallery::{CatalogError, PhotoCatalog};

use crate::cli::PhotosAction;

pub fn run_photos(action: &PhotosAction, catalog_path: &Path) -> Result<()> {
    match action {
        PhotosAction::List => list(catalog_path),
        PhotosAction::Check => check(catalog_path),
        PhotosAction::Where => {
            let marker = if catalog_path.exists() { "" } else { " (missing)" };
            println!("{}{marker}", catalog_path.display());
            Ok(())
        }
    }
}

fn list(catalog_path: &Path) -> Result<()> {
    let catalog = PhotoCatalog::load(catalog_path)
        .with_context(|| format!("failed to load catalog {}", catalog_path.display()))?;
    if catalog.is_empty() {
        println!("no photos in {}", catalog_path.display());
        return Ok(());
    }
    for photo in catalog.photos() {
        println!("{:<20} {:<32} aspect {:.3}", photo.slug, photo.title, photo.aspect);
        if let Some(caption) = photo.caption.as_deref() {
            println!("{:<20} {caption}", "");
        }
    }
    Ok(())
}

fn check(catalog_path: &Path) -> Result<()> {
    let catalog = match PhotoCatalog::load(catalog_path) {
        Ok(catalog) => catalog,
        Err(CatalogError::Validation(issues)) => {
            for issue in &issues {
                println!("error: {issue}");
            }
            bail!("catalog has {} problem(s)", issues.len());
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to load catalog {}", catalog_path.display()))
        }
    };

    let missing = missing_local_sources(&catalog);
    for (slug, source) in &missing {
        println!("error: photo '{slug}' source not found: {source}");
    }
    if !missing.is_empty() {
        bail!("catalog references {} missing file(s)", missing.len());
    }
    println!(
        "{}: {} photo(s) ok",
        catalog_path.display(),
        catalog.photos().len()
    );
    Ok(())
}

/// Local sources that do not exist on disk; remote URLs are not probed.
fn missing_local_sources(catalog: &PhotoCatalog) -> Vec<(String, String)> {
    let mut missing = Vec::new();
    for photo in catalog.photos() {
        let (image, depth) = catalog.sources(photo);
        for source in [image, depth] {
            if source.starts_with("http://") || source.starts_with("https://") {
                continue;
            }
            let path = source.strip_prefix("file://").unwrap_or(&source);
            if !Path::new(path).exists() {
                missing.push((photo.slug.clone(), source.clone()));
            }
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reports_only_missing_local_files() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("a.jpg"), b"jpeg").unwrap();
        let raw = r#"
[[photo]]
slug = "a"
title = "A"
src = "a.jpg"
depth_src = "a-depth.png"
aspect = 1.0

[[photo]]
slug = "remote"
title = "Remote"
src = "https://example.org/r.jpg"
depth_src = "https://example.org/r-depth.png"
aspect = 1.0
"#;
        let catalog = PhotoCatalog::parse(raw, temp.path()).unwrap();
        let missing = missing_local_sources(&catalog);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].0, "a");
        assert!(missing[0].1.ends_with("a-depth.png"));
    }
}
