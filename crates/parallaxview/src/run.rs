use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use gallery::PhotoCatalog;
use renderer::ViewerConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, RunArgs};
use crate::paths::AppPaths;
use crate::photos::run_photos;

/// Long edge of the window when a catalog photo picks its own size.
const PHOTO_WINDOW_EDGE: u32 = 1280;

pub fn run(args: Cli) -> Result<()> {
    initialise_tracing();

    let paths = AppPaths::discover()?;
    let catalog_path = paths.catalog_file(args.catalog.as_deref());
    tracing::debug!(
        config = %paths.config_dir().display(),
        catalog = %catalog_path.display(),
        "resolved parallaxview paths"
    );

    match &args.command {
        Some(Command::Photos(command)) => run_photos(&command.action, &catalog_path),
        None => {
            let config = resolve_viewer_config(&args.run, &catalog_path)?;
            tracing::info!(
                title = %config.title,
                width = config.window_size.0,
                height = config.window_size.1,
                intensity = config.intensity,
                "opening parallax preview"
            );
            renderer::run_window(config)
        }
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Turns the command line into a renderer configuration, consulting the
/// catalog when a photo slug was given.
pub fn resolve_viewer_config(args: &RunArgs, catalog_path: &Path) -> Result<ViewerConfig> {
    let mut config = ViewerConfig {
        intensity: args.intensity,
        gpu_power: args.gpu_power,
        ..ViewerConfig::default()
    };

    match (&args.photo, &args.image, &args.depth) {
        (Some(slug), _, _) => {
            let catalog = PhotoCatalog::load(catalog_path)
                .with_context(|| format!("failed to load catalog {}", catalog_path.display()))?;
            let photo = catalog.find(slug).ok_or_else(|| {
                let known: Vec<&str> = catalog.photos().iter().map(|p| p.slug.as_str()).collect();
                anyhow!("no photo '{slug}' in catalog (known: {})", known.join(", "))
            })?;
            let (image, depth) = catalog.sources(photo);
            config.title = format!("{} - parallaxview", photo.title);
            config.image_source = image;
            config.depth_source = depth;
            config.window_size = photo.window_size(PHOTO_WINDOW_EDGE);
        }
        (None, Some(image), Some(depth)) => {
            config.image_source = image.clone();
            config.depth_source = depth.clone();
        }
        _ => bail!("nothing to show: pass --photo SLUG or both --image and --depth"),
    }

    if let Some(size) = args.size {
        config.window_size = size;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["parallaxview"];
        full.extend_from_slice(argv);
        Cli::try_parse_from(full).expect("valid args").run
    }

    fn write_catalog(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("photos.toml");
        fs::write(
            &path,
            r#"
[[photo]]
slug = "tall"
title = "Tall one"
src = "tall.jpg"
depth_src = "tall-depth.png"
aspect = 0.5
"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn explicit_sources_use_default_window() {
        let args = run_args(&["--image", "a.jpg", "--depth", "a.png", "--intensity", "0.04"]);
        let config = resolve_viewer_config(&args, Path::new("unused.toml")).unwrap();
        assert_eq!(config.image_source, "a.jpg");
        assert_eq!(config.depth_source, "a.png");
        assert_eq!(config.intensity, 0.04);
        assert_eq!(config.window_size, ViewerConfig::default().window_size);
    }

    #[test]
    fn photo_resolves_sources_and_sizes_window_from_aspect() {
        let temp = tempfile::tempdir().unwrap();
        let catalog = write_catalog(temp.path());
        let config = resolve_viewer_config(&run_args(&["--photo", "tall"]), &catalog).unwrap();

        assert_eq!(config.title, "Tall one - parallaxview");
        assert_eq!(
            Path::new(&config.image_source),
            temp.path().join("tall.jpg").as_path()
        );
        assert_eq!(config.window_size, (640, 1280));
    }

    #[test]
    fn size_flag_overrides_photo_aspect() {
        let temp = tempfile::tempdir().unwrap();
        let catalog = write_catalog(temp.path());
        let args = run_args(&["--photo", "tall", "--size", "300x200"]);
        let config = resolve_viewer_config(&args, &catalog).unwrap();
        assert_eq!(config.window_size, (300, 200));
    }

    #[test]
    fn unknown_photo_lists_known_slugs() {
        let temp = tempfile::tempdir().unwrap();
        let catalog = write_catalog(temp.path());
        let err = resolve_viewer_config(&run_args(&["--photo", "wide"]), &catalog).unwrap_err();
        assert!(err.to_string().contains("known: tall"), "{err}");
    }

    #[test]
    fn nothing_to_show_is_an_error() {
        let err = resolve_viewer_config(&run_args(&[]), Path::new("unused.toml")).unwrap_err();
        assert!(err.to_string().contains("nothing to show"));
    }
}
