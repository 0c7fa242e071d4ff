use std::path::PathBuf;

use clap::{Parser, Subcommand};
use renderer::{GpuPowerPreference, DEFAULT_INTENSITY};

#[derive(Parser, Debug)]
#[command(
    name = "parallaxview",
    author,
    version,
    about = "Depth-map parallax photo viewer"
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,

    /// Photo catalog TOML file (defaults to `photos.toml` in the config directory).
    #[arg(long, value_name = "FILE", global = true, env = "PARALLAXVIEW_CATALOG")]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Color image path or URL.
    #[arg(long, value_name = "SRC", requires = "depth", conflicts_with = "photo")]
    pub image: Option<String>,

    /// Grayscale depth map path or URL (brighter is nearer).
    #[arg(long, value_name = "SRC", requires = "image", conflicts_with = "photo")]
    pub depth: Option<String>,

    /// Catalog slug of the photo to show.
    #[arg(long, value_name = "SLUG")]
    pub photo: Option<String>,

    /// Displacement scale applied to the depth offset.
    #[arg(long, value_name = "F", default_value_t = DEFAULT_INTENSITY, value_parser = parse_intensity)]
    pub intensity: f32,

    /// Window size in logical pixels (e.g. `1280x800`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_window_size)]
    pub size: Option<(u32, u32)>,

    /// Adapter preference: `low` (integrated) or `high` (discrete).
    #[arg(long, value_name = "POWER", value_parser = parse_gpu_power, default_value = "low")]
    pub gpu_power: GpuPowerPreference,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect the photo catalog.
    Photos(PhotosCommand),
}

#[derive(Parser, Debug)]
pub struct PhotosCommand {
    #[command(subcommand)]
    pub action: PhotosAction,
}

#[derive(Subcommand, Debug)]
pub enum PhotosAction {
    /// Print every photo in the catalog.
    List,
    /// Validate the catalog and confirm local sources exist.
    Check,
    /// Print the resolved catalog path.
    Where,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_window_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x800".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{}'", width.trim()))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{}'", height.trim()))?;
    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}

pub fn parse_intensity(value: &str) -> Result<f32, String> {
    let intensity: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid intensity '{value}'"))?;
    if !intensity.is_finite() || intensity < 0.0 {
        return Err("intensity must be a non-negative number".to_string());
    }
    Ok(intensity)
}

pub fn parse_gpu_power(value: &str) -> Result<GpuPowerPreference, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" | "low-power" | "integrated" => Ok(GpuPowerPreference::Low),
        "high" | "high-performance" | "discrete" => Ok(GpuPowerPreference::High),
        other => Err(format!("unknown GPU power preference '{other}'; use low or high")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_window_sizes() {
        assert_eq!(parse_window_size("1280x800"), Ok((1280, 800)));
        assert_eq!(parse_window_size(" 640 X 480 "), Ok((640, 480)));
        assert!(parse_window_size("1280").is_err());
        assert!(parse_window_size("0x800").is_err());
        assert!(parse_window_size("wide x 800").is_err());
    }

    #[test]
    fn rejects_negative_or_non_finite_intensity() {
        assert_eq!(parse_intensity("0.05"), Ok(0.05));
        assert!(parse_intensity("-0.1").is_err());
        assert!(parse_intensity("inf").is_err());
        assert!(parse_intensity("lots").is_err());
    }

    #[test]
    fn parses_gpu_power_aliases() {
        assert_eq!(parse_gpu_power("HIGH"), Ok(GpuPowerPreference::High));
        assert_eq!(parse_gpu_power("integrated"), Ok(GpuPowerPreference::Low));
        assert!(parse_gpu_power("medium").is_err());
    }

    #[test]
    fn image_requires_depth_and_excludes_photo() {
        assert!(Cli::try_parse_from(["parallaxview", "--image", "a.jpg"]).is_err());
        assert!(Cli::try_parse_from([
            "parallaxview",
            "--image",
            "a.jpg",
            "--depth",
            "a.png",
            "--photo",
            "x"
        ])
        .is_err());

        let cli = Cli::try_parse_from(["parallaxview", "--image", "a.jpg", "--depth", "a.png"])
            .expect("valid args");
        assert_eq!(cli.run.image.as_deref(), Some("a.jpg"));
        assert_eq!(cli.run.intensity, DEFAULT_INTENSITY);
        assert_eq!(cli.run.gpu_power, GpuPowerPreference::Low);
    }

    #[test]
    fn catalog_flag_reaches_subcommands() {
        let cli = Cli::try_parse_from(["parallaxview", "photos", "list", "--catalog", "p.toml"])
            .expect("valid args");
        assert_eq!(cli.catalog, Some(PathBuf::from("p.toml")));
        assert!(matches!(
            cli.command,
            Some(Command::Photos(PhotosCommand {
                action: PhotosAction::List
            }))
        ));
    }
}
