use crate::parallax::DEFAULT_INTENSITY;

/// Adapter power preference forwarded to wgpu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    /// Prefer integrated GPUs to save battery.
    #[default]
    Low,
    /// Prefer discrete GPUs for headroom.
    High,
}

impl GpuPowerPreference {
    pub(crate) fn to_wgpu(self) -> wgpu::PowerPreference {
        match self {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Immutable configuration passed to the preview window at start-up.
///
/// `ViewerConfig` mirrors the CLI flags after catalog lookups have been
/// resolved, so both sources are plain paths or URLs by the time they get here.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Window title.
    pub title: String,
    /// Color image path or URL.
    pub image_source: String,
    /// Grayscale depth map path or URL.
    pub depth_source: String,
    /// Initial displacement scale.
    pub intensity: f32,
    /// Initial window size in logical pixels.
    pub window_size: (u32, u32),
    pub gpu_power: GpuPowerPreference,
}

impl Default for ViewerConfig {
    /// Provides a 1280x800 window with no sources selected.
    fn default() -> Self {
        Self {
            title: "parallaxview".to_string(),
            image_source: String::new(),
            depth_source: String::new(),
            intensity: DEFAULT_INTENSITY,
            window_size: (1280, 800),
            gpu_power: GpuPowerPreference::default(),
        }
    }
}
