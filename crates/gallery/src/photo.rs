use serde::{Deserialize, Serialize};

/// One catalog entry: a color image paired with its grayscale depth map.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Photo {
    /// Stable identifier used on the command line.
    pub slug: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Color image path or URL.
    pub src: String,
    /// Depth map path or URL; brighter means nearer.
    pub depth_src: String,
    /// Width divided by height.
    pub aspect: f32,
}

impl Photo {
    /// Window size for this photo, `long_edge` pixels along its longer side.
    pub fn window_size(&self, long_edge: u32) -> (u32, u32) {
        if !self.aspect.is_finite() || self.aspect <= 0.0 {
            return (long_edge, long_edge);
        }
        let long = long_edge as f32;
        if self.aspect >= 1.0 {
            (long_edge, (long / self.aspect).round().max(1.0) as u32)
        } else {
            ((long * self.aspect).round().max(1.0) as u32, long_edge)
        }
    }

    pub(crate) fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.slug.trim().is_empty() {
            issues.push("photo with an empty slug".to_string());
        }
        if self.src.trim().is_empty() {
            issues.push(format!("photo '{}' has an empty src", self.slug));
        }
        if self.depth_src.trim().is_empty() {
            issues.push(format!("photo '{}' has an empty depth_src", self.slug));
        }
        if !self.aspect.is_finite() || self.aspect <= 0.0 {
            issues.push(format!(
                "photo '{}' has a non-positive aspect ({})",
                self.slug, self.aspect
            ));
        }
        issues
    }
}
