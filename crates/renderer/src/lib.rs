//! Depth-parallax image renderer.
//!
//! Given a color image and a matching grayscale depth map, the renderer
//! displaces texture sampling per pixel by depth and pointer position to fake
//! a look-around 3D effect. The overall flow is:
//!
//! ```text
//!   DrawingSurface ──▶ ParallaxRenderer::init ──▶ bootstrap (program, quad, uniforms)
//!                              │
//!   load_textures ──▶ PendingTextures (worker threads) ──▶ poll_textures ──▶ texture slots
//!                              │
//!   FrameScheduler ──▶ frame() ──▶ pointer smoothing + drift ──▶ uniforms ──▶ draw
//! ```
//!
//! The core is generic over a GL-shaped [`GraphicsContext`] and a
//! [`FrameScheduler`], so it runs unchanged against the native wgpu backend in
//! [`gpu`] and against recording doubles in tests. [`run_window`] wires it to a
//! winit window for interactive previews.

mod bootstrap;
mod context;
pub mod gpu;
mod parallax;
mod pointer;
mod schedule;
mod shaders;
#[cfg(test)]
mod testing;
mod textures;
mod types;
mod window;

pub use bootstrap::InitError;
pub use context::{CanvasSize, ContextError, DrawingSurface, GraphicsContext, ShaderStage};
pub use parallax::{ParallaxRenderer, TextureLoad, DEFAULT_INTENSITY};
pub use pointer::{
    drift, normalize_cursor, normalize_tilt, shared_pointer, PointerInput, PointerSource,
    PointerState, SharedPointerSource, SMOOTHING,
};
pub use schedule::{FrameHandle, FrameScheduler, RunState};
pub use shaders::{
    ATTRIB_POSITION, DEPTH_UNIT, FRAGMENT_SHADER, IMAGE_UNIT, QUAD_VERTEX_COUNT, QUAD_VERTICES,
    UNIFORM_DEPTH, UNIFORM_IMAGE, UNIFORM_IMAGE_RES, UNIFORM_INTENSITY, UNIFORM_POINTER,
    UNIFORM_RESOLUTION, VERTEX_SHADER,
};
pub use textures::{
    DecodedImage, DefaultFetcher, ImageFetcher, ImagePair, PendingTextures, TextureError,
    TextureSlot,
};
pub use types::{GpuPowerPreference, ViewerConfig};
pub use window::{run_window, RedrawScheduler, WindowSurface};
