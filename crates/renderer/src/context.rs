//! The graphics seam the parallax core drives.
//!
//! `GraphicsContext` is deliberately shaped like an immediate-mode GL API:
//! shaders and programs are created and released explicitly, uniforms are
//! written by location, and textures are bound to numbered units. The native
//! implementation lives in [`crate::gpu`]; tests substitute a recording
//! context so every call the core issues can be asserted on.

use std::fmt;

use crate::textures::DecodedImage;

/// Pipeline stage a shader source is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Layout size of the drawing surface as the host reports it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    /// Width in logical (CSS-like) pixels.
    pub client_width: f64,
    /// Height in logical pixels.
    pub client_height: f64,
    /// Physical pixels per logical pixel.
    pub device_pixel_ratio: f64,
}

impl CanvasSize {
    pub fn new(client_width: f64, client_height: f64, device_pixel_ratio: f64) -> Self {
        Self {
            client_width,
            client_height,
            device_pixel_ratio,
        }
    }

    /// Device-pixel-scaled size the backing surface should have.
    pub fn backing_size(&self) -> (u32, u32) {
        let ratio = if self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        };
        (
            scaled_dimension(self.client_width, ratio),
            scaled_dimension(self.client_height, ratio),
        )
    }
}

fn scaled_dimension(client: f64, ratio: f64) -> u32 {
    let scaled = client * ratio;
    if !scaled.is_finite() || scaled <= 0.0 {
        return 0;
    }
    // Absorb float noise such as 1279.9999 before truncating like a canvas does.
    (scaled + 1e-6).floor().min(u32::MAX as f64) as u32
}

/// Error raised when a surface cannot provide a graphics context at all.
#[derive(Debug, thiserror::Error)]
#[error("graphics context unavailable: {reason}")]
pub struct ContextError {
    reason: String,
}

impl ContextError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Something that can hand out a graphics context, such as a window.
pub trait DrawingSurface {
    type Context: GraphicsContext;

    fn acquire_context(&self) -> Result<Self::Context, ContextError>;
}

/// Immediate-mode graphics operations used by the bootstrap and render loop.
///
/// Errors are reported as driver diagnostic text; callers decide how to log
/// and surface them.
pub trait GraphicsContext {
    type Shader;
    type Program;
    type Buffer;
    type Texture;
    type Uniform: Clone + fmt::Debug;

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<Self::Shader, String>;
    fn delete_shader(&mut self, shader: Self::Shader);

    fn link_program(
        &mut self,
        vertex: &Self::Shader,
        fragment: &Self::Shader,
    ) -> Result<Self::Program, String>;
    fn delete_program(&mut self, program: Self::Program);
    fn use_program(&mut self, program: &Self::Program);

    /// Allocates a static vertex buffer that is never written again.
    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<Self::Buffer, String>;
    fn delete_buffer(&mut self, buffer: Self::Buffer);
    fn attribute_location(&self, program: &Self::Program, name: &str) -> Option<u32>;
    /// Feeds `location` from `buffer` with tightly packed `components`-wide floats.
    fn bind_attribute(&mut self, buffer: &Self::Buffer, location: u32, components: u32);

    fn uniform_location(&self, program: &Self::Program, name: &str) -> Option<Self::Uniform>;
    fn uniform_i32(&mut self, location: &Self::Uniform, value: i32);
    fn uniform_f32(&mut self, location: &Self::Uniform, value: f32);
    fn uniform_vec2(&mut self, location: &Self::Uniform, value: [f32; 2]);

    /// Uploads an RGBA8 image with clamp-to-edge wrapping, linear filtering and
    /// no mipmaps.
    fn create_texture(&mut self, image: &DecodedImage) -> Result<Self::Texture, String>;
    fn bind_texture(&mut self, unit: u32, texture: &Self::Texture);
    fn delete_texture(&mut self, texture: Self::Texture);

    fn canvas_size(&self) -> CanvasSize;
    fn backing_size(&self) -> (u32, u32);
    fn resize_backing(&mut self, width: u32, height: u32);
    fn viewport(&mut self, width: u32, height: u32);

    /// Draws the bound quad as a triangle strip.
    fn draw_quad(&mut self, vertex_count: u32);

    /// Forces the context into the lost state if the platform allows it.
    /// Returns whether anything happened.
    fn lose_context(&mut self) -> bool;
}
