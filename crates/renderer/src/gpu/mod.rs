//! Native wgpu backend for the parallax core.
//!
//! wgpu has no notion of "current program" or numbered texture units, so this
//! module keeps that state on the CPU and turns it into pipelines and bind
//! groups at draw time:
//! - `reflect` parses each GLSL stage with naga and extracts its interface
//!   (vertex inputs, uniform block offsets, texture/sampler slots).
//! - `pipeline` links two stage interfaces into a render pipeline plus the
//!   bind group layouts, and caches texture bind groups per program.
//! - `uniforms` stages uniform block writes until the next draw.
//! - `texture` uploads decoded images and owns the 1x1 placeholder that
//!   stands in for empty texture units.
//! - `context` wires instance/adapter/device/surface together and implements
//!   [`crate::GraphicsContext`] on top of the pieces above.

mod context;
mod pipeline;
mod reflect;
mod texture;
mod uniforms;

pub use context::{WgpuBuffer, WgpuContext, WgpuProgram, WgpuShader, WgpuUniform};
pub use texture::WgpuTexture;
