use std::borrow::Cow;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context as AnyhowContext, Result};
use winit::window::Window;

use crate::context::{CanvasSize, GraphicsContext, ShaderStage};
use crate::textures::DecodedImage;
use crate::types::GpuPowerPreference;

use super::pipeline::{LinkedProgram, PipelineTargets, ProgramLayout};
use super::reflect::{compile_interface, naga_stage, MemberKind, ShaderInterface};
use super::texture::{self, BoundTexture, WgpuTexture};

/// Number of texture units exposed to programs.
const TEXTURE_UNITS: usize = 8;

pub struct WgpuShader {
    stage: ShaderStage,
    module: wgpu::ShaderModule,
    interface: ShaderInterface,
}

pub struct WgpuProgram {
    linked: Rc<LinkedProgram>,
}

pub struct WgpuBuffer {
    id: u64,
    buffer: wgpu::Buffer,
}

/// Uniform location resolved against one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WgpuUniform {
    program: u64,
    slot: UniformSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UniformSlot {
    Block { offset: u32 },
    /// Index into the program's sampler pairs.
    Sampler { pair: usize },
}

/// A window-backed wgpu device that speaks the GL-shaped [`GraphicsContext`].
pub struct WgpuContext {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    current: Option<Rc<LinkedProgram>>,
    /// Vertex buffer feeding each shader location.
    attributes: Vec<(u32, u64, wgpu::Buffer)>,
    units: Vec<Option<BoundTexture>>,
    placeholder: WgpuTexture,
    viewport: Option<(u32, u32)>,
    next_id: u64,
    lost: bool,
}

impl WgpuContext {
    pub fn new(window: Arc<Window>, gpu_power: GpuPowerPreference) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create rendering surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: gpu_power.to_wgpu(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        tracing::debug!(
            name = %info.name,
            backend = ?info.backend,
            device_type = ?info.device_type,
            "selected GPU adapter"
        );

        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("parallax device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits.clone(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let caps = surface.get_capabilities(&adapter);
        let Some(&first_format) = caps.formats.first() else {
            anyhow::bail!("surface reports no supported formats on this adapter");
        };
        // Image bytes are uploaded unconverted, so present them unconverted too.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .unwrap_or_else(|| {
                tracing::warn!(
                    fallback = ?first_format,
                    "no linear (non-sRGB) surface format available; colors will be re-encoded"
                );
                first_format
            });
        let alpha_mode = if caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::Opaque) {
            wgpu::CompositeAlphaMode::Opaque
        } else {
            caps.alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.clamp(1, limits.max_texture_dimension_2d),
            height: size.height.clamp(1, limits.max_texture_dimension_2d),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        tracing::debug!(?format, width = config.width, height = config.height, "configured surface");

        let placeholder = texture::placeholder(&device, &queue);
        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            current: None,
            attributes: Vec::new(),
            units: vec![None; TEXTURE_UNITS],
            placeholder,
            viewport: None,
            next_id: texture::PLACEHOLDER_ID + 1,
            lost: false,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Runs `build` inside a validation error scope and returns its value or
    /// the captured validation message.
    fn validated<T>(&self, build: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = build(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(err.to_string()),
            None => Ok(value),
        }
    }

    fn write_uniform<T: bytemuck::Pod>(&mut self, location: &WgpuUniform, kind: MemberKind, value: T) {
        let Some(program) = self.current.as_ref() else {
            return;
        };
        if program.id != location.program {
            tracing::warn!("uniform written while a different program is in use; ignoring");
            return;
        }
        let UniformSlot::Block { offset } = location.slot else {
            tracing::warn!(?kind, "non-sampler value written to a sampler uniform; ignoring");
            return;
        };
        if let Some(block) = program.uniforms() {
            if !block.borrow_mut().write(offset, kind, value) {
                tracing::warn!(offset, ?kind, "uniform type mismatch; ignoring write");
            }
        }
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }
}

impl GraphicsContext for WgpuContext {
    type Shader = WgpuShader;
    type Program = WgpuProgram;
    type Buffer = WgpuBuffer;
    type Texture = WgpuTexture;
    type Uniform = WgpuUniform;

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<WgpuShader, String> {
        let interface = compile_interface(stage, source)?;
        let module = self.validated(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match stage {
                    ShaderStage::Vertex => "parallax vertex",
                    ShaderStage::Fragment => "parallax fragment",
                }),
                source: wgpu::ShaderSource::Glsl {
                    shader: Cow::Owned(source.to_string()),
                    stage: naga_stage(stage),
                    defines: &[],
                },
            })
        })?;
        Ok(WgpuShader {
            stage,
            module,
            interface,
        })
    }

    fn delete_shader(&mut self, shader: WgpuShader) {
        drop(shader);
    }

    fn link_program(
        &mut self,
        vertex: &WgpuShader,
        fragment: &WgpuShader,
    ) -> Result<WgpuProgram, String> {
        if vertex.stage != ShaderStage::Vertex || fragment.stage != ShaderStage::Fragment {
            return Err(format!(
                "expected vertex and fragment shaders, got {} and {}",
                vertex.stage, fragment.stage
            ));
        }
        let layout = ProgramLayout::link(&vertex.interface, &fragment.interface)?;
        let id = self.next_id();
        let targets = PipelineTargets {
            format: self.config.format,
        };
        let linked = self.validated(|device| {
            LinkedProgram::new(
                device,
                id,
                layout,
                &vertex.module,
                &fragment.module,
                &targets,
            )
        })?;
        Ok(WgpuProgram {
            linked: Rc::new(linked),
        })
    }

    fn delete_program(&mut self, program: WgpuProgram) {
        if self
            .current
            .as_ref()
            .is_some_and(|current| current.id == program.linked.id)
        {
            self.current = None;
        }
        program.linked.release();
    }

    fn use_program(&mut self, program: &WgpuProgram) {
        self.current = Some(program.linked.clone());
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<WgpuBuffer, String> {
        use wgpu::util::DeviceExt;

        let buffer = self.validated(|device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("parallax quad"),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::VERTEX,
            })
        })?;
        Ok(WgpuBuffer {
            id: self.next_id(),
            buffer,
        })
    }

    fn delete_buffer(&mut self, buffer: WgpuBuffer) {
        self.attributes.retain(|(_, id, _)| *id != buffer.id);
        buffer.buffer.destroy();
    }

    fn attribute_location(&self, program: &WgpuProgram, name: &str) -> Option<u32> {
        program
            .linked
            .layout
            .inputs
            .iter()
            .find(|input| input.name == name)
            .map(|input| input.location)
    }

    fn bind_attribute(&mut self, buffer: &WgpuBuffer, location: u32, components: u32) {
        if let Some(program) = self.current.as_ref() {
            let expected = program
                .layout
                .inputs
                .iter()
                .find(|input| input.location == location)
                .map(|input| input.format.size() / 4);
            if expected.is_some_and(|expected| expected != components as u64) {
                tracing::warn!(location, components, ?expected, "attribute width mismatch");
            }
        }
        self.attributes.retain(|(bound, _, _)| *bound != location);
        self.attributes
            .push((location, buffer.id, buffer.buffer.clone()));
    }

    fn uniform_location(&self, program: &WgpuProgram, name: &str) -> Option<WgpuUniform> {
        let linked = &program.linked;
        let slot = if let Some(pair) = linked.layout.pairs.iter().position(|pair| pair.name == name)
        {
            UniformSlot::Sampler { pair }
        } else {
            let member = linked.layout.block.as_ref()?.member(name)?;
            UniformSlot::Block {
                offset: member.offset,
            }
        };
        Some(WgpuUniform {
            program: linked.id,
            slot,
        })
    }

    fn uniform_i32(&mut self, location: &WgpuUniform, value: i32) {
        match location.slot {
            UniformSlot::Sampler { pair } => {
                let Some(program) = self.current.as_ref() else {
                    return;
                };
                if program.id != location.program {
                    return;
                }
                match u32::try_from(value) {
                    Ok(unit) if (unit as usize) < TEXTURE_UNITS => {
                        program.set_sampler_unit(pair, unit)
                    }
                    _ => tracing::warn!(value, "texture unit out of range"),
                }
            }
            UniformSlot::Block { .. } => self.write_uniform(location, MemberKind::Int, value),
        }
    }

    fn uniform_f32(&mut self, location: &WgpuUniform, value: f32) {
        self.write_uniform(location, MemberKind::Float, value);
    }

    fn uniform_vec2(&mut self, location: &WgpuUniform, value: [f32; 2]) {
        self.write_uniform(location, MemberKind::Vec2, value);
    }

    fn create_texture(&mut self, image: &DecodedImage) -> Result<WgpuTexture, String> {
        let id = self.next_id();
        let (device, queue) = (&self.device, &self.queue);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let uploaded = texture::upload(device, queue, id, image);
        let scope = pollster::block_on(device.pop_error_scope());
        match (uploaded, scope) {
            (Ok(texture), None) => Ok(texture),
            (Ok(texture), Some(err)) => {
                texture.texture.destroy();
                Err(err.to_string())
            }
            (Err(message), _) => Err(message),
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: &WgpuTexture) {
        match self.units.get_mut(unit as usize) {
            Some(slot) => *slot = Some(texture.bound.clone()),
            None => tracing::warn!(unit, "texture unit out of range"),
        }
    }

    fn delete_texture(&mut self, texture: WgpuTexture) {
        let id = texture.bound.id;
        for slot in &mut self.units {
            if slot.as_ref().is_some_and(|bound| bound.id == id) {
                *slot = None;
            }
        }
        if let Some(program) = self.current.as_ref() {
            program.forget_texture(id);
        }
        texture.texture.destroy();
    }

    fn canvas_size(&self) -> CanvasSize {
        let physical = self.window.inner_size();
        let scale = self.window.scale_factor();
        CanvasSize::new(
            physical.width as f64 / scale,
            physical.height as f64 / scale,
            scale,
        )
    }

    fn backing_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn resize_backing(&mut self, width: u32, height: u32) {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width.min(max);
        self.config.height = height.min(max);
        self.reconfigure();
        tracing::debug!(
            width = self.config.width,
            height = self.config.height,
            "resized surface"
        );
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.viewport = Some((width, height));
    }

    fn draw_quad(&mut self, vertex_count: u32) {
        if self.lost {
            return;
        }
        let Some(program) = self.current.clone() else {
            tracing::warn!("draw issued without a program in use");
            return;
        };
        let mut buffers = Vec::with_capacity(program.layout.inputs.len());
        for input in &program.layout.inputs {
            match self
                .attributes
                .iter()
                .find(|(location, _, _)| *location == input.location)
            {
                Some((_, _, buffer)) => buffers.push(buffer.clone()),
                None => {
                    tracing::warn!(input = %input.name, "no buffer bound for vertex input");
                    return;
                }
            }
        }

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.reconfigure();
                return;
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::debug!("surface timeout; retrying next frame");
                return;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to acquire surface texture");
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        program.flush_uniforms(&self.queue);
        let textures =
            program.texture_bind_group(&self.device, &self.units, &self.placeholder.bound);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("parallax encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("parallax pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            if let Some((width, height)) = self.viewport {
                let width = width.min(self.config.width).max(1);
                let height = height.min(self.config.height).max(1);
                pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            }
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, program.uniform_bind_group(), &[]);
            pass.set_bind_group(1, &textures, &[]);
            for (slot, buffer) in buffers.iter().enumerate() {
                pass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }
            pass.draw(0..vertex_count, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        self.window.pre_present_notify();
        frame.present();
    }

    fn lose_context(&mut self) -> bool {
        if self.lost {
            return false;
        }
        self.current = None;
        self.attributes.clear();
        self.units.iter_mut().for_each(|slot| *slot = None);
        self.placeholder.texture.destroy();
        self.device.destroy();
        self.lost = true;
        true
    }
}
