use std::cell::RefCell;

use super::reflect::{ResourceSlot, ShaderInterface, UniformBlockLayout, VertexInput};
use super::texture::BoundTexture;
use super::uniforms::UniformBlock;

const UNIFORM_GROUP: u32 = 0;
const TEXTURE_GROUP: u32 = 1;

/// A texture binding and the sampler bound right after it.
#[derive(Debug, Clone)]
pub(crate) struct SamplerPair {
    pub name: String,
    pub texture_binding: u32,
    pub sampler_binding: Option<u32>,
}

/// Bind group layout shape shared by every linked program.
pub(crate) struct ProgramLayout {
    pub inputs: Vec<VertexInput>,
    pub block: Option<UniformBlockLayout>,
    pub pairs: Vec<SamplerPair>,
}

impl ProgramLayout {
    /// Merges both stage interfaces, rejecting shapes the backend cannot bind.
    pub fn link(vertex: &ShaderInterface, fragment: &ShaderInterface) -> Result<Self, String> {
        if vertex.uniform_block.is_some() {
            return Err("uniform blocks are only supported in the fragment stage".to_string());
        }
        if !vertex.textures.is_empty() || !vertex.samplers.is_empty() {
            return Err("textures are only supported in the fragment stage".to_string());
        }
        if vertex.inputs.is_empty() {
            return Err("vertex stage declares no inputs".to_string());
        }
        if let Some(block) = &fragment.uniform_block {
            if block.group != UNIFORM_GROUP {
                return Err(format!(
                    "uniform block must live in set {UNIFORM_GROUP}, found set {}",
                    block.group
                ));
            }
        }
        let misplaced = |slot: &ResourceSlot| slot.group != TEXTURE_GROUP;
        if let Some(slot) = fragment
            .textures
            .iter()
            .chain(fragment.samplers.iter())
            .find(|slot| misplaced(slot))
        {
            return Err(format!(
                "`{}` must live in set {TEXTURE_GROUP}, found set {}",
                slot.name, slot.group
            ));
        }

        let pairs = fragment
            .textures
            .iter()
            .map(|texture| SamplerPair {
                name: texture.name.clone(),
                texture_binding: texture.binding,
                sampler_binding: fragment
                    .samplers
                    .iter()
                    .find(|sampler| sampler.binding == texture.binding + 1)
                    .map(|sampler| sampler.binding),
            })
            .collect();

        Ok(Self {
            inputs: vertex.inputs.clone(),
            block: fragment.uniform_block.clone(),
            pairs,
        })
    }

    fn texture_layout_entries(&self) -> Vec<wgpu::BindGroupLayoutEntry> {
        let mut entries = Vec::with_capacity(self.pairs.len() * 2);
        for pair in &self.pairs {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: pair.texture_binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            if let Some(binding) = pair.sampler_binding {
                entries.push(wgpu::BindGroupLayoutEntry {
                    binding,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                });
            }
        }
        entries
    }
}

/// GPU objects and GL-style mutable state for one linked program.
pub(crate) struct LinkedProgram {
    pub id: u64,
    pub pipeline: wgpu::RenderPipeline,
    pub layout: ProgramLayout,
    uniforms: Option<RefCell<UniformBlock>>,
    uniform_buffer: Option<wgpu::Buffer>,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    /// Texture unit read by each sampler pair, indexed like `layout.pairs`.
    sampler_units: RefCell<Vec<u32>>,
    bind_group_cache: RefCell<Option<(Vec<u64>, wgpu::BindGroup)>>,
}

pub(crate) struct PipelineTargets {
    pub format: wgpu::TextureFormat,
}

impl LinkedProgram {
    pub fn new(
        device: &wgpu::Device,
        id: u64,
        layout: ProgramLayout,
        vertex_module: &wgpu::ShaderModule,
        fragment_module: &wgpu::ShaderModule,
        targets: &PipelineTargets,
    ) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("parallax uniform layout"),
            entries: &layout
                .block
                .as_ref()
                .map(|block| {
                    vec![wgpu::BindGroupLayoutEntry {
                        binding: block.binding,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }]
                })
                .unwrap_or_default(),
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("parallax texture layout"),
            entries: &layout.texture_layout_entries(),
        });

        let uniforms = layout.block.clone().map(UniformBlock::new);
        let uniform_buffer = uniforms.as_ref().map(|block| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("parallax uniforms"),
                size: block.size(),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        let uniform_entries: Vec<wgpu::BindGroupEntry<'_>> =
            match (layout.block.as_ref(), uniform_buffer.as_ref()) {
                (Some(block), Some(buffer)) => vec![wgpu::BindGroupEntry {
                    binding: block.binding,
                    resource: buffer.as_entire_binding(),
                }],
                _ => Vec::new(),
            };
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("parallax uniform bind group"),
            layout: &uniform_layout,
            entries: &uniform_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("parallax pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let attributes: Vec<[wgpu::VertexAttribute; 1]> = layout
            .inputs
            .iter()
            .map(|input| {
                [wgpu::VertexAttribute {
                    format: input.format,
                    offset: 0,
                    shader_location: input.location,
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = attributes
            .iter()
            .map(|attribute| wgpu::VertexBufferLayout {
                array_stride: attribute[0].format.size(),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attribute,
            })
            .collect();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("parallax pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: vertex_module,
                entry_point: Some("main"),
                buffers: &buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: targets.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        let pair_count = layout.pairs.len();
        Self {
            id,
            pipeline,
            layout,
            uniforms: uniforms.map(RefCell::new),
            uniform_buffer,
            uniform_bind_group,
            texture_layout,
            sampler_units: RefCell::new(vec![0; pair_count]),
            bind_group_cache: RefCell::new(None),
        }
    }

    pub fn uniform_bind_group(&self) -> &wgpu::BindGroup {
        &self.uniform_bind_group
    }

    pub fn uniforms(&self) -> Option<&RefCell<UniformBlock>> {
        self.uniforms.as_ref()
    }

    pub fn set_sampler_unit(&self, pair: usize, unit: u32) {
        if let Some(slot) = self.sampler_units.borrow_mut().get_mut(pair) {
            *slot = unit;
        }
    }

    pub fn flush_uniforms(&self, queue: &wgpu::Queue) {
        let (Some(block), Some(buffer)) = (self.uniforms.as_ref(), self.uniform_buffer.as_ref())
        else {
            return;
        };
        if let Some(bytes) = block.borrow_mut().take_dirty() {
            queue.write_buffer(buffer, 0, bytes);
        }
    }

    /// Bind group for the textures currently bound to each pair's unit,
    /// substituting `placeholder` for empty units. Rebuilt only when the
    /// bound textures change.
    pub fn texture_bind_group(
        &self,
        device: &wgpu::Device,
        units: &[Option<BoundTexture>],
        placeholder: &BoundTexture,
    ) -> wgpu::BindGroup {
        let units_for_pairs = self.sampler_units.borrow();
        let resolved: Vec<&BoundTexture> = units_for_pairs
            .iter()
            .map(|unit| {
                units
                    .get(*unit as usize)
                    .and_then(Option::as_ref)
                    .unwrap_or(placeholder)
            })
            .collect();
        let key: Vec<u64> = resolved.iter().map(|bound| bound.id).collect();

        if let Some((cached_key, group)) = self.bind_group_cache.borrow().as_ref() {
            if *cached_key == key {
                return group.clone();
            }
        }

        let mut entries = Vec::with_capacity(self.layout.pairs.len() * 2);
        for (pair, bound) in self.layout.pairs.iter().zip(resolved.iter()) {
            entries.push(wgpu::BindGroupEntry {
                binding: pair.texture_binding,
                resource: wgpu::BindingResource::TextureView(&bound.view),
            });
            if let Some(binding) = pair.sampler_binding {
                entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::Sampler(&bound.sampler),
                });
            }
        }
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("parallax texture bind group"),
            layout: &self.texture_layout,
            entries: &entries,
        });
        *self.bind_group_cache.borrow_mut() = Some((key, group.clone()));
        group
    }

    /// Drops a cached bind group that references `texture_id`.
    pub fn forget_texture(&self, texture_id: u64) {
        let mut cache = self.bind_group_cache.borrow_mut();
        if cache
            .as_ref()
            .is_some_and(|(key, _)| key.contains(&texture_id))
        {
            *cache = None;
        }
    }

    pub fn release(&self) {
        if let Some(buffer) = &self.uniform_buffer {
            buffer.destroy();
        }
    }
}
