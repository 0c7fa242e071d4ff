//! Front-end compilation and interface reflection for GLSL stages.
//!
//! naga parses and validates each stage on the CPU, which yields the driver
//! style diagnostic text for compile failures and the name-to-binding tables
//! the GL-shaped API needs: vertex inputs by location, uniform block members by
//! byte offset, and texture/sampler globals by binding slot.

use wgpu::naga;

use crate::context::ShaderStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemberKind {
    Int,
    Float,
    Vec2,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockMember {
    pub name: String,
    pub offset: u32,
    pub kind: MemberKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UniformBlockLayout {
    pub group: u32,
    pub binding: u32,
    pub size: u32,
    pub members: Vec<BlockMember>,
}

impl UniformBlockLayout {
    pub fn member(&self, name: &str) -> Option<&BlockMember> {
        self.members.iter().find(|member| member.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VertexInput {
    pub name: String,
    pub location: u32,
    pub format: wgpu::VertexFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResourceSlot {
    pub name: String,
    pub group: u32,
    pub binding: u32,
}

/// Everything the backend needs to know about one compiled stage.
#[derive(Debug, Clone, Default)]
pub(crate) struct ShaderInterface {
    pub inputs: Vec<VertexInput>,
    pub uniform_block: Option<UniformBlockLayout>,
    pub textures: Vec<ResourceSlot>,
    pub samplers: Vec<ResourceSlot>,
}

pub(crate) fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    }
}

/// Parses and validates `source`, returning its interface or the compiler log.
pub(crate) fn compile_interface(stage: ShaderStage, source: &str) -> Result<ShaderInterface, String> {
    let options = naga::front::glsl::Options::from(naga_stage(stage));
    let module = naga::front::glsl::Frontend::default()
        .parse(&options, source)
        .map_err(|errors| errors.to_string())?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| err.to_string())?;
    Ok(reflect(&module, stage))
}

fn reflect(module: &naga::Module, stage: ShaderStage) -> ShaderInterface {
    let mut interface = ShaderInterface::default();

    if stage == ShaderStage::Vertex {
        let entry = module
            .entry_points
            .iter()
            .find(|entry| entry.stage == naga::ShaderStage::Vertex);
        for argument in entry.map(|entry| entry.function.arguments.as_slice()).unwrap_or(&[]) {
            let (Some(name), Some(naga::Binding::Location { location, .. })) =
                (argument.name.as_ref(), argument.binding.as_ref())
            else {
                continue;
            };
            let Some(format) = vertex_format(&module.types[argument.ty].inner) else {
                tracing::debug!(input = %name, "skipping vertex input with unsupported type");
                continue;
            };
            interface.inputs.push(VertexInput {
                name: name.clone(),
                location: *location,
                format,
            });
        }
        interface.inputs.sort_by_key(|input| input.location);
    }

    for (_, global) in module.global_variables.iter() {
        let Some(binding) = global.binding.as_ref() else {
            continue;
        };
        let name = global.name.clone().unwrap_or_default();
        let inner = &module.types[global.ty].inner;
        match (global.space, inner) {
            (naga::AddressSpace::Uniform, naga::TypeInner::Struct { members, span }) => {
                interface.uniform_block = Some(UniformBlockLayout {
                    group: binding.group,
                    binding: binding.binding,
                    size: *span,
                    members: members
                        .iter()
                        .filter_map(|member| {
                            Some(BlockMember {
                                name: member.name.clone()?,
                                offset: member.offset,
                                kind: member_kind(&module.types[member.ty].inner),
                            })
                        })
                        .collect(),
                });
            }
            (naga::AddressSpace::Handle, naga::TypeInner::Image { .. }) => {
                interface.textures.push(ResourceSlot {
                    name,
                    group: binding.group,
                    binding: binding.binding,
                });
            }
            (naga::AddressSpace::Handle, naga::TypeInner::Sampler { .. }) => {
                interface.samplers.push(ResourceSlot {
                    name,
                    group: binding.group,
                    binding: binding.binding,
                });
            }
            _ => {}
        }
    }
    interface.textures.sort_by_key(|slot| slot.binding);
    interface.samplers.sort_by_key(|slot| slot.binding);
    interface
}

fn vertex_format(inner: &naga::TypeInner) -> Option<wgpu::VertexFormat> {
    match inner {
        naga::TypeInner::Scalar(scalar) if scalar.kind == naga::ScalarKind::Float => {
            Some(wgpu::VertexFormat::Float32)
        }
        naga::TypeInner::Vector { size, scalar } if scalar.kind == naga::ScalarKind::Float => {
            Some(match size {
                naga::VectorSize::Bi => wgpu::VertexFormat::Float32x2,
                naga::VectorSize::Tri => wgpu::VertexFormat::Float32x3,
                naga::VectorSize::Quad => wgpu::VertexFormat::Float32x4,
            })
        }
        _ => None,
    }
}

fn member_kind(inner: &naga::TypeInner) -> MemberKind {
    match inner {
        naga::TypeInner::Scalar(scalar) => match scalar.kind {
            naga::ScalarKind::Float => MemberKind::Float,
            naga::ScalarKind::Sint => MemberKind::Int,
            _ => MemberKind::Other,
        },
        naga::TypeInner::Vector {
            size: naga::VectorSize::Bi,
            scalar,
        } if scalar.kind == naga::ScalarKind::Float => MemberKind::Vec2,
        _ => MemberKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders::{FRAGMENT_SHADER, VERTEX_SHADER};

    #[test]
    fn vertex_stage_exposes_position_at_location_zero() {
        let interface = compile_interface(ShaderStage::Vertex, VERTEX_SHADER).expect("vertex");
        assert_eq!(
            interface.inputs,
            vec![VertexInput {
                name: "a_position".to_string(),
                location: 0,
                format: wgpu::VertexFormat::Float32x2,
            }]
        );
        assert!(interface.uniform_block.is_none());
    }

    #[test]
    fn fragment_block_matches_std140_layout() {
        let interface =
            compile_interface(ShaderStage::Fragment, FRAGMENT_SHADER).expect("fragment");
        let block = interface.uniform_block.expect("uniform block");
        assert_eq!((block.group, block.binding), (0, 0));
        assert_eq!(block.size, 32);
        let offset = |name: &str| block.member(name).map(|member| member.offset);
        assert_eq!(offset("u_pointer"), Some(0));
        assert_eq!(offset("u_intensity"), Some(8));
        assert_eq!(offset("u_resolution"), Some(16));
        assert_eq!(offset("u_imageRes"), Some(24));
        assert_eq!(
            block.member("u_intensity").map(|member| member.kind),
            Some(MemberKind::Float)
        );
    }

    #[test]
    fn fragment_textures_pair_with_following_sampler() {
        let interface =
            compile_interface(ShaderStage::Fragment, FRAGMENT_SHADER).expect("fragment");
        let textures: Vec<_> = interface
            .textures
            .iter()
            .map(|slot| (slot.name.as_str(), slot.group, slot.binding))
            .collect();
        assert_eq!(textures, vec![("u_image", 1, 0), ("u_depth", 1, 2)]);
        let samplers: Vec<_> = interface.samplers.iter().map(|slot| slot.binding).collect();
        assert_eq!(samplers, vec![1, 3]);
    }

    #[test]
    fn syntax_errors_become_the_compile_log() {
        let log = compile_interface(
            ShaderStage::Fragment,
            "#version 450\nvoid main() { this is not glsl }\n",
        )
        .expect_err("invalid source");
        assert!(!log.is_empty());
    }
}
