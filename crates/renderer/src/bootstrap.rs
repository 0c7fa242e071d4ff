//! Turns a fresh graphics context into a ready-to-draw program.
//!
//! Bootstrapping either produces every resource the render loop needs or
//! releases whatever it managed to create and reports why. No texture work
//! happens here; textures arrive later through [`crate::textures`].

use crate::context::{GraphicsContext, ShaderStage};
use crate::shaders::{
    ATTRIB_POSITION, DEPTH_UNIT, FRAGMENT_SHADER, IMAGE_UNIT, QUAD_COMPONENTS, QUAD_VERTICES,
    UNIFORM_DEPTH, UNIFORM_IMAGE, UNIFORM_IMAGE_RES, UNIFORM_INTENSITY, UNIFORM_POINTER,
    UNIFORM_RESOLUTION, VERTEX_SHADER,
};

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("no graphics context: {0}")]
    NoContext(String),
    #[error("renderer already initialised")]
    AlreadyInitialised,
    #[error("renderer was destroyed")]
    Destroyed,
    #[error("{stage} shader failed to compile: {log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("program failed to link: {log}")]
    Link { log: String },
    #[error("program has no `{0}` attribute")]
    MissingAttribute(&'static str),
    #[error("failed to allocate quad buffer: {0}")]
    Buffer(String),
}

/// Uniform locations cached once after linking. Absent entries were optimised
/// out or are not declared; writes to them are skipped.
#[derive(Debug, Clone)]
pub(crate) struct UniformLocations<U> {
    pub image: Option<U>,
    pub depth: Option<U>,
    pub pointer: Option<U>,
    pub intensity: Option<U>,
    pub resolution: Option<U>,
    pub image_res: Option<U>,
}

/// Everything bootstrap allocates, owned by the renderer until teardown.
pub(crate) struct ProgramResources<C: GraphicsContext> {
    pub program: C::Program,
    pub quad: C::Buffer,
    pub locations: UniformLocations<C::Uniform>,
}

impl<C: GraphicsContext> ProgramResources<C> {
    pub fn release(self, context: &mut C) {
        context.delete_buffer(self.quad);
        context.delete_program(self.program);
    }
}

pub(crate) fn bootstrap<C: GraphicsContext>(
    context: &mut C,
) -> Result<ProgramResources<C>, InitError> {
    let program = build_program(context)?;

    let quad = match context.create_vertex_buffer(&QUAD_VERTICES) {
        Ok(buffer) => buffer,
        Err(log) => {
            tracing::error!(%log, "failed to allocate quad vertex buffer");
            context.delete_program(program);
            return Err(InitError::Buffer(log));
        }
    };

    let Some(position) = context.attribute_location(&program, ATTRIB_POSITION) else {
        tracing::error!(attribute = ATTRIB_POSITION, "linked program lacks position attribute");
        context.delete_buffer(quad);
        context.delete_program(program);
        return Err(InitError::MissingAttribute(ATTRIB_POSITION));
    };
    context.bind_attribute(&quad, position, QUAD_COMPONENTS);

    context.use_program(&program);
    let locations = UniformLocations {
        image: context.uniform_location(&program, UNIFORM_IMAGE),
        depth: context.uniform_location(&program, UNIFORM_DEPTH),
        pointer: context.uniform_location(&program, UNIFORM_POINTER),
        intensity: context.uniform_location(&program, UNIFORM_INTENSITY),
        resolution: context.uniform_location(&program, UNIFORM_RESOLUTION),
        image_res: context.uniform_location(&program, UNIFORM_IMAGE_RES),
    };
    for (name, location) in [
        (UNIFORM_IMAGE, &locations.image),
        (UNIFORM_DEPTH, &locations.depth),
        (UNIFORM_POINTER, &locations.pointer),
        (UNIFORM_INTENSITY, &locations.intensity),
    ] {
        if location.is_none() {
            tracing::warn!(uniform = name, "uniform not active in linked program");
        }
    }

    // Sampler to unit association is fixed for the lifetime of the program.
    if let Some(image) = &locations.image {
        context.uniform_i32(image, IMAGE_UNIT as i32);
    }
    if let Some(depth) = &locations.depth {
        context.uniform_i32(depth, DEPTH_UNIT as i32);
    }

    tracing::debug!(position, "parallax program ready");
    Ok(ProgramResources {
        program,
        quad,
        locations,
    })
}

fn build_program<C: GraphicsContext>(context: &mut C) -> Result<C::Program, InitError> {
    let vertex = compile(context, ShaderStage::Vertex, VERTEX_SHADER)?;
    let fragment = match compile(context, ShaderStage::Fragment, FRAGMENT_SHADER) {
        Ok(shader) => shader,
        Err(err) => {
            context.delete_shader(vertex);
            return Err(err);
        }
    };

    let linked = context.link_program(&vertex, &fragment);
    // Shader objects are not needed once linking has been attempted.
    context.delete_shader(vertex);
    context.delete_shader(fragment);

    linked.map_err(|log| {
        tracing::error!(%log, "failed to link parallax program");
        InitError::Link { log }
    })
}

fn compile<C: GraphicsContext>(
    context: &mut C,
    stage: ShaderStage,
    source: &str,
) -> Result<C::Shader, InitError> {
    context.compile_shader(stage, source).map_err(|log| {
        tracing::error!(%stage, %log, "failed to compile shader");
        InitError::Compile { stage, log }
    })
}
