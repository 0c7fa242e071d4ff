//! Recording doubles for the graphics, scheduling and fetch seams.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::context::{CanvasSize, ContextError, DrawingSurface, GraphicsContext, ShaderStage};
use crate::schedule::{FrameHandle, FrameScheduler};
use crate::shaders::{
    ATTRIB_POSITION, UNIFORM_DEPTH, UNIFORM_IMAGE, UNIFORM_IMAGE_RES, UNIFORM_INTENSITY,
    UNIFORM_POINTER, UNIFORM_RESOLUTION,
};
use crate::textures::{DecodedImage, ImageFetcher, TextureError};

#[derive(Debug, Clone)]
pub struct SurfaceBehaviour {
    pub supported: bool,
    pub fail_compile: Option<ShaderStage>,
    pub fail_link: bool,
    /// Texture uploads of images this wide are rejected.
    pub reject_texture_width: Option<u32>,
    pub inactive_uniforms: Vec<&'static str>,
    pub canvas: CanvasSize,
    pub can_lose_context: bool,
    /// Backing resizes are clamped to this edge, like a device texture limit.
    pub max_backing: Option<u32>,
}

impl Default for SurfaceBehaviour {
    fn default() -> Self {
        Self {
            supported: true,
            fail_compile: None,
            fail_link: false,
            reject_texture_width: None,
            inactive_uniforms: Vec::new(),
            canvas: CanvasSize::new(800.0, 600.0, 1.0),
            can_lose_context: true,
            max_backing: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CompileShader(ShaderStage),
    LinkProgram,
    UseProgram(u64),
    BindAttribute { location: u32, components: u32 },
    BindTexture { unit: u32, texture: u64 },
    DeleteTexture(u64),
    Resize(u32, u32),
    Viewport(u32, u32),
    Draw(u32),
    LoseContext,
}

#[derive(Debug, Default)]
pub struct Log {
    pub calls: Vec<Call>,
    pub created_shaders: usize,
    pub deleted_shaders: usize,
    pub created_programs: usize,
    pub deleted_programs: usize,
    pub created_buffers: usize,
    pub deleted_buffers: usize,
    pub created_textures: usize,
    pub deleted_textures: usize,
    pub last_buffer_data: Option<Vec<f32>>,
    pub ints: HashMap<String, i32>,
    pub floats: HashMap<String, Vec<f32>>,
    pub vec2s: HashMap<String, Vec<[f32; 2]>>,
    /// Texture id to uploaded width.
    pub textures: HashMap<u64, u32>,
    pub draws: usize,
    pub lost: bool,
    pub canvas: Option<CanvasSize>,
    pub backing: (u32, u32),
}

impl Log {
    pub fn live_shaders(&self) -> usize {
        self.created_shaders - self.deleted_shaders
    }

    pub fn live_programs(&self) -> usize {
        self.created_programs - self.deleted_programs
    }

    pub fn live_buffers(&self) -> usize {
        self.created_buffers - self.deleted_buffers
    }

    pub fn live_textures(&self) -> usize {
        self.created_textures - self.deleted_textures
    }

    pub fn int_uniform(&self, name: &str) -> Option<i32> {
        self.ints.get(name).copied()
    }

    pub fn last_float(&self, name: &str) -> Option<f32> {
        self.floats.get(name).and_then(|values| values.last().copied())
    }

    pub fn last_vec2(&self, name: &str) -> Option<[f32; 2]> {
        self.vec2s.get(name).and_then(|values| values.last().copied())
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    /// Width of the texture most recently bound to `unit`.
    pub fn bound_width(&self, unit: u32) -> Option<u32> {
        self.calls.iter().rev().find_map(|call| match call {
            Call::BindTexture { unit: u, texture } if *u == unit => {
                self.textures.get(texture).copied()
            }
            _ => None,
        })
    }
}

pub type SharedLog = Rc<RefCell<Log>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTexture(pub u64);

pub struct RecordingContext {
    behaviour: SurfaceBehaviour,
    log: SharedLog,
    next_id: u64,
}

impl RecordingContext {
    pub fn new(behaviour: SurfaceBehaviour) -> Self {
        let log = Rc::new(RefCell::new(Log::default()));
        Self::with_log(behaviour, log)
    }

    fn with_log(behaviour: SurfaceBehaviour, log: SharedLog) -> Self {
        {
            let mut log = log.borrow_mut();
            if log.canvas.is_none() {
                log.canvas = Some(behaviour.canvas);
            }
            // A fresh canvas starts at the platform default size.
            log.backing = (300, 150);
        }
        Self {
            behaviour,
            log,
            next_id: 1,
        }
    }

    pub fn log(&self) -> SharedLog {
        self.log.clone()
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl GraphicsContext for RecordingContext {
    type Shader = u64;
    type Program = u64;
    type Buffer = u64;
    type Texture = MockTexture;
    type Uniform = String;

    fn compile_shader(&mut self, stage: ShaderStage, _source: &str) -> Result<u64, String> {
        self.log.borrow_mut().calls.push(Call::CompileShader(stage));
        if self.behaviour.fail_compile == Some(stage) {
            return Err(format!("{stage}: syntax error"));
        }
        self.log.borrow_mut().created_shaders += 1;
        Ok(self.next())
    }

    fn delete_shader(&mut self, _shader: u64) {
        self.log.borrow_mut().deleted_shaders += 1;
    }

    fn link_program(&mut self, _vertex: &u64, _fragment: &u64) -> Result<u64, String> {
        self.log.borrow_mut().calls.push(Call::LinkProgram);
        if self.behaviour.fail_link {
            return Err("link error: varying mismatch".to_string());
        }
        self.log.borrow_mut().created_programs += 1;
        Ok(self.next())
    }

    fn delete_program(&mut self, _program: u64) {
        self.log.borrow_mut().deleted_programs += 1;
    }

    fn use_program(&mut self, program: &u64) {
        self.log.borrow_mut().calls.push(Call::UseProgram(*program));
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<u64, String> {
        {
            let mut log = self.log.borrow_mut();
            log.created_buffers += 1;
            log.last_buffer_data = Some(data.to_vec());
        }
        Ok(self.next())
    }

    fn delete_buffer(&mut self, _buffer: u64) {
        self.log.borrow_mut().deleted_buffers += 1;
    }

    fn attribute_location(&self, _program: &u64, name: &str) -> Option<u32> {
        (name == ATTRIB_POSITION).then_some(0)
    }

    fn bind_attribute(&mut self, _buffer: &u64, location: u32, components: u32) {
        self.log
            .borrow_mut()
            .calls
            .push(Call::BindAttribute { location, components });
    }

    fn uniform_location(&self, _program: &u64, name: &str) -> Option<String> {
        let declared = [
            UNIFORM_IMAGE,
            UNIFORM_DEPTH,
            UNIFORM_POINTER,
            UNIFORM_INTENSITY,
            UNIFORM_RESOLUTION,
            UNIFORM_IMAGE_RES,
        ];
        (declared.contains(&name) && !self.behaviour.inactive_uniforms.contains(&name))
            .then(|| name.to_string())
    }

    fn uniform_i32(&mut self, location: &String, value: i32) {
        self.log.borrow_mut().ints.insert(location.clone(), value);
    }

    fn uniform_f32(&mut self, location: &String, value: f32) {
        self.log
            .borrow_mut()
            .floats
            .entry(location.clone())
            .or_default()
            .push(value);
    }

    fn uniform_vec2(&mut self, location: &String, value: [f32; 2]) {
        self.log
            .borrow_mut()
            .vec2s
            .entry(location.clone())
            .or_default()
            .push(value);
    }

    fn create_texture(&mut self, image: &DecodedImage) -> Result<MockTexture, String> {
        if self.behaviour.reject_texture_width == Some(image.width) {
            return Err(format!("texture of width {} rejected", image.width));
        }
        let id = self.next();
        let mut log = self.log.borrow_mut();
        log.created_textures += 1;
        log.textures.insert(id, image.width);
        Ok(MockTexture(id))
    }

    fn bind_texture(&mut self, unit: u32, texture: &MockTexture) {
        self.log.borrow_mut().calls.push(Call::BindTexture {
            unit,
            texture: texture.0,
        });
    }

    fn delete_texture(&mut self, texture: MockTexture) {
        let mut log = self.log.borrow_mut();
        log.deleted_textures += 1;
        log.calls.push(Call::DeleteTexture(texture.0));
    }

    fn canvas_size(&self) -> CanvasSize {
        self.log.borrow().canvas.unwrap_or(self.behaviour.canvas)
    }

    fn backing_size(&self) -> (u32, u32) {
        self.log.borrow().backing
    }

    fn resize_backing(&mut self, width: u32, height: u32) {
        let limit = self.behaviour.max_backing.unwrap_or(u32::MAX);
        let mut log = self.log.borrow_mut();
        log.backing = (width.min(limit), height.min(limit));
        log.calls.push(Call::Resize(width, height));
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.log.borrow_mut().calls.push(Call::Viewport(width, height));
    }

    fn draw_quad(&mut self, vertex_count: u32) {
        let mut log = self.log.borrow_mut();
        log.draws += 1;
        log.calls.push(Call::Draw(vertex_count));
    }

    fn lose_context(&mut self) -> bool {
        let mut log = self.log.borrow_mut();
        log.calls.push(Call::LoseContext);
        if self.behaviour.can_lose_context {
            log.lost = true;
        }
        self.behaviour.can_lose_context
    }
}

/// Surface handing out recording contexts that share one log.
pub struct MockSurface {
    behaviour: SurfaceBehaviour,
    log: SharedLog,
}

impl MockSurface {
    pub fn new(behaviour: SurfaceBehaviour) -> Self {
        Self {
            behaviour,
            log: Rc::new(RefCell::new(Log::default())),
        }
    }

    pub fn supported() -> Self {
        Self::new(SurfaceBehaviour::default())
    }

    pub fn log(&self) -> SharedLog {
        self.log.clone()
    }

    /// Simulates the host resizing the canvas element.
    pub fn set_canvas(&self, canvas: CanvasSize) {
        self.log.borrow_mut().canvas = Some(canvas);
    }
}

impl DrawingSurface for MockSurface {
    type Context = RecordingContext;

    fn acquire_context(&self) -> Result<RecordingContext, ContextError> {
        if !self.behaviour.supported {
            return Err(ContextError::new("webgl unsupported"));
        }
        Ok(RecordingContext::with_log(
            self.behaviour.clone(),
            self.log.clone(),
        ))
    }
}

/// Frame scheduler driven by hand from tests.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    pub pending: Vec<FrameHandle>,
    pub cancelled: Vec<FrameHandle>,
    pub requested: usize,
}

impl ManualScheduler {
    /// Removes and returns the oldest outstanding request.
    pub fn take_next(&mut self) -> Option<FrameHandle> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_id += 1;
        self.requested += 1;
        let handle = FrameHandle::new(self.next_id);
        self.pending.push(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.pending.retain(|pending| *pending != handle);
        self.cancelled.push(handle);
    }
}

/// Fetcher serving canned results, optionally after a delay.
#[derive(Default)]
pub struct CannedFetcher {
    images: HashMap<String, Result<DecodedImage, TextureError>>,
    delays: HashMap<String, Duration>,
    pub requests: Mutex<Vec<String>>,
}

impl CannedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, source: &str, image: DecodedImage) -> Self {
        self.images.insert(source.to_string(), Ok(image));
        self
    }

    pub fn delayed(mut self, source: &str, delay: Duration) -> Self {
        self.delays.insert(source.to_string(), delay);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl ImageFetcher for CannedFetcher {
    fn fetch(&self, source: &str) -> Result<DecodedImage, TextureError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(source.to_string());
        }
        if let Some(delay) = self.delays.get(source) {
            std::thread::sleep(*delay);
        }
        self.images.get(source).cloned().unwrap_or_else(|| {
            Err(TextureError::Read {
                path: PathBuf::from(source),
                message: "no such file".to_string(),
            })
        })
    }
}

/// Solid image of the given size.
pub fn solid(width: u32, height: u32, value: u8) -> DecodedImage {
    let pixels = (width * height) as usize;
    DecodedImage::from_rgba(width, height, [value, value, value, 255].repeat(pixels))
}
