use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::textures::DecodedImage;

/// Id reserved for the placeholder bound to empty units.
pub(crate) const PLACEHOLDER_ID: u64 = 0;

/// Opaque black with zero depth: no displacement and no color.
const PLACEHOLDER_PIXEL: [u8; 4] = [0, 0, 0, 255];

/// The view/sampler pair a texture unit refers to.
#[derive(Clone)]
pub(crate) struct BoundTexture {
    pub id: u64,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

/// Texture handle handed to the parallax core.
pub struct WgpuTexture {
    pub(crate) texture: wgpu::Texture,
    pub(crate) bound: BoundTexture,
}

impl WgpuTexture {
    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }
}

pub(crate) fn upload(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    id: u64,
    image: &DecodedImage,
) -> Result<WgpuTexture, String> {
    let max_dimension = device.limits().max_texture_dimension_2d;
    if image.width == 0 || image.height == 0 {
        return Err("image has no pixels".to_string());
    }
    if image.width > max_dimension || image.height > max_dimension {
        return Err(format!(
            "image is {}x{}, GPU max texture dimension is {max_dimension}",
            image.width, image.height
        ));
    }
    let expected = image.width as usize * image.height as usize * 4;
    if image.rgba.len() != expected {
        return Err(format!(
            "expected {expected} bytes of RGBA data, got {}",
            image.rgba.len()
        ));
    }
    Ok(create(
        device,
        queue,
        id,
        &format!("parallax texture #{id}"),
        image.width,
        image.height,
        &image.rgba,
    ))
}

pub(crate) fn placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> WgpuTexture {
    create(
        device,
        queue,
        PLACEHOLDER_ID,
        "parallax placeholder texture",
        1,
        1,
        &PLACEHOLDER_PIXEL,
    )
}

fn create(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    id: u64,
    label: &str,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> WgpuTexture {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        rgba,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });
    WgpuTexture {
        texture,
        bound: BoundTexture { id, view, sampler },
    }
}
