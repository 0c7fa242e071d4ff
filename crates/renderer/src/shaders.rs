//! GLSL sources for the depth-parallax pass.
//!
//! Both stages are Vulkan-flavoured GLSL 450 so wgpu can hand them to naga's
//! GLSL frontend. The interface names below are fixed; alternative shader
//! implementations must keep them so the bootstrap can resolve them by name.

/// Vertex attribute carrying the unit quad corner.
pub const ATTRIB_POSITION: &str = "a_position";
/// Color image sampler, bound to texture unit 0.
pub const UNIFORM_IMAGE: &str = "u_image";
/// Depth map sampler, bound to texture unit 1.
pub const UNIFORM_DEPTH: &str = "u_depth";
/// Smoothed pointer plus idle drift.
pub const UNIFORM_POINTER: &str = "u_pointer";
/// Displacement scale.
pub const UNIFORM_INTENSITY: &str = "u_intensity";
/// Backing surface size in pixels.
pub const UNIFORM_RESOLUTION: &str = "u_resolution";
/// Source image size in pixels.
pub const UNIFORM_IMAGE_RES: &str = "u_imageRes";

/// Texture unit that feeds `u_image`.
pub const IMAGE_UNIT: u32 = 0;
/// Texture unit that feeds `u_depth`.
pub const DEPTH_UNIT: u32 = 1;

/// Full-screen quad drawn as a triangle strip: (-1,-1), (1,-1), (-1,1), (1,1).
pub const QUAD_VERTICES: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];
/// Number of vertices in [`QUAD_VERTICES`].
pub const QUAD_VERTEX_COUNT: u32 = 4;
/// Components per vertex in [`QUAD_VERTICES`].
pub const QUAD_COMPONENTS: u32 = 2;

/// Passes the quad through and derives a top-left origin texture coordinate.
pub const VERTEX_SHADER: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 0) out vec2 v_uv;

void main() {
    v_uv = vec2(a_position.x * 0.5 + 0.5, 0.5 - a_position.y * 0.5);
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

/// Contain-fits the image, displaces it by depth and pointer, then applies a
/// depth-weighted vignette.
///
/// Uniforms live in one std140 block at set 0; the wgpu backend reads member
/// offsets from the compiled module, so members may be reordered freely.
pub const FRAGMENT_SHADER: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_color;

layout(std140, set = 0, binding = 0) uniform ParallaxParams {
    vec2 u_pointer;
    float u_intensity;
    float _padding0;
    vec2 u_resolution;
    vec2 u_imageRes;
} params;

layout(set = 1, binding = 0) uniform texture2D u_image;
layout(set = 1, binding = 1) uniform sampler u_image_sampler;
layout(set = 1, binding = 2) uniform texture2D u_depth;
layout(set = 1, binding = 3) uniform sampler u_depth_sampler;

vec2 mirrored(vec2 v) {
    vec2 m = mod(v, vec2(2.0));
    return mix(m, vec2(2.0) - m, step(vec2(1.0), m));
}

// Maps screen uv into image uv, preserving the image aspect ratio.
// Falls back to a stretch fit until both sizes are known.
vec2 contain(vec2 uv) {
    vec2 res = params.u_resolution;
    vec2 img = params.u_imageRes;
    if (res.x <= 0.0 || res.y <= 0.0 || img.x <= 0.0 || img.y <= 0.0) {
        return uv;
    }
    float canvas_aspect = res.x / res.y;
    float image_aspect = img.x / img.y;
    vec2 scale = vec2(1.0);
    if (canvas_aspect > image_aspect) {
        scale.x = canvas_aspect / image_aspect;
    } else {
        scale.y = image_aspect / canvas_aspect;
    }
    return (uv - vec2(0.5)) * scale + vec2(0.5);
}

void main() {
    vec2 uv = contain(v_uv);
    vec2 inside2 = step(vec2(0.0), uv) * step(uv, vec2(1.0));
    float inside = inside2.x * inside2.y;

    float depth = texture(sampler2D(u_depth, u_depth_sampler), clamp(uv, vec2(0.0), vec2(1.0))).r;
    vec2 offset = params.u_pointer * depth * params.u_intensity;
    vec4 color = texture(sampler2D(u_image, u_image_sampler), mirrored(uv + offset));

    float edge = smoothstep(0.35, 0.85, length(v_uv - vec2(0.5)));
    float vignette = 1.0 - edge * mix(0.6, 0.25, depth);

    out_color = vec4(color.rgb * vignette * inside, 1.0);
}
";
