//! GPU boundary.
//!
//! The renderer builds a [`Frame`] of instanced quads and hands it to a
//! [`FramePresenter`], which owns the device resources. [`WgpuPresenter`] is
//! the bundled implementation.

mod wgpu_presenter;

pub use wgpu_presenter::{WgpuPresenter, WgpuTarget};

use crate::atlas::{AtlasSlot, AtlasUpload};
use crate::error::RendererError;
use crate::primitives::Color;

/// One textured quad (36 bytes).
///
/// Glyphs sample their atlas rectangle; solid quads collapse both UV corners
/// onto the white texel.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct DrawInstance {
    /// Top-left in pixels.
    pub pos: [f32; 2],      // 8 bytes
    /// Width and height in pixels.
    pub size: [f32; 2],     // 8 bytes
    /// Atlas top-left, in texels.
    pub uv_tl: [f32; 2],    // 8 bytes
    /// Atlas bottom-right, in texels.
    pub uv_br: [f32; 2],    // 8 bytes
    /// Color as packed RGBA8.
    pub color: u32,         // 4 bytes
}

impl DrawInstance {
    /// A glyph quad at `(x, y)` covering the slot's rectangle.
    pub fn glyph(x: f32, y: f32, slot: &AtlasSlot, color: Color) -> Self {
        Self {
            pos: [x, y],
            size: [slot.rect.width as f32, slot.rect.height as f32],
            uv_tl: slot.uv_tl(),
            uv_br: slot.uv_br(),
            color: color.pack(),
        }
    }

    /// A solid quad sampling the white texel at `white_uv`.
    pub fn solid(x: f32, y: f32, width: f32, height: f32, white_uv: [f32; 2], color: Color) -> Self {
        Self {
            pos: [x, y],
            size: [width, height],
            uv_tl: white_uv,
            uv_br: white_uv,
            color: color.pack(),
        }
    }
}

/// Instances drawn with one atlas texture in a single draw call.
#[derive(Debug, Clone, Copy)]
pub struct DrawBatch<'a> {
    /// Atlas texture index. The renderer keeps a single atlas.
    pub atlas: u32,
    pub instances: &'a [DrawInstance],
}

/// Everything the presenter needs to draw one frame.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    pub width: u32,
    pub height: u32,
    pub clear_color: Color,
    /// Atlas dimensions, for texel to UV normalization.
    pub atlas_size: (u32, u32),
    pub batches: Vec<DrawBatch<'a>>,
}

impl Frame<'_> {
    pub fn instance_count(&self) -> usize {
        self.batches.iter().map(|b| b.instances.len()).sum()
    }
}

/// The device side of the renderer.
pub trait FramePresenter {
    /// What `draw` renders into (e.g. color and multisample views).
    type Target<'a>;

    /// Largest texture edge the device supports.
    fn max_texture_dimension(&self) -> u32;

    /// Push atlas changes to the GPU texture, recreating it when asked.
    fn upload_atlas(&mut self, upload: AtlasUpload<'_>) -> Result<(), RendererError>;

    /// Encode and submit the frame.
    fn present(&mut self, target: Self::Target<'_>, frame: &Frame<'_>) -> Result<(), RendererError>;
}

/// Create an orthographic projection matrix.
pub(crate) fn create_orthographic_matrix(width: f32, height: f32) -> [[f32; 4]; 4] {
    let left = 0.0;
    let right = width;
    let top = 0.0;
    let bottom = height;
    let near = -1.0;
    let far = 1.0;

    let sx = 2.0 / (right - left);
    let sy = 2.0 / (top - bottom);
    let sz = 2.0 / (far - near);
    let tx = -(right + left) / (right - left);
    let ty = -(top + bottom) / (top - bottom);
    let tz = -(far + near) / (far - near);

    [
        [sx, 0.0, 0.0, 0.0],
        [0.0, sy, 0.0, 0.0],
        [0.0, 0.0, sz, 0.0],
        [tx, ty, tz, 1.0],
    ]
}
