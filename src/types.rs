//! Common types shared across the command graph.

/// Rectangular region of a framebuffer, in pixels.
///
/// Used as the render area of a deferred render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect2D {
    /// X coordinate of the top-left corner.
    pub x: i32,
    /// Y coordinate of the top-left corner.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect2D {
    /// Create a new rectangle.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Clear value for one render-pass attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Clear color as RGBA components.
    Color([f32; 4]),
    /// Clear values for a depth/stencil attachment.
    DepthStencil {
        /// Depth clear value in `[0, 1]`.
        depth: f32,
        /// Stencil clear value.
        stencil: u32,
    },
}

impl ClearValue {
    /// Color clear value from RGBA components.
    pub fn color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Color([r, g, b, a])
    }

    /// Depth/stencil clear value.
    pub fn depth_stencil(depth: f32, stencil: u32) -> Self {
        Self::DepthStencil { depth, stencil }
    }
}

/// Texture formats usable as render-pass attachments.
///
/// Only the formats the translation layer can produce attachments in; this
/// is a compatibility key for render passes, not a full format catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit per channel RGBA, unsigned normalized.
    Rgba8Unorm,
    /// 8-bit per channel BGRA, unsigned normalized.
    Bgra8Unorm,
    /// 16-bit per channel RGBA, float.
    Rgba16Float,
    /// 32-bit per channel RGBA, float.
    Rgba32Float,
    /// 32-bit float depth.
    Depth32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
}

impl TextureFormat {
    /// Whether this format holds depth and/or stencil data.
    pub fn is_depth_stencil(self) -> bool {
        matches!(self, Self::Depth32Float | Self::Depth24PlusStencil8)
    }
}
