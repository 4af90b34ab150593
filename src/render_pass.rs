//! Render-pass compatibility descriptors and the memoizing pass cache.
//!
//! A node defers its render pass as a [`RenderPassDescriptor`]; the actual
//! backend pass is resolved only at flush time, through the
//! [`RenderPassCache`], so nodes with compatible attachment layouts share
//! one backend object.

use std::collections::HashMap;

use crate::backend::{CommandBackend, RenderPassHandle};
use crate::error::GraphicsError;
use crate::types::TextureFormat;

/// Attachment layout a deferred render pass must be compatible with.
///
/// Two descriptors compare equal exactly when any backend pass created for
/// one can execute the other's commands, so this doubles as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderPassDescriptor {
    color_formats: Vec<TextureFormat>,
    depth_stencil_format: Option<TextureFormat>,
    sample_count: u32,
}

impl RenderPassDescriptor {
    /// Descriptor with no attachments and a sample count of 1.
    pub fn new() -> Self {
        Self {
            color_formats: Vec::new(),
            depth_stencil_format: None,
            sample_count: 1,
        }
    }

    /// Append a color attachment.
    pub fn with_color(mut self, format: TextureFormat) -> Self {
        self.color_formats.push(format);
        self
    }

    /// Set the depth/stencil attachment.
    pub fn with_depth_stencil(mut self, format: TextureFormat) -> Self {
        self.depth_stencil_format = Some(format);
        self
    }

    /// Set the sample count.
    pub fn with_samples(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    /// Color attachment formats, in attachment order.
    pub fn color_formats(&self) -> &[TextureFormat] {
        &self.color_formats
    }

    /// Depth/stencil attachment format, if any.
    pub fn depth_stencil_format(&self) -> Option<TextureFormat> {
        self.depth_stencil_format
    }

    /// Sample count of every attachment.
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Total number of attachments.
    pub fn attachment_count(&self) -> usize {
        self.color_formats.len() + usize::from(self.depth_stencil_format.is_some())
    }
}

impl Default for RenderPassDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache of backend render passes keyed by compatibility descriptor.
#[derive(Default)]
pub struct RenderPassCache {
    compatible: HashMap<RenderPassDescriptor, RenderPassHandle>,
}

impl RenderPassCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a pass compatible with `descriptor`, creating one on first use.
    pub fn compatible_render_pass(
        &mut self,
        backend: &dyn CommandBackend,
        descriptor: &RenderPassDescriptor,
    ) -> Result<RenderPassHandle, GraphicsError> {
        if let Some(handle) = self.compatible.get(descriptor) {
            return Ok(*handle);
        }
        log::trace!(
            "Render pass cache miss ({} attachments, {} samples)",
            descriptor.attachment_count(),
            descriptor.sample_count()
        );
        let handle = backend.create_render_pass(descriptor)?;
        self.compatible.insert(descriptor.clone(), handle);
        Ok(handle)
    }

    /// Number of distinct passes created so far.
    pub fn len(&self) -> usize {
        self.compatible.len()
    }

    /// Whether no passes were created yet.
    pub fn is_empty(&self) -> bool {
        self.compatible.is_empty()
    }
}
