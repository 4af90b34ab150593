//! Command-recording backend abstraction.
//!
//! The command graph never talks to a GPU API directly; it records into
//! opaque secondary buffers and replays them into a primary buffer through
//! the [`CommandBackend`] trait. Buffer and object handles are enums with
//! one variant per backend, so the graph can be driven by the in-memory
//! dummy backend in tests and by Vulkan in production without generics
//! leaking into the graph types.
//!
//! # Available Backends
//!
//! - dummy (always built): records marker strings and replay instructions
//!   in memory; no GPU required
//! - `vulkan-backend` feature: native Vulkan secondary/primary command
//!   buffers using ash

pub mod dummy;

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

pub use dummy::{DummyBackend, DummyCommands, DummyPrimary, ReplayedCommand};

#[cfg(feature = "vulkan-backend")]
pub use vulkan::VulkanBackend;

#[cfg(feature = "vulkan-backend")]
use ash::vk;

use crate::error::GraphicsError;
use crate::render_pass::RenderPassDescriptor;
use crate::types::{ClearValue, Rect2D};

/// Handle to a backend render-pass object.
///
/// Produced by [`CommandBackend::create_render_pass`] and memoized by the
/// render-pass cache; one handle serves every node whose stored descriptor
/// is compatible with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderPassHandle {
    /// Dummy backend render pass (an opaque id).
    Dummy(u64),
    /// Vulkan render pass.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vk::RenderPass),
}

/// Handle to a backend framebuffer.
///
/// The command graph only stores and forwards framebuffers; creating them
/// belongs to the layer that owns attachment memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferHandle {
    /// Dummy backend framebuffer (an opaque id).
    Dummy(u64),
    /// Vulkan framebuffer.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vk::Framebuffer),
}

/// Render-pass state inherited by an inside-pass secondary buffer.
#[derive(Debug, Clone, Copy)]
pub struct RenderPassInheritance<'a> {
    /// Compatible render pass the secondary buffer will execute inside.
    pub render_pass: &'a RenderPassHandle,
    /// Framebuffer the render pass instance is bound to.
    pub framebuffer: &'a FramebufferHandle,
}

/// Parameters for replaying a begin-render-pass instruction.
#[derive(Debug, Clone, Copy)]
pub struct RenderPassBegin<'a> {
    /// Render pass to begin.
    pub render_pass: &'a RenderPassHandle,
    /// Framebuffer to bind.
    pub framebuffer: &'a FramebufferHandle,
    /// Area of the framebuffer affected by the pass.
    pub render_area: Rect2D,
    /// Per-attachment clear values.
    pub clear_values: &'a [ClearValue],
}

/// A secondary command buffer in recording state.
///
/// Handed to the translation layer, which records actual GPU work into it.
/// The dummy variant retains marker strings so tests can observe replay
/// order; the Vulkan variant exposes the raw `vk::CommandBuffer`.
pub enum SecondaryCommands {
    /// Dummy backend recording.
    Dummy(DummyCommands),
    /// Vulkan secondary command buffer.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        /// Device the buffer was allocated from.
        device: ash::Device,
        /// The secondary command buffer handle.
        buffer: vk::CommandBuffer,
    },
}

impl SecondaryCommands {
    /// Record a marker into the buffer.
    ///
    /// Markers are retained by the dummy backend only; the Vulkan variant
    /// ignores them (real commands go through the raw handle).
    pub fn record(&mut self, marker: impl Into<String>) {
        match self {
            Self::Dummy(commands) => commands.push(marker.into()),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { .. } => {}
        }
    }

    /// Markers recorded so far (dummy backend only).
    ///
    /// # Panics
    ///
    /// Panics on non-dummy variants.
    pub fn markers(&self) -> &[String] {
        match self {
            Self::Dummy(commands) => commands.markers(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { .. } => panic!("markers are only retained by the dummy backend"),
        }
    }

    /// Raw Vulkan command buffer for recording real GPU work.
    ///
    /// # Panics
    ///
    /// Panics on non-Vulkan variants.
    #[cfg(feature = "vulkan-backend")]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        match self {
            Self::Vulkan { buffer, .. } => *buffer,
            Self::Dummy(_) => panic!("dummy command buffer has no Vulkan handle"),
        }
    }
}

impl std::fmt::Debug for SecondaryCommands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy(commands) => f
                .debug_tuple("SecondaryCommands::Dummy")
                .field(commands)
                .finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { buffer, .. } => f
                .debug_struct("SecondaryCommands::Vulkan")
                .field("buffer", buffer)
                .finish_non_exhaustive(),
        }
    }
}

/// The primary command buffer produced by a graph flush.
///
/// Contains every flushed node's commands in dependency order, ready to be
/// handed to the submission queue.
pub enum PrimaryCommands {
    /// Dummy backend replay list.
    Dummy(DummyPrimary),
    /// Vulkan primary command buffer.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        /// Device the buffer was allocated from.
        device: ash::Device,
        /// The primary command buffer handle.
        buffer: vk::CommandBuffer,
    },
}

impl PrimaryCommands {
    /// Instructions replayed into this buffer (dummy backend only).
    ///
    /// # Panics
    ///
    /// Panics on non-dummy variants.
    pub fn replayed(&self) -> &[ReplayedCommand] {
        match self {
            Self::Dummy(primary) => primary.replayed(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { .. } => panic!("replay lists are only retained by the dummy backend"),
        }
    }

    /// Raw Vulkan command buffer for queue submission.
    ///
    /// # Panics
    ///
    /// Panics on non-Vulkan variants.
    #[cfg(feature = "vulkan-backend")]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        match self {
            Self::Vulkan { buffer, .. } => *buffer,
            Self::Dummy(_) => panic!("dummy command buffer has no Vulkan handle"),
        }
    }
}

impl std::fmt::Debug for PrimaryCommands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy(primary) => f
                .debug_tuple("PrimaryCommands::Dummy")
                .field(primary)
                .finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { buffer, .. } => f
                .debug_struct("PrimaryCommands::Vulkan")
                .field("buffer", buffer)
                .finish_non_exhaustive(),
        }
    }
}

/// Backend trait for command-buffer allocation and replay.
///
/// Allocation failures are fatal to the flush in progress; implementations
/// must not retry internally.
pub trait CommandBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Create a render pass compatible with the given descriptor.
    ///
    /// Memoization lives in the render-pass cache; this is called once per
    /// distinct descriptor.
    fn create_render_pass(
        &self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<RenderPassHandle, GraphicsError>;

    /// Allocate and begin a secondary command buffer.
    ///
    /// With `inheritance` set, the buffer is scoped to execute inside the
    /// given render pass and framebuffer; otherwise it records work that
    /// runs outside any render pass (copies, transitions).
    fn begin_secondary(
        &self,
        inheritance: Option<&RenderPassInheritance<'_>>,
    ) -> Result<SecondaryCommands, GraphicsError>;

    /// End recording of a secondary command buffer.
    fn end_secondary(&self, commands: &mut SecondaryCommands) -> Result<(), GraphicsError>;

    /// Allocate and begin a primary command buffer.
    fn begin_primary(&self) -> Result<PrimaryCommands, GraphicsError>;

    /// End recording of the primary command buffer.
    fn end_primary(&self, primary: &mut PrimaryCommands) -> Result<(), GraphicsError>;

    /// Replay an ended secondary buffer into the primary buffer.
    fn execute_secondary(&self, primary: &mut PrimaryCommands, commands: &SecondaryCommands);

    /// Record a begin-render-pass instruction into the primary buffer.
    ///
    /// The pass contents are expected to come from secondary buffers.
    fn begin_render_pass(&self, primary: &mut PrimaryCommands, begin: &RenderPassBegin<'_>);

    /// Record an end-render-pass instruction into the primary buffer.
    fn end_render_pass(&self, primary: &mut PrimaryCommands);
}
