//! Deferred command graph and resource dependency tracking for the Opal
//! GL-on-Vulkan translation layer.
//!
//! GL work is not recorded straight into a primary command buffer.
//! Instead, each unit of work becomes a node in a [`graph::CommandGraph`],
//! recording into secondary buffers through a [`backend::CommandBackend`].
//! Every GPU resource embeds a [`resource::ResourceTracker`] that wires
//! happens-before edges between the nodes touching it. At a flush point
//! the graph is replayed in dependency order into one primary buffer and
//! handed to the [`submit::SubmitQueue`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use opal_graphics::backend::DummyBackend;
//! use opal_graphics::context::RecordingContext;
//! use opal_graphics::resource::ResourceTracker;
//!
//! let mut context = RecordingContext::new(Arc::new(DummyBackend::new()));
//! let mut buffer = ResourceTracker::new();
//!
//! buffer.begin_write(&mut context).unwrap().record("upload vertices");
//! let primary = context.submit_commands().unwrap();
//! assert_eq!(primary.replayed().len(), 1);
//! ```

pub mod backend;
pub mod context;
pub mod error;
pub mod graph;
pub mod render_pass;
pub mod resource;
pub mod serial;
pub mod submit;
pub mod types;

pub use backend::{CommandBackend, DummyBackend, PrimaryCommands, SecondaryCommands};
#[cfg(feature = "vulkan-backend")]
pub use backend::VulkanBackend;
pub use context::RecordingContext;
pub use error::GraphicsError;
pub use graph::{CommandGraph, NodeHandle};
pub use render_pass::{RenderPassCache, RenderPassDescriptor};
pub use resource::ResourceTracker;
pub use serial::Serial;
pub use submit::{Fence, FenceStatus, Semaphore, SubmitQueue};
pub use types::{ClearValue, Rect2D, TextureFormat};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the crate version at startup.
pub fn init() {
    log::info!("Initializing opal-graphics v{VERSION}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
