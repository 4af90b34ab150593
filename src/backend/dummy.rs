//! In-memory backend used for testing and headless runs.
//!
//! Secondary buffers retain the marker strings recorded into them, and the
//! primary buffer keeps an ordered list of replay instructions, so tests
//! can assert on the exact flush order the graph produced.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::{
    CommandBackend, PrimaryCommands, RenderPassBegin, RenderPassHandle, RenderPassInheritance,
    SecondaryCommands,
};
use crate::error::GraphicsError;
use crate::render_pass::RenderPassDescriptor;
use crate::types::ClearValue;

/// A recorded secondary buffer: a list of marker strings.
#[derive(Debug, Default)]
pub struct DummyCommands {
    markers: Vec<String>,
    inside_pass: bool,
}

impl DummyCommands {
    pub(crate) fn push(&mut self, marker: String) {
        self.markers.push(marker);
    }

    /// Markers recorded so far, in order.
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// Whether this buffer was begun with render-pass inheritance.
    pub fn is_inside_pass(&self) -> bool {
        self.inside_pass
    }
}

/// One instruction replayed into the primary buffer during a flush.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayedCommand {
    /// A secondary buffer's markers were executed.
    ExecuteCommands(Vec<String>),
    /// A render pass instance was begun.
    BeginRenderPass {
        /// Opaque id of the render pass.
        render_pass: u64,
        /// Clear values the pass was begun with.
        clear_values: Vec<ClearValue>,
    },
    /// The current render pass instance ended.
    EndRenderPass,
}

/// The primary buffer's ordered replay list.
#[derive(Debug, Default)]
pub struct DummyPrimary {
    replayed: Vec<ReplayedCommand>,
    ended: bool,
}

impl DummyPrimary {
    /// Instructions replayed into this buffer, in order.
    pub fn replayed(&self) -> &[ReplayedCommand] {
        &self.replayed
    }

    /// Whether recording was ended.
    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

/// Backend that records everything in memory and touches no GPU.
#[derive(Debug, Default)]
pub struct DummyBackend {
    next_render_pass_id: AtomicU64,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommandBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn create_render_pass(
        &self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<RenderPassHandle, GraphicsError> {
        let id = self.next_render_pass_id.fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "Dummy backend: created render pass {} ({} attachments)",
            id,
            descriptor.attachment_count()
        );
        Ok(RenderPassHandle::Dummy(id))
    }

    fn begin_secondary(
        &self,
        inheritance: Option<&RenderPassInheritance<'_>>,
    ) -> Result<SecondaryCommands, GraphicsError> {
        log::trace!(
            "Dummy backend: begin secondary buffer (inside pass: {})",
            inheritance.is_some()
        );
        Ok(SecondaryCommands::Dummy(DummyCommands {
            markers: Vec::new(),
            inside_pass: inheritance.is_some(),
        }))
    }

    fn end_secondary(&self, commands: &mut SecondaryCommands) -> Result<(), GraphicsError> {
        match commands {
            SecondaryCommands::Dummy(commands) => {
                log::trace!(
                    "Dummy backend: end secondary buffer ({} markers)",
                    commands.markers.len()
                );
            }
            #[cfg(feature = "vulkan-backend")]
            SecondaryCommands::Vulkan { .. } => {
                panic!("dummy backend was handed a Vulkan command buffer")
            }
        }
        Ok(())
    }

    fn begin_primary(&self) -> Result<PrimaryCommands, GraphicsError> {
        log::trace!("Dummy backend: begin primary buffer");
        Ok(PrimaryCommands::Dummy(DummyPrimary::default()))
    }

    fn end_primary(&self, primary: &mut PrimaryCommands) -> Result<(), GraphicsError> {
        match primary {
            PrimaryCommands::Dummy(primary) => {
                log::trace!(
                    "Dummy backend: end primary buffer ({} instructions)",
                    primary.replayed.len()
                );
                primary.ended = true;
            }
            #[cfg(feature = "vulkan-backend")]
            PrimaryCommands::Vulkan { .. } => {
                panic!("dummy backend was handed a Vulkan command buffer")
            }
        }
        Ok(())
    }

    fn execute_secondary(&self, primary: &mut PrimaryCommands, commands: &SecondaryCommands) {
        match (primary, commands) {
            (PrimaryCommands::Dummy(primary), SecondaryCommands::Dummy(commands)) => {
                primary
                    .replayed
                    .push(ReplayedCommand::ExecuteCommands(commands.markers.clone()));
            }
            #[cfg(feature = "vulkan-backend")]
            _ => panic!("dummy backend was handed Vulkan command buffers"),
        }
    }

    fn begin_render_pass(&self, primary: &mut PrimaryCommands, begin: &RenderPassBegin<'_>) {
        match (primary, begin.render_pass) {
            (PrimaryCommands::Dummy(primary), RenderPassHandle::Dummy(render_pass)) => {
                primary.replayed.push(ReplayedCommand::BeginRenderPass {
                    render_pass: *render_pass,
                    clear_values: begin.clear_values.to_vec(),
                });
            }
            #[cfg(feature = "vulkan-backend")]
            _ => panic!("dummy backend was handed Vulkan handles"),
        }
    }

    fn end_render_pass(&self, primary: &mut PrimaryCommands) {
        match primary {
            PrimaryCommands::Dummy(primary) => {
                primary.replayed.push(ReplayedCommand::EndRenderPass);
            }
            #[cfg(feature = "vulkan-backend")]
            PrimaryCommands::Vulkan { .. } => {
                panic!("dummy backend was handed a Vulkan command buffer")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextureFormat;

    #[test]
    fn test_render_pass_ids_are_unique() {
        let backend = DummyBackend::new();
        let descriptor = RenderPassDescriptor::new().with_color(TextureFormat::Rgba8Unorm);

        let first = backend.create_render_pass(&descriptor).unwrap();
        let second = backend.create_render_pass(&descriptor).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_secondary_records_markers() {
        let backend = DummyBackend::new();
        let mut commands = backend.begin_secondary(None).unwrap();
        commands.record("copy buffer");
        commands.record("transition image");
        backend.end_secondary(&mut commands).unwrap();

        assert_eq!(commands.markers(), ["copy buffer", "transition image"]);
    }

    #[test]
    fn test_primary_replay_order() {
        let backend = DummyBackend::new();
        let mut primary = backend.begin_primary().unwrap();

        let mut outside = backend.begin_secondary(None).unwrap();
        outside.record("upload");
        backend.end_secondary(&mut outside).unwrap();
        backend.execute_secondary(&mut primary, &outside);
        backend.end_primary(&mut primary).unwrap();

        assert_eq!(
            primary.replayed(),
            [ReplayedCommand::ExecuteCommands(vec!["upload".to_string()])]
        );
    }
}
