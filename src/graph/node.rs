//! A single node of the deferred command graph.
//!
//! Each node owns up to two secondary command buffers: one for work that
//! runs outside any render pass (copies, layout transitions) and one for
//! draw commands inside a deferred render pass. Recording is lazy; buffers
//! are begun on first use and only ended when the graph is flushed.

use crate::backend::{
    CommandBackend, FramebufferHandle, PrimaryCommands, RenderPassBegin, RenderPassInheritance,
    SecondaryCommands,
};
use crate::error::GraphicsError;
use crate::graph::NodeHandle;
use crate::render_pass::{RenderPassCache, RenderPassDescriptor};
use crate::types::{ClearValue, Rect2D};

/// Traversal state during a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VisitedState {
    /// Not yet reached by the traversal.
    Unvisited,
    /// All parents have been pushed; executes when popped again.
    Ready,
    /// Commands were replayed into the primary buffer.
    Visited,
}

/// Deferred render-pass state stored on a node.
#[derive(Debug, Clone)]
pub(crate) struct RenderPassInfo {
    pub descriptor: RenderPassDescriptor,
    pub framebuffer: FramebufferHandle,
    pub render_area: Rect2D,
    pub clear_values: Vec<ClearValue>,
}

/// One unit of deferred GPU work and its dependency links.
///
/// A node freezes once another node declares it as a parent: recording into
/// a frozen node would insert commands that escape the ordering its children
/// already depend on.
#[derive(Debug)]
pub struct CommandGraphNode {
    render_pass_info: Option<RenderPassInfo>,
    outside_commands: Option<SecondaryCommands>,
    inside_commands: Option<SecondaryCommands>,
    parents: Vec<NodeHandle>,
    has_children: bool,
    visited: VisitedState,
}

impl CommandGraphNode {
    pub(crate) fn new() -> Self {
        Self {
            render_pass_info: None,
            outside_commands: None,
            inside_commands: None,
            parents: Vec::new(),
            has_children: false,
            visited: VisitedState::Unvisited,
        }
    }

    /// Whether some other node depends on this one.
    pub fn has_children(&self) -> bool {
        self.has_children
    }

    /// Whether this node depends on any other node.
    pub fn has_parents(&self) -> bool {
        !self.parents.is_empty()
    }

    /// Nodes this one depends on.
    pub fn parents(&self) -> &[NodeHandle] {
        &self.parents
    }

    pub(crate) fn visited_state(&self) -> VisitedState {
        self.visited
    }

    /// Whether outside-pass recording has begun.
    pub fn has_started_outside(&self) -> bool {
        self.outside_commands.is_some()
    }

    /// Whether inside-pass recording has begun.
    pub fn has_started_inside(&self) -> bool {
        self.inside_commands.is_some()
    }

    pub(crate) fn add_parent(&mut self, parent: NodeHandle) {
        self.parents.push(parent);
    }

    pub(crate) fn set_has_children(&mut self) {
        self.has_children = true;
    }

    /// Begin (or resume) recording outside-pass commands.
    pub fn begin_outside_recording(
        &mut self,
        backend: &dyn CommandBackend,
    ) -> Result<&mut SecondaryCommands, GraphicsError> {
        if self.has_children {
            return Err(GraphicsError::NodeFrozen);
        }
        if self.outside_commands.is_none() {
            self.outside_commands = Some(backend.begin_secondary(None)?);
        }
        let Some(commands) = self.outside_commands.as_mut() else {
            return Err(GraphicsError::AllocationFailed(
                "secondary buffer not begun".to_string(),
            ));
        };
        Ok(commands)
    }

    /// Record the deferred render pass this node's draws will execute in.
    ///
    /// Must be called exactly once per node, before any inside-pass
    /// recording.
    pub fn store_render_pass_info(
        &mut self,
        framebuffer: FramebufferHandle,
        render_area: Rect2D,
        descriptor: RenderPassDescriptor,
        clear_values: Vec<ClearValue>,
    ) -> Result<(), GraphicsError> {
        if self.has_children {
            return Err(GraphicsError::NodeFrozen);
        }
        if self.render_pass_info.is_some() {
            return Err(GraphicsError::RenderPassAlreadyStored);
        }
        self.render_pass_info = Some(RenderPassInfo {
            descriptor,
            framebuffer,
            render_area,
            clear_values,
        });
        Ok(())
    }

    /// Begin (or resume) recording inside-pass commands.
    ///
    /// Render-pass info must already be stored; the secondary buffer is
    /// begun with inheritance against a compatible pass from the cache.
    pub fn begin_inside_recording(
        &mut self,
        backend: &dyn CommandBackend,
        render_passes: &mut RenderPassCache,
    ) -> Result<&mut SecondaryCommands, GraphicsError> {
        if self.has_children {
            return Err(GraphicsError::NodeFrozen);
        }
        if self.inside_commands.is_none() {
            let info = self
                .render_pass_info
                .as_ref()
                .ok_or(GraphicsError::MissingRenderPassInfo)?;
            let render_pass =
                render_passes.compatible_render_pass(backend, &info.descriptor)?;
            let framebuffer = info.framebuffer;
            let inheritance = RenderPassInheritance {
                render_pass: &render_pass,
                framebuffer: &framebuffer,
            };
            self.inside_commands = Some(backend.begin_secondary(Some(&inheritance))?);
        }
        let Some(commands) = self.inside_commands.as_mut() else {
            return Err(GraphicsError::AllocationFailed(
                "secondary buffer not begun".to_string(),
            ));
        };
        Ok(commands)
    }

    /// The started outside-pass buffer, if recording has begun.
    ///
    /// Fails if the node is frozen; returns `None` (rather than starting a
    /// buffer) when outside-pass recording never began.
    pub fn started_outside_commands(
        &mut self,
    ) -> Result<Option<&mut SecondaryCommands>, GraphicsError> {
        if self.has_children {
            return Err(GraphicsError::NodeFrozen);
        }
        Ok(self.outside_commands.as_mut())
    }

    /// The started inside-pass buffer, if recording has begun.
    ///
    /// Fails if the node is frozen; returns `None` (rather than starting a
    /// buffer) when inside-pass recording never began.
    pub fn started_inside_commands(
        &mut self,
    ) -> Result<Option<&mut SecondaryCommands>, GraphicsError> {
        if self.has_children {
            return Err(GraphicsError::NodeFrozen);
        }
        Ok(self.inside_commands.as_mut())
    }

    /// Push all unvisited parents and mark this node ready.
    pub(crate) fn visit_parents(&mut self, stack: &mut Vec<NodeHandle>) {
        debug_assert_eq!(self.visited, VisitedState::Unvisited);
        stack.extend_from_slice(&self.parents);
        self.visited = VisitedState::Ready;
    }

    /// Replay this node's commands into the primary buffer.
    ///
    /// Outside-pass commands execute first; if a render pass was deferred,
    /// it is then begun on the primary buffer, the inside-pass buffer is
    /// executed within it, and the pass is ended.
    pub(crate) fn visit_and_execute(
        &mut self,
        backend: &dyn CommandBackend,
        render_passes: &mut RenderPassCache,
        primary: &mut PrimaryCommands,
    ) -> Result<(), GraphicsError> {
        debug_assert_eq!(self.visited, VisitedState::Ready);
        let Self {
            render_pass_info,
            outside_commands,
            inside_commands,
            ..
        } = self;

        if let Some(outside) = outside_commands {
            backend.end_secondary(outside)?;
            backend.execute_secondary(primary, outside);
        }

        if let Some(inside) = inside_commands {
            let info = render_pass_info
                .as_ref()
                .ok_or(GraphicsError::MissingRenderPassInfo)?;
            let render_pass =
                render_passes.compatible_render_pass(backend, &info.descriptor)?;
            backend.end_secondary(inside)?;
            backend.begin_render_pass(
                primary,
                &RenderPassBegin {
                    render_pass: &render_pass,
                    framebuffer: &info.framebuffer,
                    render_area: info.render_area,
                    clear_values: &info.clear_values,
                },
            );
            backend.execute_secondary(primary, inside);
            backend.end_render_pass(primary);
        }

        self.visited = VisitedState::Visited;
        Ok(())
    }
}
