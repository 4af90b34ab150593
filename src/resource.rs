//! Per-resource dependency tracking.
//!
//! A [`ResourceTracker`] is embedded in every resource the translation
//! layer exposes (buffers, images, framebuffers). It remembers which graph
//! node currently writes the resource and which nodes read it, and wires
//! happens-before edges so that flush order respects those accesses.
//!
//! Node references are only valid within one submission epoch. Every
//! public operation first reconciles the tracker's stamped serial with the
//! context's current one and drops stale references, so a tracker never
//! needs explicit notification that a flush happened.

use crate::backend::{FramebufferHandle, SecondaryCommands};
use crate::context::RecordingContext;
use crate::error::GraphicsError;
use crate::graph::NodeHandle;
use crate::render_pass::RenderPassDescriptor;
use crate::serial::Serial;
use crate::types::{ClearValue, Rect2D};

/// Dependency state of one GPU resource.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    serial: Serial,
    current_writing_node: Option<NodeHandle>,
    current_reading_nodes: Vec<NodeHandle>,
}

impl ResourceTracker {
    /// Create a tracker with no recorded accesses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serial of the submission epoch this tracker last recorded in.
    pub fn stored_serial(&self) -> Serial {
        self.serial
    }

    /// Whether commands recorded against this resource may still be
    /// executing on the GPU.
    pub fn is_in_use(&self, context: &RecordingContext) -> bool {
        self.serial > context.last_completed_serial()
    }

    /// Drop node references left over from an already-flushed epoch.
    fn reconcile(&mut self, current: Serial) {
        if current > self.serial {
            self.serial = current;
            self.current_writing_node = None;
            self.current_reading_nodes.clear();
        }
    }

    /// Whether this tracker's current writing node exists and can still
    /// accept commands.
    pub fn has_childless_writing_node(&self, context: &RecordingContext) -> bool {
        if self.serial != context.current_serial() {
            return false;
        }
        match self.current_writing_node {
            Some(node) => !context.graph().node(node).has_children(),
            None => false,
        }
    }

    /// Whether the current writing node has begun inside-pass recording.
    pub fn has_started_render_pass(&self, context: &RecordingContext) -> bool {
        if self.serial != context.current_serial() {
            return false;
        }
        match self.current_writing_node {
            Some(node) => context.graph().node(node).has_started_inside(),
            None => false,
        }
    }

    /// Start a new write to this resource in a fresh node.
    ///
    /// Any previous writer and all readers become parents of the new node.
    /// Returns the node's outside-pass buffer, begun and ready to record.
    pub fn begin_write<'a>(
        &mut self,
        context: &'a mut RecordingContext,
    ) -> Result<&'a mut SecondaryCommands, GraphicsError> {
        let node = self.on_resource_changed(context)?;
        context.begin_outside_recording(node)
    }

    /// Continue writing this resource, reusing the current writer if it is
    /// still open.
    ///
    /// Falls back to [`Self::begin_write`] when there is no current writer
    /// or the writer has been frozen by a dependent node.
    pub fn append_write<'a>(
        &mut self,
        context: &'a mut RecordingContext,
    ) -> Result<&'a mut SecondaryCommands, GraphicsError> {
        self.reconcile(context.current_serial());
        if !self.has_childless_writing_node(context) {
            return self.begin_write(context);
        }
        let node = self
            .current_writing_node
            .ok_or(GraphicsError::MissingWritingNode)?;
        context.begin_outside_recording(node)
    }

    /// Defer a render pass targeting this resource and begin recording
    /// draws inside it.
    ///
    /// The resource must already have a current writing node (a preceding
    /// write established it); the pass is stored on that node and resolved
    /// to a backend object only at flush time.
    pub fn begin_render_pass<'a>(
        &mut self,
        context: &'a mut RecordingContext,
        framebuffer: FramebufferHandle,
        render_area: Rect2D,
        descriptor: RenderPassDescriptor,
        clear_values: Vec<ClearValue>,
    ) -> Result<&'a mut SecondaryCommands, GraphicsError> {
        self.reconcile(context.current_serial());
        let node = self
            .current_writing_node
            .ok_or(GraphicsError::MissingWritingNode)?;
        context.store_render_pass_info(node, framebuffer, render_area, descriptor, clear_values)?;
        context.begin_inside_recording(node)
    }

    /// Resume a render pass already started on the current writer.
    ///
    /// Returns `None` when there is no open writer with a started pass, in
    /// which case the caller must begin a new pass.
    pub fn append_to_started_render_pass<'a>(
        &mut self,
        context: &'a mut RecordingContext,
    ) -> Result<Option<&'a mut SecondaryCommands>, GraphicsError> {
        self.reconcile(context.current_serial());
        if !self.has_childless_writing_node(context) || !self.has_started_render_pass(context) {
            return Ok(None);
        }
        let node = self
            .current_writing_node
            .ok_or(GraphicsError::MissingWritingNode)?;
        context.started_inside_commands(node)
    }

    /// Make the write recorded through `written_by` order before further
    /// accesses to this resource.
    ///
    /// The other tracker's current writing node becomes this tracker's
    /// writer as well, with all of this tracker's pending accesses as its
    /// parents. Used when one operation writes a resource whose commands
    /// were recorded against another (a blit's destination, for example).
    pub fn add_write_dependency(
        &mut self,
        context: &mut RecordingContext,
        written_by: &mut ResourceTracker,
    ) -> Result<(), GraphicsError> {
        written_by.reconcile(context.current_serial());
        let writing_node = written_by
            .current_writing_node
            .ok_or(GraphicsError::MissingWritingNode)?;
        self.on_write_impl(context, writing_node)
    }

    /// Order this resource's current write before the node that reads it.
    ///
    /// `reading` is the tracker whose current writing node consumes this
    /// resource. The edge is only added while this tracker's writer is
    /// still open; a frozen writer's order is already pinned by the child
    /// that froze it. The reader is always remembered so a later write
    /// orders after it.
    pub fn add_read_dependency(
        &mut self,
        context: &mut RecordingContext,
        reading: &mut ResourceTracker,
    ) -> Result<(), GraphicsError> {
        self.reconcile(context.current_serial());
        reading.reconcile(context.current_serial());
        let reading_node = reading
            .current_writing_node
            .ok_or(GraphicsError::MissingWritingNode)?;

        if self.has_childless_writing_node(context) {
            if let Some(writer) = self.current_writing_node {
                if writer != reading_node {
                    context
                        .graph_mut()
                        .set_happens_before(writer, reading_node)?;
                }
            }
        }
        self.current_reading_nodes.push(reading_node);
        Ok(())
    }

    /// Allocate a fresh writing node for this resource and wire pending
    /// accesses as its parents.
    pub fn on_resource_changed(
        &mut self,
        context: &mut RecordingContext,
    ) -> Result<NodeHandle, GraphicsError> {
        let node = context.allocate_node();
        self.on_write_impl(context, node)?;
        Ok(node)
    }

    fn on_write_impl(
        &mut self,
        context: &mut RecordingContext,
        writing_node: NodeHandle,
    ) -> Result<(), GraphicsError> {
        self.reconcile(context.current_serial());

        if !self.current_reading_nodes.is_empty() {
            let readers: Vec<NodeHandle> = self
                .current_reading_nodes
                .drain(..)
                .filter(|reader| *reader != writing_node)
                .collect();
            context
                .graph_mut()
                .set_happens_before_all(&readers, writing_node)?;
        }
        if let Some(previous) = self.current_writing_node {
            if previous != writing_node {
                context
                    .graph_mut()
                    .set_happens_before(previous, writing_node)?;
            }
        }
        self.current_writing_node = Some(writing_node);
        Ok(())
    }
}
