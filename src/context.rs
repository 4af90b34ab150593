//! The per-context recording state bundle.
//!
//! Everything the graph and the trackers need during an epoch travels
//! together in a [`RecordingContext`]: the backend, the render-pass cache,
//! the node arena, and the serial counters. Operations take the context as
//! an explicit argument, so there is no ambient per-context registry to
//! keep in sync.

use std::sync::Arc;

use crate::backend::{CommandBackend, FramebufferHandle, PrimaryCommands, SecondaryCommands};
use crate::error::GraphicsError;
use crate::graph::{CommandGraph, NodeHandle};
use crate::render_pass::{RenderPassCache, RenderPassDescriptor};
use crate::serial::Serial;
use crate::types::{ClearValue, Rect2D};

/// Recording state for one GL context's deferred work.
pub struct RecordingContext {
    backend: Arc<dyn CommandBackend>,
    render_passes: RenderPassCache,
    graph: CommandGraph,
    current_serial: Serial,
    last_completed_serial: Serial,
}

impl RecordingContext {
    /// Create a context recording through the given backend.
    pub fn new(backend: Arc<dyn CommandBackend>) -> Self {
        log::debug!("Creating recording context on {} backend", backend.name());
        Self {
            backend,
            render_passes: RenderPassCache::new(),
            graph: CommandGraph::new(),
            // Serial 0 is reserved so fresh trackers always reconcile.
            current_serial: Serial::zero().next(),
            last_completed_serial: Serial::zero(),
        }
    }

    /// The backend this context records through.
    pub fn backend(&self) -> &dyn CommandBackend {
        self.backend.as_ref()
    }

    /// The current epoch's command graph.
    pub fn graph(&self) -> &CommandGraph {
        &self.graph
    }

    /// Mutable access to the current epoch's command graph.
    pub fn graph_mut(&mut self) -> &mut CommandGraph {
        &mut self.graph
    }

    /// The render-pass cache (survives across epochs).
    pub fn render_passes(&self) -> &RenderPassCache {
        &self.render_passes
    }

    /// Serial of the epoch currently being recorded.
    pub fn current_serial(&self) -> Serial {
        self.current_serial
    }

    /// Serial of the newest submission known to have finished on the GPU.
    pub fn last_completed_serial(&self) -> Serial {
        self.last_completed_serial
    }

    /// Allocate a node in the current epoch's graph.
    pub fn allocate_node(&mut self) -> NodeHandle {
        self.graph.allocate_node()
    }

    /// Begin (or resume) outside-pass recording on a node.
    pub fn begin_outside_recording(
        &mut self,
        node: NodeHandle,
    ) -> Result<&mut SecondaryCommands, GraphicsError> {
        let Self { backend, graph, .. } = self;
        graph.node_mut(node).begin_outside_recording(backend.as_ref())
    }

    /// Begin (or resume) inside-pass recording on a node.
    pub fn begin_inside_recording(
        &mut self,
        node: NodeHandle,
    ) -> Result<&mut SecondaryCommands, GraphicsError> {
        let Self {
            backend,
            graph,
            render_passes,
            ..
        } = self;
        graph
            .node_mut(node)
            .begin_inside_recording(backend.as_ref(), render_passes)
    }

    /// Store deferred render-pass state on a node.
    pub fn store_render_pass_info(
        &mut self,
        node: NodeHandle,
        framebuffer: FramebufferHandle,
        render_area: Rect2D,
        descriptor: RenderPassDescriptor,
        clear_values: Vec<ClearValue>,
    ) -> Result<(), GraphicsError> {
        self.graph
            .node_mut(node)
            .store_render_pass_info(framebuffer, render_area, descriptor, clear_values)
    }

    /// The node's started inside-pass buffer, if any.
    pub fn started_inside_commands(
        &mut self,
        node: NodeHandle,
    ) -> Result<Option<&mut SecondaryCommands>, GraphicsError> {
        self.graph.node_mut(node).started_inside_commands()
    }

    /// Flush the accumulated graph and advance to the next epoch.
    ///
    /// Returns the primary buffer ready for queue submission. On failure
    /// the epoch does not advance and the flush cannot be completed.
    pub fn submit_commands(&mut self) -> Result<PrimaryCommands, GraphicsError> {
        let Self {
            backend,
            graph,
            render_passes,
            ..
        } = self;
        let primary = graph.submit_commands(backend.as_ref(), render_passes)?;
        log::debug!("Submitted command graph for serial {}", self.current_serial);
        self.current_serial = self.current_serial.next();
        Ok(primary)
    }

    /// Record that the GPU finished every submission up to `serial`.
    pub fn on_serial_completed(&mut self, serial: Serial) {
        if serial > self.last_completed_serial {
            self.last_completed_serial = serial;
        }
    }

    /// Whether a submission with the given serial may still be executing.
    pub fn is_serial_in_use(&self, serial: Serial) -> bool {
        serial > self.last_completed_serial
    }
}
