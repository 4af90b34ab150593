//! The deferred command graph.
//!
//! Nodes live in an arena owned by [`CommandGraph`] and are addressed by
//! copyable [`NodeHandle`]s; dependency edges are parent lists on the
//! nodes. A flush walks the accumulated graph depth-first with an explicit
//! stack and replays every node into one primary command buffer in
//! happens-before order, then resets the arena.

pub mod node;

pub use node::CommandGraphNode;

use crate::backend::{CommandBackend, PrimaryCommands};
use crate::error::GraphicsError;
use crate::graph::node::VisitedState;
use crate::render_pass::RenderPassCache;

/// Handle to a node in the current submission epoch's graph.
///
/// Handles are only meaningful against the graph that allocated them and
/// become stale when that graph is flushed; resource trackers detect this
/// through serial reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(u32);

impl NodeHandle {
    fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Arena of deferred command nodes plus their dependency edges.
#[derive(Debug, Default)]
pub struct CommandGraph {
    nodes: Vec<CommandGraphNode>,
}

impl CommandGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh node with no commands and no edges.
    pub fn allocate_node(&mut self) -> NodeHandle {
        let handle = NodeHandle::new(self.nodes.len());
        self.nodes.push(CommandGraphNode::new());
        log::trace!("Allocated command graph node {}", handle.0);
        handle
    }

    /// Whether no nodes were allocated this epoch.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes allocated this epoch.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Discard every node without flushing, abandoning the epoch.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Access a node.
    ///
    /// # Panics
    ///
    /// Panics if the handle is from another epoch's graph.
    pub fn node(&self, handle: NodeHandle) -> &CommandGraphNode {
        assert!(
            handle.index() < self.nodes.len(),
            "node handle from a flushed graph"
        );
        &self.nodes[handle.index()]
    }

    /// Mutably access a node.
    ///
    /// # Panics
    ///
    /// Panics if the handle is from another epoch's graph.
    pub fn node_mut(&mut self, handle: NodeHandle) -> &mut CommandGraphNode {
        assert!(
            handle.index() < self.nodes.len(),
            "node handle from a flushed graph"
        );
        &mut self.nodes[handle.index()]
    }

    /// Declare that `before`'s commands must execute before `after`'s.
    ///
    /// Freezes `before` against further recording. Rejects self-edges and
    /// any edge that would make `after` a transitive parent of itself.
    pub fn set_happens_before(
        &mut self,
        before: NodeHandle,
        after: NodeHandle,
    ) -> Result<(), GraphicsError> {
        if before == after || self.is_ancestor(after, before) {
            return Err(GraphicsError::CyclicDependency);
        }
        self.node_mut(after).add_parent(before);
        self.node_mut(before).set_has_children();
        Ok(())
    }

    /// Declare several happens-before edges into the same `after` node.
    pub fn set_happens_before_all(
        &mut self,
        before: &[NodeHandle],
        after: NodeHandle,
    ) -> Result<(), GraphicsError> {
        for &node in before {
            self.set_happens_before(node, after)?;
        }
        Ok(())
    }

    /// Whether `ancestor` is reachable from `node` through parent edges.
    fn is_ancestor(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if current == ancestor {
                return true;
            }
            stack.extend_from_slice(self.node(current).parents());
        }
        false
    }

    /// Flush the accumulated graph into one primary command buffer.
    ///
    /// Nodes are replayed in a topological order of the happens-before
    /// edges. On success the arena is reset for the next epoch; on failure
    /// it is left as-is and the flush cannot be completed.
    pub fn submit_commands(
        &mut self,
        backend: &dyn CommandBackend,
        render_passes: &mut RenderPassCache,
    ) -> Result<PrimaryCommands, GraphicsError> {
        log::trace!("Flushing command graph with {} nodes", self.nodes.len());
        let mut primary = backend.begin_primary()?;

        let mut stack = Vec::new();
        for index in 0..self.nodes.len() {
            // Roots only: interior nodes are reached through their children.
            if self.nodes[index].has_children()
                || self.nodes[index].visited_state() != VisitedState::Unvisited
            {
                continue;
            }
            stack.push(NodeHandle::new(index));

            while let Some(handle) = stack.last().copied() {
                let node = &mut self.nodes[handle.index()];
                match node.visited_state() {
                    VisitedState::Unvisited => {
                        node.visit_parents(&mut stack);
                    }
                    VisitedState::Ready => {
                        node.visit_and_execute(backend, render_passes, &mut primary)?;
                        stack.pop();
                    }
                    VisitedState::Visited => {
                        stack.pop();
                    }
                }
            }
        }

        backend.end_primary(&mut primary)?;
        self.nodes.clear();
        Ok(primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, ReplayedCommand};

    fn markers(primary: &PrimaryCommands) -> Vec<&str> {
        primary
            .replayed()
            .iter()
            .flat_map(|command| match command {
                ReplayedCommand::ExecuteCommands(markers) => {
                    markers.iter().map(String::as_str).collect()
                }
                _ => Vec::new(),
            })
            .collect()
    }

    #[test]
    fn test_happens_before_orders_flush() {
        let backend = DummyBackend::new();
        let mut render_passes = RenderPassCache::new();
        let mut graph = CommandGraph::new();

        let first = graph.allocate_node();
        let second = graph.allocate_node();
        graph
            .node_mut(second)
            .begin_outside_recording(&backend)
            .unwrap()
            .record("second");
        graph
            .node_mut(first)
            .begin_outside_recording(&backend)
            .unwrap()
            .record("first");
        graph.set_happens_before(first, second).unwrap();

        let primary = graph.submit_commands(&backend, &mut render_passes).unwrap();
        assert_eq!(markers(&primary), ["first", "second"]);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_diamond_executes_each_node_once() {
        let backend = DummyBackend::new();
        let mut render_passes = RenderPassCache::new();
        let mut graph = CommandGraph::new();

        let root = graph.allocate_node();
        let left = graph.allocate_node();
        let right = graph.allocate_node();
        let join = graph.allocate_node();
        for (handle, marker) in [(root, "root"), (left, "left"), (right, "right"), (join, "join")]
        {
            graph
                .node_mut(handle)
                .begin_outside_recording(&backend)
                .unwrap()
                .record(marker);
        }
        graph.set_happens_before(root, left).unwrap();
        graph.set_happens_before(root, right).unwrap();
        graph.set_happens_before_all(&[left, right], join).unwrap();

        let primary = graph.submit_commands(&backend, &mut render_passes).unwrap();
        let order = markers(&primary);

        assert_eq!(order.len(), 4);
        assert_eq!(order[0], "root");
        assert_eq!(order[3], "join");
        assert_eq!(
            order.iter().filter(|marker| **marker == "root").count(),
            1
        );
    }

    #[test]
    fn test_self_edge_is_rejected() {
        let mut graph = CommandGraph::new();
        let node = graph.allocate_node();

        assert_eq!(
            graph.set_happens_before(node, node).unwrap_err(),
            GraphicsError::CyclicDependency
        );
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut graph = CommandGraph::new();
        let first = graph.allocate_node();
        let second = graph.allocate_node();
        let third = graph.allocate_node();

        graph.set_happens_before(first, second).unwrap();
        graph.set_happens_before(second, third).unwrap();
        assert_eq!(
            graph.set_happens_before(third, first).unwrap_err(),
            GraphicsError::CyclicDependency
        );
    }

    #[test]
    fn test_empty_graph_flushes_to_empty_primary() {
        let backend = DummyBackend::new();
        let mut render_passes = RenderPassCache::new();
        let mut graph = CommandGraph::new();

        let primary = graph.submit_commands(&backend, &mut render_passes).unwrap();
        assert!(primary.replayed().is_empty());
    }
}
