//! Graphics error types.

use std::fmt;

/// Errors that can occur while building or flushing the command graph.
///
/// Contract violations (`NodeFrozen`, `CyclicDependency`, and friends) are
/// checked unconditionally in every build profile; callers must treat them
/// as bugs in the recording layer rather than recoverable conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Command-buffer allocation, begin, or end failed in the backend.
    ///
    /// Fatal to the current flush: there is no partial submission and no
    /// retry. The context cannot complete this flush.
    AllocationFailed(String),
    /// The render-pass cache could not produce a pass for a descriptor.
    RenderPassResolutionFailed(String),
    /// A node that already has children was asked to record more commands.
    NodeFrozen,
    /// Inside-pass recording was requested before render-pass info was stored.
    MissingRenderPassInfo,
    /// Render-pass info was stored twice on the same node.
    RenderPassAlreadyStored,
    /// A dependency edge would make a node a transitive parent of itself.
    CyclicDependency,
    /// A resource tracker operation needed a current writing node, but the
    /// tracker has none in this submission epoch.
    MissingWritingNode,
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationFailed(msg) => write!(f, "command buffer allocation failed: {msg}"),
            Self::RenderPassResolutionFailed(msg) => {
                write!(f, "render pass resolution failed: {msg}")
            }
            Self::NodeFrozen => write!(f, "node already has children and can no longer record"),
            Self::MissingRenderPassInfo => {
                write!(f, "render pass info must be stored before inside-pass recording")
            }
            Self::RenderPassAlreadyStored => {
                write!(f, "render pass info was already stored for this node")
            }
            Self::CyclicDependency => {
                write!(f, "dependency edge would create a cycle in the command graph")
            }
            Self::MissingWritingNode => {
                write!(f, "resource has no current writing node in this submission epoch")
            }
        }
    }
}

impl std::error::Error for GraphicsError {}
