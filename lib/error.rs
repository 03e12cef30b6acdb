//! Saker error types.

use thiserror::Error;

/// Error variants for fatal conditions inside the engine.
///
/// Semantic errors in the analyzed program are *not* represented here; they
/// flow through the machine as terminal `Control::Error` states. An `Error`
/// value indicates a broken invariant in a semantics or store implementation
/// and aborts the exploration.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    #[error("reference count underflow at continuation address {0}")]
    RefCountUnderflow(String),

    #[error("continuation address {0} is not allocated")]
    KontAddressMissing(String),

    #[error("continuation frame names parent {0}, which is not allocated")]
    KontParentMissing(String),

    #[error("the vertex id {0} does not exist in the graph")]
    GraphVertexNotFound(usize),

    #[error("the edge with head {0} and tail {1} does not exist in the graph")]
    GraphEdgeNotFound(usize, usize),

    #[error("duplicate vertex id {0} in graph")]
    GraphDuplicateVertex(usize),

    #[error("duplicate edge {0} -> {1} in graph")]
    GraphDuplicateEdge(usize, usize),

    #[error("parse error: {0}")]
    Parse(String),
}
