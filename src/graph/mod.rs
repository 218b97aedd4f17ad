//! Universal code graph data model
//!
//! - [`GraphNode`] - a function, method, class or module with a stable id
//! - [`GraphEdge`] - a typed, confidence-weighted relationship
//! - [`UniversalGraph`] - the per-request store with adjacency indexes

mod edge;
mod node;
mod store;

pub use edge::{EdgeOrigin, EdgeType, GraphEdge};
pub use node::{GraphNode, Layer, MetaValue, NodeKind, NodeMetadata};
pub use store::{EdgeInsert, SubGraph, UniversalGraph};
