//! # promptgraph core
//!
//! Domain types and error definitions for the promptgraph hierarchy and
//! context-budget engine. Nodes and edges are owned by an external graph
//! store; this crate only describes their shape and offers a per-call
//! lookup index. No I/O happens here.
//!
//! All engine crates depend inward on this one.

pub mod edge;
pub mod error;
pub mod graph;
pub mod node;

// Re-export key types at crate root for ergonomics
pub use edge::{Edge, RelationshipType};
pub use error::{CompactionError, Error, Result};
pub use graph::{GraphSnapshot, GraphView};
pub use node::{Altitude, CompressionHint, Node, NodeCategory, Scope, DEFAULT_CONTEXT_PRIORITY};
