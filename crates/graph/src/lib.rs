//! # Context Graph
//!
//! Declaration-level dependency graph derived from normalized syntax trees.
//!
//! ## Architecture
//!
//! ```text
//! Arc<SyntaxNode>[]  (cached roots)
//!     │
//!     ├──> GraphBuilder
//!     │      ├─ Register every node under its GraphNodeId
//!     │      ├─ Superclass / interfaces / imports
//!     │      ├─ Field, parameter and return types (primitives dropped)
//!     │      └─ Thrown exceptions
//!     │
//!     └──> DependencyGraph (immutable)
//!            ├─ adjacency: id -> ordered DependencyTarget set
//!            ├─ registry:  id -> (root, child path)
//!            └─ resolved petgraph view for traversal
//!                 ├─ dependencies / dependents
//!                 ├─ has_path (BFS)
//!                 └─ detect_circular_dependencies (DFS)
//! ```
//!
//! Targets are names, not pointers. A target takes part in traversal only
//! when its simple name matches a class-like declaration in the same graph.

mod builder;
mod error;
mod graph;
mod types;

pub use builder::GraphBuilder;
pub use error::{GraphError, Result};
pub use graph::DependencyGraph;
pub use types::{
    DependencyKind, DependencyTarget, GraphNodeId, GraphStatistics, NodeRef, RelatedNode,
};
