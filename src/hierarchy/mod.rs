//! Hierarchy module: the hierarchical graph engine.
//!
//! # Module Organization
//!
//! - [`tree`]: the positional tree index (pre/post numbering, containment)
//! - [`view`]: per-view projections and aggregate counters
//! - `processor`: incremental meta-edge and counter maintenance
//! - `modifier`: the write-locked orchestration of every mutation
//! - [`base`]: the [`GraphStore`] facade and the read API
//!
//! # Public API
//!
//! ```rust
//! use nestgraph_core::hierarchy::{GraphStore, TreeStructure, View};
//! ```

pub(crate) mod base;
mod modifier;
pub(crate) mod processor;
mod tree;
mod view;

#[cfg(test)]
mod tests;

pub use base::{GraphReader, GraphStore};
pub use tree::{AncestorIter, ChildrenIter, TreeNode, TreeStructure};
pub use view::{View, ViewCounters};
