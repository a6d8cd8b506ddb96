//! # nestgraph-core
//!
//! A Rust library for maintaining a mutable graph whose nodes nest into a tree of
//! clusters, with multiple simultaneous views over the same data and incrementally
//! maintained meta-edges between clusters.
//!
//! ## Overview
//!
//! nestgraph-core keeps a node/edge universe together with a hierarchy: nodes can be
//! grouped into clusters, clusters into larger clusters, and every view chooses which
//! level of that hierarchy is currently **enabled** (visible). Real edges crossing
//! between two enabled clusters are summarized into synthetic **meta-edges**, and the
//! engine keeps those aggregates — plus per-node degree counters and per-view edge
//! counters — consistent through every mutation instead of recomputing them from
//! scratch.
//!
//! ### Key Features
//!
//! - **Positional tree index**: depth-first pre/post numbering over a dynamic tree,
//!   giving O(1) ancestor/descendant containment tests and O(1) positional lookup
//! - **Incremental meta-edges**: aggregation between enabled clusters is maintained
//!   edge by edge as nodes are enabled, disabled, and moved
//! - **Multiple views**: independent enabled/disabled projections (tree + counters)
//!   over one shared node/edge dictionary
//! - **Write-locked orchestration**: every mutation runs under one reader/writer
//!   lock and publishes typed change events after the lock is released
//! - **Versioned staleness detection**: monotonic node/edge counters let long-lived
//!   iterators detect that the structure moved underneath them
//!
//! ## Quick Start
//!
//! ```rust
//! use nestgraph_core::hierarchy::GraphStore;
//!
//! fn main() -> Result<(), nestgraph_core::NestGraphError> {
//!     let store = GraphStore::new();
//!     let view = store.main_view();
//!
//!     // Two leaves under a common cluster, one external node.
//!     let a = store.add_node(view, None)?;
//!     let b = store.add_node(view, None)?;
//!     let x = store.add_node(view, None)?;
//!     let cluster = store.group(view, &[a, b])?;
//!
//!     // A real edge from inside the cluster to the outside.
//!     store.add_edge(view, a, x, 1.0, true)?;
//!
//!     // Collapse the cluster: the edge is now represented by a meta-edge.
//!     store.retract(view, cluster)?;
//!     let reader = store.read();
//!     assert_eq!(reader.counters(view)?.meta_edges_count, 1);
//!     assert!(reader.is_enabled(view, cluster)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Enablement
//!
//! A node is *enabled* when it stands for itself (or its whole subtree) in a view's
//! flattened rendition. Enablement is an antichain with respect to ancestry: no
//! enabled node ever has an enabled ancestor. [`hierarchy::GraphStore::expand`]
//! pushes visibility down one level, [`hierarchy::GraphStore::retract`] pulls it
//! back up, and [`hierarchy::GraphStore::move_to_group`] reconciles enablement
//! across reparenting.
//!
//! ### Meta-edges
//!
//! A meta-edge summarizes every real edge crossing between two enabled clusters,
//! keyed by the ordered cluster pair. Aggregation is commutative: any insertion
//! order over the same edge set produces the same meta-edge multiset. Meta-edges
//! are derived state — they are destroyed and re-derived as enablement changes and
//! are never persisted.
//!
//! ### Concurrency
//!
//! One reentrant reader/writer lock per instance serializes structural access.
//! Mutations hold the write lock for their whole duration and never block inside
//! it; events are published after release, so handlers may re-enter for reads.
//! Readers that release the lock between constructing an iterable and walking it
//! validate a [`version::VersionToken`] and treat a mismatch as "stale — restart
//! or abort".
//!
//! ## Module Guide
//!
//! Start with [`hierarchy::GraphStore`] for mutation and [`hierarchy::GraphReader`]
//! for queries; [`properties`] holds the identity and payload types, [`event`] the
//! change event fan-out, [`snapshot`] the persistence contract, and [`worker`] the
//! latest-request-wins background refresh helper.

pub mod error;
pub mod event;
pub mod hierarchy;
pub mod properties;
pub mod snapshot;
pub mod version;
pub mod worker;

pub use error::*;
