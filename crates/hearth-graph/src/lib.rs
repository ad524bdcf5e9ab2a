//! Dependency ordering for the Hearth component runtime.
//!
//! This crate computes the deterministic orderings the lifecycle orchestrator
//! needs: provider-first traversal for startup and consumer-first traversal
//! for shutdown, over a set of components related by declared
//! provider/consumer edges.
//!
//! # Core Types
//!
//! - [`GraphMember`] - the seam a component implements to participate in
//!   ordering
//! - [`DependencyGraph`] - insertion-ordered membership, parent/child graph
//!   linkage, the two orderings and provider/consumer queries
//! - [`GraphError`] - cycle reports (with the full in-progress chain) and
//!   wrapped member failures
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use hearth_graph::{DependencyGraph, GraphMember, MemberError};
//! use hearth_model::ComponentId;
//!
//! #[derive(Debug)]
//! struct Fixed(ComponentId, Vec<ComponentId>);
//!
//! impl GraphMember for Fixed {
//!     fn member_id(&self) -> &ComponentId {
//!         &self.0
//!     }
//!     fn providers(&self) -> Result<Vec<ComponentId>, MemberError> {
//!         Ok(self.1.clone())
//!     }
//! }
//!
//! let db = ComponentId::root("db").expect("valid id");
//! let cache = ComponentId::root("cache").expect("valid id");
//!
//! let graph = DependencyGraph::new();
//! graph
//!     .add(Arc::new(Fixed(cache.clone(), vec![db.clone()])))
//!     .expect("add cache");
//! graph.add(Arc::new(Fixed(db, vec![]))).expect("add db");
//!
//! let order = graph.startup_order().expect("acyclic");
//! assert_eq!(order[1].member_id(), &cache);
//! ```

mod error;
mod graph;
mod member;

pub use error::{GraphError, MemberError};
pub use graph::DependencyGraph;
pub use member::GraphMember;

#[cfg(test)]
mod tests;
