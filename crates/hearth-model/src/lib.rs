//! Declarative model types for the Hearth component runtime.
//!
//! This crate is the leaf of the Hearth workspace: it defines the vocabulary
//! the dependency graph and the lifecycle runtime are built on, with no
//! behaviour of its own beyond validation and value resolution.
//!
//! # Core Types
//!
//! - [`ComponentId`] — stable URI-like component identity
//! - [`Profile`] — immutable component descriptor (type key, services,
//!   dependencies, parts, context bindings, configuration, parameters)
//! - [`StateGraph`] — immutable per-type lifecycle state machine with
//!   state-chain lookup semantics
//! - [`ValueSpec`] / [`Value`] — recursive value specifications and the
//!   resolver that turns them into concrete values
//!
//! # Example
//!
//! ```
//! use hearth_model::{Profile, State, StateGraph, Transition};
//!
//! let graph = StateGraph::builder("created")
//!     .state(
//!         State::named("created")
//!             .on_initialize(Transition::with_handler("started", "start"))
//!             .build(),
//!     )
//!     .state(State::named("started").build())
//!     .build()
//!     .expect("graph is well formed");
//!
//! let profile = Profile::new("app").with_part("db", Profile::new("database"));
//! profile.validate().expect("profile is well formed");
//! assert_eq!(graph.root(), "created");
//! ```

mod error;
mod identity;
mod profile;
mod state;
mod value;

pub use error::ModelError;
pub use identity::ComponentId;
pub use profile::{ContextDecl, ContextSpec, PartDecl, Profile};
pub use state::{
    BindingKind, HandlerBinding, Operation, State, StateBuilder, StateGraph, StateGraphBuilder,
    Transition,
};
pub use value::{ResolveContext, Value, ValueSpec};

#[cfg(test)]
mod tests;
