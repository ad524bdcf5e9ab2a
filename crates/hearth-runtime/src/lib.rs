//! The Hearth component lifecycle runtime.
//!
//! This crate ties the model and graph layers together: registered type
//! definitions construct type-erased instances, components compose into
//! trees of parts with lazily-resolved context, and the orchestrator drives
//! the lifecycle — dependency-ordered initialization, named transitions and
//! operations resolved along the state chain, and never-failing teardown.
//!
//! # Core Types
//!
//! - [`Orchestrator`] - runtime settings, type registry, event dispatch and
//!   the root of the component hierarchy
//! - [`TypeDefinition`] / [`TypeRegistry`] - explicit constructor, handler
//!   and disposer tables per implementation type
//! - [`Component`] - the managed aggregate, with the [`Identifiable`],
//!   [`Initializable`], [`Transitionable`] and [`Containing`] capabilities
//! - [`EventDispatcher`] - non-blocking lifecycle notifications on a worker
//!   thread
//! - [`RuntimeError`] - the runtime's error taxonomy
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use hearth_model::StateGraph;
//! use hearth_runtime::{Orchestrator, Profile, TypeDefinition};
//!
//! let orchestrator = Orchestrator::builder().build();
//! let definition = TypeDefinition::builder("greeter", StateGraph::single("idle"))
//!     .constructor(|_| Ok(Arc::new(String::from("hello"))))
//!     .build()
//!     .expect("valid definition");
//! orchestrator.register_type(definition).expect("fresh key");
//!
//! let greeter = orchestrator
//!     .create("greeter", Profile::new("greeter"))
//!     .expect("profile is valid");
//! greeter.initialize().expect("initializes");
//! assert!(greeter.is_initialized());
//! orchestrator.shutdown();
//! ```

mod component;
mod composition;
mod error;
mod events;
mod external;
mod factory;
mod logging;
mod orchestrator;
mod registry;

pub use component::{
    Component, ComponentHandle, Containing, ContextAccessor, Identifiable, Initializable,
    PartsAccessor, Resolved, Transitionable, TransitionOutcome,
};
pub use composition::ContextValue;
pub use error::{CallbackError, RuntimeError};
pub use events::{
    EventDispatcher, InitializedChanged, LifecycleListener, StateChanged, StateListener,
};
pub use external::{ProfileSupplier, RegistryListener, SystemRegistry};
pub use factory::{Argument, ConstructorArgs};
pub use logging::ScopedLogger;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, RuntimeSettings};
pub use registry::{
    Constructor, Disposer, Handler, HandlerScope, Instance, ParamKind, TypeDefinition,
    TypeDefinitionBuilder, TypeRegistry,
};

// Re-exported so embedders can build profiles and state graphs without a
// separate model dependency.
pub use hearth_model::{
    ComponentId, ContextDecl, ContextSpec, Operation, Profile, State, StateGraph, Transition,
    Value, ValueSpec,
};
