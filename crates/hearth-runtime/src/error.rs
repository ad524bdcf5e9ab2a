//! Domain errors raised by runtime operations.
//!
//! The taxonomy follows the lifecycle contract: *validation* errors surface
//! before any side effect, *construction* errors are wrapped with component
//! and type context, graph and model failures are carried through with
//! `#[from]`, and user-code failures (constructors, handlers) arrive as an
//! opaque [`CallbackError`] so the runtime never depends on embedder error
//! types.

use hearth_graph::GraphError;
use hearth_model::{ComponentId, ModelError};
use thiserror::Error;

/// Failure reported by embedder-supplied code: a constructor, a handler, a
/// profile supplier.
///
/// Carries a description only; embedders convert their own error types via
/// [`CallbackError::new`] or the `From<String>` / `From<&str>` impls.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CallbackError {
    message: String,
}

impl CallbackError {
    /// Creates a callback error from a description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for CallbackError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for CallbackError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_owned(),
        }
    }
}

/// Errors returned by runtime operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A model-layer failure (identity, profile, state graph, value spec).
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A dependency graph failure (cycle, member failure).
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A profile named an implementation type key with no registered
    /// definition.
    #[error("no type definition registered for '{type_key}'")]
    UnknownType {
        /// The type key that was looked up.
        type_key: String,
    },

    /// A type definition was registered twice.
    #[error("type definition '{type_key}' is already registered")]
    DuplicateType {
        /// The type key that was registered twice.
        type_key: String,
    },

    /// A type definition declared no constructor.
    #[error("type definition '{type_key}' declares no constructor")]
    MissingConstructor {
        /// The offending type key.
        type_key: String,
    },

    /// A type definition declared more than one constructor.
    #[error("type definition '{type_key}' declares more than one constructor")]
    DuplicateConstructor {
        /// The offending type key.
        type_key: String,
    },

    /// A type definition declared the same handler name twice.
    #[error("type definition '{type_key}' declares handler '{name}' twice")]
    DuplicateHandler {
        /// The offending type key.
        type_key: String,
        /// The duplicated handler name.
        name: String,
    },

    /// A constructor parameter name is not one of the supported kinds.
    #[error(
        "type definition '{type_key}' declares unsupported parameter '{name}' at position {position}"
    )]
    UnsupportedParameter {
        /// The offending type key.
        type_key: String,
        /// Zero-based position of the parameter.
        position: usize,
        /// The unrecognised parameter name.
        name: String,
    },

    /// A state graph references a handler the type definition does not
    /// register.
    #[error("component '{id}': state '{state}' binds {kind} to unknown handler '{handler}'")]
    InvalidBinding {
        /// The component whose bindings were validated.
        id: ComponentId,
        /// The state declaring the binding.
        state: String,
        /// Which declaration carries the binding (rendered
        /// [`BindingKind`](hearth_model::BindingKind)).
        kind: String,
        /// The unresolvable handler name.
        handler: String,
    },

    /// A transition key resolved to nothing along the state chain.
    #[error("component '{id}': no transition '{key}' reachable from state '{state}'")]
    UnknownTransition {
        /// The component the transition was requested on.
        id: ComponentId,
        /// The state the lookup started from.
        state: String,
        /// The requested transition key.
        key: String,
    },

    /// An operation key resolved to nothing along the state chain.
    #[error("component '{id}': no operation '{key}' reachable from state '{state}'")]
    UnknownOperation {
        /// The component the operation was requested on.
        id: ComponentId,
        /// The state the lookup started from.
        state: String,
        /// The requested operation key.
        key: String,
    },

    /// A part was registered under a key that is already taken.
    #[error("component '{id}': part '{key}' is already registered")]
    DuplicatePart {
        /// The owning component.
        id: ComponentId,
        /// The duplicated key.
        key: String,
    },

    /// A context entry was registered under a key that is already taken.
    #[error("component '{id}': context entry '{key}' is already registered")]
    DuplicateContext {
        /// The owning component.
        id: ComponentId,
        /// The duplicated key.
        key: String,
    },

    /// A part lookup found nothing under the key.
    #[error("component '{id}': no part registered under '{key}'")]
    PartNotFound {
        /// The owning component.
        id: ComponentId,
        /// The key that was looked up.
        key: String,
    },

    /// A context lookup found nothing under the key.
    #[error("component '{id}': no context entry registered under '{key}'")]
    ContextNotFound {
        /// The owning component.
        id: ComponentId,
        /// The key that was looked up.
        key: String,
    },

    /// A service lookup exhausted the container hierarchy.
    #[error("component '{id}': no provider found for service contract '{contract}'")]
    ServiceNotFound {
        /// The component that requested the service.
        id: ComponentId,
        /// The unsatisfied contract name.
        contract: String,
    },

    /// The backing instance could not be constructed.
    #[error("component '{id}' (type '{type_key}') failed to construct")]
    Instantiation {
        /// The component being constructed.
        id: ComponentId,
        /// Its implementation type key.
        type_key: String,
        /// The constructor's own failure.
        #[source]
        source: CallbackError,
    },

    /// A handler dispatch failed.
    #[error("component '{id}': handler for '{key}' failed in state '{state}'")]
    Handler {
        /// The component the handler ran against.
        id: ComponentId,
        /// The state the dispatch started from.
        state: String,
        /// The transition or operation key that named the handler.
        key: String,
        /// The handler's own failure.
        #[source]
        source: CallbackError,
    },

    /// A context value failed to resolve.
    #[error("component '{id}': context entry '{key}' failed to resolve")]
    ValueResolution {
        /// The owning component.
        id: ComponentId,
        /// The context key being resolved.
        key: String,
        /// The underlying resolution failure.
        #[source]
        source: ModelError,
    },

    /// The initialization-transition loop revisited a state.
    #[error(
        "component '{id}': recursive initialization, visited chain: {}",
        chain.join(" -> ")
    )]
    RecursiveInitialization {
        /// The component being initialized.
        id: ComponentId,
        /// The visited state names, in order, ending at the revisited state.
        chain: Vec<String>,
    },

    /// A part failed during container initialization.
    #[error("component '{id}': part '{key}' failed to initialize")]
    PartFailed {
        /// The container.
        id: ComponentId,
        /// The failing part's key.
        key: String,
        /// The part's own failure.
        #[source]
        source: Box<RuntimeError>,
    },

    /// The backing instance was requested before the component was
    /// initialized (or after it was discarded at disposal).
    #[error("component '{id}' is not initialized")]
    NotInitialized {
        /// The uninitialized component.
        id: ComponentId,
    },

    /// A lifecycle operation was requested on a disposed component.
    #[error("component '{id}' is disposed")]
    Disposed {
        /// The disposed component.
        id: ComponentId,
    },

    /// A profile supplier failed to produce a profile.
    #[error("no profile available for component '{id}'")]
    Supplier {
        /// The identity that was looked up.
        id: ComponentId,
        /// The supplier's own failure.
        #[source]
        source: CallbackError,
    },
}
