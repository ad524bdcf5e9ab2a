//! Type definitions and the type registry.
//!
//! Reflective handler-by-name dispatch is replaced by explicit registered
//! tables: a [`TypeDefinition`] binds an implementation type key to exactly
//! one constructor, an ordered constructor parameter list, a named handler
//! table, an optional disposer and the type's shared state graph. The
//! [`TypeRegistry`] stores definitions keyed by type key and rejects
//! duplicates, which is what makes "exactly one designated entry point per
//! type" a structural guarantee instead of a runtime search.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use hearth_model::StateGraph;

use crate::error::{CallbackError, RuntimeError};
use crate::factory::ConstructorArgs;
use crate::logging::ScopedLogger;

/// The backing implementation object of a component.
///
/// Instances are type-erased; handlers downcast to their concrete type.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Constructor closure producing a backing instance from resolved arguments.
pub type Constructor =
    Arc<dyn Fn(&ConstructorArgs) -> Result<Instance, CallbackError> + Send + Sync>;

/// Handler closure dispatched for a transition or operation.
pub type Handler = Arc<dyn Fn(HandlerScope<'_>) -> Result<(), CallbackError> + Send + Sync>;

/// Disposer closure invoked best-effort when an instance is discarded.
pub type Disposer = Arc<dyn Fn(&Instance) + Send + Sync>;

/// Everything a handler may dispatch against.
pub struct HandlerScope<'call> {
    /// The component's backing instance.
    pub instance: &'call Instance,
    /// Logger scoped to the component's identity.
    pub logger: &'call ScopedLogger,
    /// Name of the state the dispatch started from.
    pub current_state: &'call str,
    /// Target state for transitions; `None` for operations.
    pub target_state: Option<&'call str>,
}

/// A constructor parameter kind, resolved by the instance factory in
/// declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A logging sink scoped to the component's identity.
    Logger,
    /// A capability proxying to the component's parts table.
    Parts,
    /// A capability proxying to the component's context table.
    Context,
    /// The profile's configuration payload.
    Config,
    /// The profile's parameters payload.
    Params,
}

impl ParamKind {
    fn parse(name: &str, type_key: &str, position: usize) -> Result<Self, RuntimeError> {
        match name {
            "logger" => Ok(Self::Logger),
            "parts" => Ok(Self::Parts),
            "context" => Ok(Self::Context),
            "config" => Ok(Self::Config),
            "params" => Ok(Self::Params),
            _ => Err(RuntimeError::UnsupportedParameter {
                type_key: type_key.to_owned(),
                position,
                name: name.to_owned(),
            }),
        }
    }
}

/// Declarative description of one implementation type.
pub struct TypeDefinition {
    type_key: String,
    params: Vec<ParamKind>,
    constructor: Constructor,
    handlers: HashMap<String, Handler>,
    disposer: Option<Disposer>,
    state_graph: Arc<StateGraph>,
}

impl std::fmt::Debug for TypeDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDefinition")
            .field("type_key", &self.type_key)
            .field("params", &self.params)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("state_graph_root", &self.state_graph.root())
            .finish_non_exhaustive()
    }
}

impl TypeDefinition {
    /// Starts building a definition for the given type key and state graph.
    #[must_use]
    pub fn builder(type_key: impl Into<String>, state_graph: StateGraph) -> TypeDefinitionBuilder {
        TypeDefinitionBuilder {
            type_key: type_key.into(),
            params: Vec::new(),
            constructor: None,
            duplicate_constructor: false,
            handlers: Vec::new(),
            disposer: None,
            state_graph,
        }
    }

    /// Returns the implementation type key.
    #[must_use]
    pub fn type_key(&self) -> &str {
        &self.type_key
    }

    /// Returns the declared constructor parameter kinds, in order.
    #[must_use]
    pub fn params(&self) -> &[ParamKind] {
        &self.params
    }

    /// Returns the constructor.
    #[must_use]
    pub const fn constructor(&self) -> &Constructor {
        &self.constructor
    }

    /// Returns the named handler, if registered.
    #[must_use]
    pub fn handler(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    /// Returns the disposer, if registered.
    #[must_use]
    pub const fn disposer(&self) -> Option<&Disposer> {
        self.disposer.as_ref()
    }

    /// Returns the type's shared state graph.
    #[must_use]
    pub const fn state_graph(&self) -> &Arc<StateGraph> {
        &self.state_graph
    }

    /// Checks every handler reference in the state graph against the
    /// registered handler table.
    ///
    /// Runs once per component, before its first initialization, so broken
    /// bindings fail fast with no side effects.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidBinding`] naming the offending state
    /// and declaration for the first unresolvable reference.
    pub fn validate_bindings(
        &self,
        id: &hearth_model::ComponentId,
    ) -> Result<(), RuntimeError> {
        for binding in self.state_graph.handler_bindings() {
            if !self.handlers.contains_key(&binding.handler) {
                return Err(RuntimeError::InvalidBinding {
                    id: id.clone(),
                    state: binding.state,
                    kind: binding.kind.to_string(),
                    handler: binding.handler,
                });
            }
        }
        Ok(())
    }
}

/// Builder assembling and validating a [`TypeDefinition`].
pub struct TypeDefinitionBuilder {
    type_key: String,
    params: Vec<String>,
    constructor: Option<Constructor>,
    duplicate_constructor: bool,
    handlers: Vec<(String, Handler)>,
    disposer: Option<Disposer>,
    state_graph: StateGraph,
}

impl TypeDefinitionBuilder {
    /// Declares the constructor parameter list by name, in order.
    ///
    /// Supported names: `logger`, `parts`, `context`, `config`, `params`.
    #[must_use]
    pub fn params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the single designated constructor.
    #[must_use]
    pub fn constructor(
        mut self,
        constructor: impl Fn(&ConstructorArgs) -> Result<Instance, CallbackError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        if self.constructor.is_some() {
            self.duplicate_constructor = true;
        }
        self.constructor = Some(Arc::new(constructor));
        self
    }

    /// Registers a named handler.
    #[must_use]
    pub fn handler(
        mut self,
        name: impl Into<String>,
        handler: impl Fn(HandlerScope<'_>) -> Result<(), CallbackError> + Send + Sync + 'static,
    ) -> Self {
        self.handlers.push((name.into(), Arc::new(handler)));
        self
    }

    /// Registers the disposal entry point.
    #[must_use]
    pub fn disposer(mut self, disposer: impl Fn(&Instance) + Send + Sync + 'static) -> Self {
        self.disposer = Some(Arc::new(disposer));
        self
    }

    /// Validates and builds the definition.
    ///
    /// # Errors
    ///
    /// Returns a [`RuntimeError`] when the definition declares zero or more
    /// than one constructor, an unsupported parameter name, or a duplicate
    /// handler name.
    pub fn build(self) -> Result<TypeDefinition, RuntimeError> {
        if self.duplicate_constructor {
            return Err(RuntimeError::DuplicateConstructor {
                type_key: self.type_key,
            });
        }
        let Some(constructor) = self.constructor else {
            return Err(RuntimeError::MissingConstructor {
                type_key: self.type_key,
            });
        };
        let mut params = Vec::with_capacity(self.params.len());
        for (position, name) in self.params.iter().enumerate() {
            params.push(ParamKind::parse(name, &self.type_key, position)?);
        }
        let mut handlers = HashMap::with_capacity(self.handlers.len());
        for (name, handler) in self.handlers {
            if handlers.contains_key(&name) {
                return Err(RuntimeError::DuplicateHandler {
                    type_key: self.type_key,
                    name,
                });
            }
            handlers.insert(name, handler);
        }
        Ok(TypeDefinition {
            type_key: self.type_key,
            params,
            constructor,
            handlers,
            disposer: self.disposer,
            state_graph: Arc::new(self.state_graph),
        })
    }
}

/// Registry of type definitions, keyed by type key.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: RwLock<HashMap<String, Arc<TypeDefinition>>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type definition.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::DuplicateType`] if the type key is taken.
    pub fn register(&self, definition: TypeDefinition) -> Result<(), RuntimeError> {
        // Single-insert mutation; recovering a poisoned guard is safe.
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        if types.contains_key(definition.type_key()) {
            return Err(RuntimeError::DuplicateType {
                type_key: definition.type_key().to_owned(),
            });
        }
        types.insert(definition.type_key().to_owned(), Arc::new(definition));
        Ok(())
    }

    /// Looks a definition up by type key.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnknownType`] if nothing is registered under
    /// the key.
    pub fn get(&self, type_key: &str) -> Result<Arc<TypeDefinition>, RuntimeError> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_key)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownType {
                type_key: type_key.to_owned(),
            })
    }

    /// Returns the number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when no definitions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
