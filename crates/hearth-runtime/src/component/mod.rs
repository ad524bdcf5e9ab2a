//! The component aggregate: identity, profile, composition and lifecycle
//! words under one cheaply-clonable handle.
//!
//! A [`Component`] is an `Arc` over its shared state. The containment tree is
//! strong downwards (parts tables own their children) and weak upwards
//! (children hold a weak parent reference), so dropping a container releases
//! the whole subtree. Each container also owns a dependency graph of its
//! parts, nested under the graph the container itself is a member of; the
//! component is removed from that graph at disposal.
//!
//! Lifecycle operations live in the sibling `lifecycle` module; this module
//! holds the data shape, the capability traits and context resolution.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use hearth_graph::{DependencyGraph, GraphMember, MemberError};
use hearth_model::{ComponentId, ContextSpec, Profile, ResolveContext};

use crate::composition::{ContextTable, ContextValue, PartsTable};
use crate::error::RuntimeError;
use crate::logging::ScopedLogger;
use crate::orchestrator::RuntimeCore;
use crate::registry::{Instance, TypeDefinition};

mod lifecycle;

pub use lifecycle::{ComponentHandle, Resolved, TransitionOutcome};

/// Mutable lifecycle words, guarded by the per-component mutex.
pub(crate) struct Lifecycle {
    pub(crate) current: String,
    pub(crate) initialized: bool,
    pub(crate) disposed: bool,
    pub(crate) validated: bool,
    pub(crate) instance: Option<Instance>,
    pub(crate) handles: u64,
}

pub(crate) struct ComponentInner {
    id: ComponentId,
    profile: Profile,
    parent: Weak<ComponentInner>,
    membership: Weak<DependencyGraph>,
    definition: Arc<TypeDefinition>,
    core: Arc<RuntimeCore>,
    lifecycle: Mutex<Lifecycle>,
    ops: Mutex<()>,
    parts: PartsTable,
    context: ContextTable,
    graph: Arc<DependencyGraph>,
    logger: ScopedLogger,
}

/// A managed component: a cheap clone over shared state.
#[derive(Clone)]
pub struct Component {
    inner: Arc<ComponentInner>,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.inner.id)
            .field("type_key", &self.inner.profile.type_key())
            .finish_non_exhaustive()
    }
}

impl Component {
    /// Builds the component and, recursively, its declared parts.
    ///
    /// The component registers itself as a member of `membership` (its
    /// container's graph) and creates a nested graph for its own parts.
    pub(crate) fn build(
        core: &Arc<RuntimeCore>,
        parent: Option<&Component>,
        membership: &Arc<DependencyGraph>,
        id: ComponentId,
        profile: Profile,
    ) -> Result<Self, RuntimeError> {
        let definition = core.registry().get(profile.type_key())?;
        let root_state = definition.state_graph().root().to_owned();
        let logger = ScopedLogger::for_component(&id);
        let inner = Arc::new(ComponentInner {
            id,
            profile,
            parent: parent.map_or_else(Weak::new, |component| Arc::downgrade(&component.inner)),
            membership: Arc::downgrade(membership),
            definition,
            core: Arc::clone(core),
            lifecycle: Mutex::new(Lifecycle {
                current: root_state,
                initialized: false,
                disposed: false,
                validated: false,
                instance: None,
                handles: 0,
            }),
            ops: Mutex::new(()),
            parts: PartsTable::new(),
            context: ContextTable::new(),
            graph: DependencyGraph::new_child(membership),
            logger,
        });
        let component = Self { inner };
        membership.add(Arc::new(component.clone()))?;
        if let Err(error) = component.populate(core) {
            // Unregister the half-built tree so the identity can be reused.
            component.dismantle();
            return Err(error);
        }
        Ok(component)
    }

    fn populate(&self, core: &Arc<RuntimeCore>) -> Result<(), RuntimeError> {
        for decl in self.inner.profile.context() {
            self.inner.context.add(self.id(), decl.key(), decl.clone())?;
        }
        for part in self.inner.profile.parts() {
            let child_id = self.id().child(part.key())?;
            let child = Self::build(
                core,
                Some(self),
                &self.inner.graph,
                child_id,
                part.profile().clone(),
            )?;
            self.inner.parts.add(self.id(), part.key(), child)?;
        }
        Ok(())
    }

    /// Returns the containing component, if it is still alive.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.inner.parent.upgrade().map(|inner| Self { inner })
    }

    /// Returns the component's scoped logger.
    #[must_use]
    pub fn logger(&self) -> &ScopedLogger {
        &self.inner.logger
    }

    /// Returns a parts capability bound to this component.
    #[must_use]
    pub fn parts_accessor(&self) -> PartsAccessor {
        PartsAccessor {
            id: self.inner.id.clone(),
            owner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns a context capability bound to this component.
    #[must_use]
    pub fn context_accessor(&self) -> ContextAccessor {
        ContextAccessor {
            id: self.inner.id.clone(),
            owner: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn definition(&self) -> &Arc<TypeDefinition> {
        &self.inner.definition
    }

    pub(crate) fn core(&self) -> &Arc<RuntimeCore> {
        &self.inner.core
    }

    pub(crate) fn parts(&self) -> &PartsTable {
        &self.inner.parts
    }

    pub(crate) fn graph(&self) -> &Arc<DependencyGraph> {
        &self.inner.graph
    }

    pub(crate) fn membership(&self) -> Option<Arc<DependencyGraph>> {
        self.inner.membership.upgrade()
    }

    // The words are plain flags and counters; a poisoned guard is coherent.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn context_table(&self) -> &ContextTable {
        &self.inner.context
    }

    // Serializes whole lifecycle operations on this component. Held across
    // callbacks and part operations; nested acquisition is always parent
    // before child along the containment tree.
    pub(crate) fn ops_lock(&self) -> MutexGuard<'_, ()> {
        self.inner.ops.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolves one context entry by key.
    ///
    /// Cached values win; otherwise the declaration is resolved and the
    /// result cached when the entry is non-volatile.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ContextNotFound`] for an unknown key, or the
    /// underlying part, service or value resolution failure.
    pub fn resolve_context(&self, key: &str) -> Result<ContextValue, RuntimeError> {
        if let Some(cached) = self.inner.context.cached(key) {
            return Ok(cached);
        }
        let decl = self.inner.context.declaration(self.id(), key)?;
        let value = self.resolve_context_spec(key, decl.spec())?;
        if !decl.is_volatile() {
            self.inner.context.cache(key, value.clone());
        }
        Ok(value)
    }

    fn resolve_context_spec(
        &self,
        key: &str,
        spec: &ContextSpec,
    ) -> Result<ContextValue, RuntimeError> {
        match spec {
            ContextSpec::Part(part_key) => {
                let part = self.inner.parts.get(self.id(), part_key)?;
                part.initialize()?;
                Ok(ContextValue::Instance(part.instance()?))
            }
            ContextSpec::Service(contract) => {
                Ok(ContextValue::Instance(self.find_service(contract)?))
            }
            ContextSpec::Value(value_spec) => {
                let settings = self.inner.core.settings();
                let ctx = ResolveContext::new(
                    settings.work_dir().clone(),
                    settings.temp_dir().clone(),
                    self.id().clone(),
                );
                let value =
                    value_spec
                        .resolve(&ctx)
                        .map_err(|source| RuntimeError::ValueResolution {
                            id: self.id().clone(),
                            key: key.to_owned(),
                            source,
                        })?;
                Ok(ContextValue::Value(value))
            }
        }
    }

    /// Finds the backing instance of a component publishing the contract.
    ///
    /// Searches this component's own parts, then each ancestor's parts, and
    /// finally delegates to the ambient system registry if one is installed.
    /// The provider is initialized on demand. The requesting component never
    /// satisfies its own lookup.
    pub(crate) fn find_service(&self, contract: &str) -> Result<Instance, RuntimeError> {
        let mut scope = Some(self.clone());
        while let Some(component) = scope {
            for (_, part) in component.inner.parts.snapshot() {
                if part.id() != self.id() && part.profile().publishes(contract) {
                    part.initialize()?;
                    return part.instance();
                }
            }
            scope = component.parent();
        }
        if let Some(system) = self.inner.core.system()
            && let Some(instance) = system.get_by_contract(contract)
        {
            return Ok(instance);
        }
        Err(RuntimeError::ServiceNotFound {
            id: self.id().clone(),
            contract: contract.to_owned(),
        })
    }
}

impl GraphMember for Component {
    fn member_id(&self) -> &ComponentId {
        &self.inner.id
    }

    fn providers(&self) -> Result<Vec<ComponentId>, MemberError> {
        let Some(parent) = self.parent() else {
            // A root component's declared dependencies have no sibling scope.
            return Ok(Vec::new());
        };
        let dependencies = self.inner.profile.dependencies();
        let mut providers = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            let provider = parent
                .id()
                .child(dependency)
                .map_err(|error| MemberError::new(error.to_string()))?;
            providers.push(provider);
        }
        Ok(providers)
    }
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Anything with a stable identity and a descriptor.
pub trait Identifiable {
    /// Returns the stable identity.
    fn id(&self) -> &ComponentId;

    /// Returns the immutable descriptor.
    fn profile(&self) -> &Profile;
}

/// Anything that can be brought into and out of service.
pub trait Initializable {
    /// Brings the component (and its parts) into service. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a [`RuntimeError`] naming the first failing step; no partial
    /// success is recorded.
    fn initialize(&self) -> Result<(), RuntimeError>;

    /// Returns `true` once initialization has completed.
    fn is_initialized(&self) -> bool;

    /// Takes the component (and its parts) out of service. Never fails;
    /// failures along the way are logged and termination runs to completion.
    fn terminate(&self);
}

/// Anything whose lifecycle state can be driven by name.
pub trait Transitionable {
    /// Applies the named transition, resolved along the state chain. The
    /// component is initialized on demand.
    ///
    /// # Errors
    ///
    /// Returns a [`RuntimeError`] when the key resolves to nothing, the
    /// component is disposed, initialization fails, or the bound handler
    /// fails.
    fn apply(&self, key: &str) -> Result<TransitionOutcome, RuntimeError>;

    /// Executes the named operation, resolved along the state chain. The
    /// component is initialized on demand; the current state never changes.
    ///
    /// # Errors
    ///
    /// Returns a [`RuntimeError`] when the key resolves to nothing, the
    /// component is disposed, initialization fails, or the bound handler
    /// fails.
    fn execute(&self, key: &str) -> Result<(), RuntimeError>;

    /// Returns the name of the current state.
    fn current_state(&self) -> String;
}

/// Anything that owns addressable sub-parts.
pub trait Containing {
    /// Returns the part registered under the key.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::PartNotFound`] for an unknown key.
    fn part(&self, key: &str) -> Result<Component, RuntimeError>;

    /// Returns the part keys, in declaration order.
    fn part_keys(&self) -> Vec<String>;
}

impl Identifiable for Component {
    fn id(&self) -> &ComponentId {
        &self.inner.id
    }

    fn profile(&self) -> &Profile {
        &self.inner.profile
    }
}

impl Containing for Component {
    fn part(&self, key: &str) -> Result<Self, RuntimeError> {
        self.inner.parts.get(self.id(), key)
    }

    fn part_keys(&self) -> Vec<String> {
        self.inner.parts.keys()
    }
}

// ---------------------------------------------------------------------------
// Capabilities handed to constructors
// ---------------------------------------------------------------------------

/// Constructor-visible capability over a component's parts table.
///
/// Holds the owner weakly so a captured accessor cannot keep a disposed
/// component tree alive.
#[derive(Clone)]
pub struct PartsAccessor {
    id: ComponentId,
    owner: Weak<ComponentInner>,
}

impl std::fmt::Debug for PartsAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartsAccessor").field("id", &self.id).finish()
    }
}

impl PartsAccessor {
    fn owner(&self) -> Result<Component, RuntimeError> {
        self.owner
            .upgrade()
            .map(|inner| Component { inner })
            .ok_or_else(|| RuntimeError::Disposed {
                id: self.id.clone(),
            })
    }

    /// Returns the backing instance of the part under the key, initializing
    /// the part on demand.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::PartNotFound`] for an unknown key, or the
    /// part's own initialization failure.
    pub fn get(&self, key: &str) -> Result<Instance, RuntimeError> {
        let owner = self.owner()?;
        let part = owner.inner.parts.get(&self.id, key)?;
        part.initialize()?;
        part.instance()
    }

    /// Returns the part keys, in declaration order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.owner()
            .map(|owner| owner.inner.parts.keys())
            .unwrap_or_default()
    }
}

/// Constructor-visible capability over a component's context table.
#[derive(Clone)]
pub struct ContextAccessor {
    id: ComponentId,
    owner: Weak<ComponentInner>,
}

impl std::fmt::Debug for ContextAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextAccessor")
            .field("id", &self.id)
            .finish()
    }
}

impl ContextAccessor {
    fn owner(&self) -> Result<Component, RuntimeError> {
        self.owner
            .upgrade()
            .map(|inner| Component { inner })
            .ok_or_else(|| RuntimeError::Disposed {
                id: self.id.clone(),
            })
    }

    /// Resolves the context entry under the key.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ContextNotFound`] for an unknown key, or the
    /// underlying resolution failure.
    pub fn get(&self, key: &str) -> Result<ContextValue, RuntimeError> {
        self.owner()?.resolve_context(key)
    }

    /// Returns the context keys, in declaration order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.owner()
            .map(|owner| owner.inner.context.keys())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests;
