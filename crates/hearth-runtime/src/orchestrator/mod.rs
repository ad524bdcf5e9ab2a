//! The orchestrator: runtime settings, shared core and the root of the
//! component hierarchy.
//!
//! An [`Orchestrator`] owns the type registry, the event dispatcher and the
//! root dependency graph. Root components are created from validated
//! profiles (directly or through a [`ProfileSupplier`]) and terminated in
//! reverse creation order at shutdown.

use std::sync::{Arc, Mutex, PoisonError};

use camino::Utf8PathBuf;
use hearth_graph::DependencyGraph;
use hearth_model::{ComponentId, Profile};
use tracing::info;

use crate::component::{Component, Identifiable};
use crate::error::RuntimeError;
use crate::events::{EventDispatcher, LifecycleListener, StateListener};
use crate::external::{ProfileSupplier, SystemRegistry};
use crate::registry::{TypeDefinition, TypeRegistry};

/// Tracing target for orchestrator events.
const ORCHESTRATOR_TARGET: &str = "hearth::lifecycle";

/// Default capacity of the notification queue.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Ambient settings shared by every component of one orchestrator.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    work_dir: Utf8PathBuf,
    temp_dir: Utf8PathBuf,
    event_capacity: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        let temp_dir = Utf8PathBuf::from_path_buf(std::env::temp_dir())
            .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"));
        Self {
            work_dir: Utf8PathBuf::from("."),
            temp_dir,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl RuntimeSettings {
    /// Returns the working directory symbolic values resolve against.
    #[must_use]
    pub const fn work_dir(&self) -> &Utf8PathBuf {
        &self.work_dir
    }

    /// Returns the temporary directory symbolic values resolve against.
    #[must_use]
    pub const fn temp_dir(&self) -> &Utf8PathBuf {
        &self.temp_dir
    }

    /// Returns the notification queue capacity.
    #[must_use]
    pub const fn event_capacity(&self) -> usize {
        self.event_capacity
    }
}

/// Shared state every component of one orchestrator holds onto.
pub(crate) struct RuntimeCore {
    registry: TypeRegistry,
    dispatcher: EventDispatcher,
    settings: RuntimeSettings,
    system: Option<Arc<dyn SystemRegistry>>,
}

impl RuntimeCore {
    pub(crate) fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub(crate) fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub(crate) fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub(crate) fn system(&self) -> Option<&Arc<dyn SystemRegistry>> {
        self.system.as_ref()
    }
}

/// Builder for an [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    settings: RuntimeSettings,
    system: Option<Arc<dyn SystemRegistry>>,
}

impl OrchestratorBuilder {
    /// Sets the working directory.
    #[must_use]
    pub fn with_work_dir(mut self, work_dir: impl Into<Utf8PathBuf>) -> Self {
        self.settings.work_dir = work_dir.into();
        self
    }

    /// Sets the temporary directory.
    #[must_use]
    pub fn with_temp_dir(mut self, temp_dir: impl Into<Utf8PathBuf>) -> Self {
        self.settings.temp_dir = temp_dir.into();
        self
    }

    /// Sets the notification queue capacity.
    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.settings.event_capacity = capacity;
        self
    }

    /// Installs the ambient system registry consulted at the top of service
    /// lookups.
    #[must_use]
    pub fn with_system_registry(mut self, system: Arc<dyn SystemRegistry>) -> Self {
        self.system = Some(system);
        self
    }

    /// Builds the orchestrator and starts its event dispatcher.
    #[must_use]
    pub fn build(self) -> Orchestrator {
        Orchestrator {
            core: Arc::new(RuntimeCore {
                registry: TypeRegistry::new(),
                dispatcher: EventDispatcher::new(self.settings.event_capacity),
                settings: self.settings,
                system: self.system,
            }),
            graph: Arc::new(DependencyGraph::new()),
            roots: Mutex::new(Vec::new()),
        }
    }
}

/// The component lifecycle runtime.
pub struct Orchestrator {
    core: Arc<RuntimeCore>,
    graph: Arc<DependencyGraph>,
    roots: Mutex<Vec<Component>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("types", &self.core.registry.len())
            .field("roots", &self.roots().len())
            .finish_non_exhaustive()
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Orchestrator {
    /// Starts building an orchestrator.
    #[must_use]
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Returns the orchestrator's settings.
    #[must_use]
    pub fn settings(&self) -> &RuntimeSettings {
        &self.core.settings
    }

    /// Registers an implementation type definition.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::DuplicateType`] when the type key is taken.
    pub fn register_type(&self, definition: TypeDefinition) -> Result<(), RuntimeError> {
        self.core.registry.register(definition)
    }

    /// Creates the root component named `name` from a validated profile,
    /// together with its whole declared part tree. Nothing is initialized.
    ///
    /// # Errors
    ///
    /// Returns a [`RuntimeError`] when the profile is invalid, a named type
    /// key is unregistered, or a declared key is duplicated.
    pub fn create(&self, name: &str, profile: Profile) -> Result<Component, RuntimeError> {
        profile.validate()?;
        let id = ComponentId::root(name)?;
        let component = Component::build(&self.core, None, &self.graph, id, profile)?;
        info!(
            target: ORCHESTRATOR_TARGET,
            component = %component.id(),
            "component tree created"
        );
        self.roots_lock().push(component.clone());
        Ok(component)
    }

    /// Creates the root component named `name`, fetching its profile from
    /// the supplier.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Supplier`] when the supplier fails, or any
    /// error [`Orchestrator::create`] reports.
    pub fn create_from(
        &self,
        supplier: &dyn ProfileSupplier,
        name: &str,
    ) -> Result<Component, RuntimeError> {
        let id = ComponentId::root(name)?;
        let profile = supplier
            .profile_for(&id)
            .map_err(|source| RuntimeError::Supplier {
                id: id.clone(),
                source,
            })?;
        self.create(name, profile)
    }

    /// Returns the root component with the given name, if one exists.
    #[must_use]
    pub fn root(&self, name: &str) -> Option<Component> {
        self.roots()
            .into_iter()
            .find(|component| component.id().name() == name)
    }

    /// Returns the root components, in creation order.
    #[must_use]
    pub fn roots(&self) -> Vec<Component> {
        self.roots_lock().clone()
    }

    /// Registers a state-changed listener.
    pub fn add_state_listener(&self, listener: Arc<dyn StateListener>) {
        self.core.dispatcher.add_state_listener(listener);
    }

    /// Removes a previously registered state-changed listener.
    pub fn remove_state_listener(&self, listener: &Arc<dyn StateListener>) {
        self.core.dispatcher.remove_state_listener(listener);
    }

    /// Registers an initialized-flag listener.
    pub fn add_lifecycle_listener(&self, listener: Arc<dyn LifecycleListener>) {
        self.core.dispatcher.add_lifecycle_listener(listener);
    }

    /// Terminates every root component in reverse creation order and stops
    /// the event dispatcher after queued notifications drain.
    pub fn shutdown(&self) {
        let roots = {
            let mut roots = self.roots_lock();
            std::mem::take(&mut *roots)
        };
        for component in roots.iter().rev() {
            component.terminate();
        }
        self.core.dispatcher.shutdown();
        info!(target: ORCHESTRATOR_TARGET, "orchestrator shut down");
    }

    fn roots_lock(&self) -> std::sync::MutexGuard<'_, Vec<Component>> {
        self.roots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
