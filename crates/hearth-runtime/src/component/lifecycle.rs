//! Lifecycle operations: initialize, apply, execute, terminate, resolve.
//!
//! Initialization is idempotent and all-or-nothing: handler bindings are
//! validated before any side effect, parts come up provider-first, the
//! backing instance is constructed once, then the automatic initialization
//! transitions run under a revisit guard. Termination mirrors it
//! consumer-first but never fails; every failure along the way is logged and
//! the teardown runs to completion.

use std::sync::Arc;

use hearth_model::Transition;
use tracing::{debug, info, warn};

use super::{Component, Identifiable, Initializable, Transitionable};
use crate::error::RuntimeError;
use crate::events::{InitializedChanged, StateChanged};
use crate::factory::{self, FactoryInputs};
use crate::registry::{HandlerScope, Instance};

/// Tracing target for lifecycle events.
const LIFECYCLE_TARGET: &str = "hearth::lifecycle";

/// What applying a named transition did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The component moved to a new state.
    Applied {
        /// State before the transition.
        from: String,
        /// State after the transition.
        to: String,
    },
    /// The transition targeted the current state; nothing was dispatched.
    NoChange,
}

/// A reference-counted claim on a component.
///
/// Dropping the handle releases the claim; the last release after
/// termination triggers disposal.
#[derive(Debug)]
pub struct ComponentHandle {
    component: Component,
}

impl ComponentHandle {
    /// Returns the claimed component.
    #[must_use]
    pub const fn component(&self) -> &Component {
        &self.component
    }

    /// Returns the claimed component's backing instance.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::NotInitialized`] if the component was
    /// terminated after the claim was taken.
    pub fn instance(&self) -> Result<Instance, RuntimeError> {
        self.component.instance()
    }
}

impl Drop for ComponentHandle {
    fn drop(&mut self) {
        self.component.release_handle();
    }
}

/// Result of resolving a component for use.
pub enum Resolved {
    /// A reference-counted claim keeping the component alive.
    Handle(ComponentHandle),
    /// The bare backing instance, with no claim taken.
    Raw(Instance),
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Handle(handle) => f.debug_tuple("Handle").field(handle).finish(),
            Self::Raw(_) => f.write_str("Raw"),
        }
    }
}

impl Component {
    /// Brings the component into service. Idempotent, and serialized against
    /// every other lifecycle operation on the same component.
    ///
    /// Order: handler-binding validation (fast fail, no side effects), parts
    /// in provider-first order, instance construction, the automatic
    /// initialization transitions, then the initialized flag and its
    /// notification.
    ///
    /// # Errors
    ///
    /// Returns the first failure; the initialized flag stays clear and a
    /// later call starts over.
    pub fn initialize(&self) -> Result<(), RuntimeError> {
        let _ops = self.ops_lock();
        self.initialize_inner()
    }

    fn initialize_inner(&self) -> Result<(), RuntimeError> {
        {
            let mut words = self.lock();
            if words.disposed {
                return Err(RuntimeError::Disposed {
                    id: self.id().clone(),
                });
            }
            if words.initialized {
                return Ok(());
            }
            if !words.validated {
                self.definition().validate_bindings(self.id())?;
                words.validated = true;
            }
        }
        self.initialize_parts()?;
        self.ensure_instance()?;
        self.run_initialize_transitions()?;
        self.lock().initialized = true;
        info!(target: LIFECYCLE_TARGET, component = %self.id(), "initialized");
        self.core().dispatcher().publish_initialized(InitializedChanged {
            id: self.id().clone(),
            initialized: true,
        });
        Ok(())
    }

    /// Returns `true` once initialization has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Returns `true` once the component has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Returns the name of the current lifecycle state.
    #[must_use]
    pub fn current_state(&self) -> String {
        self.lock().current.clone()
    }

    /// Returns the cached backing instance.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::NotInitialized`] when no instance has been
    /// constructed yet (or it was discarded at disposal).
    pub fn instance(&self) -> Result<Instance, RuntimeError> {
        self.lock()
            .instance
            .clone()
            .ok_or_else(|| RuntimeError::NotInitialized {
                id: self.id().clone(),
            })
    }

    /// Applies the named transition, resolved along the state chain. The
    /// component is initialized on demand.
    ///
    /// A transition targeting the current state dispatches nothing and
    /// reports [`TransitionOutcome::NoChange`].
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnknownTransition`] when the key resolves to
    /// nothing from the current state, [`RuntimeError::Disposed`] for a
    /// disposed component, the initialization failure, or the handler's
    /// failure. On handler failure the state does not change.
    pub fn apply(&self, key: &str) -> Result<TransitionOutcome, RuntimeError> {
        let _ops = self.ops_lock();
        self.initialize_inner()?;
        let current = self.current_state();
        let graph = Arc::clone(self.definition().state_graph());
        let transition = graph.find_transition(&current, key)?.cloned().ok_or_else(|| {
            RuntimeError::UnknownTransition {
                id: self.id().clone(),
                state: current.clone(),
                key: key.to_owned(),
            }
        })?;
        if transition.target() == current {
            debug!(
                target: LIFECYCLE_TARGET,
                component = %self.id(),
                state = %current,
                key,
                "transition targets the current state; nothing to do"
            );
            return Ok(TransitionOutcome::NoChange);
        }
        let to = transition.target().to_owned();
        self.dispatch_and_move(&current, key, &transition)?;
        Ok(TransitionOutcome::Applied { from: current, to })
    }

    /// Executes the named operation, resolved along the state chain. The
    /// component is initialized on demand.
    ///
    /// The current state never changes; an operation with no handler is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnknownOperation`] when the key resolves to
    /// nothing from the current state, [`RuntimeError::Disposed`] for a
    /// disposed component, the initialization failure, or the handler's
    /// failure.
    pub fn execute(&self, key: &str) -> Result<(), RuntimeError> {
        let _ops = self.ops_lock();
        self.initialize_inner()?;
        let current = self.current_state();
        let graph = Arc::clone(self.definition().state_graph());
        let operation = graph.find_operation(&current, key)?.cloned().ok_or_else(|| {
            RuntimeError::UnknownOperation {
                id: self.id().clone(),
                state: current.clone(),
                key: key.to_owned(),
            }
        })?;
        operation.handler().map_or(Ok(()), |handler_name| {
            self.dispatch(&current, key, None, handler_name)
        })
    }

    /// Takes the component out of service. Never fails.
    ///
    /// Parts go down consumer-first (falling back to reverse declaration
    /// order if the ordering itself fails), then the automatic terminator
    /// transitions run with loop detection and handler failures logged, the
    /// state resets to the root, the initialized flag clears and cached
    /// context resolutions are dropped. When no handles remain the component
    /// is disposed immediately; otherwise disposal happens at the last
    /// release.
    pub fn terminate(&self) {
        let _ops = self.ops_lock();
        self.terminate_inner();
    }

    fn terminate_inner(&self) {
        {
            let words = self.lock();
            if words.disposed || !words.initialized {
                return;
            }
        }
        self.terminate_parts();
        self.run_terminator_transitions();
        self.context_table().invalidate();
        let root = self.definition().state_graph().root().to_owned();
        let from = {
            let mut words = self.lock();
            words.initialized = false;
            std::mem::replace(&mut words.current, root.clone())
        };
        if from != root {
            self.core().dispatcher().publish_state(StateChanged {
                id: self.id().clone(),
                from,
                to: root,
            });
        }
        info!(target: LIFECYCLE_TARGET, component = %self.id(), "terminated");
        self.core().dispatcher().publish_initialized(InitializedChanged {
            id: self.id().clone(),
            initialized: false,
        });
        let dispose_now = self.lock().handles == 0;
        if dispose_now {
            self.dispose();
        }
    }

    /// Resolves the component for use, initializing it on demand.
    ///
    /// With `proxy` set the claim is counted and returned as a
    /// [`ComponentHandle`]; otherwise the bare instance is returned and no
    /// claim is taken.
    ///
    /// # Errors
    ///
    /// Returns the initialization failure, if any.
    pub fn resolve(&self, proxy: bool) -> Result<Resolved, RuntimeError> {
        let _ops = self.ops_lock();
        self.initialize_inner()?;
        if proxy {
            self.lock().handles += 1;
            Ok(Resolved::Handle(ComponentHandle {
                component: self.clone(),
            }))
        } else {
            Ok(Resolved::Raw(self.instance()?))
        }
    }

    pub(crate) fn release_handle(&self) {
        let dispose_now = {
            let mut words = self.lock();
            words.handles = words.handles.saturating_sub(1);
            words.handles == 0 && !words.initialized && !words.disposed
        };
        if dispose_now {
            self.dispose();
        }
    }

    fn initialize_parts(&self) -> Result<(), RuntimeError> {
        let order = self.graph().startup_order()?;
        for member in order {
            let key = member.member_id().name().to_owned();
            let part = self.parts().get(self.id(), &key)?;
            part.initialize()
                .map_err(|source| RuntimeError::PartFailed {
                    id: self.id().clone(),
                    key,
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }

    fn ensure_instance(&self) -> Result<(), RuntimeError> {
        if self.lock().instance.is_some() {
            return Ok(());
        }
        let settings_profile = self.profile();
        let inputs = FactoryInputs {
            id: self.id(),
            logger: self.logger(),
            parts: self.parts_accessor(),
            context: self.context_accessor(),
            config: settings_profile.config(),
            params: settings_profile.params(),
        };
        let instance = factory::instantiate(self.definition(), inputs)?;
        let mut words = self.lock();
        if words.instance.is_none() {
            words.instance = Some(instance);
        }
        Ok(())
    }

    fn run_initialize_transitions(&self) -> Result<(), RuntimeError> {
        let mut visited: Vec<String> = Vec::new();
        loop {
            let current = self.current_state();
            let graph = Arc::clone(self.definition().state_graph());
            let Some(transition) = graph.state(&current)?.initialize().cloned() else {
                return Ok(());
            };
            if visited.contains(&current) {
                visited.push(current);
                return Err(RuntimeError::RecursiveInitialization {
                    id: self.id().clone(),
                    chain: visited,
                });
            }
            visited.push(current.clone());
            self.dispatch_and_move(&current, "initialize", &transition)?;
        }
    }

    fn run_terminator_transitions(&self) {
        let mut visited: Vec<String> = Vec::new();
        loop {
            let current = self.current_state();
            let graph = Arc::clone(self.definition().state_graph());
            let terminator = match graph.state(&current) {
                Ok(state) => state.terminator().cloned(),
                Err(error) => {
                    warn!(
                        target: LIFECYCLE_TARGET,
                        component = %self.id(),
                        error = %error,
                        "current state missing from graph during termination"
                    );
                    return;
                }
            };
            let Some(transition) = terminator else {
                return;
            };
            if visited.contains(&current) {
                warn!(
                    target: LIFECYCLE_TARGET,
                    component = %self.id(),
                    state = %current,
                    "terminator transitions revisited a state; stopping"
                );
                return;
            }
            visited.push(current.clone());
            // A failing terminator handler does not stop teardown: the state
            // still advances and the rest of the chain runs.
            if let Some(handler_name) = transition.handler()
                && let Err(error) =
                    self.dispatch(&current, "terminate", Some(transition.target()), handler_name)
            {
                warn!(
                    target: LIFECYCLE_TARGET,
                    component = %self.id(),
                    state = %current,
                    error = %error,
                    "terminator handler failed; continuing"
                );
            }
            self.enter_state(&current, transition.target());
        }
    }

    fn terminate_parts(&self) {
        let keys: Vec<String> = match self.graph().shutdown_order() {
            Ok(order) => order
                .iter()
                .map(|member| member.member_id().name().to_owned())
                .collect(),
            Err(error) => {
                warn!(
                    target: LIFECYCLE_TARGET,
                    component = %self.id(),
                    error = %error,
                    "shutdown ordering failed; terminating parts in reverse declaration order"
                );
                self.parts().keys().into_iter().rev().collect()
            }
        };
        for key in keys {
            match self.parts().get(self.id(), &key) {
                Ok(part) => part.terminate(),
                Err(error) => {
                    warn!(
                        target: LIFECYCLE_TARGET,
                        component = %self.id(),
                        part = %key,
                        error = %error,
                        "part missing during termination"
                    );
                }
            }
        }
    }

    fn dispatch_and_move(
        &self,
        from: &str,
        key: &str,
        transition: &Transition,
    ) -> Result<(), RuntimeError> {
        if let Some(handler_name) = transition.handler() {
            self.dispatch(from, key, Some(transition.target()), handler_name)?;
        }
        self.enter_state(from, transition.target());
        Ok(())
    }

    fn enter_state(&self, from: &str, to: &str) {
        if to == from {
            return;
        }
        self.lock().current = to.to_owned();
        debug!(
            target: LIFECYCLE_TARGET,
            component = %self.id(),
            from,
            to,
            "state changed"
        );
        self.core().dispatcher().publish_state(StateChanged {
            id: self.id().clone(),
            from: from.to_owned(),
            to: to.to_owned(),
        });
    }

    fn dispatch(
        &self,
        state: &str,
        key: &str,
        target: Option<&str>,
        handler_name: &str,
    ) -> Result<(), RuntimeError> {
        let instance = self.instance()?;
        let handler = self
            .definition()
            .handler(handler_name)
            .cloned()
            .ok_or_else(|| RuntimeError::InvalidBinding {
                id: self.id().clone(),
                state: state.to_owned(),
                kind: if target.is_some() {
                    format!("transition '{key}'")
                } else {
                    format!("operation '{key}'")
                },
                handler: handler_name.to_owned(),
            })?;
        handler(HandlerScope {
            instance: &instance,
            logger: self.logger(),
            current_state: state,
            target_state: target,
        })
        .map_err(|source| RuntimeError::Handler {
            id: self.id().clone(),
            state: state.to_owned(),
            key: key.to_owned(),
            source,
        })
    }

    /// Tears the whole subtree down, parts first, and unregisters every
    /// component from its membership graph.
    pub(crate) fn dismantle(&self) {
        for (_, part) in self.parts().snapshot() {
            part.dismantle();
        }
        self.dispose();
    }

    fn dispose(&self) {
        let instance = {
            let mut words = self.lock();
            if words.disposed {
                return;
            }
            words.disposed = true;
            words.instance.take()
        };
        if let (Some(instance), Some(disposer)) = (instance, self.definition().disposer()) {
            disposer(&instance);
        }
        if let Some(graph) = self.membership() {
            graph.remove(self.id());
        }
        debug!(target: LIFECYCLE_TARGET, component = %self.id(), "disposed");
    }
}

impl Initializable for Component {
    fn initialize(&self) -> Result<(), RuntimeError> {
        Self::initialize(self)
    }

    fn is_initialized(&self) -> bool {
        Self::is_initialized(self)
    }

    fn terminate(&self) {
        Self::terminate(self);
    }
}

impl Transitionable for Component {
    fn apply(&self, key: &str) -> Result<TransitionOutcome, RuntimeError> {
        Self::apply(self, key)
    }

    fn execute(&self, key: &str) -> Result<(), RuntimeError> {
        Self::execute(self, key)
    }

    fn current_state(&self) -> String {
        Self::current_state(self)
    }
}
