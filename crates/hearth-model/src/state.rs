//! State-machine types describing a component type's lifecycle.
//!
//! A [`StateGraph`] is built once per component type, validated, and shared
//! immutably (via `Arc`) by every component of that type. Each [`State`] may
//! carry an automatic initialization transition, an automatic terminator
//! transition, named transitions and named operations, and an optional parent
//! state. Named lookups walk the parent chain ("state chain"): an entry
//! declared closer to the current state overrides one declared higher up.
//! The automatic transitions are deliberately *not* chained — they belong to
//! the exact state the component is in.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A state change: the target state plus an optional handler reference.
///
/// The handler reference names an entry in the owning type's registered
/// handler table; it is validated against that table before the component's
/// first initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    target: String,
    handler: Option<String>,
}

impl Transition {
    /// Creates a transition to `target` with no handler.
    #[must_use]
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            handler: None,
        }
    }

    /// Creates a transition to `target` dispatching the named handler.
    #[must_use]
    pub fn with_handler(target: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            handler: Some(handler.into()),
        }
    }

    /// Returns the target state name.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the handler reference, if any.
    #[must_use]
    pub fn handler(&self) -> Option<&str> {
        self.handler.as_deref()
    }
}

/// A side-effecting, non-transitioning operation bound to a state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    handler: Option<String>,
}

impl Operation {
    /// Creates an operation dispatching the named handler.
    #[must_use]
    pub fn with_handler(handler: impl Into<String>) -> Self {
        Self {
            handler: Some(handler.into()),
        }
    }

    /// Creates an operation with no handler (executing it is a no-op).
    #[must_use]
    pub const fn noop() -> Self {
        Self { handler: None }
    }

    /// Returns the handler reference, if any.
    #[must_use]
    pub fn handler(&self) -> Option<&str> {
        self.handler.as_deref()
    }
}

/// A node in a component type's state graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    name: String,
    parent: Option<String>,
    initialize: Option<Transition>,
    terminator: Option<Transition>,
    transitions: HashMap<String, Transition>,
    operations: HashMap<String, Operation>,
}

impl State {
    /// Starts building a state with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> StateBuilder {
        StateBuilder {
            state: Self {
                name: name.into(),
                parent: None,
                initialize: None,
                terminator: None,
                transitions: HashMap::new(),
                operations: HashMap::new(),
            },
        }
    }

    /// Returns the state name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parent state name, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Returns the automatic initialization transition, if any.
    #[must_use]
    pub const fn initialize(&self) -> Option<&Transition> {
        self.initialize.as_ref()
    }

    /// Returns the automatic terminator transition, if any.
    #[must_use]
    pub const fn terminator(&self) -> Option<&Transition> {
        self.terminator.as_ref()
    }

    /// Returns the transition declared locally under `key`, ignoring the
    /// state chain.
    #[must_use]
    pub fn local_transition(&self, key: &str) -> Option<&Transition> {
        self.transitions.get(key)
    }

    /// Returns the operation declared locally under `key`, ignoring the
    /// state chain.
    #[must_use]
    pub fn local_operation(&self, key: &str) -> Option<&Operation> {
        self.operations.get(key)
    }
}

/// Builder for a single [`State`].
#[derive(Debug)]
pub struct StateBuilder {
    state: State,
}

impl StateBuilder {
    /// Sets the parent state for chained lookup.
    #[must_use]
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.state.parent = Some(parent.into());
        self
    }

    /// Sets the automatic initialization transition.
    #[must_use]
    pub fn on_initialize(mut self, transition: Transition) -> Self {
        self.state.initialize = Some(transition);
        self
    }

    /// Sets the automatic terminator transition.
    #[must_use]
    pub fn on_terminate(mut self, transition: Transition) -> Self {
        self.state.terminator = Some(transition);
        self
    }

    /// Declares a named transition.
    #[must_use]
    pub fn transition(mut self, key: impl Into<String>, transition: Transition) -> Self {
        self.state.transitions.insert(key.into(), transition);
        self
    }

    /// Declares a named operation.
    #[must_use]
    pub fn operation(mut self, key: impl Into<String>, operation: Operation) -> Self {
        self.state.operations.insert(key.into(), operation);
        self
    }

    /// Finishes the state.
    #[must_use]
    pub fn build(self) -> State {
        self.state
    }
}

/// How a handler reference is bound inside a state graph.
///
/// Used by the runtime's fast-fail binding validation to report exactly
/// which declaration is broken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
    /// The automatic initialization transition.
    Initialize,
    /// The automatic terminator transition.
    Terminate,
    /// A named transition.
    Transition(String),
    /// A named operation.
    Operation(String),
}

impl std::fmt::Display for BindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialize => f.write_str("initialize"),
            Self::Terminate => f.write_str("terminate"),
            Self::Transition(key) => write!(f, "transition '{key}'"),
            Self::Operation(key) => write!(f, "operation '{key}'"),
        }
    }
}

/// A handler reference together with the state and declaration binding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerBinding {
    /// State declaring the handler reference.
    pub state: String,
    /// Where in the state the reference appears.
    pub kind: BindingKind,
    /// The referenced handler name.
    pub handler: String,
}

/// Immutable, shared, per-type directed graph of lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateGraph {
    root: String,
    states: HashMap<String, State>,
}

impl StateGraph {
    /// Starts building a graph rooted at the named state.
    ///
    /// The root state must be added to the builder like any other state.
    #[must_use]
    pub fn builder(root: impl Into<String>) -> StateGraphBuilder {
        StateGraphBuilder {
            root: root.into(),
            states: Vec::new(),
        }
    }

    /// Builds the trivial graph: a single root state with no transitions.
    #[must_use]
    pub fn single(root: impl Into<String>) -> Self {
        let name = root.into();
        let state = State::named(name.clone()).build();
        Self {
            root: name.clone(),
            states: HashMap::from([(name, state)]),
        }
    }

    /// Returns the root state name.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns the named state.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownState`] if no state carries the name.
    pub fn state(&self, name: &str) -> Result<&State, ModelError> {
        self.states.get(name).ok_or_else(|| ModelError::UnknownState {
            name: name.to_owned(),
        })
    }

    /// Resolves a named transition from `from`, walking the state chain.
    ///
    /// The entry declared closest to `from` wins.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownState`] if `from` names no state in the
    /// graph.
    pub fn find_transition(&self, from: &str, key: &str) -> Result<Option<&Transition>, ModelError> {
        self.walk_chain(from, |state| state.local_transition(key))
    }

    /// Resolves a named operation from `from`, walking the state chain.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownState`] if `from` names no state in the
    /// graph.
    pub fn find_operation(&self, from: &str, key: &str) -> Result<Option<&Operation>, ModelError> {
        self.walk_chain(from, |state| state.local_operation(key))
    }

    fn walk_chain<'graph, T>(
        &'graph self,
        from: &str,
        select: impl Fn(&'graph State) -> Option<&'graph T>,
    ) -> Result<Option<&'graph T>, ModelError> {
        let mut current = Some(self.state(from)?);
        while let Some(state) = current {
            if let Some(found) = select(state) {
                return Ok(Some(found));
            }
            current = state.parent().and_then(|parent| self.states.get(parent));
        }
        Ok(None)
    }

    /// Collects every handler reference declared anywhere in the graph.
    ///
    /// Deterministically ordered by state name so validation failures are
    /// stable.
    #[must_use]
    pub fn handler_bindings(&self) -> Vec<HandlerBinding> {
        let mut names: Vec<&String> = self.states.keys().collect();
        names.sort();
        let mut bindings = Vec::new();
        for name in names {
            let Some(state) = self.states.get(name) else {
                continue;
            };
            if let Some(handler) = state.initialize().and_then(Transition::handler) {
                bindings.push(binding(name, BindingKind::Initialize, handler));
            }
            if let Some(handler) = state.terminator().and_then(Transition::handler) {
                bindings.push(binding(name, BindingKind::Terminate, handler));
            }
            let mut keys: Vec<&String> = state.transitions.keys().collect();
            keys.sort();
            for key in keys {
                if let Some(handler) = state.local_transition(key).and_then(Transition::handler) {
                    bindings.push(binding(name, BindingKind::Transition(key.clone()), handler));
                }
            }
            let mut op_keys: Vec<&String> = state.operations.keys().collect();
            op_keys.sort();
            for key in op_keys {
                if let Some(handler) = state.local_operation(key).and_then(Operation::handler) {
                    bindings.push(binding(name, BindingKind::Operation(key.clone()), handler));
                }
            }
        }
        bindings
    }
}

fn binding(state: &str, kind: BindingKind, handler: &str) -> HandlerBinding {
    HandlerBinding {
        state: state.to_owned(),
        kind,
        handler: handler.to_owned(),
    }
}

/// Builder validating and assembling a [`StateGraph`].
#[derive(Debug)]
pub struct StateGraphBuilder {
    root: String,
    states: Vec<State>,
}

impl StateGraphBuilder {
    /// Adds a state to the graph.
    #[must_use]
    pub fn state(mut self, state: State) -> Self {
        self.states.push(state);
        self
    }

    /// Validates and builds the graph.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] if a state name is duplicated, the root or a
    /// parent reference names no state, a parent chain is cyclic, or a
    /// transition targets an unknown state.
    pub fn build(self) -> Result<StateGraph, ModelError> {
        let mut states: HashMap<String, State> = HashMap::new();
        for state in self.states {
            if states.contains_key(state.name()) {
                return Err(ModelError::DuplicateState {
                    name: state.name().to_owned(),
                });
            }
            states.insert(state.name().to_owned(), state);
        }
        if !states.contains_key(&self.root) {
            return Err(ModelError::UnknownState { name: self.root });
        }
        for state in states.values() {
            validate_parent_chain(state, &states)?;
            validate_targets(state, &states)?;
        }
        Ok(StateGraph {
            root: self.root,
            states,
        })
    }
}

fn validate_parent_chain(state: &State, states: &HashMap<String, State>) -> Result<(), ModelError> {
    let mut seen: HashSet<&str> = HashSet::from([state.name()]);
    let mut current = state;
    while let Some(parent) = current.parent() {
        let Some(next) = states.get(parent) else {
            return Err(ModelError::UnknownParentState {
                state: current.name().to_owned(),
                parent: parent.to_owned(),
            });
        };
        if !seen.insert(next.name()) {
            return Err(ModelError::StateChainCycle {
                state: state.name().to_owned(),
            });
        }
        current = next;
    }
    Ok(())
}

fn validate_targets(state: &State, states: &HashMap<String, State>) -> Result<(), ModelError> {
    let mut check = |key: &str, transition: &Transition| -> Result<(), ModelError> {
        if states.contains_key(transition.target()) {
            Ok(())
        } else {
            Err(ModelError::UnknownTargetState {
                state: state.name().to_owned(),
                key: key.to_owned(),
                target: transition.target().to_owned(),
            })
        }
    };
    if let Some(transition) = state.initialize() {
        check("initialize", transition)?;
    }
    if let Some(transition) = state.terminator() {
        check("terminate", transition)?;
    }
    for (key, transition) in &state.transitions {
        check(key, transition)?;
    }
    Ok(())
}
