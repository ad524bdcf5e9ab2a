//! Domain errors raised by model types.
//!
//! All errors use `thiserror`-derived enums with structured context so callers
//! can inspect the failure programmatically. Identity, profile, state-graph
//! and value-resolution failures share one enum because they surface through
//! the same declarative-descriptor layer.

use thiserror::Error;

/// Errors arising from model construction and value resolution.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A component identity could not be parsed or constructed.
    #[error("invalid component identity '{uri}': {reason}")]
    InvalidIdentity {
        /// The offending identity text.
        uri: String,
        /// Description of the syntax violation.
        reason: String,
    },

    /// A profile declared an empty or missing implementation type key.
    #[error("profile declares an empty implementation type key")]
    EmptyTypeKey,

    /// A part or context declaration used an empty key.
    #[error("empty {table} key in profile")]
    EmptyKey {
        /// Which table the declaration targeted (`parts` or `context`).
        table: &'static str,
    },

    /// Two part declarations used the same key.
    #[error("part '{key}' is declared twice")]
    DuplicatePart {
        /// Key that was declared twice.
        key: String,
    },

    /// Two context declarations used the same key.
    #[error("context entry '{key}' is declared twice")]
    DuplicateContext {
        /// Key that was declared twice.
        key: String,
    },

    /// A part declared a dependency on a part key that does not exist among
    /// its siblings.
    #[error("part '{part}' depends on undeclared part '{dependency}'")]
    UnknownDependency {
        /// Part carrying the dependency declaration.
        part: String,
        /// Dependency key that matched no sibling part.
        dependency: String,
    },

    /// A context specification string used an unknown prefix.
    #[error("unrecognised context specification '{spec}'")]
    InvalidContextSpec {
        /// The offending specification text.
        spec: String,
    },

    /// Two states in a state graph used the same name.
    #[error("state '{name}' is declared twice")]
    DuplicateState {
        /// State name that was declared twice.
        name: String,
    },

    /// A state referenced a parent state absent from the graph.
    #[error("state '{state}' names unknown parent '{parent}'")]
    UnknownParentState {
        /// State carrying the parent reference.
        state: String,
        /// Parent name that matched no state.
        parent: String,
    },

    /// Following parent references from a state revisited the state.
    #[error("state chain starting at '{state}' is cyclic")]
    StateChainCycle {
        /// State at which the cycle was detected.
        state: String,
    },

    /// A transition targeted a state absent from the graph.
    #[error("transition '{key}' of state '{state}' targets unknown state '{target}'")]
    UnknownTargetState {
        /// State declaring the transition.
        state: String,
        /// Transition key (`initialize` and `terminate` for the automatic
        /// transitions).
        key: String,
        /// Target name that matched no state.
        target: String,
    },

    /// A lookup named a state absent from the graph.
    #[error("unknown state '{name}'")]
    UnknownState {
        /// Name that was looked up.
        name: String,
    },

    /// A value specification declared a type the resolver does not support.
    #[error("unsupported value type '{type_name}'")]
    UnsupportedValueType {
        /// The declared type name.
        type_name: String,
    },

    /// A value argument could not be parsed as the declared type.
    #[error("cannot construct {type_name} from '{argument}': {reason}")]
    ValueParse {
        /// The declared type name.
        type_name: String,
        /// Argument text that failed to parse.
        argument: String,
        /// Description of the parse failure.
        reason: String,
    },

    /// A value type requires an argument but none was declared.
    #[error("value type '{type_name}' has no zero-argument construction")]
    MissingArgument {
        /// The declared type name.
        type_name: String,
    },

    /// A composite specification used a base type with no matching
    /// multi-argument construction.
    #[error("value type '{type_name}' has no composite construction")]
    UnsupportedComposite {
        /// The declared base type name.
        type_name: String,
    },

    /// A nested value had a kind the enclosing composite cannot consume.
    #[error("composite {type_name} cannot consume nested {nested_kind} value")]
    IncompatibleNestedValue {
        /// The enclosing composite type name.
        type_name: String,
        /// Kind of the offending nested value.
        nested_kind: &'static str,
    },

    /// A symbolic reference used an urn the resolver does not know.
    #[error("unknown symbolic reference '{urn}'")]
    UnknownUrn {
        /// The urn text that was looked up.
        urn: String,
    },
}

impl ModelError {
    /// Creates a new `InvalidIdentity` error.
    #[must_use]
    pub fn invalid_identity(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `ValueParse` error.
    #[must_use]
    pub fn value_parse(
        type_name: impl Into<String>,
        argument: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ValueParse {
            type_name: type_name.into(),
            argument: argument.into(),
            reason: reason.into(),
        }
    }
}
