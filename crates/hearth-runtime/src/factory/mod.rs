//! Instance construction: argument assembly and the single entry point.
//!
//! The factory resolves one argument per declared constructor parameter, in
//! declared order, from the fixed precedence the runtime supports: a scoped
//! logger, a parts-access capability, a context-access capability, the
//! configuration payload, the parameters payload. The constructor runs
//! exactly once per component lifetime; the caller caches the produced
//! instance.

use serde_json::Value as Json;

use crate::component::{ContextAccessor, PartsAccessor};
use crate::error::RuntimeError;
use crate::logging::ScopedLogger;
use crate::registry::{Instance, ParamKind, TypeDefinition};
use hearth_model::ComponentId;

/// One resolved constructor argument.
#[derive(Clone)]
pub enum Argument {
    /// A logging sink scoped to the component's identity.
    Logger(ScopedLogger),
    /// Access to the component's parts table.
    Parts(PartsAccessor),
    /// Access to the component's context table.
    Context(ContextAccessor),
    /// The profile's configuration payload.
    Config(Json),
    /// The profile's parameters payload.
    Params(Json),
}

impl std::fmt::Debug for Argument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Logger(_) => "Logger",
            Self::Parts(_) => "Parts",
            Self::Context(_) => "Context",
            Self::Config(_) => "Config",
            Self::Params(_) => "Params",
        };
        f.write_str(kind)
    }
}

/// The resolved arguments handed to a constructor, in declared order.
#[derive(Debug, Default)]
pub struct ConstructorArgs {
    args: Vec<Argument>,
}

impl ConstructorArgs {
    /// Returns the argument at the given declared position.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&Argument> {
        self.args.get(position)
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Returns `true` when no parameters were declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Returns the scoped logger argument, if declared.
    #[must_use]
    pub fn logger(&self) -> Option<&ScopedLogger> {
        self.args.iter().find_map(|arg| match arg {
            Argument::Logger(logger) => Some(logger),
            _ => None,
        })
    }

    /// Returns the parts capability, if declared.
    #[must_use]
    pub fn parts(&self) -> Option<&PartsAccessor> {
        self.args.iter().find_map(|arg| match arg {
            Argument::Parts(parts) => Some(parts),
            _ => None,
        })
    }

    /// Returns the context capability, if declared.
    #[must_use]
    pub fn context(&self) -> Option<&ContextAccessor> {
        self.args.iter().find_map(|arg| match arg {
            Argument::Context(context) => Some(context),
            _ => None,
        })
    }

    /// Returns the configuration payload, if declared.
    #[must_use]
    pub fn config(&self) -> Option<&Json> {
        self.args.iter().find_map(|arg| match arg {
            Argument::Config(config) => Some(config),
            _ => None,
        })
    }

    /// Returns the parameters payload, if declared.
    #[must_use]
    pub fn params(&self) -> Option<&Json> {
        self.args.iter().find_map(|arg| match arg {
            Argument::Params(params) => Some(params),
            _ => None,
        })
    }
}

/// Everything the factory needs to assemble arguments for one component.
pub(crate) struct FactoryInputs<'build> {
    /// The component's identity, for error context.
    pub id: &'build ComponentId,
    /// Logger scoped to the component.
    pub logger: &'build ScopedLogger,
    /// Parts capability bound to the component.
    pub parts: PartsAccessor,
    /// Context capability bound to the component.
    pub context: ContextAccessor,
    /// Configuration payload from the profile.
    pub config: &'build Json,
    /// Parameters payload from the profile.
    pub params: &'build Json,
}

/// Constructs the backing instance for one component.
///
/// Assembles the argument vector from the definition's declared parameter
/// order and invokes the registered constructor once. Failures are wrapped
/// with the component identity and its type key.
pub(crate) fn instantiate(
    definition: &TypeDefinition,
    inputs: FactoryInputs<'_>,
) -> Result<Instance, RuntimeError> {
    let mut args = Vec::with_capacity(definition.params().len());
    for kind in definition.params() {
        args.push(match kind {
            ParamKind::Logger => Argument::Logger(inputs.logger.clone()),
            ParamKind::Parts => Argument::Parts(inputs.parts.clone()),
            ParamKind::Context => Argument::Context(inputs.context.clone()),
            ParamKind::Config => Argument::Config(inputs.config.clone()),
            ParamKind::Params => Argument::Params(inputs.params.clone()),
        });
    }
    let assembled = ConstructorArgs { args };
    (definition.constructor())(&assembled).map_err(|source| RuntimeError::Instantiation {
        id: inputs.id.clone(),
        type_key: definition.type_key().to_owned(),
        source,
    })
}
