//! Component profiles: the immutable descriptor a component is built from.
//!
//! A [`Profile`] declares everything the runtime needs to know about a
//! component before it exists: which registered implementation type backs it,
//! which service contracts it publishes, which sibling parts it depends on,
//! its owned sub-parts, its context bindings, and its configuration and
//! parameter payloads. Profiles arrive fully parsed — the runtime never
//! consumes a textual descriptor format directly.
//!
//! Parts hold nested profiles, never references: reference-style entries live
//! only in the context table, which is what keeps ownership of the component
//! tree unambiguous.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::ModelError;
use crate::value::ValueSpec;

/// Declarative description of a component.
///
/// Profiles are built with the `with_*` methods and validated via
/// [`Profile::validate`] before the runtime accepts them.
///
/// # Example
///
/// ```
/// use hearth_model::Profile;
///
/// let app = Profile::new("app")
///     .with_part("db", Profile::new("database"))
///     .with_part("cache", Profile::new("cache").with_dependency("db"));
/// app.validate().expect("profile is well formed");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    type_key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    services: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    parts: Vec<PartDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    context: Vec<ContextDecl>,
    #[serde(default, skip_serializing_if = "Json::is_null")]
    config: Json,
    #[serde(default, skip_serializing_if = "Json::is_null")]
    params: Json,
}

impl Profile {
    /// Creates a profile backed by the named implementation type.
    #[must_use]
    pub fn new(type_key: impl Into<String>) -> Self {
        Self {
            type_key: type_key.into(),
            services: Vec::new(),
            dependencies: Vec::new(),
            parts: Vec::new(),
            context: Vec::new(),
            config: Json::Null,
            params: Json::Null,
        }
    }

    /// Declares a service contract this component publishes.
    #[must_use]
    pub fn with_service(mut self, contract: impl Into<String>) -> Self {
        self.services.push(contract.into());
        self
    }

    /// Declares a provider dependency on a sibling part key.
    #[must_use]
    pub fn with_dependency(mut self, part_key: impl Into<String>) -> Self {
        self.dependencies.push(part_key.into());
        self
    }

    /// Declares an owned sub-part.
    #[must_use]
    pub fn with_part(mut self, key: impl Into<String>, profile: Profile) -> Self {
        self.parts.push(PartDecl {
            key: key.into(),
            profile,
        });
        self
    }

    /// Declares a context binding.
    #[must_use]
    pub fn with_context(mut self, decl: ContextDecl) -> Self {
        self.context.push(decl);
        self
    }

    /// Sets the configuration payload.
    #[must_use]
    pub fn with_config(mut self, config: Json) -> Self {
        self.config = config;
        self
    }

    /// Sets the parameters payload.
    #[must_use]
    pub fn with_params(mut self, params: Json) -> Self {
        self.params = params;
        self
    }

    /// Returns the implementation type key.
    #[must_use]
    pub fn type_key(&self) -> &str {
        &self.type_key
    }

    /// Returns the published service contracts.
    #[must_use]
    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Returns the declared provider dependencies (sibling part keys), in
    /// declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Returns the declared parts, in declaration order.
    #[must_use]
    pub fn parts(&self) -> &[PartDecl] {
        &self.parts
    }

    /// Returns the declared context bindings, in declaration order.
    #[must_use]
    pub fn context(&self) -> &[ContextDecl] {
        &self.context
    }

    /// Returns the configuration payload.
    #[must_use]
    pub const fn config(&self) -> &Json {
        &self.config
    }

    /// Returns the parameters payload.
    #[must_use]
    pub const fn params(&self) -> &Json {
        &self.params
    }

    /// Returns true when this profile publishes the given service contract.
    #[must_use]
    pub fn publishes(&self, contract: &str) -> bool {
        self.services.iter().any(|service| service == contract)
    }

    /// Validates the profile and, recursively, its parts.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] when the type key or a declared key is empty,
    /// a part or context key is duplicated, or a part depends on a part key
    /// its enclosing profile does not declare.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.type_key.is_empty() {
            return Err(ModelError::EmptyTypeKey);
        }
        let mut part_keys: Vec<&str> = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            if part.key.is_empty() {
                return Err(ModelError::EmptyKey { table: "parts" });
            }
            if part_keys.contains(&part.key.as_str()) {
                return Err(ModelError::DuplicatePart {
                    key: part.key.clone(),
                });
            }
            part_keys.push(&part.key);
        }
        let mut context_keys: Vec<&str> = Vec::with_capacity(self.context.len());
        for decl in &self.context {
            if decl.key.is_empty() {
                return Err(ModelError::EmptyKey { table: "context" });
            }
            if context_keys.contains(&decl.key.as_str()) {
                return Err(ModelError::DuplicateContext {
                    key: decl.key.clone(),
                });
            }
            context_keys.push(&decl.key);
        }
        for part in &self.parts {
            for dependency in part.profile.dependencies() {
                if dependency == &part.key || !part_keys.contains(&dependency.as_str()) {
                    return Err(ModelError::UnknownDependency {
                        part: part.key.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
            part.profile.validate()?;
        }
        Ok(())
    }
}

/// A strongly-owned sub-part declaration: key plus nested profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartDecl {
    key: String,
    profile: Profile,
}

impl PartDecl {
    /// Returns the part key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the part's profile.
    #[must_use]
    pub const fn profile(&self) -> &Profile {
        &self.profile
    }
}

/// A lazily-resolved context binding declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDecl {
    key: String,
    spec: ContextSpec,
    #[serde(default = "default_volatile")]
    volatile: bool,
}

const fn default_volatile() -> bool {
    true
}

impl ContextDecl {
    /// Creates a volatile binding (re-resolved on every read).
    #[must_use]
    pub fn new(key: impl Into<String>, spec: ContextSpec) -> Self {
        Self {
            key: key.into(),
            spec,
            volatile: true,
        }
    }

    /// Marks the binding non-volatile: the first resolved value is cached.
    #[must_use]
    pub const fn non_volatile(mut self) -> Self {
        self.volatile = false;
        self
    }

    /// Returns the binding key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the binding specification.
    #[must_use]
    pub const fn spec(&self) -> &ContextSpec {
        &self.spec
    }

    /// Returns true when the binding is re-resolved on every read.
    #[must_use]
    pub const fn is_volatile(&self) -> bool {
        self.volatile
    }
}

/// What a context binding resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSpec {
    /// A local part's backing instance, textual form `parts:<key>`.
    Part(String),
    /// A service contract looked up through the enclosing container chain,
    /// textual form `service:<name>`.
    Service(String),
    /// A freshly constructed value.
    Value(ValueSpec),
}

impl ContextSpec {
    /// Parses the textual reference forms `parts:<key>` and
    /// `service:<name>`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidContextSpec`] when the text carries no
    /// recognised prefix or the referenced key is empty.
    pub fn parse(text: &str) -> Result<Self, ModelError> {
        let invalid = || ModelError::InvalidContextSpec {
            spec: text.to_owned(),
        };
        if let Some(key) = text.strip_prefix("parts:") {
            if key.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::Part(key.to_owned()));
        }
        if let Some(name) = text.strip_prefix("service:") {
            if name.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::Service(name.to_owned()));
        }
        Err(invalid())
    }
}
