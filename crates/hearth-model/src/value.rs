//! Value specifications and their resolution.
//!
//! A [`ValueSpec`] is the constructor-equivalent description of a single
//! argument or context value: a base type name, an optional textual argument,
//! and zero or more nested specs. Resolution is recursive and produces a
//! concrete [`Value`]:
//!
//! - a *symbolic* argument (`urn:system:...`, `urn:component:...`) is looked
//!   up in the ambient [`ResolveContext`] instead of being constructed;
//! - a *simple* spec parses the argument as the declared type, or falls back
//!   to the type's zero-argument construction when the argument is absent;
//! - a *composite* spec resolves its nested specs first and then applies the
//!   matching multi-argument construction of the base type.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ModelError;
use crate::identity::ComponentId;

/// A recursive value specification.
///
/// # Example
///
/// ```
/// use hearth_model::{ComponentId, ResolveContext, Value, ValueSpec};
///
/// let spec = ValueSpec::simple("i64", "42");
/// let ctx = ResolveContext::new(
///     "/work",
///     "/tmp",
///     ComponentId::root("app").expect("valid id"),
/// );
/// assert_eq!(spec.resolve(&ctx).expect("resolves"), Value::Int(42));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSpec {
    type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    argument: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    nested: Vec<ValueSpec>,
}

impl ValueSpec {
    /// Creates a simple spec with an argument.
    #[must_use]
    pub fn simple(type_name: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            argument: Some(argument.into()),
            nested: Vec::new(),
        }
    }

    /// Creates a spec with no argument, resolved through the type's
    /// zero-argument construction.
    #[must_use]
    pub fn default_of(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            argument: None,
            nested: Vec::new(),
        }
    }

    /// Creates a composite spec from nested specs.
    #[must_use]
    pub fn composite(type_name: impl Into<String>, nested: Vec<ValueSpec>) -> Self {
        Self {
            type_name: type_name.into(),
            argument: None,
            nested,
        }
    }

    /// Returns the declared base type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the textual argument, if any.
    #[must_use]
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// Returns the nested specs.
    #[must_use]
    pub fn nested(&self) -> &[ValueSpec] {
        &self.nested
    }

    /// Returns true when the argument is a symbolic `urn:` reference.
    #[must_use]
    pub fn is_symbolic(&self) -> bool {
        self.argument
            .as_deref()
            .is_some_and(|argument| argument.starts_with("urn:"))
    }

    /// Resolves the specification against the ambient context.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] naming the declared type when the type is
    /// unsupported, the argument cannot be parsed, a symbolic reference is
    /// unknown, or a composite construction does not exist.
    pub fn resolve(&self, ctx: &ResolveContext) -> Result<Value, ModelError> {
        if let Some(argument) = self.argument.as_deref() {
            if argument.starts_with("urn:") {
                return resolve_symbolic(argument, ctx);
            }
        }
        if self.nested.is_empty() {
            return match self.argument.as_deref() {
                None => zero_argument(&self.type_name),
                Some(argument) => from_argument(&self.type_name, argument),
            };
        }
        let mut values = Vec::with_capacity(self.nested.len());
        for nested in &self.nested {
            values.push(nested.resolve(ctx)?);
        }
        from_composite(&self.type_name, values)
    }
}

/// A resolved concrete value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A string.
    Str(String),
    /// A UTF-8 filesystem path.
    Path(Utf8PathBuf),
    /// A URL.
    Url(Url),
    /// An ordered collection of values.
    List(Vec<Value>),
}

impl Value {
    /// Returns a short name for the value's kind, used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "i64",
            Self::Float(_) => "f64",
            Self::Str(_) => "string",
            Self::Path(_) => "path",
            Self::Url(_) => "url",
            Self::List(_) => "list",
        }
    }

    /// Returns the string content when the value is textual.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(text) => Some(text),
            Self::Path(path) => Some(path.as_str()),
            Self::Url(url) => Some(url.as_str()),
            _ => None,
        }
    }
}

/// Ambient execution context for symbolic references.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    work_dir: Utf8PathBuf,
    temp_dir: Utf8PathBuf,
    component_id: ComponentId,
}

impl ResolveContext {
    /// Creates a resolve context.
    #[must_use]
    pub fn new(
        work_dir: impl Into<Utf8PathBuf>,
        temp_dir: impl Into<Utf8PathBuf>,
        component_id: ComponentId,
    ) -> Self {
        Self {
            work_dir: work_dir.into(),
            temp_dir: temp_dir.into(),
            component_id,
        }
    }

    /// Returns the working directory.
    #[must_use]
    pub const fn work_dir(&self) -> &Utf8PathBuf {
        &self.work_dir
    }

    /// Returns the temporary directory.
    #[must_use]
    pub const fn temp_dir(&self) -> &Utf8PathBuf {
        &self.temp_dir
    }

    /// Returns the enclosing component identity.
    #[must_use]
    pub const fn component_id(&self) -> &ComponentId {
        &self.component_id
    }
}

fn resolve_symbolic(urn: &str, ctx: &ResolveContext) -> Result<Value, ModelError> {
    match urn {
        "urn:system:work-dir" => Ok(Value::Path(ctx.work_dir.clone())),
        "urn:system:temp-dir" => Ok(Value::Path(ctx.temp_dir.clone())),
        "urn:component:name" => Ok(Value::Str(ctx.component_id.name().to_owned())),
        "urn:component:id" => Ok(Value::Str(ctx.component_id.as_str().to_owned())),
        _ => Err(ModelError::UnknownUrn {
            urn: urn.to_owned(),
        }),
    }
}

fn zero_argument(type_name: &str) -> Result<Value, ModelError> {
    match type_name {
        "null" => Ok(Value::Null),
        "bool" => Ok(Value::Bool(false)),
        "i64" | "int" => Ok(Value::Int(0)),
        "f64" | "float" => Ok(Value::Float(0.0)),
        "string" => Ok(Value::Str(String::new())),
        "path" => Ok(Value::Path(Utf8PathBuf::new())),
        "list" => Ok(Value::List(Vec::new())),
        "url" => Err(ModelError::MissingArgument {
            type_name: type_name.to_owned(),
        }),
        _ => Err(ModelError::UnsupportedValueType {
            type_name: type_name.to_owned(),
        }),
    }
}

fn from_argument(type_name: &str, argument: &str) -> Result<Value, ModelError> {
    match type_name {
        "bool" => argument
            .parse()
            .map(Value::Bool)
            .map_err(|_| ModelError::value_parse(type_name, argument, "expected true or false")),
        "i64" | "int" => argument
            .parse()
            .map(Value::Int)
            .map_err(|_| ModelError::value_parse(type_name, argument, "expected an integer")),
        "f64" | "float" => argument
            .parse()
            .map(Value::Float)
            .map_err(|_| ModelError::value_parse(type_name, argument, "expected a number")),
        "string" => Ok(Value::Str(argument.to_owned())),
        "path" => Ok(Value::Path(Utf8PathBuf::from(argument))),
        "url" => Url::parse(argument)
            .map(Value::Url)
            .map_err(|error| ModelError::value_parse(type_name, argument, error.to_string())),
        _ => Err(ModelError::UnsupportedValueType {
            type_name: type_name.to_owned(),
        }),
    }
}

fn from_composite(type_name: &str, values: Vec<Value>) -> Result<Value, ModelError> {
    match type_name {
        "list" => Ok(Value::List(values)),
        "string" => {
            let mut joined = String::new();
            for value in &values {
                let Some(text) = value.as_str() else {
                    return Err(ModelError::IncompatibleNestedValue {
                        type_name: type_name.to_owned(),
                        nested_kind: value.kind(),
                    });
                };
                joined.push_str(text);
            }
            Ok(Value::Str(joined))
        }
        "path" => {
            let mut joined = Utf8PathBuf::new();
            for value in &values {
                let Some(text) = value.as_str() else {
                    return Err(ModelError::IncompatibleNestedValue {
                        type_name: type_name.to_owned(),
                        nested_kind: value.kind(),
                    });
                };
                joined.push(text);
            }
            Ok(Value::Path(joined))
        }
        "null" | "bool" | "i64" | "int" | "f64" | "float" | "url" => {
            Err(ModelError::UnsupportedComposite {
                type_name: type_name.to_owned(),
            })
        }
        _ => Err(ModelError::UnsupportedValueType {
            type_name: type_name.to_owned(),
        }),
    }
}
