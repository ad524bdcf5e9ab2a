//! Component identity.
//!
//! Every managed component is addressed by a stable URI-like identity with
//! the `component` scheme, where the path segments spell out the containment
//! path from the root container (e.g. `component://root/app/db`). The `url`
//! crate validates syntax so identities survive round-trips through logs,
//! error messages and serialized profiles.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ModelError;

/// Scheme used by component identities.
const SCHEME: &str = "component";

/// Opaque stable identity of a managed component.
///
/// Identities are ordered and hashable so orderings and error chains that
/// include them are deterministic.
///
/// # Example
///
/// ```
/// use hearth_model::ComponentId;
///
/// let app = ComponentId::root("app").expect("valid root");
/// let db = app.child("db").expect("valid segment");
/// assert_eq!(db.as_str(), "component://app/db");
/// assert_eq!(db.name(), "db");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentId(String);

impl ComponentId {
    /// Parses an identity from its textual form.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidIdentity`] if the text is not a valid
    /// `component://` URI with a non-empty authority.
    pub fn parse(uri: &str) -> Result<Self, ModelError> {
        let parsed =
            Url::parse(uri).map_err(|error| ModelError::invalid_identity(uri, error.to_string()))?;
        if parsed.scheme() != SCHEME {
            return Err(ModelError::invalid_identity(
                uri,
                format!("expected scheme '{SCHEME}', found '{}'", parsed.scheme()),
            ));
        }
        let Some(host) = parsed.host_str() else {
            return Err(ModelError::invalid_identity(uri, "missing root segment"));
        };
        if host.is_empty() {
            return Err(ModelError::invalid_identity(uri, "missing root segment"));
        }
        let mut canonical = format!("{SCHEME}://{host}");
        if let Some(segments) = parsed.path_segments() {
            for segment in segments {
                if segment.is_empty() {
                    return Err(ModelError::invalid_identity(uri, "empty path segment"));
                }
                canonical.push('/');
                canonical.push_str(segment);
            }
        }
        Ok(Self(canonical))
    }

    /// Creates a root identity from a bare name.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidIdentity`] if the name is empty or
    /// contains separator characters.
    pub fn root(name: &str) -> Result<Self, ModelError> {
        validate_segment(name)?;
        Ok(Self(format!("{SCHEME}://{name}")))
    }

    /// Creates the identity of a child addressed by `segment` under this
    /// component.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidIdentity`] if the segment is empty or
    /// contains separator characters.
    pub fn child(&self, segment: &str) -> Result<Self, ModelError> {
        validate_segment(segment)?;
        Ok(Self(format!("{}/{segment}", self.0)))
    }

    /// Returns the textual form of this identity.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the last path segment, the component's local name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

fn validate_segment(segment: &str) -> Result<(), ModelError> {
    if segment.is_empty() {
        return Err(ModelError::invalid_identity(segment, "empty segment"));
    }
    if segment.contains(['/', ':', '?', '#']) {
        return Err(ModelError::invalid_identity(
            segment,
            "segment contains a reserved character",
        ));
    }
    Ok(())
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ComponentId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ComponentId> for String {
    fn from(id: ComponentId) -> Self {
        id.0
    }
}
