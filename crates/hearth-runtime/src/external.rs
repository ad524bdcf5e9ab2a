//! Seams to the embedding system.
//!
//! The runtime never reads descriptor files or owns a global service
//! directory; both arrive through these traits. Suppliers are consumed at
//! component creation, the system registry is consulted read-only at the top
//! of the service lookup chain.

use std::sync::Arc;

use hearth_model::{ComponentId, Profile};

use crate::error::CallbackError;
use crate::registry::Instance;

/// Produces the profile for a component identity.
///
/// Consumed by [`Orchestrator::create_from`](crate::Orchestrator::create_from)
/// so embedders can keep descriptors wherever they like; the runtime only
/// ever sees the parsed [`Profile`].
pub trait ProfileSupplier: Send + Sync {
    /// Returns the profile for the identity.
    ///
    /// # Errors
    ///
    /// Returns a [`CallbackError`] when no profile exists for the identity or
    /// it cannot be produced.
    fn profile_for(&self, id: &ComponentId) -> Result<Profile, CallbackError>;
}

/// Listener for system registry membership changes.
pub trait RegistryListener: Send + Sync {
    /// Called after an instance is registered under the identity.
    fn registered(&self, id: &ComponentId);

    /// Called after the identity's registration is removed.
    fn unregistered(&self, id: &ComponentId);
}

/// Ambient system-wide service directory.
///
/// Installed on the orchestrator at build time; the service lookup walk
/// delegates here once the component hierarchy is exhausted. The runtime
/// only reads from the registry.
pub trait SystemRegistry: Send + Sync {
    /// Returns the instance registered under the identity, if any.
    fn get_by_id(&self, id: &ComponentId) -> Option<Instance>;

    /// Returns an instance published under the service contract, if any.
    fn get_by_contract(&self, contract: &str) -> Option<Instance>;

    /// Registers a membership-change listener.
    fn subscribe(&self, listener: Arc<dyn RegistryListener>);
}
