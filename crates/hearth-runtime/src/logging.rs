//! Scoped per-component logger sink.
//!
//! Components and their handlers log through a [`ScopedLogger`] carrying the
//! component identity, so every event lands on the `hearth::component` target
//! with a stable `scope` field. The sink is a thin façade over `tracing`:
//! it never blocks and never fails.

use std::sync::Arc;

use hearth_model::ComponentId;

/// Tracing target for component-scoped events.
const COMPONENT_TARGET: &str = "hearth::component";

/// Logger sink scoped to one component's identity.
#[derive(Debug, Clone)]
pub struct ScopedLogger {
    scope: Arc<str>,
}

impl ScopedLogger {
    /// Creates a logger scoped to the given component.
    #[must_use]
    pub fn for_component(id: &ComponentId) -> Self {
        Self {
            scope: Arc::from(id.as_str()),
        }
    }

    /// Returns the scope (the component identity text).
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Emits a debug-severity event.
    pub fn debug(&self, message: &str) {
        tracing::debug!(target: COMPONENT_TARGET, scope = %self.scope, "{message}");
    }

    /// Emits an info-severity event.
    pub fn info(&self, message: &str) {
        tracing::info!(target: COMPONENT_TARGET, scope = %self.scope, "{message}");
    }

    /// Emits a warn-severity event.
    pub fn warn(&self, message: &str) {
        tracing::warn!(target: COMPONENT_TARGET, scope = %self.scope, "{message}");
    }

    /// Emits an error-severity event.
    pub fn error(&self, message: &str) {
        tracing::error!(target: COMPONENT_TARGET, scope = %self.scope, "{message}");
    }
}
