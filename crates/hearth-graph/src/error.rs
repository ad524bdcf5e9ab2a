//! Error types for dependency graph operations.

use hearth_model::ComponentId;
use thiserror::Error;

/// Error raised by a graph member asked for its providers.
///
/// Members sit behind the [`GraphMember`](crate::GraphMember) seam, so the
/// graph only sees an opaque description of what went wrong.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct MemberError {
    message: String,
}

impl MemberError {
    /// Creates a member error from a description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors returned by dependency graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A traversal revisited a member still marked in-progress.
    #[error("cyclic dependency involving '{id}'; in-progress chain: {}", render_chain(chain))]
    Cycle {
        /// Member at which the cycle closed.
        id: ComponentId,
        /// The full in-progress chain, traversal order, ending at the
        /// revisited member.
        chain: Vec<ComponentId>,
    },

    /// A member failed while being asked for its providers.
    #[error("member '{id}' failed to report providers")]
    Member {
        /// The failing member.
        id: ComponentId,
        /// The member's own failure description.
        #[source]
        source: MemberError,
    },

    /// A member with the same identity is already registered.
    #[error("member '{id}' is already in the graph")]
    DuplicateMember {
        /// Identity that was registered twice.
        id: ComponentId,
    },

    /// The requested member is not in the graph.
    #[error("member '{id}' is not in the graph")]
    NotFound {
        /// Identity that was looked up.
        id: ComponentId,
    },
}

fn render_chain(chain: &[ComponentId]) -> String {
    chain
        .iter()
        .map(ComponentId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
