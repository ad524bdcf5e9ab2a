//! The seam between the graph and the components it orders.
//!
//! The graph never holds components directly; it holds [`GraphMember`] trait
//! objects. The runtime's component aggregate implements the trait, and test
//! code implements it with in-memory doubles.

use hearth_model::ComponentId;

use crate::error::MemberError;

/// A participant in dependency ordering.
///
/// # Example
///
/// ```
/// use hearth_graph::{GraphMember, MemberError};
/// use hearth_model::ComponentId;
///
/// #[derive(Debug)]
/// struct Fixed {
///     id: ComponentId,
///     providers: Vec<ComponentId>,
/// }
///
/// impl GraphMember for Fixed {
///     fn member_id(&self) -> &ComponentId {
///         &self.id
///     }
///
///     fn providers(&self) -> Result<Vec<ComponentId>, MemberError> {
///         Ok(self.providers.clone())
///     }
/// }
/// ```
pub trait GraphMember: std::fmt::Debug + Send + Sync {
    /// Returns the member's stable identity.
    fn member_id(&self) -> &ComponentId;

    /// Returns the identities of this member's declared providers, in
    /// declaration order.
    ///
    /// # Errors
    ///
    /// Returns a [`MemberError`] when the member cannot enumerate its
    /// providers; the traversal wraps it with the member identity and keeps
    /// visiting sibling branches before failing the overall request.
    fn providers(&self) -> Result<Vec<ComponentId>, MemberError>;
}
