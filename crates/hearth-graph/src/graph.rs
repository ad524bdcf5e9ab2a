//! Dependency graph with deterministic startup and shutdown orderings.
//!
//! The graph owns an insertion-ordered set of [`GraphMember`]s plus an
//! optional parent graph. Startup ordering is a depth-first post-order over
//! declared providers, so every provider precedes its consumers; shutdown
//! ordering runs the same traversal with the roles swapped, so every consumer
//! precedes its providers. A per-traversal in-progress marker detects cycles
//! and reports the full chain; a done marker keeps the traversal linear.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use hearth_model::ComponentId;
use tracing::{debug, warn};

use crate::error::GraphError;
use crate::member::GraphMember;

/// Tracing target for graph traversal events.
const GRAPH_TARGET: &str = "hearth::graph";

#[derive(Default)]
struct Members {
    order: Vec<ComponentId>,
    by_id: HashMap<ComponentId, Arc<dyn GraphMember>>,
}

impl Members {
    fn snapshot(&self) -> Vec<Arc<dyn GraphMember>> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }
}

/// A set of components ordered by their provider/consumer relationships.
///
/// Graphs nest: a child graph consults its parent chain when a declared
/// provider is not satisfied locally, and shutdown ordering also searches
/// registered child graphs for consumers of a member.
#[derive(Default)]
pub struct DependencyGraph {
    parent: Option<Arc<DependencyGraph>>,
    members: RwLock<Members>,
    children: RwLock<Vec<Weak<DependencyGraph>>>,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("members", &self.read().order)
            .field("has_parent", &self.parent.is_some())
            .finish_non_exhaustive()
    }
}

impl DependencyGraph {
    /// Creates an empty root graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty graph nested under `parent` and registers it so the
    /// parent's shutdown traversal can find consumers living here.
    #[must_use]
    pub fn new_child(parent: &Arc<Self>) -> Arc<Self> {
        let child = Arc::new(Self {
            parent: Some(Arc::clone(parent)),
            members: RwLock::new(Members::default()),
            children: RwLock::new(Vec::new()),
        });
        let mut children = parent
            .children
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        children.retain(|weak| weak.strong_count() > 0);
        children.push(Arc::downgrade(&child));
        child
    }

    // Each mutation below is a single insert or remove, so a panic inside a
    // guard cannot leave the two tables out of step; recovering from poison
    // is safe.
    fn read(&self) -> RwLockReadGuard<'_, Members> {
        self.members.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Members> {
        self.members.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a member to the graph.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateMember`] if a member with the same
    /// identity is already registered.
    pub fn add(&self, member: Arc<dyn GraphMember>) -> Result<(), GraphError> {
        let id = member.member_id().clone();
        let mut members = self.write();
        if members.by_id.contains_key(&id) {
            return Err(GraphError::DuplicateMember { id });
        }
        members.order.push(id.clone());
        members.by_id.insert(id, member);
        Ok(())
    }

    /// Removes and returns the member with the given identity.
    pub fn remove(&self, id: &ComponentId) -> Option<Arc<dyn GraphMember>> {
        let mut members = self.write();
        let removed = members.by_id.remove(id);
        if removed.is_some() {
            members.order.retain(|existing| existing != id);
        }
        removed
    }

    /// Returns the local member with the given identity.
    #[must_use]
    pub fn get(&self, id: &ComponentId) -> Option<Arc<dyn GraphMember>> {
        self.read().by_id.get(id).cloned()
    }

    /// Returns the number of local members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    /// Returns `true` when the graph has no local members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().order.is_empty()
    }

    /// Looks a member up locally, then through the parent chain.
    #[must_use]
    pub fn lookup(&self, id: &ComponentId) -> Option<Arc<dyn GraphMember>> {
        if let Some(member) = self.get(id) {
            return Some(member);
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(id))
    }

    /// Computes the provider-first startup ordering of the local members.
    ///
    /// Every declared provider appears before its consumers. Providers are
    /// visited in reverse declaration order so the result is stable across
    /// runs. Providers satisfied by no graph in the hierarchy are skipped
    /// with a debug log.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Cycle`] on a cyclic dependency (fatal, with the
    /// full in-progress chain) or [`GraphError::Member`] when a member failed
    /// to enumerate its providers (sibling branches are still traversed).
    pub fn startup_order(&self) -> Result<Vec<Arc<dyn GraphMember>>, GraphError> {
        let snapshot = self.read().snapshot();
        let mut traversal = Traversal::default();
        for member in &snapshot {
            self.visit_startup(member, &mut traversal)?;
        }
        traversal.finish()
    }

    /// Computes the consumer-first shutdown ordering of the local members.
    ///
    /// Every member that declares another as a provider appears before it.
    /// Consumers are searched in the local graph, the parent chain and all
    /// registered child graphs.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Cycle`] on a cyclic dependency or
    /// [`GraphError::Member`] when a member failed to enumerate its
    /// providers.
    pub fn shutdown_order(&self) -> Result<Vec<Arc<dyn GraphMember>>, GraphError> {
        let snapshot = self.read().snapshot();
        let space = self.search_space();
        let mut traversal = Traversal::default();
        for member in &snapshot {
            visit_shutdown(member, &space, &mut traversal)?;
        }
        traversal.finish()
    }

    /// Returns the providers of one member that are present in the
    /// hierarchy, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFound`] for an unknown member or
    /// [`GraphError::Member`] when the member cannot enumerate providers.
    pub fn providers_of(
        &self,
        id: &ComponentId,
    ) -> Result<Vec<Arc<dyn GraphMember>>, GraphError> {
        let member = self
            .lookup(id)
            .ok_or_else(|| GraphError::NotFound { id: id.clone() })?;
        let providers = member.providers().map_err(|source| GraphError::Member {
            id: id.clone(),
            source,
        })?;
        let mut resolved = Vec::with_capacity(providers.len());
        for provider in &providers {
            if let Some(found) = self.lookup(provider) {
                resolved.push(found);
            } else {
                debug!(
                    target: GRAPH_TARGET,
                    provider = %provider,
                    consumer = %id,
                    "provider not in graph hierarchy; skipping"
                );
            }
        }
        Ok(resolved)
    }

    /// Returns every member of the hierarchy that declares `id` as a
    /// provider.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Member`] when a searched member cannot
    /// enumerate its providers.
    pub fn consumers_of(
        &self,
        id: &ComponentId,
    ) -> Result<Vec<Arc<dyn GraphMember>>, GraphError> {
        let mut consumers = Vec::new();
        for candidate in self.search_space() {
            if candidate.member_id() == id {
                continue;
            }
            let providers = candidate.providers().map_err(|source| GraphError::Member {
                id: candidate.member_id().clone(),
                source,
            })?;
            if providers.contains(id) {
                consumers.push(candidate);
            }
        }
        Ok(consumers)
    }

    fn visit_startup(
        &self,
        member: &Arc<dyn GraphMember>,
        traversal: &mut Traversal,
    ) -> Result<(), GraphError> {
        let id = member.member_id().clone();
        if traversal.done.contains(&id) {
            return Ok(());
        }
        traversal.enter(&id)?;
        let providers = traversal.providers_of(member);
        for provider in providers.iter().rev() {
            if let Some(found) = self.lookup(provider) {
                self.visit_startup(&found, traversal)?;
            } else {
                debug!(
                    target: GRAPH_TARGET,
                    provider = %provider,
                    consumer = %id,
                    "provider not in graph hierarchy; skipping"
                );
            }
        }
        traversal.leave(member);
        Ok(())
    }

    /// Members of this graph, its ancestors and its descendants, in a
    /// deterministic order (local first, then up, then down).
    fn search_space(&self) -> Vec<Arc<dyn GraphMember>> {
        let mut space = self.read().snapshot();
        let mut ancestor = self.parent.clone();
        while let Some(graph) = ancestor {
            space.extend(graph.read().snapshot());
            ancestor = graph.parent.clone();
        }
        self.collect_descendants(&mut space);
        space
    }

    fn collect_descendants(&self, out: &mut Vec<Arc<dyn GraphMember>>) {
        let children = self
            .children
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for weak in children.iter() {
            if let Some(child) = weak.upgrade() {
                out.extend(child.read().snapshot());
                child.collect_descendants(out);
            }
        }
    }
}

fn visit_shutdown(
    member: &Arc<dyn GraphMember>,
    space: &[Arc<dyn GraphMember>],
    traversal: &mut Traversal,
) -> Result<(), GraphError> {
    let id = member.member_id().clone();
    if traversal.done.contains(&id) {
        return Ok(());
    }
    traversal.enter(&id)?;
    let consumers: Vec<Arc<dyn GraphMember>> = space
        .iter()
        .filter(|candidate| candidate.member_id() != &id)
        .filter(|candidate| traversal.providers_of(candidate).contains(&id))
        .cloned()
        .collect();
    for consumer in &consumers {
        visit_shutdown(consumer, space, traversal)?;
    }
    traversal.leave(member);
    Ok(())
}

/// Book-keeping for one depth-first traversal.
#[derive(Default)]
struct Traversal {
    in_progress: Vec<ComponentId>,
    in_set: HashSet<ComponentId>,
    done: HashSet<ComponentId>,
    failed: HashSet<ComponentId>,
    order: Vec<Arc<dyn GraphMember>>,
    deferred: Vec<GraphError>,
}

impl Traversal {
    fn enter(&mut self, id: &ComponentId) -> Result<(), GraphError> {
        if self.in_set.contains(id) {
            let mut chain = self.in_progress.clone();
            chain.push(id.clone());
            return Err(GraphError::Cycle {
                id: id.clone(),
                chain,
            });
        }
        self.in_set.insert(id.clone());
        self.in_progress.push(id.clone());
        Ok(())
    }

    fn leave(&mut self, member: &Arc<dyn GraphMember>) {
        let id = member.member_id();
        self.in_progress.pop();
        self.in_set.remove(id);
        self.done.insert(id.clone());
        self.order.push(Arc::clone(member));
    }

    /// Asks the member for its providers, deferring (once per member) any
    /// failure so sibling branches still get visited.
    fn providers_of(&mut self, member: &Arc<dyn GraphMember>) -> Vec<ComponentId> {
        match member.providers() {
            Ok(providers) => providers,
            Err(source) => {
                let id = member.member_id().clone();
                if self.failed.insert(id.clone()) {
                    self.deferred.push(GraphError::Member { id, source });
                }
                Vec::new()
            }
        }
    }

    fn finish(self) -> Result<Vec<Arc<dyn GraphMember>>, GraphError> {
        let mut deferred = self.deferred.into_iter();
        if let Some(first) = deferred.next() {
            for extra in deferred {
                warn!(
                    target: GRAPH_TARGET,
                    error = %extra,
                    "additional provider failure during traversal"
                );
            }
            return Err(first);
        }
        Ok(self.order)
    }
}
