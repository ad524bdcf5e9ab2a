//! Unit tests for dependency graph ordering and cycle detection.

#![expect(clippy::expect_used, reason = "tests use expect for clarity")]

use std::sync::Arc;

use hearth_model::ComponentId;
use rstest::rstest;

use crate::error::{GraphError, MemberError};
use crate::graph::DependencyGraph;
use crate::member::GraphMember;

/// In-memory member with fixed provider declarations.
#[derive(Debug)]
struct Fixed {
    id: ComponentId,
    providers: Vec<ComponentId>,
}

impl GraphMember for Fixed {
    fn member_id(&self) -> &ComponentId {
        &self.id
    }

    fn providers(&self) -> Result<Vec<ComponentId>, MemberError> {
        Ok(self.providers.clone())
    }
}

/// Member whose provider enumeration always fails.
#[derive(Debug)]
struct Broken {
    id: ComponentId,
}

impl GraphMember for Broken {
    fn member_id(&self) -> &ComponentId {
        &self.id
    }

    fn providers(&self) -> Result<Vec<ComponentId>, MemberError> {
        Err(MemberError::new("descriptor store unavailable"))
    }
}

fn id(name: &str) -> ComponentId {
    ComponentId::root(name).expect("valid id")
}

fn fixed(name: &str, providers: &[&str]) -> Arc<dyn GraphMember> {
    Arc::new(Fixed {
        id: id(name),
        providers: providers.iter().map(|p| id(p)).collect(),
    })
}

fn names(order: &[Arc<dyn GraphMember>]) -> Vec<String> {
    order
        .iter()
        .map(|m| m.member_id().name().to_owned())
        .collect()
}

fn position(order: &[Arc<dyn GraphMember>], name: &str) -> usize {
    names(order)
        .iter()
        .position(|n| n == name)
        .expect("member present in order")
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

#[test]
fn new_graph_is_empty() {
    let graph = DependencyGraph::new();
    assert!(graph.is_empty());
    assert_eq!(graph.len(), 0);
}

#[test]
fn add_rejects_duplicate_member() {
    let graph = DependencyGraph::new();
    graph.add(fixed("db", &[])).expect("first add");
    let err = graph.add(fixed("db", &[])).expect_err("duplicate add");
    assert!(matches!(err, GraphError::DuplicateMember { .. }));
    assert_eq!(graph.len(), 1);
}

#[test]
fn remove_returns_the_member() {
    let graph = DependencyGraph::new();
    graph.add(fixed("db", &[])).expect("add");
    let removed = graph.remove(&id("db")).expect("member was present");
    assert_eq!(removed.member_id(), &id("db"));
    assert!(graph.is_empty());
}

// ---------------------------------------------------------------------------
// Startup ordering
// ---------------------------------------------------------------------------

#[rstest]
fn provider_precedes_consumer() {
    let graph = DependencyGraph::new();
    graph.add(fixed("cache", &["db"])).expect("add cache");
    graph.add(fixed("db", &[])).expect("add db");
    let order = graph.startup_order().expect("acyclic");
    assert!(position(&order, "db") < position(&order, "cache"));
}

#[rstest]
fn startup_order_is_stable() {
    let build = || {
        let graph = DependencyGraph::new();
        graph.add(fixed("app", &["db", "cache"])).expect("add app");
        graph.add(fixed("cache", &["db"])).expect("add cache");
        graph.add(fixed("db", &[])).expect("add db");
        graph
    };
    let first = names(&build().startup_order().expect("acyclic"));
    let second = names(&build().startup_order().expect("acyclic"));
    assert_eq!(first, second);
    assert_eq!(first, vec!["db", "cache", "app"]);
}

#[rstest]
fn absent_provider_is_skipped() {
    let graph = DependencyGraph::new();
    graph.add(fixed("app", &["external"])).expect("add app");
    let order = graph.startup_order().expect("missing provider tolerated");
    assert_eq!(names(&order), vec!["app"]);
}

#[rstest]
fn provider_resolved_through_parent_graph() {
    let parent = Arc::new(DependencyGraph::new());
    parent.add(fixed("db", &[])).expect("add db");
    let child = DependencyGraph::new_child(&parent);
    child.add(fixed("cache", &["db"])).expect("add cache");
    let order = child.startup_order().expect("acyclic");
    assert_eq!(names(&order), vec!["db", "cache"]);
}

// ---------------------------------------------------------------------------
// Shutdown ordering
// ---------------------------------------------------------------------------

#[rstest]
fn consumer_precedes_provider_on_shutdown() {
    let graph = DependencyGraph::new();
    graph.add(fixed("db", &[])).expect("add db");
    graph.add(fixed("cache", &["db"])).expect("add cache");
    let order = graph.shutdown_order().expect("acyclic");
    assert!(position(&order, "cache") < position(&order, "db"));
}

#[rstest]
fn shutdown_reverses_the_chain() {
    let graph = DependencyGraph::new();
    graph.add(fixed("app", &["db", "cache"])).expect("add app");
    graph.add(fixed("cache", &["db"])).expect("add cache");
    graph.add(fixed("db", &[])).expect("add db");
    let order = graph.shutdown_order().expect("acyclic");
    assert_eq!(names(&order), vec!["app", "cache", "db"]);
}

#[rstest]
fn shutdown_finds_consumers_in_child_graphs() {
    let parent = Arc::new(DependencyGraph::new());
    parent.add(fixed("db", &[])).expect("add db");
    let child = DependencyGraph::new_child(&parent);
    child.add(fixed("cache", &["db"])).expect("add cache");
    let order = parent.shutdown_order().expect("acyclic");
    assert_eq!(names(&order), vec!["cache", "db"]);
}

// ---------------------------------------------------------------------------
// Cycle detection
// ---------------------------------------------------------------------------

#[rstest]
fn mutual_providers_fail_startup_with_chain() {
    let graph = DependencyGraph::new();
    graph.add(fixed("a", &["b"])).expect("add a");
    graph.add(fixed("b", &["a"])).expect("add b");
    let err = graph.startup_order().expect_err("cycle");
    let GraphError::Cycle { chain, .. } = err else {
        panic!("expected cycle error, got {err}");
    };
    assert!(chain.len() >= 3, "chain names the full loop: {chain:?}");
    assert_eq!(chain.first(), chain.last());
}

#[rstest]
fn mutual_providers_fail_shutdown() {
    let graph = DependencyGraph::new();
    graph.add(fixed("a", &["b"])).expect("add a");
    graph.add(fixed("b", &["a"])).expect("add b");
    let err = graph.shutdown_order().expect_err("cycle");
    assert!(matches!(err, GraphError::Cycle { .. }));
}

// ---------------------------------------------------------------------------
// Member failures
// ---------------------------------------------------------------------------

#[rstest]
fn failing_member_fails_the_request_but_siblings_complete() {
    let graph = DependencyGraph::new();
    graph
        .add(Arc::new(Broken { id: id("broken") }))
        .expect("add broken");
    graph.add(fixed("cache", &["db"])).expect("add cache");
    graph.add(fixed("db", &[])).expect("add db");
    let err = graph.startup_order().expect_err("member failure");
    assert!(matches!(
        err,
        GraphError::Member { ref id, .. } if id.name() == "broken"
    ));
}

// ---------------------------------------------------------------------------
// Provider/consumer queries
// ---------------------------------------------------------------------------

#[rstest]
fn providers_of_resolves_declared_providers() {
    let graph = DependencyGraph::new();
    graph.add(fixed("db", &[])).expect("add db");
    graph.add(fixed("cache", &["db"])).expect("add cache");
    let providers = graph.providers_of(&id("cache")).expect("query works");
    assert_eq!(names(&providers), vec!["db"]);
}

#[rstest]
fn consumers_of_finds_declaring_members() {
    let graph = DependencyGraph::new();
    graph.add(fixed("db", &[])).expect("add db");
    graph.add(fixed("cache", &["db"])).expect("add cache");
    graph.add(fixed("app", &["cache"])).expect("add app");
    let consumers = graph.consumers_of(&id("db")).expect("query works");
    assert_eq!(names(&consumers), vec!["cache"]);
}

#[rstest]
fn providers_of_unknown_member_fails() {
    let graph = DependencyGraph::new();
    let err = graph.providers_of(&id("ghost")).expect_err("unknown");
    assert!(matches!(err, GraphError::NotFound { .. }));
}
