//! Unit tests for the component aggregate: identity, containment, context
//! resolution and service lookup.

#![expect(clippy::expect_used, reason = "tests use expect for clarity")]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hearth_graph::GraphMember;
use hearth_model::{ComponentId, ContextDecl, ContextSpec, Profile, StateGraph, Value, ValueSpec};
use rstest::{fixture, rstest};

use crate::component::{Containing, Identifiable, Resolved};
use crate::composition::ContextValue;
use crate::error::RuntimeError;
use crate::external::{RegistryListener, SystemRegistry};
use crate::orchestrator::Orchestrator;
use crate::registry::{Instance, TypeDefinition};

/// An orchestrator with a `store` type whose instances are plain strings.
#[fixture]
fn orchestrator() -> Orchestrator {
    let orchestrator = Orchestrator::builder().build();
    let definition = TypeDefinition::builder("store", StateGraph::single("idle"))
        .constructor(|_| Ok(Arc::new(String::from("store-instance"))))
        .build()
        .expect("definition builds");
    orchestrator.register_type(definition).expect("register");
    orchestrator
}

fn app_profile() -> Profile {
    Profile::new("store")
        .with_part("db", Profile::new("store").with_service("storage"))
        .with_part("cache", Profile::new("store").with_dependency("db"))
}

// ---------------------------------------------------------------------------
// Identity and containment
// ---------------------------------------------------------------------------

#[rstest]
fn part_identities_extend_the_container_path(orchestrator: Orchestrator) {
    let app = orchestrator.create("app", app_profile()).expect("create");
    assert_eq!(app.id().as_str(), "component://app");
    let db = app.part("db").expect("db exists");
    assert_eq!(db.id().as_str(), "component://app/db");
    assert_eq!(db.parent().expect("parent alive").id(), app.id());
}

#[rstest]
fn part_keys_keep_declaration_order(orchestrator: Orchestrator) {
    let app = orchestrator.create("app", app_profile()).expect("create");
    assert_eq!(app.part_keys(), vec!["db", "cache"]);
    let err = app.part("ghost").expect_err("unknown part");
    assert!(matches!(err, RuntimeError::PartNotFound { .. }));
}

#[rstest]
fn providers_resolve_dependencies_to_sibling_identities(orchestrator: Orchestrator) {
    let app = orchestrator.create("app", app_profile()).expect("create");
    let cache = app.part("cache").expect("cache exists");
    let providers = cache.providers().expect("providers enumerate");
    assert_eq!(
        providers,
        vec![ComponentId::parse("component://app/db").expect("valid id")]
    );
    assert!(app.providers().expect("root providers").is_empty());
}

// ---------------------------------------------------------------------------
// Context resolution
// ---------------------------------------------------------------------------

#[rstest]
fn value_context_resolves_symbolic_references(orchestrator: Orchestrator) {
    let profile = Profile::new("store").with_context(ContextDecl::new(
        "who",
        ContextSpec::Value(ValueSpec::simple("string", "urn:component:name")),
    ));
    let app = orchestrator.create("app", profile).expect("create");
    let resolved = app.resolve_context("who").expect("resolves");
    assert!(matches!(
        resolved,
        ContextValue::Value(Value::Str(ref name)) if name == "app"
    ));
}

#[rstest]
fn part_context_yields_the_initialized_part_instance(orchestrator: Orchestrator) {
    let profile = Profile::new("store")
        .with_part("db", Profile::new("store"))
        .with_context(ContextDecl::new("db", ContextSpec::parse("parts:db").expect("parses")));
    let app = orchestrator.create("app", profile).expect("create");
    let resolved = app.resolve_context("db").expect("resolves");
    let ContextValue::Instance(instance) = resolved else {
        panic!("expected an instance");
    };
    assert_eq!(
        instance.downcast_ref::<String>().expect("string instance"),
        "store-instance"
    );
    assert!(app.part("db").expect("db exists").is_initialized());
}

#[rstest]
fn unknown_context_key_is_reported(orchestrator: Orchestrator) {
    let app = orchestrator
        .create("app", Profile::new("store"))
        .expect("create");
    let err = app.resolve_context("ghost").expect_err("unknown key");
    assert!(matches!(err, RuntimeError::ContextNotFound { .. }));
}

// ---------------------------------------------------------------------------
// Service lookup
// ---------------------------------------------------------------------------

#[rstest]
fn service_context_finds_a_sibling_provider(orchestrator: Orchestrator) {
    let profile = Profile::new("store")
        .with_part("db", Profile::new("store").with_service("storage"))
        .with_part(
            "web",
            Profile::new("store").with_context(ContextDecl::new(
                "storage",
                ContextSpec::Service("storage".to_owned()),
            )),
        );
    let app = orchestrator.create("app", profile).expect("create");
    let web = app.part("web").expect("web exists");
    let resolved = web.resolve_context("storage").expect("provider found");
    assert!(matches!(resolved, ContextValue::Instance(_)));
    assert!(app.part("db").expect("db exists").is_initialized());
}

#[rstest]
fn service_lookup_fails_at_the_hierarchy_top(orchestrator: Orchestrator) {
    let app = orchestrator
        .create("app", Profile::new("store"))
        .expect("create");
    let err = app.find_service("metrics").expect_err("nothing published");
    assert!(matches!(
        err,
        RuntimeError::ServiceNotFound { ref contract, .. } if contract == "metrics"
    ));
}

/// A system registry double serving one contract and counting lookups.
struct FixedRegistry {
    contract: String,
    instance: Instance,
    lookups: AtomicUsize,
}

impl SystemRegistry for FixedRegistry {
    fn get_by_id(&self, _id: &ComponentId) -> Option<Instance> {
        None
    }

    fn get_by_contract(&self, contract: &str) -> Option<Instance> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        (contract == self.contract).then(|| Arc::clone(&self.instance))
    }

    fn subscribe(&self, _listener: Arc<dyn RegistryListener>) {}
}

fn system_orchestrator(registry: &Arc<FixedRegistry>) -> Orchestrator {
    let orchestrator = Orchestrator::builder()
        .with_system_registry(Arc::clone(registry) as Arc<dyn SystemRegistry>)
        .build();
    let definition = TypeDefinition::builder("store", StateGraph::single("idle"))
        .constructor(|_| Ok(Arc::new(String::from("store-instance"))))
        .build()
        .expect("definition builds");
    orchestrator.register_type(definition).expect("register");
    orchestrator
}

#[test]
fn service_lookup_delegates_to_the_system_registry() {
    let registry = Arc::new(FixedRegistry {
        contract: "metrics".to_owned(),
        instance: Arc::new(String::from("meter")),
        lookups: AtomicUsize::new(0),
    });
    let orchestrator = system_orchestrator(&registry);
    let app = orchestrator
        .create("app", Profile::new("store"))
        .expect("create");
    let instance = app.find_service("metrics").expect("delegated");
    assert_eq!(instance.downcast_ref::<String>().expect("string"), "meter");
}

#[test]
fn non_volatile_service_context_is_resolved_once() {
    let registry = Arc::new(FixedRegistry {
        contract: "metrics".to_owned(),
        instance: Arc::new(String::from("meter")),
        lookups: AtomicUsize::new(0),
    });
    let orchestrator = system_orchestrator(&registry);
    let profile = Profile::new("store").with_context(
        ContextDecl::new("metrics", ContextSpec::Service("metrics".to_owned())).non_volatile(),
    );
    let app = orchestrator.create("app", profile).expect("create");
    app.resolve_context("metrics").expect("first read");
    app.resolve_context("metrics").expect("second read");
    assert_eq!(registry.lookups.load(Ordering::SeqCst), 1);
}

#[test]
fn volatile_service_context_is_resolved_on_every_read() {
    let registry = Arc::new(FixedRegistry {
        contract: "metrics".to_owned(),
        instance: Arc::new(String::from("meter")),
        lookups: AtomicUsize::new(0),
    });
    let orchestrator = system_orchestrator(&registry);
    let profile = Profile::new("store").with_context(ContextDecl::new(
        "metrics",
        ContextSpec::Service("metrics".to_owned()),
    ));
    let app = orchestrator.create("app", profile).expect("create");
    app.resolve_context("metrics").expect("first read");
    app.resolve_context("metrics").expect("second read");
    assert_eq!(registry.lookups.load(Ordering::SeqCst), 2);
}

#[test]
fn termination_drops_cached_context_resolutions() {
    let registry = Arc::new(FixedRegistry {
        contract: "metrics".to_owned(),
        instance: Arc::new(String::from("meter")),
        lookups: AtomicUsize::new(0),
    });
    let orchestrator = system_orchestrator(&registry);
    let profile = Profile::new("store").with_context(
        ContextDecl::new("metrics", ContextSpec::Service("metrics".to_owned())).non_volatile(),
    );
    let app = orchestrator.create("app", profile).expect("create");
    // An outstanding handle defers disposal past the terminate below.
    let Resolved::Handle(handle) = app.resolve(true).expect("claim") else {
        panic!("expected a proxy handle");
    };
    app.resolve_context("metrics").expect("first read");
    app.resolve_context("metrics").expect("second read");
    assert_eq!(registry.lookups.load(Ordering::SeqCst), 1);

    // Termination empties the cache, so the next read goes back to the
    // registry.
    app.terminate();
    app.resolve_context("metrics").expect("read after terminate");
    assert_eq!(registry.lookups.load(Ordering::SeqCst), 2);
    drop(handle);
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

#[rstest]
fn accessors_fail_once_the_component_is_gone(orchestrator: Orchestrator) {
    let app = orchestrator
        .create("app", Profile::new("store"))
        .expect("create");
    app.initialize().expect("initialize");
    let context = app.context_accessor();
    let parts = app.parts_accessor();
    orchestrator.shutdown();
    drop(app);
    assert!(matches!(
        context.get("anything").expect_err("owner gone"),
        RuntimeError::Disposed { .. }
    ));
    assert!(matches!(
        parts.get("anything").expect_err("owner gone"),
        RuntimeError::Disposed { .. }
    ));
}
