//! End-to-end lifecycle scenarios: dependency-ordered startup and shutdown,
//! the automatic transition loops, named transitions and operations, and
//! handle-counted disposal.

#![expect(clippy::expect_used, reason = "tests use expect for clarity")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use hearth_runtime::{
    CallbackError, ComponentId, Containing, HandlerScope, InitializedChanged, LifecycleListener,
    Operation,
    Orchestrator, Profile, Resolved, RuntimeError, State, StateChanged, StateGraph, StateListener,
    Transition, TransitionOutcome, TypeDefinition,
};
use rstest::{fixture, rstest};

/// Shared append-only record of constructor and handler activity.
#[derive(Clone, Default)]
struct Recorder {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn push(&self, entry: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn scope_name(scope: &HandlerScope<'_>) -> String {
    scope
        .logger
        .scope()
        .rsplit('/')
        .next()
        .unwrap_or("?")
        .to_owned()
}

/// A service type with a two-step initialization chain
/// (`created -> ready -> running`), a mirrored terminator chain, a named
/// `stop` transition and a `ping` operation.
fn service_graph() -> StateGraph {
    StateGraph::builder("created")
        .state(
            State::named("created")
                .on_initialize(Transition::with_handler("ready", "boot"))
                .build(),
        )
        .state(
            State::named("ready")
                .on_initialize(Transition::to("running"))
                .on_terminate(Transition::to("created"))
                .operation("ping", Operation::with_handler("ping"))
                .build(),
        )
        .state(
            State::named("running")
                .parent("ready")
                .on_terminate(Transition::with_handler("ready", "quiesce"))
                .transition("stop", Transition::with_handler("ready", "quiesce"))
                .build(),
        )
        .build()
        .expect("service graph builds")
}

fn service_type(recorder: &Recorder) -> TypeDefinition {
    let on_new = recorder.clone();
    let on_boot = recorder.clone();
    let on_quiesce = recorder.clone();
    let on_ping = recorder.clone();
    let on_dispose = recorder.clone();
    TypeDefinition::builder("service", service_graph())
        .params(["logger"])
        .constructor(move |args| {
            let logger = args.logger().ok_or("missing logger")?;
            let name = logger.scope().rsplit('/').next().unwrap_or("?");
            on_new.push(format!("new:{name}"));
            Ok(Arc::new(()))
        })
        .handler("boot", move |scope| {
            on_boot.push(format!("boot:{}", scope_name(&scope)));
            Ok(())
        })
        .handler("quiesce", move |scope| {
            on_quiesce.push(format!("quiesce:{}", scope_name(&scope)));
            Ok(())
        })
        .handler("ping", move |scope| {
            on_ping.push(format!("ping:{}", scope_name(&scope)));
            Ok(())
        })
        .disposer(move |_| on_dispose.push("dispose"))
        .build()
        .expect("service type builds")
}

#[fixture]
fn recorder() -> Recorder {
    Recorder::default()
}

fn orchestrator_with(recorder: &Recorder) -> Orchestrator {
    let orchestrator = Orchestrator::builder().build();
    orchestrator
        .register_type(service_type(recorder))
        .expect("register service type");
    orchestrator
}

/// `app` containing `db` and `cache`, with cache depending on db.
fn app_profile() -> Profile {
    Profile::new("service")
        .with_part("db", Profile::new("service"))
        .with_part("cache", Profile::new("service").with_dependency("db"))
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

#[rstest]
fn initialization_is_provider_first_and_runs_the_transition_chain(recorder: Recorder) {
    let orchestrator = orchestrator_with(&recorder);
    let app = orchestrator.create("app", app_profile()).expect("create");
    app.initialize().expect("initializes");

    assert!(app.is_initialized());
    assert_eq!(app.current_state(), "running");
    for key in ["db", "cache"] {
        let part = app.part(key).expect("part exists");
        assert!(part.is_initialized());
        assert_eq!(part.current_state(), "running");
    }

    let entries = recorder.entries();
    let position = |entry: &str| {
        entries
            .iter()
            .position(|candidate| candidate == entry)
            .expect("entry recorded")
    };
    // Parts come up before the container, providers before consumers, and
    // each constructor runs before its own boot handler.
    assert!(position("new:db") < position("new:cache"));
    assert!(position("new:cache") < position("new:app"));
    assert!(position("new:db") < position("boot:db"));
    assert!(position("boot:cache") < position("new:app"));
}

#[rstest]
fn initialization_is_idempotent(recorder: Recorder) {
    let orchestrator = orchestrator_with(&recorder);
    let app = orchestrator.create("app", app_profile()).expect("create");
    app.initialize().expect("first");
    let before = recorder.entries().len();
    app.initialize().expect("second");
    assert_eq!(recorder.entries().len(), before);
}

#[test]
fn concurrent_initialization_runs_the_constructor_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let orchestrator = Orchestrator::builder().build();
    let definition = TypeDefinition::builder("slow", StateGraph::single("idle"))
        .constructor(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            Ok(Arc::new(()))
        })
        .build()
        .expect("slow type builds");
    orchestrator.register_type(definition).expect("register");
    let component = orchestrator
        .create("app", Profile::new("slow"))
        .expect("create");

    let racing = component.clone();
    let racer = thread::spawn(move || racing.initialize());
    component.initialize().expect("initializes");
    racer.join().expect("no panic").expect("initializes");

    assert!(component.is_initialized());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[rstest]
fn part_failure_aborts_initialization_naming_the_part(recorder: Recorder) {
    let orchestrator = orchestrator_with(&recorder);
    let fragile = TypeDefinition::builder("fragile", StateGraph::single("idle"))
        .constructor(|_| Err(CallbackError::new("disk full")))
        .build()
        .expect("fragile type builds");
    orchestrator.register_type(fragile).expect("register");
    let profile = Profile::new("service").with_part("store", Profile::new("fragile"));
    let app = orchestrator.create("app", profile).expect("create");

    let err = app.initialize().expect_err("part fails");
    assert!(matches!(
        err,
        RuntimeError::PartFailed { ref key, .. } if key == "store"
    ));
    assert!(!app.is_initialized());
    // The container's own constructor never ran.
    assert!(recorder.entries().iter().all(|entry| entry != "new:app"));
}

#[test]
fn recursive_initialization_is_detected_with_its_chain() {
    let orchestrator = Orchestrator::builder().build();
    let graph = StateGraph::builder("a")
        .state(State::named("a").on_initialize(Transition::to("b")).build())
        .state(State::named("b").on_initialize(Transition::to("a")).build())
        .build()
        .expect("looping graph builds");
    let definition = TypeDefinition::builder("looper", graph)
        .constructor(|_| Ok(Arc::new(())))
        .build()
        .expect("looper builds");
    orchestrator.register_type(definition).expect("register");
    let component = orchestrator
        .create("loop", Profile::new("looper"))
        .expect("create");

    let err = component.initialize().expect_err("loop detected");
    let RuntimeError::RecursiveInitialization { chain, .. } = err else {
        panic!("expected recursive initialization, got {err}");
    };
    assert_eq!(chain.first(), chain.last());
    assert!(chain.len() >= 3, "chain shows the loop: {chain:?}");
    assert!(!component.is_initialized());
}

#[test]
fn broken_handler_bindings_fail_before_any_side_effect() {
    let recorder = Recorder::default();
    let on_new = recorder.clone();
    let orchestrator = Orchestrator::builder().build();
    let graph = StateGraph::builder("created")
        .state(
            State::named("created")
                .on_initialize(Transition::with_handler("ready", "missing"))
                .build(),
        )
        .state(State::named("ready").build())
        .build()
        .expect("graph builds");
    let definition = TypeDefinition::builder("broken", graph)
        .constructor(move |_| {
            on_new.push("new");
            Ok(Arc::new(()))
        })
        .build()
        .expect("broken builds");
    orchestrator.register_type(definition).expect("register");
    let component = orchestrator
        .create("app", Profile::new("broken"))
        .expect("create");

    let err = component.initialize().expect_err("binding invalid");
    assert!(matches!(
        err,
        RuntimeError::InvalidBinding { ref handler, .. } if handler == "missing"
    ));
    assert!(recorder.entries().is_empty(), "constructor must not run");
}

// ---------------------------------------------------------------------------
// Transitions and operations
// ---------------------------------------------------------------------------

#[rstest]
fn named_transition_moves_the_state_and_dispatches(recorder: Recorder) {
    let orchestrator = orchestrator_with(&recorder);
    let app = orchestrator
        .create("app", Profile::new("service"))
        .expect("create");
    app.initialize().expect("initializes");

    let outcome = app.apply("stop").expect("stop resolves");
    assert_eq!(
        outcome,
        TransitionOutcome::Applied {
            from: "running".to_owned(),
            to: "ready".to_owned(),
        }
    );
    assert_eq!(app.current_state(), "ready");
    assert!(recorder.entries().contains(&"quiesce:app".to_owned()));
}

#[rstest]
fn transition_to_the_current_state_is_a_no_op(recorder: Recorder) {
    let orchestrator = orchestrator_with(&recorder);
    let loopback = TypeDefinition::builder(
        "loopback",
        StateGraph::builder("idle")
            .state(
                State::named("idle")
                    .transition("refresh", Transition::with_handler("idle", "never"))
                    .build(),
            )
            .build()
            .expect("graph builds"),
    )
    .constructor(|_| Ok(Arc::new(())))
    .handler("never", |_| Err(CallbackError::new("must not dispatch")))
    .build()
    .expect("loopback builds");
    orchestrator.register_type(loopback).expect("register");
    let component = orchestrator
        .create("same", Profile::new("loopback"))
        .expect("create");
    component.initialize().expect("initializes");

    let outcome = component.apply("refresh").expect("no-op succeeds");
    assert_eq!(outcome, TransitionOutcome::NoChange);
    assert_eq!(component.current_state(), "idle");
}

#[rstest]
fn unknown_transition_and_operation_keys_are_reported(recorder: Recorder) {
    let orchestrator = orchestrator_with(&recorder);
    let app = orchestrator
        .create("app", Profile::new("service"))
        .expect("create");
    app.initialize().expect("initializes");

    assert!(matches!(
        app.apply("hibernate").expect_err("unknown transition"),
        RuntimeError::UnknownTransition { ref key, .. } if key == "hibernate"
    ));
    assert!(matches!(
        app.execute("defragment").expect_err("unknown operation"),
        RuntimeError::UnknownOperation { ref key, .. } if key == "defragment"
    ));
}

#[rstest]
fn operations_resolve_through_the_state_chain_without_moving(recorder: Recorder) {
    let orchestrator = orchestrator_with(&recorder);
    let app = orchestrator
        .create("app", Profile::new("service"))
        .expect("create");
    app.initialize().expect("initializes");

    // `ping` is declared on `ready`; `running` inherits it via the chain.
    assert_eq!(app.current_state(), "running");
    app.execute("ping").expect("ping resolves");
    assert_eq!(app.current_state(), "running");
    assert!(recorder.entries().contains(&"ping:app".to_owned()));
}

#[rstest]
fn failed_transition_handler_leaves_the_state_unchanged(recorder: Recorder) {
    let orchestrator = orchestrator_with(&recorder);
    let sticky = TypeDefinition::builder(
        "sticky",
        StateGraph::builder("idle")
            .state(
                State::named("idle")
                    .transition("go", Transition::with_handler("gone", "fail"))
                    .build(),
            )
            .state(State::named("gone").build())
            .build()
            .expect("graph builds"),
    )
    .constructor(|_| Ok(Arc::new(())))
    .handler("fail", |_| Err(CallbackError::new("not today")))
    .build()
    .expect("sticky builds");
    orchestrator.register_type(sticky).expect("register");
    let component = orchestrator
        .create("stuck", Profile::new("sticky"))
        .expect("create");
    component.initialize().expect("initializes");

    let err = component.apply("go").expect_err("handler fails");
    assert!(matches!(err, RuntimeError::Handler { .. }));
    assert_eq!(component.current_state(), "idle");
}

#[rstest]
fn apply_and_execute_initialize_on_demand(recorder: Recorder) {
    let orchestrator = orchestrator_with(&recorder);
    let app = orchestrator
        .create("app", Profile::new("service"))
        .expect("create");
    // The initialization chain runs first and lands on `running`, where
    // `stop` resolves.
    let outcome = app.apply("stop").expect("initializes then applies");
    assert_eq!(
        outcome,
        TransitionOutcome::Applied {
            from: "running".to_owned(),
            to: "ready".to_owned(),
        }
    );
    assert!(app.is_initialized());

    let worker = orchestrator
        .create("worker", Profile::new("service"))
        .expect("create");
    worker.execute("ping").expect("initializes then executes");
    assert!(worker.is_initialized());
    assert!(recorder.entries().contains(&"ping:worker".to_owned()));
}

// ---------------------------------------------------------------------------
// Termination
// ---------------------------------------------------------------------------

#[rstest]
fn termination_is_consumer_first_and_resets_the_state(recorder: Recorder) {
    let orchestrator = orchestrator_with(&recorder);
    let app = orchestrator.create("app", app_profile()).expect("create");
    app.initialize().expect("initializes");
    app.terminate();

    assert!(!app.is_initialized());
    assert_eq!(app.current_state(), "created");
    for key in ["db", "cache"] {
        let part = app.part(key).expect("part exists");
        assert!(!part.is_initialized());
        assert_eq!(part.current_state(), "created");
    }

    let entries = recorder.entries();
    let position = |entry: &str| {
        entries
            .iter()
            .position(|candidate| candidate == entry)
            .expect("entry recorded")
    };
    // Consumers go down before their providers, parts before the container.
    assert!(position("quiesce:cache") < position("quiesce:db"));
    assert!(position("quiesce:db") < position("quiesce:app"));
}

#[rstest]
fn termination_is_idempotent_and_survives_handler_failures(recorder: Recorder) {
    let orchestrator = orchestrator_with(&recorder);
    let on_down = recorder.clone();
    let flaky = TypeDefinition::builder(
        "flaky",
        StateGraph::builder("idle")
            .state(
                State::named("idle")
                    .on_initialize(Transition::to("mid"))
                    .build(),
            )
            .state(
                State::named("mid")
                    .on_initialize(Transition::to("up"))
                    .on_terminate(Transition::with_handler("idle", "down"))
                    .build(),
            )
            .state(
                State::named("up")
                    .on_terminate(Transition::with_handler("mid", "refuse"))
                    .build(),
            )
            .build()
            .expect("graph builds"),
    )
    .constructor(|_| Ok(Arc::new(())))
    .handler("refuse", |_| Err(CallbackError::new("refuses to stop")))
    .handler("down", move |_| {
        on_down.push("down:app");
        Ok(())
    })
    .build()
    .expect("flaky builds");
    orchestrator.register_type(flaky).expect("register");
    let profile = Profile::new("flaky").with_part("db", Profile::new("service"));
    let app = orchestrator.create("app", profile).expect("create");
    app.initialize().expect("initializes");
    assert_eq!(app.current_state(), "up");

    // The first terminator handler fails, yet the chain keeps walking: the
    // later terminator still runs, the part is down, the flag is clear and
    // the state is back at the root.
    app.terminate();
    assert!(!app.is_initialized());
    assert_eq!(app.current_state(), "idle");
    assert!(recorder.entries().contains(&"down:app".to_owned()));
    let db = app.part("db").expect("db exists");
    assert!(!db.is_initialized());
    assert!(recorder.entries().contains(&"quiesce:db".to_owned()));

    // A second terminate is a quiet no-op.
    app.terminate();
}

// ---------------------------------------------------------------------------
// Handles and disposal
// ---------------------------------------------------------------------------

#[rstest]
fn disposal_waits_for_the_last_handle(recorder: Recorder) {
    let orchestrator = orchestrator_with(&recorder);
    let app = orchestrator
        .create("app", Profile::new("service"))
        .expect("create");

    let resolved = app.resolve(true).expect("resolve with a claim");
    let Resolved::Handle(handle) = resolved else {
        panic!("expected a counted handle");
    };
    assert!(handle.instance().is_ok());

    app.terminate();
    assert!(!app.is_initialized());
    assert!(!app.is_disposed(), "live handle defers disposal");
    assert!(!recorder.entries().contains(&"dispose".to_owned()));

    drop(handle);
    assert!(app.is_disposed());
    assert!(recorder.entries().contains(&"dispose".to_owned()));
}

#[rstest]
fn terminate_without_handles_disposes_immediately(recorder: Recorder) {
    let orchestrator = orchestrator_with(&recorder);
    let app = orchestrator
        .create("app", Profile::new("service"))
        .expect("create");
    app.initialize().expect("initializes");
    app.terminate();
    assert!(app.is_disposed());
    assert!(recorder.entries().contains(&"dispose".to_owned()));
    assert!(matches!(
        app.initialize().expect_err("disposed components stay down"),
        RuntimeError::Disposed { .. }
    ));
    assert!(matches!(
        app.apply("stop").expect_err("disposed components stay down"),
        RuntimeError::Disposed { .. }
    ));
}

#[rstest]
fn raw_resolution_returns_the_bare_instance(recorder: Recorder) {
    let orchestrator = orchestrator_with(&recorder);
    let app = orchestrator
        .create("app", Profile::new("service"))
        .expect("create");
    let resolved = app.resolve(false).expect("resolve raw");
    assert!(matches!(resolved, Resolved::Raw(_)));
    assert!(app.is_initialized(), "resolution initializes on demand");
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

struct ForwardState(std::sync::mpsc::Sender<StateChanged>);

impl StateListener for ForwardState {
    fn state_changed(&self, event: &StateChanged) {
        drop(self.0.send(event.clone()));
    }
}

struct ForwardLifecycle(std::sync::mpsc::Sender<InitializedChanged>);

impl LifecycleListener for ForwardLifecycle {
    fn initialized_changed(&self, event: &InitializedChanged) {
        drop(self.0.send(event.clone()));
    }
}

#[rstest]
fn listeners_observe_the_initialization_chain(recorder: Recorder) {
    let orchestrator = orchestrator_with(&recorder);
    let (state_sender, state_receiver) = channel();
    let (flag_sender, flag_receiver) = channel();
    orchestrator.add_state_listener(Arc::new(ForwardState(state_sender)));
    orchestrator.add_lifecycle_listener(Arc::new(ForwardLifecycle(flag_sender)));

    let app = orchestrator
        .create("app", Profile::new("service"))
        .expect("create");
    app.initialize().expect("initializes");

    let wait = Duration::from_secs(5);
    let first = state_receiver.recv_timeout(wait).expect("first hop");
    assert_eq!((first.from.as_str(), first.to.as_str()), ("created", "ready"));
    let second = state_receiver.recv_timeout(wait).expect("second hop");
    assert_eq!((second.from.as_str(), second.to.as_str()), ("ready", "running"));

    let flag = flag_receiver.recv_timeout(wait).expect("flag raised");
    assert_eq!(flag.id, ComponentId::parse("component://app").expect("id"));
    assert!(flag.initialized);
}
