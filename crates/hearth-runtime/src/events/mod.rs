//! Asynchronous lifecycle notifications.
//!
//! State-changed and initialized-changed notifications are delivered to
//! registered listeners on a dedicated worker thread fed by a bounded
//! channel, so listener code can never block or corrupt the lifecycle thread
//! that produced the event. A listener panic is caught and logged, never
//! propagated. The dispatcher's worker has an explicit shutdown path and is
//! also stopped when the dispatcher is dropped.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use hearth_model::ComponentId;
use tracing::{debug, warn};

/// Tracing target for dispatcher events.
const EVENTS_TARGET: &str = "hearth::events";

/// Notification that a component's current state changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChanged {
    /// The component that transitioned.
    pub id: ComponentId,
    /// The state the component left.
    pub from: String,
    /// The state the component entered.
    pub to: String,
}

/// Notification that a component's initialized flag changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializedChanged {
    /// The component whose flag changed.
    pub id: ComponentId,
    /// The new flag value.
    pub initialized: bool,
}

/// Listener for state-changed notifications.
pub trait StateListener: Send + Sync {
    /// Called on the dispatcher thread after a successful transition.
    fn state_changed(&self, event: &StateChanged);
}

/// Listener for initialized-flag notifications.
pub trait LifecycleListener: Send + Sync {
    /// Called on the dispatcher thread after the flag changes.
    fn initialized_changed(&self, event: &InitializedChanged);
}

#[derive(Debug, Clone)]
enum Event {
    State(StateChanged),
    Initialized(InitializedChanged),
}

#[derive(Default)]
struct Listeners {
    state: RwLock<Vec<Arc<dyn StateListener>>>,
    lifecycle: RwLock<Vec<Arc<dyn LifecycleListener>>>,
}

impl Listeners {
    fn deliver(&self, event: &Event) {
        match event {
            Event::State(state_event) => {
                let snapshot: Vec<Arc<dyn StateListener>> = self
                    .state
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                for listener in snapshot {
                    let outcome =
                        catch_unwind(AssertUnwindSafe(|| listener.state_changed(state_event)));
                    if outcome.is_err() {
                        warn!(
                            target: EVENTS_TARGET,
                            component = %state_event.id,
                            "state listener panicked; notification dropped"
                        );
                    }
                }
            }
            Event::Initialized(lifecycle_event) => {
                let snapshot: Vec<Arc<dyn LifecycleListener>> = self
                    .lifecycle
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                for listener in snapshot {
                    let outcome = catch_unwind(AssertUnwindSafe(|| {
                        listener.initialized_changed(lifecycle_event);
                    }));
                    if outcome.is_err() {
                        warn!(
                            target: EVENTS_TARGET,
                            component = %lifecycle_event.id,
                            "lifecycle listener panicked; notification dropped"
                        );
                    }
                }
            }
        }
    }
}

/// Per-orchestrator notification dispatcher.
///
/// One bounded channel, one worker thread. Publishing never blocks: when
/// the queue is full the notification is dropped with a warning and counted.
pub struct EventDispatcher {
    sender: Mutex<Option<SyncSender<Event>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    listeners: Arc<Listeners>,
    dropped: AtomicU64,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventDispatcher {
    /// Creates a dispatcher with the given queue capacity and starts its
    /// worker thread.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = sync_channel(capacity.max(1));
        let listeners = Arc::new(Listeners::default());
        let worker_listeners = Arc::clone(&listeners);
        let worker = thread::spawn(move || run_delivery_loop(&receiver, &worker_listeners));
        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            listeners,
            dropped: AtomicU64::new(0),
        }
    }

    /// Registers a state-changed listener.
    pub fn add_state_listener(&self, listener: Arc<dyn StateListener>) {
        self.listeners
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Removes a previously registered state-changed listener.
    pub fn remove_state_listener(&self, listener: &Arc<dyn StateListener>) {
        self.listeners
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|existing| !Arc::ptr_eq(existing, listener));
    }

    /// Registers an initialized-flag listener.
    pub fn add_lifecycle_listener(&self, listener: Arc<dyn LifecycleListener>) {
        self.listeners
            .lifecycle
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Queues a state-changed notification.
    pub fn publish_state(&self, event: StateChanged) {
        self.publish(Event::State(event));
    }

    /// Queues an initialized-flag notification.
    pub fn publish_initialized(&self, event: InitializedChanged) {
        self.publish(Event::Initialized(event));
    }

    /// Returns how many notifications were dropped on queue overflow.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn publish(&self, event: Event) {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            debug!(target: EVENTS_TARGET, "dispatcher already shut down; notification dropped");
            return;
        };
        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(target: EVENTS_TARGET, "notification queue full; event dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!(target: EVENTS_TARGET, "dispatcher worker gone; notification dropped");
            }
        }
    }

    /// Stops the worker after draining queued notifications and joins it.
    pub fn shutdown(&self) {
        // Dropping the sender ends the worker's recv loop.
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = worker {
            if handle.join().is_err() {
                warn!(target: EVENTS_TARGET, "dispatcher worker panicked during shutdown");
            }
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_delivery_loop(receiver: &Receiver<Event>, listeners: &Listeners) {
    while let Ok(event) = receiver.recv() {
        listeners.deliver(&event);
    }
    debug!(target: EVENTS_TARGET, "dispatcher worker stopped");
}
