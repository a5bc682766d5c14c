//! # EngineController: per-consumer engine lifecycle.
//!
//! One controller owns one [`EngineConfig`] and drives the load/reload/destroy
//! state machine for the engine its consumer uses. With a sharing key it goes
//! through the [`SingletonRegistry`]; without one it owns a private engine.
//!
//! ## Load path
//! ```text
//! load()
//!   ├─ destroyed                        → resolved no-op
//!   ├─ load memoized                    → same LoadTask
//!   ├─ no runtime / backend unavailable → Idle (degraded, not an error)
//!   └─ Loading
//!        ├─ shared key, live entry      → adopt (refs += 1)           → Ready
//!        ├─ shared key, in construction → join, await the shared task
//!        ├─ shared key, absent          → construct, registry.complete(ticket)
//!        └─ private                     → factory.create(url, logger)
//!                                            │ (spawned; awaits the construction)
//!                                            ▼
//!                      destroyed or reloaded meanwhile?
//!                        ├─ yes → release / teardown the late engine (EngineDiscarded)
//!                        └─ no  → Ready(engine) | Failed(reason)
//! ```
//!
//! ## Rules
//! - At most one construction per controller at a time; concurrent `load()` calls
//!   return the same [`LoadTask`].
//! - `destroy()`/`reload()` never cancel a construction; they bump the controller's
//!   generation so the late result is discarded on arrival.
//! - Registry release and engine teardown run outside the controller lock.
//! - The controller remembers the registry [`Lease`] it actually holds, so a reload
//!   that changes the key releases the old one, and a lease on a force-cleared
//!   entry never touches an entry rebuilt under the same key.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::core::config::{EngineConfig, EngineConfigPatch};
use crate::core::registry::{
    Acquire, Completion, ConstructionTicket, Lease, Release, SingletonRegistry,
};
use crate::core::state::EngineState;
use crate::engine::{Backends, EngineRef, FactoryRef, teardown};
use crate::error::ErrorReason;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{Task, TaskHelper};

/// Completion of a `load()` call. Never rejects; the outcome lives in the controller state.
pub type LoadTask = Task<(), Infallible>;

static CONTROLLER_ID: AtomicU64 = AtomicU64::new(1);

/// What a controller lets go of on teardown.
enum Held {
    Shared(Lease),
    Private(EngineRef),
}

impl Held {
    fn new(engine: EngineRef, lease: Option<Lease>) -> Self {
        match lease {
            Some(lease) => Held::Shared(lease),
            None => Held::Private(engine),
        }
    }
}

/// Where a construction result comes from.
enum Origin {
    Private,
    Joined(Lease),
    Constructed(ConstructionTicket),
}

/// Releases engines and reports it. Outlives the controller inside in-flight loads.
#[derive(Clone)]
struct Releaser {
    id: u64,
    registry: Arc<SingletonRegistry>,
    bus: Bus,
}

impl Releaser {
    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_controller(self.id)
    }

    fn let_go(&self, held: Held) {
        match held {
            Held::Shared(lease) => {
                let refs = match self.registry.release_lease(&lease) {
                    Release::Decremented(n) => n,
                    Release::TornDown => 0,
                    Release::Untracked => return,
                };
                self.bus.publish(
                    self.event(EventKind::EngineReleased)
                        .with_key(lease.key())
                        .with_refs(refs),
                );
            }
            Held::Private(engine) => {
                teardown(&engine);
                self.bus.publish(self.event(EventKind::EngineDestroyed));
            }
        }
    }

    fn discard(&self, held: Held) {
        let key = match &held {
            Held::Shared(lease) => Some(lease.key().to_string()),
            Held::Private(_) => None,
        };
        self.let_go(held);
        self.bus
            .publish(self.event(EventKind::EngineDiscarded).with_key_opt(key.as_deref()));
    }
}

struct Inner {
    config: EngineConfig,
    factory: Option<FactoryRef>,
    destroyed: bool,
    generation: u64,
    pending: Option<LoadTask>,
    lease: Option<Lease>,
}

/// Drives one consumer's engine through `Idle → Loading → Ready | Failed → Destroyed`.
///
/// Created by [`EngineHub::controller`](crate::EngineHub::controller). Dropping the
/// last reference destroys it.
pub struct EngineController {
    releaser: Releaser,
    backends: Backends,
    inner: Mutex<Inner>,
    state: watch::Sender<EngineState>,
}

impl EngineController {
    pub(crate) fn new(
        config: EngineConfig,
        registry: Arc<SingletonRegistry>,
        backends: Backends,
        bus: Bus,
    ) -> Arc<Self> {
        let factory = backends.resolve(config.mode);
        let (state, _) = watch::channel(EngineState::Idle);
        Arc::new(Self {
            releaser: Releaser {
                id: CONTROLLER_ID.fetch_add(1, Ordering::Relaxed),
                registry,
                bus,
            },
            backends,
            inner: Mutex::new(Inner {
                config,
                factory,
                destroyed: false,
                generation: 0,
                pending: None,
                lease: None,
            }),
            state,
        })
    }

    /// Loads the engine, or returns the load already started.
    ///
    /// The returned task resolves once the controller left `Loading` (or the
    /// load turned out to be stale). A destroyed controller returns a resolved task.
    pub fn load(self: &Arc<Self>) -> LoadTask {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return LoadTask::from_value(());
        }
        if let Some(pending) = &inner.pending {
            return pending.clone();
        }
        let task = LoadTask::new();
        inner.pending = Some(task.clone());

        let mode = inner.config.mode;
        let factory = inner.factory.clone();
        let runtime = Handle::try_current()
            .ok()
            .filter(|_| factory.as_ref().is_none_or(|f| f.is_available()));
        let Some(runtime) = runtime else {
            self.set_state(EngineState::Idle);
            self.publish(self.event(EventKind::EnvironmentUnavailable).with_mode(mode));
            drop(inner);
            let _ = task.resolve(());
            return task;
        };

        let key = inner.config.sharing_key().map(str::to_owned);
        self.set_state(EngineState::Loading);
        self.publish(
            self.event(EventKind::LoadStarted)
                .with_mode(mode)
                .with_key_opt(key.as_deref()),
        );

        let (origin, joined) = match key {
            None => (Origin::Private, None),
            Some(key) => match self.releaser.registry.acquire(&key) {
                Acquire::Adopted { engine, refs, lease } => {
                    inner.lease = Some(lease);
                    self.set_state(EngineState::Ready(engine));
                    self.publish(self.event(EventKind::EngineAdopted).with_key(key).with_refs(refs));
                    drop(inner);
                    let _ = task.resolve(());
                    return task;
                }
                Acquire::Joined { task: construction, lease } => {
                    self.publish(self.event(EventKind::ConstructionJoined).with_key(key.as_str()));
                    (Origin::Joined(lease), Some(construction))
                }
                Acquire::Construct(ticket) => (Origin::Constructed(ticket), None),
            },
        };
        let generation = inner.generation;
        let url = inner.config.resource_url.clone();
        let logger = Arc::clone(&inner.config.logger);
        drop(inner);

        let (construction, source) = match (joined, &factory) {
            (Some(construction), _) => (construction, "registry".to_string()),
            (None, Some(factory)) => (factory.create(&url, logger), factory.name().to_string()),
            (None, None) => (
                TaskHelper::reject(ErrorReason::not_supported(format!(
                    "no engine factory for mode `{}`",
                    mode.as_label()
                ))),
                String::new(),
            ),
        };
        let kind = match origin {
            Origin::Joined(_) => EventKind::EngineAdopted,
            _ => EventKind::EngineCreated,
        };

        let weak: Weak<Self> = Arc::downgrade(self);
        let releaser = self.releaser.clone();
        let done = task.clone();
        runtime.spawn(async move {
            let outcome = construction.settled().await;
            let landed = match origin {
                Origin::Private => outcome.map(|engine| (engine, None)),
                Origin::Joined(lease) => outcome.map(|engine| (engine, Some(lease))),
                Origin::Constructed(ticket) => {
                    let lease = ticket.lease();
                    releaser.registry.complete(ticket, outcome).map(|c| match c {
                        Completion::Shared(engine) => (engine, Some(lease)),
                        Completion::Detached(engine) => (engine, None),
                    })
                }
            };
            match weak.upgrade() {
                Some(ctrl) => ctrl.finish_load(generation, landed, kind, source),
                None => {
                    if let Ok((engine, lease)) = landed {
                        releaser.discard(Held::new(engine, lease));
                    }
                }
            }
            let _ = done.resolve(());
        });
        task
    }

    fn finish_load(
        &self,
        generation: u64,
        landed: Result<(EngineRef, Option<Lease>), ErrorReason>,
        kind: EventKind,
        source: String,
    ) {
        let mut inner = self.inner.lock();
        if inner.destroyed || inner.generation != generation {
            drop(inner);
            if let Ok((engine, lease)) = landed {
                self.releaser.discard(Held::new(engine, lease));
            }
            return;
        }

        match landed {
            Ok((engine, lease)) => {
                let ev = self
                    .event(kind)
                    .with_key_opt(lease.as_ref().map(Lease::key))
                    .with_source(source);
                inner.lease = lease;
                self.set_state(EngineState::Ready(engine));
                self.publish(ev);
            }
            Err(reason) => {
                tracing::debug!(controller = self.id(), %reason, "engine construction failed");
                let key = inner.config.sharing_key().map(str::to_owned);
                let ev = self
                    .event(EventKind::LoadFailed)
                    .with_key_opt(key.as_deref())
                    .with_reason(reason.to_string());
                self.set_state(EngineState::Failed(reason));
                self.publish(ev);
            }
        }
    }

    /// Merges `patch` into the configuration, lets go of the current engine and loads again.
    ///
    /// A construction still in flight is not cancelled; its result is discarded on arrival.
    pub fn reload(self: &Arc<Self>, patch: EngineConfigPatch) -> LoadTask {
        let held = {
            let mut inner = self.inner.lock();
            if inner.destroyed {
                return LoadTask::from_value(());
            }
            patch.apply(&mut inner.config);
            inner.factory = self.backends.resolve(inner.config.mode);
            self.publish(
                self.event(EventKind::ReloadRequested)
                    .with_mode(inner.config.mode)
                    .with_key_opt(inner.config.sharing_key()),
            );
            let held = self.detach(&mut inner);
            self.set_state(EngineState::Idle);
            held
        };
        if let Some(held) = held {
            self.releaser.let_go(held);
        }
        self.load()
    }

    /// Terminal teardown. Idempotent.
    ///
    /// Releases the registry reference when one is held, otherwise tears the
    /// private engine down. Later `load`/`reload` calls have no effect.
    pub fn destroy(&self) {
        let held = {
            let mut inner = self.inner.lock();
            if inner.destroyed {
                return;
            }
            inner.destroyed = true;
            let held = self.detach(&mut inner);
            self.set_state(EngineState::Destroyed);
            held
        };
        if let Some(held) = held {
            self.releaser.let_go(held);
        }
        self.publish(self.event(EventKind::ControllerDestroyed));
    }

    /// Invalidates in-flight loads and takes what must be let go of.
    fn detach(&self, inner: &mut Inner) -> Option<Held> {
        inner.generation += 1;
        inner.pending = None;
        let engine = self.state.borrow().engine();
        match inner.lease.take() {
            Some(lease) => Some(Held::Shared(lease)),
            None => engine.map(Held::Private),
        }
    }

    /// Must be called with the inner lock held so observers see transitions in order.
    fn set_state(&self, state: EngineState) {
        let label = state.as_label();
        self.state.send_replace(state);
        self.publish(self.event(EventKind::StateChanged).with_state(label));
    }

    fn event(&self, kind: EventKind) -> Event {
        self.releaser.event(kind)
    }

    pub(crate) fn publish(&self, ev: Event) {
        self.releaser.bus.publish(ev);
    }

    /// Published engine, if any.
    pub fn engine(&self) -> Option<EngineRef> {
        self.state.borrow().engine()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    /// Error of the last construction, if it failed.
    pub fn error(&self) -> Option<ErrorReason> {
        self.state.borrow().error().cloned()
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> EngineConfig {
        self.inner.lock().config.clone()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> EngineState {
        self.state.borrow().clone()
    }

    /// Receiver observing every state change.
    pub fn watch(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Registry key this controller currently holds a reference for.
    pub fn held_key(&self) -> Option<String> {
        self.inner.lock().lease.as_ref().map(|l| l.key().to_string())
    }

    /// Process-unique controller id (used in events).
    pub fn id(&self) -> u64 {
        self.releaser.id
    }
}

impl Drop for EngineController {
    fn drop(&mut self) {
        self.destroy();
    }
}
