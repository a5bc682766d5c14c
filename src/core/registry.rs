//! # Singleton registry: process-wide, reference-counted shared engines.
//!
//! Maps a sharing key to either a live engine with its reference count, or a
//! construction still in flight. Controllers configured with the same key share
//! one engine; the engine is torn down when the last holder releases it.
//!
//! ## Architecture
//! ```text
//! acquire(key)
//!   ├─ Ready{engine, refs}          → refs += 1            → Acquire::Adopted
//!   ├─ Constructing{task, waiters}  → waiters += 1         → Acquire::Joined{task, lease}
//!   └─ absent                       → insert Constructing  → Acquire::Construct(ticket)
//!
//! complete(ticket, Ok(engine))
//!   ├─ marker still ours → Ready{engine, refs: 1 + waiters}, resolve task → Completion::Shared
//!   └─ marker gone       → engine stays private                          → Completion::Detached
//! complete(ticket, Err(reason)) → entry removed, task rejected (joiners fail too)
//!
//! release(key) / release_lease(lease)
//!   ├─ refs > 1 → refs -= 1           → Release::Decremented(refs)
//!   ├─ refs = 1 → remove + teardown   → Release::TornDown
//!   └─ absent   → no-op               → Release::Untracked
//!      (or, for a lease, an entry from another epoch)
//! ```
//!
//! ## Rules
//! - Every operation is one atomic map mutation under a single lock.
//! - Engine teardown and task settlement run after the lock is released.
//! - A joiner's reference is counted as soon as the construction succeeds; a
//!   joiner that no longer wants the engine must release it.
//! - Every entry has an epoch. A [`Lease`] only releases the entry it was taken
//!   from, so a holder cleared by [`force_clear`](SingletonRegistry::force_clear)
//!   cannot drop a reference of an entry rebuilt under the same key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::engine::{EngineRef, teardown};
use crate::error::ErrorReason;
use crate::tasks::{EngineTask, TaskHelper};

/// Process-wide registry used when a hub is not given its own.
static GLOBAL: OnceLock<Arc<SingletonRegistry>> = OnceLock::new();

/// One registry entry.
enum Slot {
    Ready {
        engine: EngineRef,
        refs: usize,
        epoch: u64,
    },
    Constructing {
        ticket: u64,
        task: EngineTask<EngineRef>,
        waiters: usize,
    },
}

/// One holder's reference on a registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    key: String,
    epoch: u64,
}

impl Lease {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Outcome of [`SingletonRegistry::acquire`].
pub enum Acquire {
    /// A live engine was adopted; the caller now holds one reference.
    Adopted {
        engine: EngineRef,
        refs: usize,
        lease: Lease,
    },
    /// Another caller is constructing the engine. On success the caller holds
    /// `lease`; on failure it holds nothing.
    Joined {
        task: EngineTask<EngineRef>,
        lease: Lease,
    },
    /// The caller must construct the engine and hand the result to
    /// [`SingletonRegistry::complete`].
    Construct(ConstructionTicket),
}

/// Permission to construct the engine for a key. Must be completed.
#[must_use = "a construction ticket must be passed to SingletonRegistry::complete"]
pub struct ConstructionTicket {
    key: String,
    id: u64,
    task: EngineTask<EngineRef>,
}

impl ConstructionTicket {
    /// Key the construction is for.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Lease the constructor holds once the engine is published as shared.
    pub fn lease(&self) -> Lease {
        Lease {
            key: self.key.clone(),
            epoch: self.id,
        }
    }
}

/// Outcome of a successful [`SingletonRegistry::complete`].
pub enum Completion {
    /// Published under the ticket's key; the constructor holds one reference.
    Shared(EngineRef),
    /// The construction marker was cleared meanwhile; the engine is the
    /// constructor's private engine.
    Detached(EngineRef),
}

/// Outcome of [`SingletonRegistry::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// One reference dropped; the engine stays alive with this many references.
    Decremented(usize),
    /// The last reference dropped; the engine was torn down and the entry removed.
    TornDown,
    /// No live entry for the key (or the lease's epoch is gone); nothing happened.
    Untracked,
}

/// Reference-counted map from sharing key to engine.
#[derive(Default)]
pub struct SingletonRegistry {
    slots: Mutex<HashMap<String, Slot>>,
    next_epoch: AtomicU64,
}

impl SingletonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn epoch(&self) -> u64 {
        self.next_epoch.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the process-wide registry.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// Returns the live engine for `key` without touching its reference count.
    pub fn lookup(&self, key: &str) -> Option<EngineRef> {
        match self.slots.lock().get(key) {
            Some(Slot::Ready { engine, .. }) => Some(Arc::clone(engine)),
            _ => None,
        }
    }

    /// Adds one reference for `key`, inserting `engine` if the key has no live entry.
    ///
    /// An existing engine wins over `engine`. Retaining a key whose engine is still
    /// being constructed publishes `engine` to the waiting callers.
    /// Returns the reference count after the call.
    pub fn retain(&self, key: &str, engine: EngineRef) -> usize {
        let mut slots = self.slots.lock();
        if let Some(Slot::Ready { refs, .. }) = slots.get_mut(key) {
            *refs += 1;
            return *refs;
        }
        match slots.remove(key) {
            Some(Slot::Constructing {
                ticket,
                task,
                waiters,
            }) => {
                let refs = waiters + 1;
                slots.insert(
                    key.to_string(),
                    Slot::Ready {
                        engine: Arc::clone(&engine),
                        refs,
                        epoch: ticket,
                    },
                );
                drop(slots);
                let _ = task.resolve(engine);
                refs
            }
            _ => {
                let epoch = self.epoch();
                slots.insert(key.to_string(), Slot::Ready { engine, refs: 1, epoch });
                1
            }
        }
    }

    /// Drops one reference for `key`; tears the engine down when none remain.
    pub fn release(&self, key: &str) -> Release {
        self.drop_ref(key, None)
    }

    /// Drops the reference `lease` stands for.
    ///
    /// Untracked when the entry the lease was taken from is gone, even if the
    /// key has been rebuilt since.
    pub fn release_lease(&self, lease: &Lease) -> Release {
        self.drop_ref(&lease.key, Some(lease.epoch))
    }

    fn drop_ref(&self, key: &str, expected: Option<u64>) -> Release {
        let mut slots = self.slots.lock();
        let remaining = match slots.get_mut(key) {
            Some(Slot::Ready { refs, epoch, .. }) if expected.is_none_or(|e| e == *epoch) => {
                *refs = refs.saturating_sub(1);
                Some(*refs)
            }
            _ => None,
        };
        let Some(remaining) = remaining else {
            drop(slots);
            tracing::warn!(key, epoch = expected, "release of an untracked engine reference");
            return Release::Untracked;
        };
        if remaining > 0 {
            return Release::Decremented(remaining);
        }

        let removed = slots.remove(key);
        drop(slots);
        if let Some(Slot::Ready { engine, .. }) = removed {
            teardown(&engine);
        }
        Release::TornDown
    }

    /// Removes the entry for `key` regardless of its reference count.
    ///
    /// A live engine is torn down; a construction in flight is abandoned and its
    /// waiters are rejected as cancelled. Returns `false` if there was no entry.
    pub fn force_clear(&self, key: &str) -> bool {
        let removed = self.slots.lock().remove(key);
        match removed {
            Some(Slot::Ready { engine, .. }) => {
                teardown(&engine);
                true
            }
            Some(Slot::Constructing { task, .. }) => {
                let _ = task.abort(ErrorReason::cancelled(format!("registry entry `{key}` cleared")));
                true
            }
            None => false,
        }
    }

    /// Adopts, joins or starts the construction of the engine for `key`.
    pub fn acquire(&self, key: &str) -> Acquire {
        let mut slots = self.slots.lock();
        match slots.get_mut(key) {
            Some(Slot::Ready {
                engine,
                refs,
                epoch,
            }) => {
                *refs += 1;
                Acquire::Adopted {
                    engine: Arc::clone(engine),
                    refs: *refs,
                    lease: Lease {
                        key: key.to_string(),
                        epoch: *epoch,
                    },
                }
            }
            Some(Slot::Constructing {
                ticket,
                task,
                waiters,
            }) => {
                *waiters += 1;
                Acquire::Joined {
                    task: task.clone(),
                    lease: Lease {
                        key: key.to_string(),
                        epoch: *ticket,
                    },
                }
            }
            None => {
                let id = self.epoch();
                let task = TaskHelper::create();
                slots.insert(
                    key.to_string(),
                    Slot::Constructing {
                        ticket: id,
                        task: task.clone(),
                        waiters: 0,
                    },
                );
                Acquire::Construct(ConstructionTicket {
                    key: key.to_string(),
                    id,
                    task,
                })
            }
        }
    }

    /// Finishes a construction started by [`acquire`](Self::acquire).
    ///
    /// A failure removes the construction marker and is passed through.
    pub fn complete(
        &self,
        ticket: ConstructionTicket,
        outcome: Result<EngineRef, ErrorReason>,
    ) -> Result<Completion, ErrorReason> {
        let ConstructionTicket { key, id, task } = ticket;
        let mut slots = self.slots.lock();
        let ours = matches!(slots.get(&key), Some(Slot::Constructing { ticket, .. }) if *ticket == id);

        match outcome {
            Ok(engine) if ours => {
                let waiters = match slots.remove(&key) {
                    Some(Slot::Constructing { waiters, .. }) => waiters,
                    _ => 0,
                };
                slots.insert(
                    key,
                    Slot::Ready {
                        engine: Arc::clone(&engine),
                        refs: 1 + waiters,
                        epoch: id,
                    },
                );
                drop(slots);
                let _ = task.resolve(Arc::clone(&engine));
                Ok(Completion::Shared(engine))
            }
            Ok(engine) => {
                drop(slots);
                tracing::debug!(key, "construction finished after its entry was cleared");
                Ok(Completion::Detached(engine))
            }
            Err(reason) => {
                if ours {
                    slots.remove(&key);
                }
                drop(slots);
                let _ = task.reject(reason.clone());
                Err(reason)
            }
        }
    }

    /// Reference count of the live engine for `key`.
    pub fn refcount(&self, key: &str) -> Option<usize> {
        match self.slots.lock().get(key) {
            Some(Slot::Ready { refs, .. }) => Some(*refs),
            _ => None,
        }
    }

    /// True if a construction for `key` is in flight.
    pub fn is_constructing(&self, key: &str) -> bool {
        matches!(self.slots.lock().get(key), Some(Slot::Constructing { .. }))
    }

    /// Returns the sorted list of keys (live and in construction).
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.slots.lock().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::testing::MockEngine;

    fn engine(id: usize) -> (Arc<MockEngine>, EngineRef) {
        let e = Arc::new(MockEngine::new(id));
        (e.clone(), e)
    }

    #[test]
    fn test_retain_then_release_tears_down_once() {
        let reg = SingletonRegistry::new();
        let (mock, h) = engine(1);

        assert_eq!(reg.retain("k", h), 1);
        assert_eq!(reg.release("k"), Release::TornDown);

        assert!(reg.lookup("k").is_none());
        assert!(reg.is_empty());
        assert_eq!(mock.destroy_calls(), 1);
    }

    #[test]
    fn test_double_retain_single_release_keeps_engine() {
        let reg = SingletonRegistry::new();
        let (mock, h) = engine(1);

        reg.retain("k", h.clone());
        reg.retain("k", h);
        assert_eq!(reg.release("k"), Release::Decremented(1));

        assert_eq!(reg.refcount("k"), Some(1));
        assert!(reg.lookup("k").is_some());
        assert_eq!(mock.destroy_calls(), 0);
    }

    #[test]
    fn test_release_without_retain_is_noop() {
        let reg = SingletonRegistry::new();
        assert_eq!(reg.release("missing"), Release::Untracked);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_existing_engine_wins_on_retain() {
        let reg = SingletonRegistry::new();
        let (first, a) = engine(1);
        let (_, b) = engine(2);

        reg.retain("k", a);
        assert_eq!(reg.retain("k", b), 2);

        let live = reg.lookup("k").unwrap();
        assert!(crate::engine::same_engine(&live, &(first as EngineRef)));
    }

    #[test]
    fn test_lookup_has_no_refcount_effect() {
        let reg = SingletonRegistry::new();
        let (_, h) = engine(1);
        reg.retain("k", h);

        let _ = reg.lookup("k");
        let _ = reg.lookup("k");
        assert_eq!(reg.refcount("k"), Some(1));
    }

    #[test]
    fn test_force_clear_ignores_refcount() {
        let reg = SingletonRegistry::new();
        let (mock, h) = engine(1);
        reg.retain("k", h.clone());
        reg.retain("k", h);

        assert!(reg.force_clear("k"));
        assert!(!reg.force_clear("k"));
        assert_eq!(mock.destroy_calls(), 1);
        assert_eq!(reg.release("k"), Release::Untracked);
    }

    #[test]
    fn test_lease_from_cleared_entry_leaves_rebuilt_entry_alone() {
        let reg = SingletonRegistry::new();
        let (_, first) = engine(1);
        reg.retain("k", first);
        let Acquire::Adopted { lease: stale, .. } = reg.acquire("k") else {
            panic!("must adopt");
        };
        assert!(reg.force_clear("k"));

        let (rebuilt, second) = engine(2);
        reg.retain("k", second);
        assert_eq!(reg.release_lease(&stale), Release::Untracked);
        assert_eq!(reg.refcount("k"), Some(1));
        assert_eq!(rebuilt.destroy_calls(), 0);

        let Acquire::Adopted { lease, .. } = reg.acquire("k") else {
            panic!("must adopt");
        };
        assert_eq!(reg.release_lease(&lease), Release::Decremented(1));
    }

    #[test]
    fn test_concurrent_acquirers_coalesce_on_one_construction() {
        let reg = SingletonRegistry::new();

        let Acquire::Construct(ticket) = reg.acquire("k") else {
            panic!("first acquirer must construct");
        };
        let Acquire::Joined { task: joined, lease } = reg.acquire("k") else {
            panic!("second acquirer must join");
        };
        assert!(reg.is_constructing("k"));
        assert!(reg.lookup("k").is_none());

        let (_, h) = engine(1);
        let Ok(Completion::Shared(_)) = reg.complete(ticket, Ok(h)) else {
            panic!("construction must be published");
        };

        assert!(joined.outcome().unwrap().is_ok());
        assert_eq!(reg.refcount("k"), Some(2));

        let Acquire::Adopted { refs, .. } = reg.acquire("k") else {
            panic!("third acquirer must adopt");
        };
        assert_eq!(refs, 3);
        assert_eq!(reg.release_lease(&lease), Release::Decremented(2));
    }

    #[test]
    fn test_failed_construction_leaves_no_entry() {
        let reg = SingletonRegistry::new();
        let Acquire::Construct(ticket) = reg.acquire("k") else {
            panic!("must construct");
        };
        let Acquire::Joined { task: joined, .. } = reg.acquire("k") else {
            panic!("must join");
        };

        let err = reg
            .complete(ticket, Err(ErrorReason::initialization("no module")))
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::Initialization);
        assert!(reg.is_empty());
        assert!(joined.outcome().unwrap().is_err());
    }

    #[test]
    fn test_force_clear_during_construction_detaches_result() {
        let reg = SingletonRegistry::new();
        let Acquire::Construct(ticket) = reg.acquire("k") else {
            panic!("must construct");
        };
        let Acquire::Joined { task: joined, .. } = reg.acquire("k") else {
            panic!("must join");
        };

        assert!(reg.force_clear("k"));
        let Some(Err(reason)) = joined.outcome() else {
            panic!("joiner must be rejected");
        };
        assert!(reason.is_cancelled());

        let (_, h) = engine(1);
        let Ok(Completion::Detached(_)) = reg.complete(ticket, Ok(h)) else {
            panic!("late construction must stay private");
        };
        assert!(reg.is_empty());
    }

    #[test]
    fn test_retain_during_construction_publishes_to_waiters() {
        let reg = SingletonRegistry::new();
        let Acquire::Construct(ticket) = reg.acquire("k") else {
            panic!("must construct");
        };
        let Acquire::Joined { task: joined, .. } = reg.acquire("k") else {
            panic!("must join");
        };

        let (_, h) = engine(1);
        assert_eq!(reg.retain("k", h), 2);
        assert!(joined.outcome().unwrap().is_ok());

        let (_, late) = engine(2);
        assert!(matches!(reg.complete(ticket, Ok(late)), Ok(Completion::Detached(_))));
        assert_eq!(reg.refcount("k"), Some(2));
    }

    #[test]
    fn test_keys_are_sorted() {
        let reg = SingletonRegistry::new();
        reg.retain("b", engine(1).1);
        reg.retain("a", engine(2).1);
        assert_eq!(reg.keys(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_global_is_shared() {
        let a = SingletonRegistry::global();
        let b = SingletonRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
