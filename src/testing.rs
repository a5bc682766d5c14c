//! Test doubles: a counting engine and a scriptable construction strategy.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::engine::{EngineFactory, EngineHandle, EngineRef, LoggerRef};
use crate::error::ErrorReason;
use crate::tasks::{EngineTask, TaskHelper};

/// Ordered record of constructions and teardowns shared by a factory and its engines.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub struct MockEngine {
    id: usize,
    destroy_calls: AtomicUsize,
    journal: Journal,
}

impl MockEngine {
    pub fn new(id: usize) -> Self {
        Self::with_journal(id, Journal::default())
    }

    fn with_journal(id: usize, journal: Journal) -> Self {
        Self {
            id,
            destroy_calls: AtomicUsize::new(0),
            journal,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn destroy_calls(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }
}

impl EngineHandle for MockEngine {
    fn destroy(&self) -> EngineTask<bool> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        self.journal.lock().push(format!("destroy:{}", self.id));
        TaskHelper::resolve(true)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Script {
    Immediate,
    Gated,
    Fail,
}

/// Factory that counts calls and either resolves at once, fails at once, or
/// parks every construction until the test opens its gate.
pub struct MockFactory {
    script: Script,
    available: AtomicBool,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
    gates: Mutex<Vec<EngineTask<EngineRef>>>,
    engines: Mutex<Vec<Arc<MockEngine>>>,
    journal: Journal,
}

impl MockFactory {
    fn scripted(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            available: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            gates: Mutex::new(Vec::new()),
            engines: Mutex::new(Vec::new()),
            journal: Journal::default(),
        })
    }

    /// Every construction resolves immediately with a fresh engine.
    pub fn arc() -> Arc<Self> {
        Self::scripted(Script::Immediate)
    }

    /// Every construction stays pending until `open_gate`/`fail_gate`.
    pub fn gated() -> Arc<Self> {
        Self::scripted(Script::Gated)
    }

    /// Every construction rejects with an initialization error.
    pub fn failing() -> Arc<Self> {
        Self::scripted(Script::Fail)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }

    /// Engine built by the `n`-th construction (0-based).
    pub fn engine(&self, n: usize) -> Arc<MockEngine> {
        Arc::clone(&self.engines.lock()[n])
    }

    /// Resolves the `n`-th parked construction with a fresh engine.
    pub fn open_gate(&self, n: usize) -> Arc<MockEngine> {
        let engine = self.build(n + 1);
        let gate = self.gates.lock()[n].clone();
        gate.resolve(engine.clone() as EngineRef).unwrap();
        engine
    }

    /// Rejects the `n`-th parked construction.
    pub fn fail_gate(&self, n: usize, reason: ErrorReason) {
        let gate = self.gates.lock()[n].clone();
        gate.reject(reason).unwrap();
    }

    fn build(&self, id: usize) -> Arc<MockEngine> {
        let engine = Arc::new(MockEngine::with_journal(id, self.journal.clone()));
        self.engines.lock().push(engine.clone());
        engine
    }
}

impl EngineFactory for MockFactory {
    fn name(&self) -> &str {
        "mock"
    }

    fn create(&self, resource_url: &str, _logger: LoggerRef) -> EngineTask<EngineRef> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.urls.lock().push(resource_url.to_string());
        self.journal.lock().push(format!("create:{resource_url}"));

        match self.script {
            Script::Immediate => TaskHelper::resolve(self.build(n) as EngineRef),
            Script::Fail => {
                TaskHelper::reject(ErrorReason::initialization(format!("cannot load {resource_url}")))
            }
            Script::Gated => {
                let gate = TaskHelper::create();
                self.gates.lock().push(gate.clone());
                gate
            }
        }
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst) && tokio::runtime::Handle::try_current().is_ok()
    }
}
