//! Dependency-tracking effects.
//!
//! [`watch`] runs a callback immediately and records every [`Signal`] read during
//! the run. When any of those signals changes, the callback runs again and its
//! dependency set is collected afresh. Dispose the returned [`Effect`] to stop.
//!
//! [`Signal`]: super::Signal

use crate::dispose::Disposer;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{trace, warn};

/// A reactive value an effect can depend on
pub trait Trackable: Send + Sync {
    fn trackable_id(&self) -> u64;

    /// Bumped on every change.
    fn version(&self) -> u64;

    /// Re-run `effect` on change until the returned disposer runs.
    fn subscribe(&self, effect: Weak<EffectInner>) -> Disposer;
}

/// A dependency and the version it had when first read
type Read = (Arc<dyn Trackable>, u64);

thread_local! {
    static TRACKING: RefCell<Vec<Vec<Read>>> = const { RefCell::new(Vec::new()) };
}

/// Upper bound on back-to-back runs caused by the effect's own writes.
const MAX_CONSECUTIVE_RUNS: usize = 100;

/// Record `dep` as a dependency of the effect currently running on this thread.
pub(crate) fn track(dep: Arc<dyn Trackable>) {
    TRACKING.with(|stack| {
        if let Some(frame) = stack.borrow_mut().last_mut() {
            if !frame
                .iter()
                .any(|(known, _)| known.trackable_id() == dep.trackable_id())
            {
                let version = dep.version();
                frame.push((dep, version));
            }
        }
    });
}

/// Run `f` without recording signal reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let saved = TRACKING.with(|stack| std::mem::take(&mut *stack.borrow_mut()));
    let result = f();
    TRACKING.with(|stack| *stack.borrow_mut() = saved);
    result
}

pub struct EffectInner {
    run: Box<dyn Fn() + Send + Sync>,
    deps: Mutex<Vec<Disposer>>,
    running: AtomicBool,
    dirty: AtomicBool,
    disposed: AtomicBool,
    runs: AtomicUsize,
    weak_self: Weak<EffectInner>,
}

impl EffectInner {
    /// Run the effect, or mark it dirty if a run is already in progress. A dirty
    /// effect runs again as soon as the current run finishes.
    pub(crate) fn rerun(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        self.dirty.store(true, Ordering::SeqCst);
        if self.running.swap(true, Ordering::SeqCst) {
            trace!("Effect running; deferring re-run");
            return;
        }

        let mut consecutive = 0;
        loop {
            self.dirty.store(false, Ordering::SeqCst);
            let changed_mid_run = self.run_once();
            consecutive += 1;

            let again = !self.disposed.load(Ordering::SeqCst)
                && (changed_mid_run || self.dirty.swap(false, Ordering::SeqCst));
            if again && consecutive < MAX_CONSECUTIVE_RUNS {
                continue;
            }
            if again {
                warn!(runs = consecutive, "Effect keeps invalidating itself; pausing");
            }

            self.running.store(false, Ordering::SeqCst);
            // A change may land between the dirty check and releasing the guard.
            if self.dirty.load(Ordering::SeqCst)
                && !self.disposed.load(Ordering::SeqCst)
                && consecutive < MAX_CONSECUTIVE_RUNS
                && !self.running.swap(true, Ordering::SeqCst)
            {
                continue;
            }
            break;
        }

        if self.disposed.load(Ordering::SeqCst) {
            self.release_deps();
        }
    }

    /// One tracked run. Returns whether a dependency changed after it was read;
    /// such writes happen before this run subscribed, so nothing else reports them.
    fn run_once(&self) -> bool {
        self.release_deps();

        TRACKING.with(|stack| stack.borrow_mut().push(Vec::new()));
        (self.run)();
        let reads = TRACKING.with(|stack| stack.borrow_mut().pop().unwrap_or_default());
        self.runs.fetch_add(1, Ordering::SeqCst);

        let subscriptions: Vec<Disposer> = reads
            .iter()
            .map(|(dep, _)| dep.subscribe(self.weak_self.clone()))
            .collect();
        *self.deps.lock() = subscriptions;

        reads.iter().any(|(dep, seen)| dep.version() != *seen)
    }

    fn release_deps(&self) {
        let deps = std::mem::take(&mut *self.deps.lock());
        for dep in deps {
            dep.dispose();
        }
    }
}

/// Handle to a running effect
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    pub fn dispose(&self) -> bool {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.release_deps();
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub fn run_count(&self) -> usize {
        self.inner.runs.load(Ordering::SeqCst)
    }

    pub fn dependency_count(&self) -> usize {
        self.inner.deps.lock().len()
    }
}

impl From<Effect> for Disposer {
    fn from(effect: Effect) -> Self {
        Disposer::new(move || {
            effect.dispose();
        })
    }
}

/// Run `run` now and again whenever a signal it read changes.
pub fn watch(run: impl Fn() + Send + Sync + 'static) -> Effect {
    let inner = Arc::new_cyclic(|weak_self| EffectInner {
        run: Box::new(run),
        deps: Mutex::new(Vec::new()),
        running: AtomicBool::new(false),
        dirty: AtomicBool::new(false),
        disposed: AtomicBool::new(false),
        runs: AtomicUsize::new(0),
        weak_self: weak_self.clone(),
    });
    inner.rerun();
    Effect { inner }
}
