//! Shared reactive values.

use super::effect::{track, EffectInner, Trackable};
use crate::dispose::Disposer;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_SIGNAL_ID: AtomicU64 = AtomicU64::new(1);

struct SignalInner<T> {
    id: u64,
    value: Mutex<T>,
    version: AtomicU64,
    subscribers: Mutex<Vec<(u64, Weak<EffectInner>)>>,
    next_subscriber: AtomicU64,
    weak_self: Weak<SignalInner<T>>,
}

impl<T: Send + 'static> Trackable for SignalInner<T> {
    fn trackable_id(&self) -> u64 {
        self.id
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    fn subscribe(&self, effect: Weak<EffectInner>) -> Disposer {
        let subscriber = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push((subscriber, effect));
        let weak_signal = self.weak_self.clone();
        Disposer::new(move || {
            if let Some(signal) = weak_signal.upgrade() {
                signal
                    .subscribers
                    .lock()
                    .retain(|(existing, _)| *existing != subscriber);
            }
        })
    }
}

/// A versioned value; reads inside an effect register a dependency
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("value", &*self.inner.value.lock())
            .field("version", &self.inner.version.load(Ordering::SeqCst))
            .finish()
    }
}

impl<T: Clone + PartialEq + Send + 'static> Signal<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new_cyclic(|weak_self| SignalInner {
                id: NEXT_SIGNAL_ID.fetch_add(1, Ordering::Relaxed),
                value: Mutex::new(value),
                version: AtomicU64::new(0),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber: AtomicU64::new(1),
                weak_self: weak_self.clone(),
            }),
        }
    }

    /// Current value; registers a dependency when read inside an effect.
    pub fn get(&self) -> T {
        track(self.inner.clone());
        self.inner.value.lock().clone()
    }

    pub fn get_untracked(&self) -> T {
        self.inner.value.lock().clone()
    }

    /// Replace the value. Setting an equal value is a no-op.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.lock();
            if *current == value {
                return;
            }
            *current = value;
        }
        self.inner.version.fetch_add(1, Ordering::SeqCst);
        self.notify();
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut current = self.inner.value.lock();
            let before = current.clone();
            f(&mut current);
            *current != before
        };
        if changed {
            self.inner.version.fetch_add(1, Ordering::SeqCst);
            self.notify();
        }
    }

    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    fn notify(&self) {
        let effects: Vec<Arc<EffectInner>> = {
            let mut subscribers = self.inner.subscribers.lock();
            subscribers.retain(|(_, effect)| effect.strong_count() > 0);
            subscribers
                .iter()
                .filter_map(|(_, effect)| effect.upgrade())
                .collect()
        };
        for effect in effects {
            effect.rerun();
        }
    }
}
