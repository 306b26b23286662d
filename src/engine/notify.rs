//! Notification batching.
//!
//! Engine state transitions run inside [`batch`]. Listeners wrapped with
//! [`batch_calls`] are not called while a batch is open; instead the latest result
//! per listener is queued and delivered once when the outermost batch closes.
//! Batches are tracked per thread, matching the single-threaded delivery model: a
//! state transition and its notifications always run on one thread.

use crate::engine::ResultListener;
use crate::result::QueryResult;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_BATCHED_ID: AtomicU64 = AtomicU64::new(1);

struct Pending {
    id: u64,
    listener: ResultListener,
    result: QueryResult,
}

#[derive(Default)]
struct BatchState {
    depth: usize,
    queue: Vec<Pending>,
}

thread_local! {
    static BATCH: RefCell<BatchState> = RefCell::new(BatchState::default());
}

/// Run `f` with listener delivery deferred until the outermost batch closes.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    BATCH.with(|state| state.borrow_mut().depth += 1);
    let depth = DepthGuard;
    let result = f();
    drop(depth);
    if !is_batching() {
        flush();
    }
    result
}

/// Closes one batch level, even when the batched closure panics. Results queued
/// by a transition that unwound past the outermost batch are dropped.
struct DepthGuard;

impl Drop for DepthGuard {
    fn drop(&mut self) {
        let unwinding = std::thread::panicking();
        BATCH.with(|state| {
            let mut state = state.borrow_mut();
            state.depth -= 1;
            if state.depth == 0 && unwinding {
                state.queue.clear();
            }
        });
    }
}

/// Wrap `listener` so calls made inside a batch coalesce into one delivery.
pub fn batch_calls(listener: ResultListener) -> ResultListener {
    let id = NEXT_BATCHED_ID.fetch_add(1, Ordering::Relaxed);
    Arc::new(move |result: QueryResult| schedule(id, &listener, result))
}

pub fn is_batching() -> bool {
    BATCH.with(|state| state.borrow().depth > 0)
}

fn schedule(id: u64, listener: &ResultListener, result: QueryResult) {
    let deferred = BATCH.with(|state| {
        let mut state = state.borrow_mut();
        if state.depth == 0 {
            return Some(result);
        }
        // Keep the first queue position, deliver the latest result.
        match state.queue.iter_mut().find(|pending| pending.id == id) {
            Some(pending) => pending.result = result,
            None => state.queue.push(Pending {
                id,
                listener: Arc::clone(listener),
                result,
            }),
        }
        None
    });
    if let Some(result) = deferred {
        listener(result);
    }
}

fn flush() {
    loop {
        let pending = BATCH.with(|state| std::mem::take(&mut state.borrow_mut().queue));
        if pending.is_empty() {
            break;
        }
        for Pending {
            listener, result, ..
        } in pending
        {
            listener(result);
        }
    }
}
