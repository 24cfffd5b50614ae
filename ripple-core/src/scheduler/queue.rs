//! Update Queue
//!
//! Subscribers notified between two ticks are collected here and run in one
//! batch, the flush.
//!
//! # Algorithm
//!
//! 1. `enqueue` adds a subscriber unless it is already waiting, and asks
//!    the tick queue for a flush if none is scheduled yet.
//!
//! 2. The flush sorts the queue by subscriber ID. IDs follow creation order,
//!    so a parent's render runs before its children's, and a watcher created
//!    before a render runs before it.
//!
//! 3. Subscribers notified while the flush is running are inserted at the
//!    position their ID calls for, after the entry currently running. The
//!    loop re-reads the queue length on every step.
//!
//! 4. A subscriber that keeps re-queueing itself is counted. Past
//!    `max_update_count` re-runs the loop is reported and the subscriber is
//!    skipped for the rest of the flush.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::config;
use crate::error::{Error, Result};
use crate::reactive::{Subscriber, SubscriberId};

use super::tick;

#[derive(Default)]
struct QueueState {
    queue: Vec<Subscriber>,
    has: HashSet<SubscriberId>,
    circular: HashMap<SubscriberId, usize>,
    skipped: HashSet<SubscriberId>,
    /// A flush has been requested and not finished.
    waiting: bool,
    flushing: bool,
    /// Position of the entry currently running.
    index: usize,
}

impl QueueState {
    fn reset(&mut self) {
        self.queue.clear();
        self.has.clear();
        self.circular.clear();
        self.skipped.clear();
        self.waiting = false;
        self.flushing = false;
        self.index = 0;
    }
}

thread_local! {
    static STATE: RefCell<QueueState> = RefCell::new(QueueState::default());
}

/// Queue `subscriber` for the next flush.
///
/// With `async_flush` disabled the flush happens before this returns, and
/// any error it produces is reported.
pub fn enqueue(subscriber: Subscriber) {
    let id = subscriber.id();
    let request_flush = STATE.with(|state| {
        let mut state = state.borrow_mut();
        if state.has.contains(&id) || state.skipped.contains(&id) {
            return false;
        }
        state.has.insert(id);

        if state.flushing {
            let mut i = state.queue.len();
            while i > state.index + 1 && state.queue[i - 1].id() > id {
                i -= 1;
            }
            state.queue.insert(i, subscriber);
        } else {
            state.queue.push(subscriber);
        }

        !std::mem::replace(&mut state.waiting, true)
    });
    tracing::trace!(subscriber = id.raw(), "enqueued");

    if !request_flush {
        return;
    }
    if config::with(|c| c.async_flush) {
        tick::schedule_flush();
    } else if let Err(err) = flush_queue() {
        config::handle_error(&err, "synchronous flush");
    }
}

/// True if `id` is waiting to run in the current or next flush.
pub fn is_queued(id: SubscriberId) -> bool {
    STATE.with(|state| state.borrow().has.contains(&id))
}

/// Number of subscribers in the queue, including ones already run in an
/// ongoing flush.
pub fn queue_len() -> usize {
    STATE.with(|state| state.borrow().queue.len())
}

/// Run every queued subscriber in ID order.
///
/// Errors from non-user subscribers do not stop the flush. The first one is
/// returned once the queue has drained.
pub fn flush_queue() -> Result<()> {
    let span = tracing::debug_span!("flush");
    let _enter = span.enter();

    STATE.with(|state| {
        let mut state = state.borrow_mut();
        state.flushing = true;
        state.index = 0;
        state.queue.sort_by_key(Subscriber::id);
    });
    let max_update_count = config::with(|c| c.max_update_count);
    let mut first_error: Option<Error> = None;
    let mut runs = 0usize;

    loop {
        let next = STATE.with(|state| {
            let mut state = state.borrow_mut();
            let subscriber = state.queue.get(state.index)?.clone();
            let id = subscriber.id();
            state.has.remove(&id);
            let skip = state.skipped.contains(&id);
            Some((subscriber, skip))
        });
        let Some((subscriber, skip)) = next else {
            break;
        };

        if !skip {
            subscriber.call_before();
            let result = subscriber.run();
            subscriber.call_after();
            runs += 1;

            if let Err(err) = result {
                tracing::error!(subscriber = subscriber.id().raw(), %err, "subscriber failed during flush");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }

            if let Some(err) = check_circular(&subscriber, max_update_count) {
                config::handle_error(&err, "scheduler flush");
            }
        }

        STATE.with(|state| state.borrow_mut().index += 1);
    }

    STATE.with(|state| state.borrow_mut().reset());
    tracing::debug!(runs, "flush finished");

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Count a self-requeue and build the loop error once past the limit.
fn check_circular(subscriber: &Subscriber, limit: usize) -> Option<Error> {
    let id = subscriber.id();
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        if !state.has.contains(&id) {
            return None;
        }
        let count = state.circular.entry(id).or_insert(0);
        *count += 1;
        if *count <= limit {
            return None;
        }
        state.skipped.insert(id);
        state.has.remove(&id);
        Some(Error::InfiniteUpdate {
            id,
            expression: subscriber.expression().to_string(),
            limit,
        })
    })
}
