//! Next Tick
//!
//! The tick queue is the deferred boundary at which queued subscribers are
//! flushed. The host drives it by calling [`run_tick`], the equivalent of a
//! microtask checkpoint.
//!
//! The flush is itself a task on this queue. A callback registered with
//! [`next_tick`] after a mutation therefore runs after the flush that the
//! mutation requested, and sees its results.

use std::cell::RefCell;
use std::future::Future;

use tokio::sync::oneshot;

use super::queue;
use crate::error::{Error, Result};

enum Task {
    Flush,
    Callback(Box<dyn FnOnce()>),
    Notify(oneshot::Sender<()>),
}

thread_local! {
    static TASKS: RefCell<Vec<Task>> = const { RefCell::new(Vec::new()) };
}

fn push(task: Task) {
    TASKS.with(|tasks| tasks.borrow_mut().push(task));
}

/// Run `callback` on the next tick.
pub fn next_tick(callback: impl FnOnce() + 'static) {
    push(Task::Callback(Box::new(callback)));
}

/// A future that resolves once the next tick has run.
///
/// The tick still has to be driven with [`run_tick`].
pub fn next_tick_async() -> impl Future<Output = ()> {
    let (tx, rx) = oneshot::channel();
    push(Task::Notify(tx));
    async move {
        // A dropped sender means the queue was discarded; resolve anyway.
        let _ = rx.await;
    }
}

pub(crate) fn schedule_flush() {
    push(Task::Flush);
}

/// True if any task is waiting for the next tick.
pub fn has_pending() -> bool {
    TASKS.with(|tasks| !tasks.borrow().is_empty())
}

/// Run every task queued so far.
///
/// Tasks queued while this runs wait for the following tick. Returns the
/// first error produced by a flush.
pub fn run_tick() -> Result<()> {
    let tasks = TASKS.with(|tasks| std::mem::take(&mut *tasks.borrow_mut()));
    let mut first_error: Option<Error> = None;

    for task in tasks {
        match task {
            Task::Flush => {
                if let Err(err) = queue::flush_queue() {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
            Task::Callback(callback) => callback(),
            Task::Notify(tx) => {
                let _ = tx.send(());
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Run ticks until nothing is pending. Returns the first flush error.
///
/// Does not return while callbacks keep scheduling further ticks.
pub fn run_until_idle() -> Result<()> {
    let mut first_error: Option<Error> = None;
    while has_pending() {
        if let Err(err) = run_tick() {
            if first_error.is_none() {
                first_error = Some(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
