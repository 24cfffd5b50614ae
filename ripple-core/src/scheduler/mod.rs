//! Update Scheduler
//!
//! Notified subscribers are not re-run on the spot. They are queued, and the
//! queue is flushed once per tick in creation order, so any number of
//! mutations between two ticks costs each affected subscriber one re-run.

mod queue;
mod tick;

pub use queue::{enqueue, flush_queue, is_queued, queue_len};
pub use tick::{has_pending, next_tick, next_tick_async, run_tick, run_until_idle};
