//! Reactive Primitives
//!
//! This module implements dependency tracking: reactive data, dependency
//! sets, and the subscribers that re-run when the data they read changes.
//!
//! # Concepts
//!
//! ## Reactive data
//!
//! A [`Value`] holds scalars, [`Object`]s and [`Array`]s. Once a container has
//! been passed to [`observe`], reading one of its properties while a
//! subscriber is evaluating registers that subscriber, and writing the
//! property notifies everyone registered.
//!
//! ## Dependency sets
//!
//! A [`Dep`] is the registry of subscribers for one slot. Every reactive
//! property has one, and so does every observed container for changes to
//! its shape.
//!
//! ## Subscribers
//!
//! A [`Subscriber`] evaluates a function, remembers which dependency sets it
//! read, and reacts when any of them notifies. Renders, [`Computed`] values
//! and user watches ([`watch`], [`watch_path`]) are all subscribers.
//!
//! # Implementation Notes
//!
//! Tracking uses a thread-local stack of active subscribers (see
//! [`ReactiveContext`]). The runtime is single-threaded: state may be shared
//! through `Arc`, but each thread tracks, queues and flushes on its own.

mod computed;
mod context;
mod dep;
mod observer;
mod path;
mod subscriber;
mod traverse;
mod value;

pub use computed::Computed;
pub use context::{untracked, ReactiveContext};
pub use dep::{Dep, DepId, Reactive};
pub use observer::{
    define_reactive, del, observable, observe, observe_root, set, should_observe, toggle_observing,
    Observer, PropKey,
};
pub use path::Path;
pub use subscriber::{
    watch, watch_path, Callback, Getter, LifecycleHook, Subscriber, SubscriberId, SubscriberOptions,
    WatchOptions,
};
pub use traverse::traverse;
pub use value::{Array, Object, Value};

pub(crate) use observer::release_root;
