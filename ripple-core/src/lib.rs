//! Ripple Core
//!
//! This crate provides the rendering core of the Ripple UI framework.
//! It implements:
//!
//! - Reactive data with automatic dependency tracking
//! - Subscribers (renders, computed values, watches) and a batching scheduler
//! - A virtual tree with a keyed diff/patch engine
//! - The component render loop that connects the two
//!
//! Node operations are injected through [`vdom::NodeOps`]; the crate ships
//! an in-memory implementation and no platform bindings.
//!
//! # Architecture
//!
//! - `reactive`: reactive data, dependency sets, subscribers
//! - `scheduler`: the update queue and the next-tick boundary
//! - `vdom`: virtual nodes, modules, patching and reconciliation
//! - `component`: render loop, static subtrees, child components
//! - `config` / `error`: runtime settings and the crate error type
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ripple_core::component::{mount_component_render_loop, Component, ComponentOptions};
//! use ripple_core::scheduler::run_tick;
//! use ripple_core::vdom::{MemoryDom, Patcher, VNode};
//!
//! let dom = Arc::new(MemoryDom::new());
//! let patcher = Arc::new(Patcher::new(dom.clone(), Vec::new()));
//!
//! let options = ComponentOptions::new("counter", |cx| {
//!     let count = cx.get("count").as_f64().unwrap_or_default();
//!     Ok(VNode::element("p").text(format!("count: {count}")).build())
//! })
//! .data(serde_json::json!({ "count": 0 }));
//!
//! let component = Component::new(options, patcher);
//! let root = mount_component_render_loop(&component, None)?;
//!
//! component.data().as_object().unwrap().assign("count", 1);
//! run_tick()?;
//! // dom.text_content(root) == "count: 1"
//! ```

pub mod component;
pub mod config;
pub mod error;
pub mod reactive;
pub mod scheduler;
pub mod vdom;

pub use component::{mount_component_render_loop, Component, ComponentOptions, Lifecycle, RenderContext};
pub use config::Config;
pub use error::{Error, Result};
pub use reactive::{observable, observe, set, del, watch, watch_path, Computed, Subscriber, Value};
pub use vdom::{h, MemoryDom, NodeOps, PatchTarget, Patcher, VNode, VNodeRef};
