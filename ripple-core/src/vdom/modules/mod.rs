//! Built-in Modules
//!
//! Modules bind the data of a virtual node onto its live node. Pass the ones
//! you need to [`Patcher::new`](super::Patcher::new).

mod attributes;
mod class;

pub use attributes::attributes_module;
pub use class::class_module;
