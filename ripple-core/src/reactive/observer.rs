//! Observation
//!
//! [`observe`] turns plain containers into reactive ones. Observation is
//! idempotent: the observer attached to a container is its marker, and a
//! container that already carries one is returned as is.
//!
//! [`set`] and [`del`] add and remove properties reactively, which plain
//! assignment cannot do for keys that did not exist when the container was
//! observed.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::dep::Dep;
use super::value::{Array, Object, Value};
use crate::config;
use crate::error::Error;

thread_local! {
    static SHOULD_OBSERVE: Cell<bool> = const { Cell::new(true) };
}

/// Globally enable or disable observation of new containers on this thread.
pub fn toggle_observing(value: bool) {
    SHOULD_OBSERVE.with(|c| c.set(value));
}

pub fn should_observe() -> bool {
    SHOULD_OBSERVE.with(Cell::get)
}

struct ObserverData {
    dep: Dep,
    vm_count: AtomicUsize,
}

/// The record attached to every observed container.
///
/// Its dependency set is notified when the container changes shape: array
/// mutations, and properties added or removed through [`set`] and [`del`].
#[derive(Clone)]
pub struct Observer {
    inner: Arc<ObserverData>,
}

impl Observer {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(ObserverData {
                dep: Dep::new(),
                vm_count: AtomicUsize::new(0),
            }),
        }
    }

    /// The container's own dependency set.
    pub fn dep(&self) -> &Dep {
        &self.inner.dep
    }

    /// How many components use the container as their root data.
    pub fn vm_count(&self) -> usize {
        self.inner.vm_count.load(Ordering::Relaxed)
    }

    pub fn ptr_eq(&self, other: &Observer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("dep", &self.inner.dep)
            .field("vm_count", &self.vm_count())
            .finish()
    }
}

/// Make `value` reactive.
///
/// Returns the container's observer: the existing one if it was already
/// observed, a new one otherwise. Scalars and `Null` yield `None`, as does
/// any unobserved container while observation is disabled.
pub fn observe(value: &Value) -> Option<Observer> {
    match value {
        Value::Object(object) => {
            if let Some(observer) = object.observer() {
                return Some(observer);
            }
            if !should_observe() {
                return None;
            }
            let (observer, created) = object.attach_observer();
            if created {
                walk(object);
            }
            Some(observer)
        }
        Value::Array(array) => {
            if let Some(observer) = array.observer() {
                return Some(observer);
            }
            if !should_observe() {
                return None;
            }
            let (observer, created) = array.attach_observer();
            if created {
                for item in array.to_vec() {
                    observe(&item);
                }
            }
            Some(observer)
        }
        _ => None,
    }
}

/// Observe `value` and hand it back.
pub fn observable(value: impl Into<Value>) -> Value {
    let value = value.into();
    observe(&value);
    value
}

/// Observe `value` as a component's root data.
pub fn observe_root(value: &Value) -> Option<Observer> {
    let observer = observe(value)?;
    observer.inner.vm_count.fetch_add(1, Ordering::Relaxed);
    Some(observer)
}

/// Undo one [`observe_root`].
pub(crate) fn release_root(value: &Value) {
    if let Some(observer) = value.observer() {
        // Never below zero.
        let _ = observer
            .inner
            .vm_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }
}

/// Convert every existing property into a reactive property.
fn walk(object: &Object) {
    for key in object.keys() {
        if let Some(value) = object.make_reactive(&key) {
            observe(&value);
        }
    }
}

/// Define `key` on `object` as a reactive property holding `value`.
pub fn define_reactive(object: &Object, key: &str, value: impl Into<Value>) -> Dep {
    let value = value.into();
    let dep = object.define_property(key, value.clone());
    observe(&value);
    dep
}

/// Depend on every observed element of `array`, recursively.
///
/// Element access is not intercepted, so a subscriber that reads an array
/// through a reactive property also has to hear about mutations of nested
/// containers.
pub(crate) fn depend_array(array: &Array) {
    for item in array.to_vec() {
        if let Some(observer) = item.observer() {
            observer.dep().depend();
        }
        if let Value::Array(nested) = &item {
            depend_array(nested);
        }
    }
}

/// A property name or array index for [`set`] and [`del`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropKey {
    Index(usize),
    Name(String),
}

impl PropKey {
    fn as_index(&self) -> Option<usize> {
        match self {
            PropKey::Index(i) => Some(*i),
            PropKey::Name(name) => name.parse().ok(),
        }
    }

    fn name(&self) -> String {
        match self {
            PropKey::Index(i) => i.to_string(),
            PropKey::Name(name) => name.clone(),
        }
    }
}

impl From<usize> for PropKey {
    fn from(i: usize) -> Self {
        PropKey::Index(i)
    }
}

impl From<&str> for PropKey {
    fn from(name: &str) -> Self {
        PropKey::Name(name.to_string())
    }
}

impl From<String> for PropKey {
    fn from(name: String) -> Self {
        PropKey::Name(name)
    }
}

/// Set a property, adding it reactively if it does not exist.
///
/// Returns `value`. Targets that cannot hold properties are reported as a
/// warning and left alone.
pub fn set(target: &Value, key: impl Into<PropKey>, value: impl Into<Value>) -> Value {
    let key = key.into();
    let value = value.into();

    match target {
        Value::Array(array) => match key.as_index() {
            Some(index) => {
                array.extend_to(index);
                array.splice(index, 1, [value.clone()]);
            }
            None => config::warn(&format!(
                "Cannot set non-index property \"{}\" on an array",
                key.name()
            )),
        },
        Value::Object(object) => {
            let name = key.name();
            if object.contains_key(&name) {
                object.assign(&name, value.clone());
                return value;
            }
            let observer = object.observer();
            if observer.as_ref().is_some_and(|ob| ob.vm_count() > 0) {
                config::warn(
                    "Avoid adding reactive properties to a component's root data at runtime; \
                     declare it upfront instead.",
                );
                return value;
            }
            match observer {
                None => object.assign(&name, value.clone()),
                Some(observer) => {
                    define_reactive(object, &name, value.clone());
                    observer.dep().notify();
                }
            }
        }
        other => config::warn(
            &Error::InvalidTarget(format!(
                "set reactive property on null or primitive value: {}",
                other.describe()
            ))
            .to_string(),
        ),
    }

    value
}

/// Delete a property, notifying dependents if the target is observed.
pub fn del(target: &Value, key: impl Into<PropKey>) {
    let key = key.into();

    match target {
        Value::Array(array) => match key.as_index() {
            Some(index) => {
                array.splice(index, 1, []);
            }
            None => config::warn(&format!(
                "Cannot delete non-index property \"{}\" from an array",
                key.name()
            )),
        },
        Value::Object(object) => {
            let observer = object.observer();
            if observer.as_ref().is_some_and(|ob| ob.vm_count() > 0) {
                config::warn(
                    "Avoid deleting properties on a component's root data; just set it to null.",
                );
                return;
            }
            if object.remove(&key.name()).is_none() {
                return;
            }
            if let Some(observer) = observer {
                observer.dep().notify();
            }
        }
        other => config::warn(
            &Error::InvalidTarget(format!(
                "delete reactive property on null or primitive value: {}",
                other.describe()
            ))
            .to_string(),
        ),
    }
}
