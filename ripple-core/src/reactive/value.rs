//! Reactive Values
//!
//! [`Value`] is the dynamic data model reactive state is written in. Scalars
//! are held inline; [`Object`] and [`Array`] are shared handles, so cloning
//! a container clones a reference to the same data, and identity is pointer
//! identity.
//!
//! # Plain and observed containers
//!
//! A container starts out plain: reads and writes are not intercepted. Once
//! [`observe`](super::observe) has attached an [`Observer`] to it, every
//! property present at that moment becomes a reactive property with its own
//! dependency set, and nested containers are observed in turn.
//!
//! - Reading a reactive property registers the current subscriber with the
//!   property and, when the value is an observed container, with that
//!   container's own dependency set too.
//! - Writing a reactive property with a value that is not the same as the
//!   old one stores it, observes it, and notifies the property's dependents.
//! - Array operations that change shape notify the array's own dependency
//!   set after observing any inserted elements.
//!
//! Properties added later by plain assignment stay untracked. Use
//! [`set`](super::set) and [`del`](super::del) to add or remove keys
//! reactively.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::observer::{depend_array, observe, Observer};

/// A dynamically typed reactive value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Array),
    Object(Object),
}

impl Value {
    /// Identity comparison used to decide whether a write changed anything.
    ///
    /// Scalars compare by value, with `NaN` equal to `NaN`. Containers
    /// compare by identity.
    pub fn same(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Array(x), Value::Array(y)) => x.ptr_eq(y),
            (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
            _ => false,
        }
    }

    /// True for arrays and objects.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The observer attached to this container, if it has been observed.
    pub fn observer(&self) -> Option<Observer> {
        match self {
            Value::Array(array) => array.observer(),
            Value::Object(object) => object.observer(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Snapshot this value as JSON without tracking any reads.
    ///
    /// Non-finite numbers become `null`. Cyclic data is not supported.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(a) => serde_json::Value::Array(a.to_vec().iter().map(Value::to_json).collect()),
            Value::Object(o) => serde_json::Value::Object(
                o.entries_untracked()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_json()))
                    .collect(),
            ),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Short description used in warnings.
    pub(crate) fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => format!("{s:?}"),
            other => other.type_name().to_string(),
        }
    }
}

/// Same-value equality; see [`Value::same`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        Value::same(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(a) => a.fmt(f),
            Value::Object(o) => o.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(Array::from_values(items.into_iter().map(Into::into).collect()))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Build plain (unobserved) data from JSON.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(Array::from_values(items.into_iter().map(Value::from).collect()))
            }
            serde_json::Value::Object(map) => {
                Value::Object(Object::from_entries(map.into_iter().map(|(k, v)| (k, Value::from(v)))))
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Objects
// ----------------------------------------------------------------------------

/// One property slot. `dep` is present once the property has been made
/// reactive.
#[derive(Clone)]
struct Property {
    value: Value,
    dep: Option<Dep>,
}

struct ObjectData {
    observer: OnceLock<Observer>,
    props: RwLock<IndexMap<String, Property>>,
}

/// A shared, insertion-ordered map of properties.
#[derive(Clone)]
pub struct Object {
    inner: Arc<ObjectData>,
}

impl Object {
    /// Create an empty plain object.
    pub fn new() -> Self {
        Self::from_entries(std::iter::empty::<(String, Value)>())
    }

    /// Create a plain object from key/value pairs.
    pub fn from_entries<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let props = entries
            .into_iter()
            .map(|(k, value)| (k.into(), Property { value, dep: None }))
            .collect();

        Self {
            inner: Arc::new(ObjectData {
                observer: OnceLock::new(),
                props: RwLock::new(props),
            }),
        }
    }

    /// True if both handles share the same properties.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Address used to recognise this object during traversal.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    pub fn observer(&self) -> Option<Observer> {
        self.inner.observer.get().cloned()
    }

    /// Attach an observer if none is attached yet. Returns the observer and
    /// whether this call created it.
    pub(crate) fn attach_observer(&self) -> (Observer, bool) {
        let mut created = false;
        let observer = self
            .inner
            .observer
            .get_or_init(|| {
                created = true;
                Observer::new()
            })
            .clone();
        (observer, created)
    }

    /// Read a property.
    ///
    /// Reads of reactive properties are tracked by the current subscriber.
    pub fn get(&self, key: &str) -> Option<Value> {
        let (value, dep) = {
            let props = self.inner.props.read();
            let prop = props.get(key)?;
            (prop.value.clone(), prop.dep.clone())
        };

        if let Some(dep) = dep {
            if ReactiveContext::is_active() {
                dep.depend();
                if let Some(child) = value.observer() {
                    child.dep().depend();
                    if let Value::Array(array) = &value {
                        depend_array(array);
                    }
                }
            }
        }

        Some(value)
    }

    /// Read a property without tracking.
    pub fn get_untracked(&self, key: &str) -> Option<Value> {
        self.inner.props.read().get(key).map(|p| p.value.clone())
    }

    /// Assign a property.
    ///
    /// Writing a reactive property notifies its dependents unless the new
    /// value is the same as the old one. Assigning a key that is not present
    /// adds a plain, untracked property.
    pub fn assign(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let dep = {
            let mut props = self.inner.props.write();
            match props.get_mut(key) {
                Some(prop) => {
                    if prop.dep.is_some() && Value::same(&prop.value, &value) {
                        return;
                    }
                    prop.value = value.clone();
                    prop.dep.clone()
                }
                None => {
                    props.insert(key.to_string(), Property { value, dep: None });
                    return;
                }
            }
        };

        if let Some(dep) = dep {
            observe(&value);
            dep.notify();
        }
    }

    /// True if the key is present. Untracked.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.props.read().contains_key(key)
    }

    /// True if the key holds a reactive property.
    pub fn is_reactive(&self, key: &str) -> bool {
        self.inner
            .props
            .read()
            .get(key)
            .is_some_and(|p| p.dep.is_some())
    }

    /// Keys in insertion order. Untracked.
    pub fn keys(&self) -> Vec<String> {
        self.inner.props.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.props.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries. Untracked.
    pub fn entries_untracked(&self) -> Vec<(String, Value)> {
        self.inner
            .props
            .read()
            .iter()
            .map(|(k, p)| (k.clone(), p.value.clone()))
            .collect()
    }

    /// Install `key` as a reactive property holding `value`, replacing
    /// whatever was there. Returns the property's dependency set.
    pub(crate) fn define_property(&self, key: &str, value: Value) -> Dep {
        let dep = Dep::new();
        self.inner.props.write().insert(
            key.to_string(),
            Property {
                value,
                dep: Some(dep.clone()),
            },
        );
        dep
    }

    /// Convert an existing plain property into a reactive one, keeping its
    /// value. Returns the value, or `None` if the key is absent.
    pub(crate) fn make_reactive(&self, key: &str) -> Option<Value> {
        let mut props = self.inner.props.write();
        let prop = props.get_mut(key)?;
        if prop.dep.is_none() {
            prop.dep = Some(Dep::new());
        }
        Some(prop.value.clone())
    }

    pub(crate) fn remove(&self, key: &str) -> Option<Value> {
        self.inner.props.write().shift_remove(key).map(|p| p.value)
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries_untracked()).finish()
    }
}

// ----------------------------------------------------------------------------
// Arrays
// ----------------------------------------------------------------------------

struct ArrayData {
    observer: OnceLock<Observer>,
    items: RwLock<Vec<Value>>,
}

/// A shared, growable list of values.
///
/// Element reads are not tracked individually. Subscribers learn about
/// changes through the array's own dependency set, which every mutating
/// operation notifies once the array has been observed.
#[derive(Clone)]
pub struct Array {
    inner: Arc<ArrayData>,
}

impl Array {
    /// Create an empty plain array.
    pub fn new() -> Self {
        Self::from_values(Vec::new())
    }

    /// Wrap `items` as a plain array.
    pub fn from_values(items: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(ArrayData {
                observer: OnceLock::new(),
                items: RwLock::new(items),
            }),
        }
    }

    /// True if both handles share the same elements.
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    pub fn observer(&self) -> Option<Observer> {
        self.inner.observer.get().cloned()
    }

    pub(crate) fn attach_observer(&self) -> (Observer, bool) {
        let mut created = false;
        let observer = self
            .inner
            .observer
            .get_or_init(|| {
                created = true;
                Observer::new()
            })
            .clone();
        (observer, created)
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.items.read().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.read().clone()
    }

    /// Append values, returning the new length.
    pub fn push(&self, values: impl IntoIterator<Item = Value>) -> usize {
        let inserted: Vec<Value> = values.into_iter().collect();
        let len = {
            let mut items = self.inner.items.write();
            items.extend(inserted.iter().cloned());
            items.len()
        };
        self.mutated(&inserted);
        len
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Option<Value> {
        let popped = self.inner.items.write().pop();
        self.mutated(&[]);
        popped
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Option<Value> {
        let shifted = {
            let mut items = self.inner.items.write();
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        };
        self.mutated(&[]);
        shifted
    }

    /// Prepend values, returning the new length.
    pub fn unshift(&self, values: impl IntoIterator<Item = Value>) -> usize {
        let inserted: Vec<Value> = values.into_iter().collect();
        let len = {
            let mut items = self.inner.items.write();
            items.splice(0..0, inserted.iter().cloned());
            items.len()
        };
        self.mutated(&inserted);
        len
    }

    /// Remove `delete_count` elements starting at `start` and insert
    /// `values` in their place. Out-of-range arguments are clamped.
    /// Returns the removed elements.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        values: impl IntoIterator<Item = Value>,
    ) -> Vec<Value> {
        let inserted: Vec<Value> = values.into_iter().collect();
        let removed = {
            let mut items = self.inner.items.write();
            let start = start.min(items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            let removed: Vec<Value> = items.splice(start..end, inserted.iter().cloned()).collect();
            removed
        };
        self.mutated(&inserted);
        removed
    }

    /// Sort in place with `compare`.
    ///
    /// A snapshot is sorted without holding the lock, so the comparator may
    /// read this array.
    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> CmpOrdering) {
        let mut sorted = self.to_vec();
        sorted.sort_by(compare);
        *self.inner.items.write() = sorted;
        self.mutated(&[]);
    }

    /// Reverse in place.
    pub fn reverse(&self) {
        self.inner.items.write().reverse();
        self.mutated(&[]);
    }

    /// Grow the array with `Null`s up to `len`. Does not notify.
    pub(crate) fn extend_to(&self, len: usize) {
        let mut items = self.inner.items.write();
        if items.len() < len {
            items.resize(len, Value::Null);
        }
    }

    /// Observe inserted elements and notify, once the array is observed.
    fn mutated(&self, inserted: &[Value]) {
        if let Some(observer) = self.observer() {
            for value in inserted {
                observe(value);
            }
            observer.dep().notify();
        }
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{observable, watch_path, WatchOptions};
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn nan_is_the_same_as_nan() {
        assert!(Value::same(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
        assert!(Value::same(&Value::Number(0.0), &Value::Number(-0.0)));
        assert!(!Value::same(&Value::Number(1.0), &Value::String("1".into())));
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = Object::new();
        let b = Object::new();
        assert!(Value::same(&a.clone().into(), &a.clone().into()));
        assert!(!Value::same(&a.into(), &b.into()));
    }

    #[test]
    fn json_conversion() {
        let value = Value::from(json!({ "b": 1, "a": [true, null, "x"] }));
        assert_eq!(value.as_object().unwrap().len(), 2);
        assert_eq!(value.to_json(), json!({ "b": 1.0, "a": [true, null, "x"] }));
    }

    #[test]
    fn objects_keep_insertion_order() {
        let object = Object::from_entries([("b", Value::from(1)), ("a", Value::from(2))]);
        object.assign("c", 3);
        assert_eq!(object.keys(), vec!["b", "a", "c"]);
    }

    #[test]
    fn plain_assignment_adds_untracked_property() {
        let object = Object::new();
        object.assign("late", 1);
        assert_eq!(object.get("late"), Some(Value::from(1)));
        assert!(!object.is_reactive("late"));
    }

    #[test]
    fn array_operations_on_plain_array() {
        let array = Array::from_values(vec![1.into(), 2.into(), 3.into()]);
        assert_eq!(array.push([Value::from(4)]), 4);
        assert_eq!(array.shift(), Some(Value::from(1)));
        assert_eq!(array.unshift([Value::from(0)]), 4);
        assert_eq!(array.splice(1, 2, [Value::from(9)]), vec![Value::from(2), Value::from(3)]);
        array.reverse();
        assert_eq!(array.to_vec(), vec![Value::from(4), Value::from(9), Value::from(0)]);
        array.sort_by(|a, b| {
            a.as_f64()
                .unwrap_or_default()
                .total_cmp(&b.as_f64().unwrap_or_default())
        });
        assert_eq!(array.to_vec(), vec![Value::from(0), Value::from(4), Value::from(9)]);
        assert_eq!(array.pop(), Some(Value::from(9)));
    }

    fn by_number(a: &Value, b: &Value) -> CmpOrdering {
        a.as_f64()
            .unwrap_or_default()
            .total_cmp(&b.as_f64().unwrap_or_default())
    }

    #[test]
    fn every_mutator_notifies_readers() {
        let state = observable(json!({ "items": [3, 1, 2] }));
        let calls = Arc::new(Mutex::new(0usize));
        let counter = calls.clone();
        let _watch = watch_path(
            &state,
            "items",
            move |_, _| {
                *counter.lock() += 1;
                Ok(())
            },
            WatchOptions { sync: true, ..Default::default() },
        )
        .unwrap();

        let items = state.as_object().unwrap().get_untracked("items").unwrap();
        let items = items.as_array().unwrap();
        let mutations: Vec<(&str, Box<dyn Fn(&Array)>)> = vec![
            ("push", Box::new(|a: &Array| { a.push([Value::from(4)]); })),
            ("pop", Box::new(|a: &Array| { a.pop(); })),
            ("shift", Box::new(|a: &Array| { a.shift(); })),
            ("unshift", Box::new(|a: &Array| { a.unshift([Value::from(0)]); })),
            ("splice", Box::new(|a: &Array| { a.splice(1, 1, [Value::from(7)]); })),
            ("sort_by", Box::new(|a: &Array| a.sort_by(by_number))),
            ("reverse", Box::new(|a: &Array| a.reverse())),
        ];

        for (expected, (name, mutate)) in mutations.iter().enumerate() {
            mutate(items);
            assert_eq!(*calls.lock(), expected + 1, "{name} did not notify");
        }
        assert_eq!(items.to_vec(), vec![Value::from(7), Value::from(2), Value::from(0)]);
    }

    #[test]
    fn inserted_elements_become_reactive() {
        let state = observable(json!({ "items": [] }));
        let items = state.as_object().unwrap().get_untracked("items").unwrap();
        let items = items.as_array().unwrap();

        let pushed = Value::from(json!({ "name": "a" }));
        let spliced = Value::from(json!({ "name": "b" }));
        let unshifted = Value::from(json!({ "name": "c" }));
        items.push([pushed.clone()]);
        items.splice(0, 0, [spliced.clone()]);
        items.unshift([unshifted.clone()]);
        assert!(pushed.observer().is_some());
        assert!(spliced.observer().is_some());
        assert!(unshifted.observer().is_some());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _watch = watch_path(
            &state,
            "items.2.name",
            move |new, old| {
                sink.lock().push((new.clone(), old.clone()));
                Ok(())
            },
            WatchOptions { sync: true, ..Default::default() },
        )
        .unwrap();

        pushed.as_object().unwrap().assign("name", "z");
        assert_eq!(*seen.lock(), vec![(Value::from("z"), Value::from("a"))]);
    }

    #[test]
    fn plain_array_mutations_observe_nothing() {
        let array = Array::from_values(Vec::new());
        let pushed = Value::from(json!({ "name": "a" }));
        array.push([pushed.clone()]);
        assert!(pushed.observer().is_none());
    }

    #[test]
    fn sort_comparator_may_read_the_array() {
        let array = Array::from_values(vec![2.into(), 3.into(), 1.into()]);
        let reader = array.clone();
        array.sort_by(|a, b| {
            assert_eq!(reader.len(), 3);
            by_number(a, b)
        });
        assert_eq!(array.to_vec(), vec![Value::from(1), Value::from(2), Value::from(3)]);
    }

    #[test]
    fn splice_clamps_out_of_range() {
        let array = Array::from_values(vec![1.into()]);
        assert!(array.splice(5, 3, []).is_empty());
        assert_eq!(array.len(), 1);
    }
}
