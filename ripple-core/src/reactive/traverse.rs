//! Deep traversal for deep subscribers.
//!
//! Reading every reachable property registers the evaluating subscriber with
//! every nested dependency set. The cost is proportional to the size of the
//! value on every evaluation; nested mutations cannot be detected otherwise.

use std::collections::HashSet;

use super::value::Value;

/// Read every property reachable from `value`.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    walk(value, &mut seen);
}

fn walk(value: &Value, seen: &mut HashSet<usize>) {
    match value {
        Value::Object(object) => {
            if !seen.insert(object.addr()) {
                return;
            }
            for key in object.keys() {
                if let Some(child) = object.get(&key) {
                    walk(&child, seen);
                }
            }
        }
        Value::Array(array) => {
            if !seen.insert(array.addr()) {
                return;
            }
            if let Some(observer) = array.observer() {
                observer.dep().depend();
            }
            for item in array.to_vec() {
                walk(&item, seen);
            }
        }
        _ => {}
    }
}
