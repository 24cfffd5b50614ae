//! Dotted-path getters for string watch expressions such as `"user.name"`
//! or `"items.length"`.

use super::value::Value;
use crate::error::{Error, Result};

/// A parsed dot-delimited path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parse `path`. Only word characters, `$` and `.` are allowed.
    pub fn parse(path: &str) -> Result<Self> {
        let valid = path
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.');
        if !valid {
            return Err(Error::InvalidPath(path.to_string()));
        }

        Ok(Self {
            segments: path.split('.').map(str::to_string).collect(),
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolve the path against `root`, tracking every property read.
    ///
    /// A missing segment yields `Null`. On arrays, `length` and numeric
    /// indexes are understood.
    pub fn resolve(&self, root: &Value) -> Value {
        let mut current = root.clone();
        for segment in &self.segments {
            current = match &current {
                Value::Object(object) => object.get(segment).unwrap_or_default(),
                Value::Array(array) => {
                    if let Some(observer) = array.observer() {
                        observer.dep().depend();
                    }
                    if segment == "length" {
                        Value::from(array.len())
                    } else {
                        segment
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| array.get(i))
                            .unwrap_or_default()
                    }
                }
                _ => return Value::Null,
            };
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_non_path_expressions() {
        assert!(Path::parse("a.b_c.$d").is_ok());
        assert!(matches!(Path::parse("a[0]"), Err(Error::InvalidPath(_))));
        assert!(Path::parse("a + b").is_err());
    }

    #[test]
    fn resolves_objects_and_arrays() {
        let root = Value::from(json!({ "user": { "tags": ["x", "y"] } }));

        let length = Path::parse("user.tags.length").unwrap();
        assert_eq!(length.resolve(&root), Value::from(2));

        let second = Path::parse("user.tags.1").unwrap();
        assert_eq!(second.resolve(&root), Value::from("y"));

        let missing = Path::parse("user.name.first").unwrap();
        assert_eq!(missing.resolve(&root), Value::Null);
    }
}
