//! Path-based addressing into JSON message payloads.
//!
//! Used by the JSON variable extractor and the JSON path data dictionary.

use std::fmt;
use serde_json::Value;

use crate::runtime::variables::value_to_string;

/// Represents a path to a field in a JSON document
///
/// # Examples
///
/// - `user.name`
/// - `$.user.name` (leading `$` is optional)
/// - `items[0].name` or `items.[0].name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    /// The raw path string
    pub raw: String,
    /// Parsed path segments
    pub segments: Vec<PathSegment>,
}

/// A segment in a field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A named field (e.g., "user", "name")
    Field(String),
    /// An array index (e.g., [0], [5])
    Index(usize),
}

impl FieldPath {
    /// Parse a dotted path.
    ///
    /// Array indices may follow a field name directly (`items[0]`) or stand
    /// as their own segment (`items.[0]`).
    ///
    /// # Example
    ///
    /// ```
    /// use courier::extraction::{FieldPath, PathSegment};
    ///
    /// let path = FieldPath::parse("$.user.items[1]");
    /// assert_eq!(path.segments.len(), 3);
    /// assert_eq!(path.segments[2], PathSegment::Index(1));
    /// ```
    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim();
        let body = trimmed
            .strip_prefix("$.")
            .or_else(|| trimmed.strip_prefix('$'))
            .unwrap_or(trimmed);

        let mut segments = Vec::new();
        for part in body.split('.').filter(|s| !s.is_empty()) {
            let (field, mut rest) = match part.find('[') {
                Some(idx) => (&part[..idx], &part[idx..]),
                None => (part, ""),
            };

            if !field.is_empty() {
                segments.push(PathSegment::Field(field.to_string()));
            }

            while let Some(stripped) = rest.strip_prefix('[') {
                match stripped.find(']') {
                    Some(end) => {
                        match stripped[..end].parse::<usize>() {
                            Ok(index) => segments.push(PathSegment::Index(index)),
                            Err(_) => segments.push(PathSegment::Field(stripped[..end].to_string())),
                        }
                        rest = &stripped[end + 1..];
                    }
                    None => {
                        segments.push(PathSegment::Field(rest.to_string()));
                        rest = "";
                    }
                }
            }
        }

        Self {
            raw: path.to_string(),
            segments,
        }
    }

    /// Look up the value addressed by this path.
    pub fn get<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.segments.iter().try_fold(document, |current, segment| match segment {
            PathSegment::Field(name) => current.get(name.as_str()),
            PathSegment::Index(index) => current.get(*index),
        })
    }

    /// Look up the value addressed by this path for modification.
    pub fn get_mut<'a>(&self, document: &'a mut Value) -> Option<&'a mut Value> {
        self.segments.iter().try_fold(document, |current, segment| match segment {
            PathSegment::Field(name) => current.get_mut(name.as_str()),
            PathSegment::Index(index) => current.get_mut(*index),
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Trait for types that can extract values by field path
pub trait Extractor {
    /// Extract a value at the given field path
    ///
    /// Returns `Some(value)` if the path exists, `None` otherwise
    fn extract(&self, path: &FieldPath) -> Option<String>;

    /// Extract a value and parse it to a specific type
    fn extract_as<T>(&self, path: &FieldPath) -> Option<T>
    where
        T: std::str::FromStr,
    {
        self.extract(path).and_then(|s| s.parse().ok())
    }
}

impl Extractor for Value {
    fn extract(&self, path: &FieldPath) -> Option<String> {
        path.get(self).map(value_to_string)
    }
}

/// Collect the dotted path of every leaf value in a document, in document order.
///
/// Array elements render as `items[0]`, so the result can be fed back to
/// [`FieldPath::parse`].
pub fn leaf_paths(document: &Value) -> Vec<String> {
    fn walk(value: &Value, prefix: String, out: &mut Vec<String>) {
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    walk(child, path, out);
                }
            }
            Value::Array(items) if !items.is_empty() => {
                for (idx, child) in items.iter().enumerate() {
                    walk(child, format!("{}[{}]", prefix, idx), out);
                }
            }
            _ => {
                if !prefix.is_empty() {
                    out.push(prefix);
                }
            }
        }
    }

    let mut out = Vec::new();
    walk(document, String::new(), &mut out);
    out
}
