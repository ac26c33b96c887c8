//! Variable store and `${...}` placeholder scanning.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CourierError, Result};

/// Opening token of a variable placeholder.
pub const PLACEHOLDER_PREFIX: &str = "${";

/// Closing token of a variable placeholder.
pub const PLACEHOLDER_SUFFIX: char = '}';

/// Name → value mapping holding the variables of one running test case.
///
/// Values are arbitrary JSON values; writes replace previous values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableStore {
    #[serde(default)]
    values: HashMap<String, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`, replacing any previous binding.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Get a variable by name.
    ///
    /// # Errors
    /// Returns `UnknownVariable` if no value is bound to `name`.
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| CourierError::UnknownVariable(name.to_string()))
    }

    /// Get a variable rendered as text.
    pub fn get_string(&self, name: &str) -> Result<String> {
        self.get(name).map(value_to_string)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

/// Render a variable value the way it is inserted into templates.
///
/// Strings are inserted without quotes, `null` becomes the empty string and
/// everything else uses its JSON representation.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A segment of a template split at placeholder boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Split a template into literal text and `${...}` placeholder expressions.
///
/// The scan is single pass and brace balanced, so `${a:f('${b}')}` is one
/// placeholder whose expression is `a:f('${b}')`.
///
/// # Errors
/// Returns `InvalidExpression` when a placeholder is never closed.
pub fn split_template(template: &str) -> Result<Vec<TemplateSegment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find(PLACEHOLDER_PREFIX) {
        if start > 0 {
            segments.push(TemplateSegment::Literal(&rest[..start]));
        }

        let body = &rest[start + PLACEHOLDER_PREFIX.len()..];
        let end = find_closing_brace(body).ok_or_else(|| {
            CourierError::InvalidExpression(format!(
                "unterminated placeholder in '{}'",
                template
            ))
        })?;

        segments.push(TemplateSegment::Placeholder(&body[..end]));
        rest = &body[end + PLACEHOLDER_SUFFIX.len_utf8()..];
    }

    if !rest.is_empty() {
        segments.push(TemplateSegment::Literal(rest));
    }

    Ok(segments)
}

fn find_closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(idx),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let mut store = VariableStore::new();
        store.set("text", "Hello World!");
        store.set("count", 3);

        assert_eq!(store.get_string("text").unwrap(), "Hello World!");
        assert_eq!(store.get_string("count").unwrap(), "3");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_last_write_wins() {
        let mut store = VariableStore::new();
        store.set("a", "1");
        store.set("a", "2");
        assert_eq!(store.get_string("a").unwrap(), "2");
    }

    #[test]
    fn test_missing_variable() {
        let store = VariableStore::new();
        let err = store.get("missing").unwrap_err();
        assert!(matches!(err, CourierError::UnknownVariable(name) if name == "missing"));
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("x")), "x");
        assert_eq!(value_to_string(&json!(null)), "");
        assert_eq!(value_to_string(&json!(true)), "true");
        assert_eq!(value_to_string(&json!({"a": 1})), "{\"a\":1}");
    }

    #[test]
    fn test_split_template() {
        let segments = split_template("<M>${text}</M>").unwrap();
        assert_eq!(
            segments,
            vec![
                TemplateSegment::Literal("<M>"),
                TemplateSegment::Placeholder("text"),
                TemplateSegment::Literal("</M>"),
            ]
        );
    }

    #[test]
    fn test_split_template_nested() {
        let segments = split_template("${courier:concat('a', ${b})}!").unwrap();
        assert_eq!(segments[0], TemplateSegment::Placeholder("courier:concat('a', ${b})"));
        assert_eq!(segments[1], TemplateSegment::Literal("!"));
    }

    #[test]
    fn test_split_template_unterminated() {
        assert!(matches!(
            split_template("abc ${oops"),
            Err(CourierError::InvalidExpression(_))
        ));
    }
}
