//! Variable extractors: processors writing message values into the context.

use indexmap::IndexMap;

use crate::error::{CourierError, Result};
use crate::extraction::{Extractor, FieldPath};
use crate::message::{Message, MessageProcessor};
use crate::runtime::{value_to_string, TestContext};

/// Copies header values into variables (`header name -> variable name`).
///
/// The reserved message id and timestamp headers can be extracted too.
#[derive(Debug, Clone, Default)]
pub struct MessageHeaderVariableExtractor {
    mappings: IndexMap<String, String>,
}

impl MessageHeaderVariableExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(mut self, header: impl Into<String>, variable: impl Into<String>) -> Self {
        self.mappings.insert(header.into(), variable.into());
        self
    }

    pub fn with_mappings(mut self, mappings: IndexMap<String, String>) -> Self {
        self.mappings.extend(mappings);
        self
    }
}

impl MessageProcessor for MessageHeaderVariableExtractor {
    fn process(&self, message: &mut Message, context: &mut TestContext) -> Result<()> {
        for (header, variable) in &self.mappings {
            let value = message.header(header).ok_or_else(|| {
                CourierError::Processing(format!("Failed to find header '{}' in message", header))
            })?;
            tracing::debug!("Extracted header '{}' into variable '{}'", header, variable);
            context.set_variable(variable.clone(), value_to_string(&value));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "header-variable-extractor"
    }
}

/// Copies JSON payload values into variables (`path -> variable name`).
#[derive(Debug, Clone, Default)]
pub struct JsonPathVariableExtractor {
    mappings: IndexMap<String, String>,
}

impl JsonPathVariableExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(mut self, path: impl Into<String>, variable: impl Into<String>) -> Self {
        self.mappings.insert(path.into(), variable.into());
        self
    }

    pub fn with_mappings(mut self, mappings: IndexMap<String, String>) -> Self {
        self.mappings.extend(mappings);
        self
    }
}

impl MessageProcessor for JsonPathVariableExtractor {
    fn process(&self, message: &mut Message, context: &mut TestContext) -> Result<()> {
        if self.mappings.is_empty() {
            return Ok(());
        }

        let document = message.payload.to_json().map_err(|e| {
            CourierError::Processing(format!("payload is not valid JSON: {}", e))
        })?;

        for (path, variable) in &self.mappings {
            let value = document.extract(&FieldPath::parse(path)).ok_or_else(|| {
                CourierError::Processing(format!("No value found for JSON path '{}'", path))
            })?;
            context.set_variable(variable.clone(), value);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "json-path-variable-extractor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MESSAGE_ID_HEADER;
    use serde_json::json;

    #[test]
    fn test_header_extraction() {
        let mut context = TestContext::new();
        let mut message = Message::new("x").with_header("operation", "sayHello");

        MessageHeaderVariableExtractor::new()
            .with_mapping("operation", "op")
            .with_mapping(MESSAGE_ID_HEADER, "messageId")
            .process(&mut message, &mut context)
            .unwrap();

        assert_eq!(context.get_variable_string("op").unwrap(), "sayHello");
        assert_eq!(context.get_variable_string("messageId").unwrap(), message.id.to_string());
    }

    #[test]
    fn test_missing_header_fails() {
        let mut context = TestContext::new();
        let mut message = Message::new("x");
        let err = MessageHeaderVariableExtractor::new()
            .with_mapping("missing", "v")
            .process(&mut message, &mut context)
            .unwrap_err();
        assert!(matches!(err, CourierError::Processing(_)));
    }

    #[test]
    fn test_json_path_extraction() {
        let mut context = TestContext::new();
        let mut message = Message::new(json!({"user": {"id": 7, "names": ["a", "b"]}}));

        JsonPathVariableExtractor::new()
            .with_mapping("$.user.id", "userId")
            .with_mapping("user.names[1]", "second")
            .process(&mut message, &mut context)
            .unwrap();

        assert_eq!(context.get_variable_string("userId").unwrap(), "7");
        assert_eq!(context.get_variable_string("second").unwrap(), "b");
    }

    #[test]
    fn test_json_path_on_text_payload() {
        let mut context = TestContext::new();
        let mut message = Message::new("not json");
        let result = JsonPathVariableExtractor::new()
            .with_mapping("a", "b")
            .process(&mut message, &mut context);
        assert!(matches!(result, Err(CourierError::Processing(_))));
    }
}
