//! Text replacement dictionary.

use regex::{NoExpand, Regex};

use crate::dictionary::{load_mappings, DataDictionary};
use crate::error::{CourierError, Result};
use crate::message::{Message, MessageDirection, MessageProcessor, Payload};
use crate::runtime::TestContext;

#[derive(Debug, Clone)]
enum MappingKey {
    Literal(String),
    Pattern(Regex),
}

#[derive(Debug, Clone)]
struct Mapping {
    key: MappingKey,
    value: String,
}

/// Replaces literal text or regex matches in the payload with mapped values.
///
/// Mapped values are resolved through the context, so they may contain
/// placeholders and function calls. Mappings apply in declaration order.
#[derive(Debug, Clone)]
pub struct SimpleMappingDictionary {
    name: String,
    direction: MessageDirection,
    global: bool,
    mappings: Vec<Mapping>,
}

impl SimpleMappingDictionary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: MessageDirection::Unbound,
            global: false,
            mappings: Vec::new(),
        }
    }

    pub fn with_direction(mut self, direction: MessageDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Register the dictionary for every message of matching direction.
    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn with_mapping(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.mappings.push(Mapping {
            key: MappingKey::Literal(key.into()),
            value: value.into(),
        });
        self
    }

    /// Add a mapping whose key is a regular expression.
    pub fn with_pattern_mapping(mut self, pattern: &str, value: impl Into<String>) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            CourierError::dictionary(&self.name, format!("invalid pattern '{}': {}", pattern, e))
        })?;
        self.mappings.push(Mapping {
            key: MappingKey::Pattern(regex),
            value: value.into(),
        });
        Ok(self)
    }

    /// Add literal mappings from a YAML resource.
    pub fn with_mappings_resource(mut self, path: &str, context: &TestContext) -> Result<Self> {
        for (key, value) in load_mappings(path, context)? {
            self = self.with_mapping(key, value);
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    fn translate_text(&self, text: &str, context: &TestContext) -> Result<String> {
        let mut translated = text.to_string();
        for mapping in &self.mappings {
            let value = context.resolve(&mapping.value)?;
            translated = match &mapping.key {
                MappingKey::Literal(key) if key.is_empty() => translated,
                MappingKey::Literal(key) => translated.replace(key.as_str(), &value),
                MappingKey::Pattern(regex) => regex
                    .replace_all(&translated, NoExpand(&value))
                    .into_owned(),
            };
        }
        Ok(translated)
    }
}

impl DataDictionary for SimpleMappingDictionary {
    fn name(&self) -> &str {
        &self.name
    }

    fn direction(&self) -> MessageDirection {
        self.direction
    }

    fn is_global_scope(&self) -> bool {
        self.global
    }

    fn translate(&self, message: &mut Message, context: &TestContext) -> Result<()> {
        let translated = match &message.payload {
            Payload::Text(text) => Payload::from(self.translate_text(text, context)?),
            Payload::Json(value) => {
                let text = self.translate_text(&value.to_string(), context)?;
                let value = serde_json::from_str(&text).map_err(|e| {
                    CourierError::dictionary(&self.name, format!("translation produced invalid JSON: {}", e))
                })?;
                Payload::Json(value)
            }
            Payload::Empty | Payload::Binary(_) => return Ok(()),
        };

        message.payload = translated;
        Ok(())
    }
}

impl MessageProcessor for SimpleMappingDictionary {
    fn process(&self, message: &mut Message, context: &mut TestContext) -> Result<()> {
        self.translate(message, context)
    }

    fn direction(&self) -> MessageDirection {
        self.direction
    }

    fn as_dictionary(&self) -> Option<&dyn DataDictionary> {
        Some(self)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::InMemoryResourceLoader;
    use std::sync::Arc;

    #[test]
    fn test_literal_mapping() {
        let context = TestContext::new();
        let dictionary = SimpleMappingDictionary::new("greetings").with_mapping("?", "Hello Courier!");

        let mut message = Message::new("<M>?</M>");
        DataDictionary::translate(&dictionary, &mut message, &context).unwrap();
        assert_eq!(message.payload_text(), "<M>Hello Courier!</M>");
    }

    #[test]
    fn test_pattern_mapping_and_resolved_value() {
        let mut context = TestContext::new();
        context.set_variable("user", "courier");
        let dictionary = SimpleMappingDictionary::new("users")
            .with_pattern_mapping(r"user-\d+", "${user}")
            .unwrap();

        let mut message = Message::new("<U>user-12</U><U>user-7</U>");
        DataDictionary::translate(&dictionary, &mut message, &context).unwrap();
        assert_eq!(message.payload_text(), "<U>courier</U><U>courier</U>");
    }

    #[test]
    fn test_invalid_pattern() {
        let err = SimpleMappingDictionary::new("broken")
            .with_pattern_mapping("(", "x")
            .unwrap_err();
        assert!(matches!(err, CourierError::Dictionary { dictionary, .. } if dictionary == "broken"));
    }

    #[test]
    fn test_unresolvable_value_fails() {
        let context = TestContext::new();
        let dictionary = SimpleMappingDictionary::new("d").with_mapping("a", "${missing}");
        let mut message = Message::new("a");
        let err = DataDictionary::translate(&dictionary, &mut message, &context).unwrap_err();
        assert!(matches!(err, CourierError::UnknownVariable(name) if name == "missing"));
    }

    #[test]
    fn test_mappings_from_yaml_resource() {
        let mut context = TestContext::new();
        context.set_resource_loader(Arc::new(
            InMemoryResourceLoader::new().with_text("mappings.yaml", "\"?\": Hello\nfoo: bar\n"),
        ));

        let dictionary = SimpleMappingDictionary::new("yaml")
            .with_mappings_resource("mappings.yaml", &context)
            .unwrap();
        assert_eq!(dictionary.len(), 2);

        let mut message = Message::new("? foo");
        DataDictionary::translate(&dictionary, &mut message, &context).unwrap();
        assert_eq!(message.payload_text(), "Hello bar");
    }
}
