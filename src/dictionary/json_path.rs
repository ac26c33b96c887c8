//! Dictionary replacing JSON leaf values addressed by dotted paths.

use std::str::FromStr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dictionary::{load_mappings, DataDictionary};
use crate::error::{CourierError, Result};
use crate::extraction::{leaf_paths, FieldPath};
use crate::message::{Message, MessageDirection, MessageProcessor, MessageType, Payload};
use crate::runtime::TestContext;

/// How a mapping key is compared against a leaf path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathMappingStrategy {
    #[default]
    Exact,
    StartsWith,
    EndsWith,
}

impl PathMappingStrategy {
    pub fn matches(self, path: &str, key: &str) -> bool {
        match self {
            PathMappingStrategy::Exact => path == key,
            PathMappingStrategy::StartsWith => path.starts_with(key),
            PathMappingStrategy::EndsWith => path.ends_with(key),
        }
    }
}

impl FromStr for PathMappingStrategy {
    type Err = CourierError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EXACT" => Ok(PathMappingStrategy::Exact),
            "STARTS_WITH" => Ok(PathMappingStrategy::StartsWith),
            "ENDS_WITH" => Ok(PathMappingStrategy::EndsWith),
            other => Err(CourierError::Config(format!("unknown path mapping strategy '{}'", other))),
        }
    }
}

/// Replaces JSON leaf values whose path matches a mapping key.
///
/// The first matching mapping (declaration order) wins for each leaf.
#[derive(Debug, Clone)]
pub struct JsonPathMappingDictionary {
    name: String,
    direction: MessageDirection,
    global: bool,
    strategy: PathMappingStrategy,
    mappings: IndexMap<String, String>,
}

impl JsonPathMappingDictionary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: MessageDirection::Unbound,
            global: false,
            strategy: PathMappingStrategy::Exact,
            mappings: IndexMap::new(),
        }
    }

    pub fn with_direction(mut self, direction: MessageDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_strategy(mut self, strategy: PathMappingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn with_mapping(mut self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.mappings.insert(path.into(), value.into());
        self
    }

    pub fn with_mappings_resource(mut self, path: &str, context: &TestContext) -> Result<Self> {
        self.mappings.extend(load_mappings(path, context)?);
        Ok(self)
    }

    fn mapping_for(&self, path: &str) -> Option<&String> {
        self.mappings
            .iter()
            .find(|(key, _)| self.strategy.matches(path, key))
            .map(|(_, value)| value)
    }

    fn translate_document(&self, document: &mut Value, context: &TestContext) -> Result<()> {
        for path in leaf_paths(document) {
            let Some(template) = self.mapping_for(&path) else {
                continue;
            };
            let value = context.resolve(template)?;
            if let Some(leaf) = FieldPath::parse(&path).get_mut(document) {
                tracing::trace!("Dictionary '{}' translating '{}'", self.name, path);
                *leaf = Value::String(value);
            }
        }
        Ok(())
    }
}

impl DataDictionary for JsonPathMappingDictionary {
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
        if message.payload.is_empty() || self.mappings.is_empty() {
            return Ok(());
        }

        // Typed non-JSON messages are left alone.
        let declared_other = message
            .message_type
            .is_some_and(|message_type| message_type != MessageType::Json);
        if declared_other && !matches!(message.payload, Payload::Json(_)) {
            tracing::trace!("Dictionary '{}' skipping non-JSON message {}", self.name, message.id);
            return Ok(());
        }

        let mut document = message.payload.to_json().map_err(|e| {
            CourierError::dictionary(&self.name, format!("payload is not valid JSON: {}", e))
        })?;
        self.translate_document(&mut document, context)?;

        message.payload = match message.payload {
            Payload::Json(_) => Payload::Json(document),
            _ => Payload::Text(document.to_string()),
        };
        Ok(())
    }
}

impl MessageProcessor for JsonPathMappingDictionary {
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
