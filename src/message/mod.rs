//! Message value type exchanged with endpoints.
//!
//! A message carries a payload, a header map, ordered header-data blocks and a
//! unique id generated at construction time.

pub mod builder;
pub mod processor;

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CourierError;

pub use builder::{
    MarkupBuilder, MessageBuilder, PayloadTemplateBuilder, ScriptEngine, ScriptMessageBuilder,
    StaticMessageBuilder, TemplateSource,
};
pub use processor::{apply_global_processors, MessageProcessor, MessageProcessors};

/// Reserved header answering with the message id.
pub const MESSAGE_ID_HEADER: &str = "courier_message_id";

/// Reserved header answering with the message timestamp (RFC 3339).
pub const MESSAGE_TIMESTAMP_HEADER: &str = "courier_message_timestamp";

/// Message payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum Payload {
    #[default]
    Empty,
    Text(String),
    Json(Value),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Empty => true,
            Payload::Text(text) => text.is_empty(),
            Payload::Json(_) => false,
            Payload::Binary(bytes) => bytes.is_empty(),
        }
    }

    /// Textual form of the payload. Binary content is decoded lossily.
    pub fn to_text(&self) -> String {
        match self {
            Payload::Empty => String::new(),
            Payload::Text(text) => text.clone(),
            Payload::Json(value) => value.to_string(),
            Payload::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Payload as a JSON document, parsing text payloads on demand.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        match self {
            Payload::Json(value) => Ok(value.clone()),
            other => serde_json::from_str(&other.to_text()),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        if text.is_empty() {
            Payload::Empty
        } else {
            Payload::Text(text)
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::from(text.to_string())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

/// Content type of a message, used to pick the validation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    #[default]
    Xml,
    Json,
    Plaintext,
    Binary,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::Xml => "XML",
            MessageType::Json => "JSON",
            MessageType::Plaintext => "PLAINTEXT",
            MessageType::Binary => "BINARY",
        };
        f.write_str(name)
    }
}

impl FromStr for MessageType {
    type Err = CourierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "XML" => Ok(MessageType::Xml),
            "JSON" => Ok(MessageType::Json),
            "PLAINTEXT" | "TEXT" => Ok(MessageType::Plaintext),
            "BINARY" => Ok(MessageType::Binary),
            other => Err(CourierError::Config(format!("unknown message type '{}'", other))),
        }
    }
}

/// Direction a message travels relative to the system under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageDirection {
    Inbound,
    Outbound,
    /// Both directions.
    #[default]
    Unbound,
}

impl MessageDirection {
    /// Whether a processor with this direction handles messages travelling `direction`.
    pub fn applies_to(self, direction: MessageDirection) -> bool {
        self == MessageDirection::Unbound || direction == MessageDirection::Unbound || self == direction
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id
    pub id: Uuid,

    /// Creation time
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub message_type: Option<MessageType>,

    #[serde(default)]
    pub payload: Payload,

    /// Case-sensitive header map, insertion ordered
    #[serde(default)]
    pub headers: IndexMap<String, Value>,

    /// Auxiliary header blocks in declaration order
    #[serde(default)]
    pub header_data: Vec<String>,
}

impl Message {
    /// Create a new message with a fresh id
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            name: None,
            message_type: None,
            payload: payload.into(),
            headers: IndexMap::new(),
            header_data: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Payload::Empty)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_header_data(mut self, data: impl Into<String>) -> Self {
        self.header_data.push(data.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = Some(message_type);
        self
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn add_header_data(&mut self, data: impl Into<String>) {
        self.header_data.push(data.into());
    }

    /// Header lookup; the reserved id and timestamp headers are always present.
    pub fn header(&self, name: &str) -> Option<Value> {
        match name {
            MESSAGE_ID_HEADER => Some(Value::String(self.id.to_string())),
            MESSAGE_TIMESTAMP_HEADER => Some(Value::String(self.timestamp.to_rfc3339())),
            _ => self.headers.get(name).cloned(),
        }
    }

    pub fn payload_text(&self) -> String {
        self.payload.to_text()
    }

    /// Copy of this message with a newly generated id and timestamp.
    pub fn copy_with_new_id(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            ..self.clone()
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::empty()
    }
}

/// Messages compare equal when payload and headers match.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload && self.headers == other.headers
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message[id: {}, payload: {}", self.id, self.payload.to_text())?;
        if !self.headers.is_empty() {
            let headers = serde_json::to_string(&self.headers).map_err(|_| fmt::Error)?;
            write!(f, ", headers: {}", headers)?;
        }
        write!(f, "]")
    }
}

/// Messages recorded during a test case, keyed by action or message name.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    messages: IndexMap<String, Message>,
}

impl MessageStore {
    pub fn store(&mut self, key: impl Into<String>, message: Message) {
        self.messages.insert(key.into(), message);
    }

    pub fn get(&self, key: &str) -> Option<&Message> {
        self.messages.get(key)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Message)> {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_message_has_unique_id() {
        let a = Message::new("a");
        let b = Message::new("a");
        assert_ne!(a.id, b.id);
        assert_eq!(a, b);
    }

    #[test]
    fn test_reserved_headers() {
        let message = Message::new("x").with_header("Operation", "sayHello");
        assert_eq!(message.header("Operation"), Some(json!("sayHello")));
        assert_eq!(message.header(MESSAGE_ID_HEADER), Some(json!(message.id.to_string())));
        assert!(message.header(MESSAGE_TIMESTAMP_HEADER).is_some());
        assert_eq!(message.header("missing"), None);
    }

    #[test]
    fn test_copy_with_new_id_keeps_content() {
        let message = Message::new("<M/>")
            .with_header("a", 1)
            .with_header_data("<H/>");
        let copy = message.copy_with_new_id();
        assert_ne!(copy.id, message.id);
        assert_eq!(copy, message);
        assert_eq!(copy.header_data, vec!["<H/>".to_string()]);
    }

    #[test]
    fn test_empty_text_is_empty_payload() {
        assert_eq!(Payload::from(""), Payload::Empty);
        assert!(Message::empty().payload.is_empty());
    }

    #[test]
    fn test_direction_applies_to() {
        assert!(MessageDirection::Unbound.applies_to(MessageDirection::Outbound));
        assert!(MessageDirection::Outbound.applies_to(MessageDirection::Outbound));
        assert!(!MessageDirection::Inbound.applies_to(MessageDirection::Outbound));
    }

    #[test]
    fn test_message_type_from_str() {
        assert_eq!("json".parse::<MessageType>().unwrap(), MessageType::Json);
        assert_eq!(MessageType::Plaintext.to_string(), "PLAINTEXT");
        assert!("yaml".parse::<MessageType>().is_err());
    }
}
