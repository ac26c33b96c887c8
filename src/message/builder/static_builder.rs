//! Builder wrapping a pre-built message.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::Result;
use crate::message::builder::{resolve_header_data, resolve_headers, TemplateSource};
use crate::message::{Message, Payload};
use crate::runtime::TestContext;

/// Copies a held message, merging builder-level extra headers into the copy.
///
/// Extra header-data blocks are appended after the held message's own blocks.
#[derive(Debug, Clone)]
pub struct StaticMessageBuilder {
    message: Message,
    name: Option<String>,
    extra_headers: IndexMap<String, Value>,
    extra_header_data: Vec<TemplateSource>,
}

impl StaticMessageBuilder {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            name: None,
            extra_headers: IndexMap::new(),
            extra_header_data: Vec::new(),
        }
    }

    /// Name the copy, replacing the held message's name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_header_data(mut self, data: TemplateSource) -> Self {
        self.extra_header_data.push(data);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: IndexMap<String, Value>) -> Self {
        self.extra_headers.extend(headers);
        self
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Build a copy with a fresh id. Extra headers win on key collisions.
    pub fn build(&self, context: &TestContext) -> Result<Message> {
        let mut message = self.message.copy_with_new_id();

        if let Payload::Text(text) = &message.payload {
            message.payload = Payload::from(context.resolve(text)?);
        }

        let mut headers = resolve_headers(&message.headers, context)?;
        headers.extend(resolve_headers(&self.extra_headers, context)?);
        message.headers = headers;

        let mut header_data = message
            .header_data
            .iter()
            .map(|data| context.resolve(data))
            .collect::<Result<Vec<_>>>()?;
        header_data.extend(resolve_header_data(&self.extra_header_data, context)?);
        message.header_data = header_data;

        if let Some(name) = &self.name {
            message.name = Some(name.clone());
        }

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_round_trip_with_fresh_id() {
        let context = TestContext::new();
        let source = Message::new("<Hello/>")
            .with_header("operation", "greet")
            .with_header("priority", 1);

        let message = StaticMessageBuilder::new(source.clone())
            .with_header("additional", "extra")
            .build(&context)
            .unwrap();

        assert_ne!(message.id, source.id);
        assert_eq!(message.payload_text(), "<Hello/>");
        assert_eq!(message.headers["operation"], json!("greet"));
        assert_eq!(message.headers["priority"], json!(1));
        assert_eq!(message.headers["additional"], json!("extra"));
        assert_eq!(message.headers.len(), 3);
    }

    #[test]
    fn test_extra_headers_win() {
        let context = TestContext::new();
        let message = StaticMessageBuilder::new(Message::new("x").with_header("operation", "old"))
            .with_header("operation", "new")
            .build(&context)
            .unwrap();
        assert_eq!(message.headers["operation"], json!("new"));
    }

    #[test]
    fn test_extra_header_data_and_name() {
        let mut context = TestContext::new();
        context.set_variable("tag", "Extra");
        let mut source = Message::new("<a/>");
        source.header_data.push("<Own/>".to_string());

        let message = StaticMessageBuilder::new(source)
            .with_name("m1")
            .with_header_data(TemplateSource::data("<${tag}/>"))
            .build(&context)
            .unwrap();

        assert_eq!(message.header_data, vec!["<Own/>".to_string(), "<Extra/>".to_string()]);
        assert_eq!(message.name.as_deref(), Some("m1"));
    }

    #[test]
    fn test_static_payload_is_resolved() {
        let mut context = TestContext::new();
        context.set_variable("user", "courier");
        let message = StaticMessageBuilder::new(Message::new("Hello ${user}"))
            .build(&context)
            .unwrap();
        assert_eq!(message.payload_text(), "Hello courier");
    }
}
