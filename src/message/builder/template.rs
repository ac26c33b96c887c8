//! Payload template builder.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::Result;
use crate::message::builder::{resolve_header_data, resolve_headers, TemplateSource};
use crate::message::{Message, Payload};
use crate::runtime::TestContext;

/// Builds a message from a payload template, header map and header-data list.
#[derive(Debug, Clone, Default)]
pub struct PayloadTemplateBuilder {
    pub name: Option<String>,
    pub payload: Option<TemplateSource>,
    pub headers: IndexMap<String, Value>,
    pub header_data: Vec<TemplateSource>,
}

impl PayloadTemplateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(TemplateSource::data(payload));
        self
    }

    pub fn with_payload_resource(mut self, path: impl Into<String>) -> Self {
        self.payload = Some(TemplateSource::resource(path));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_header_data(mut self, data: impl Into<String>) -> Self {
        self.header_data.push(TemplateSource::data(data));
        self
    }

    pub fn with_header_resource(mut self, path: impl Into<String>) -> Self {
        self.header_data.push(TemplateSource::resource(path));
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn build(&self, context: &TestContext) -> Result<Message> {
        let payload = match &self.payload {
            Some(source) => Payload::from(source.resolve(context)?),
            None => Payload::Empty,
        };

        let mut message = Message::new(payload);
        message.name = self.name.clone();
        message.headers = resolve_headers(&self.headers, context)?;
        message.header_data = resolve_header_data(&self.header_data, context)?;
        Ok(message)
    }
}
