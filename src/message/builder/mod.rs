//! Message builders.
//!
//! A builder turns a declarative message description into a concrete
//! [`Message`] using the runtime context. Three variants exist:
//!
//! - [`StaticMessageBuilder`]: copies a pre-built message
//! - [`PayloadTemplateBuilder`]: resolves a literal or resource payload template
//! - [`ScriptMessageBuilder`]: renders the payload through an injected [`ScriptEngine`]
//!
//! All variants share the same template contract: every placeholder in every
//! templated field must resolve, otherwise the build fails.

pub mod script;
pub mod static_builder;
pub mod template;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::Result;
use crate::message::{Message, MessageType};
use crate::runtime::TestContext;

pub use script::{MarkupBuilder, ScriptEngine, ScriptMessageBuilder};
pub use static_builder::StaticMessageBuilder;
pub use template::PayloadTemplateBuilder;

/// Closed set of builder variants.
#[derive(Debug, Clone)]
pub enum MessageBuilder {
    Static(StaticMessageBuilder),
    PayloadTemplate(PayloadTemplateBuilder),
    Script(ScriptMessageBuilder),
}

impl MessageBuilder {
    /// Build a message for the given context.
    ///
    /// # Arguments
    /// * `context` - Runtime context used for placeholder resolution and resource loading
    /// * `message_type` - Type recorded on the message when the builder does not set one
    ///
    /// # Returns
    /// A new message with a fresh id, or the first resolution/loading failure
    pub fn build(&self, context: &TestContext, message_type: &MessageType) -> Result<Message> {
        let mut message = match self {
            MessageBuilder::Static(builder) => builder.build(context)?,
            MessageBuilder::PayloadTemplate(builder) => builder.build(context)?,
            MessageBuilder::Script(builder) => builder.build(context)?,
        };

        if message.message_type.is_none() {
            message.message_type = Some(*message_type);
        }

        tracing::debug!("Built message {}", message.id);
        Ok(message)
    }

    /// Shorthand for a payload template builder with a literal payload.
    pub fn payload(payload: impl Into<String>) -> Self {
        MessageBuilder::PayloadTemplate(PayloadTemplateBuilder::new().with_payload(payload))
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        MessageBuilder::PayloadTemplate(PayloadTemplateBuilder::default())
    }
}

/// Where a template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Literal template text.
    Data(String),
    /// Resource path (may contain placeholders) and optional charset override.
    Resource { path: String, charset: Option<String> },
}

impl TemplateSource {
    pub fn data(text: impl Into<String>) -> Self {
        TemplateSource::Data(text.into())
    }

    pub fn resource(path: impl Into<String>) -> Self {
        TemplateSource::Resource {
            path: path.into(),
            charset: None,
        }
    }

    pub fn resource_with_charset(path: impl Into<String>, charset: impl Into<String>) -> Self {
        TemplateSource::Resource {
            path: path.into(),
            charset: Some(charset.into()),
        }
    }

    /// Raw template text, before placeholder resolution.
    ///
    /// Literal text is returned as-is; resources are loaded and decoded.
    pub fn load(&self, context: &TestContext) -> Result<String> {
        match self {
            TemplateSource::Data(text) => Ok(text.clone()),
            TemplateSource::Resource { path, charset } => {
                let path = context.resolve(path)?;
                context
                    .resource_loader()
                    .load(&path)?
                    .read_to_string(charset.as_deref())
            }
        }
    }

    /// Loaded and fully resolved template text.
    pub fn resolve(&self, context: &TestContext) -> Result<String> {
        let raw = self.load(context)?;
        context.resolve(&raw)
    }
}

/// Resolve header values. Keys are taken literally; only string values are templated.
pub(crate) fn resolve_headers(
    headers: &IndexMap<String, Value>,
    context: &TestContext,
) -> Result<IndexMap<String, Value>> {
    headers
        .iter()
        .map(|(name, value)| Ok((name.clone(), context.resolve_value(value)?)))
        .collect()
}

/// Resolve header-data blocks preserving their order.
pub(crate) fn resolve_header_data(
    header_data: &[TemplateSource],
    context: &TestContext,
) -> Result<Vec<String>> {
    header_data.iter().map(|source| source.resolve(context)).collect()
}
