//! Send message action.

use std::sync::Arc;
use indexmap::IndexMap;
use serde_json::Value;

use crate::actions::{endpoint_action_disabled, TestAction};
use crate::actor::TestActor;
use crate::dictionary::{apply_dictionaries, DataDictionary};
use crate::endpoint::Endpoint;
use crate::error::{CourierError, Result};
use crate::message::{
    apply_global_processors, Message, MessageBuilder, MessageDirection, MessageProcessor,
    MessageType, PayloadTemplateBuilder, ScriptMessageBuilder, StaticMessageBuilder,
    TemplateSource,
};
use crate::reference::Reference;
use crate::runtime::TestContext;

/// Builds a message and hands it to the endpoint's producer.
///
/// Pipeline: build, outbound dictionaries (explicit then global), global
/// outbound processors, action processors in declaration order, store, send.
pub struct SendMessageAction {
    name: String,
    actor: Option<TestActor>,
    endpoint: Reference<Arc<dyn Endpoint>>,
    builder: MessageBuilder,
    message_type: MessageType,
    dictionary: Option<Reference<Arc<dyn DataDictionary>>>,
    processors: Vec<Arc<dyn MessageProcessor>>,
}

impl SendMessageAction {
    pub fn builder() -> SendMessageActionBuilder {
        SendMessageActionBuilder::default()
    }

    pub fn builder_spec(&self) -> &MessageBuilder {
        &self.builder
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    fn message_key(&self, endpoint: &dyn Endpoint, message: &Message) -> String {
        message
            .name
            .clone()
            .unwrap_or_else(|| format!("send({})", endpoint.name()))
    }
}

impl TestAction for SendMessageAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn actor(&self) -> Option<&TestActor> {
        self.actor.as_ref()
    }

    fn is_disabled(&self, context: &TestContext) -> Result<bool> {
        endpoint_action_disabled(self.actor.as_ref(), &self.endpoint, context)
    }

    fn do_execute(&self, context: &mut TestContext) -> Result<()> {
        let endpoint = self.endpoint.resolve(context)?;
        let mut message = self.builder.build(context, &self.message_type)?;

        let dictionary = self
            .dictionary
            .as_ref()
            .map(|reference| reference.resolve(context))
            .transpose()?;
        apply_dictionaries(&mut message, MessageDirection::Outbound, dictionary.as_ref(), context)?;
        apply_global_processors(&mut message, MessageDirection::Outbound, context)?;

        for processor in &self.processors {
            processor.process(&mut message, context)?;
        }

        let key = self.message_key(endpoint.as_ref(), &message);
        context.message_store_mut().store(key, message.clone());

        let producer = endpoint.create_producer()?;
        tracing::info!("Sending message {} to endpoint '{}'", message.id, endpoint.name());
        producer.send(&message, context)
    }
}

/// Entry point of the send DSL.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use courier::actions::{send, TestAction};
/// use courier::endpoint::ChannelEndpoint;
/// use courier::runtime::TestContext;
///
/// let endpoint = Arc::new(ChannelEndpoint::new("orders"));
/// let action = send(endpoint.clone())
///     .payload("<Order>${id}</Order>")
///     .header("operation", "create")
///     .build()
///     .unwrap();
///
/// let mut context = TestContext::new();
/// context.set_variable("id", "42");
/// action.execute(&mut context).unwrap();
/// assert_eq!(endpoint.pending(), 1);
/// ```
pub fn send(endpoint: Arc<dyn Endpoint>) -> SendMessageActionBuilder {
    SendMessageActionBuilder::default().endpoint(endpoint)
}

/// Fluent builder for [`SendMessageAction`].
#[derive(Default)]
pub struct SendMessageActionBuilder {
    name: Option<String>,
    actor: Option<TestActor>,
    endpoint: Option<Reference<Arc<dyn Endpoint>>>,
    message: MessageSpec,
    message_type: MessageType,
    dictionary: Option<Reference<Arc<dyn DataDictionary>>>,
    processors: Vec<Arc<dyn MessageProcessor>>,
}

/// Message description shared by the send and receive builders.
#[derive(Debug, Clone, Default)]
pub(crate) struct MessageSpec {
    pub(crate) explicit: Option<MessageBuilder>,
    pub(crate) name: Option<String>,
    pub(crate) payload: Option<TemplateSource>,
    pub(crate) script: Option<TemplateSource>,
    pub(crate) message: Option<Message>,
    pub(crate) headers: IndexMap<String, Value>,
    pub(crate) header_data: Vec<TemplateSource>,
}

impl MessageSpec {
    pub(crate) fn is_empty(&self) -> bool {
        self.explicit.is_none()
            && self.payload.is_none()
            && self.script.is_none()
            && self.message.is_none()
            && self.headers.is_empty()
            && self.header_data.is_empty()
    }

    /// Pick the builder variant: explicit, static, scripted, or payload template.
    ///
    /// # Errors
    /// Returns `Config` when inputs of different variants are combined, such
    /// as a payload together with a script.
    pub(crate) fn into_builder(self) -> Result<MessageBuilder> {
        if let Some(builder) = self.explicit {
            if self.name.is_some()
                || self.payload.is_some()
                || self.script.is_some()
                || self.message.is_some()
                || !self.headers.is_empty()
                || !self.header_data.is_empty()
            {
                return Err(conflict("an explicit message builder", "other message settings"));
            }
            return Ok(builder);
        }

        if let Some(message) = self.message {
            if self.payload.is_some() || self.script.is_some() {
                return Err(conflict("a static message", "a payload or script"));
            }
            let mut builder = StaticMessageBuilder::new(message).with_headers(self.headers);
            if let Some(name) = self.name {
                builder = builder.with_name(name);
            }
            for data in self.header_data {
                builder = builder.with_header_data(data);
            }
            return Ok(MessageBuilder::Static(builder));
        }

        if let Some(script) = self.script {
            if self.payload.is_some() {
                return Err(conflict("a script", "a payload"));
            }
            let mut builder = ScriptMessageBuilder::new(script);
            builder.name = self.name;
            builder.headers = self.headers;
            builder.header_data = self.header_data;
            return Ok(MessageBuilder::Script(builder));
        }

        Ok(MessageBuilder::PayloadTemplate(PayloadTemplateBuilder {
            name: self.name,
            payload: self.payload,
            headers: self.headers,
            header_data: self.header_data,
        }))
    }
}

fn conflict(first: &str, second: &str) -> CourierError {
    CourierError::Config(format!("message cannot combine {} with {}", first, second))
}

impl SendMessageActionBuilder {
    pub fn endpoint(mut self, endpoint: Arc<dyn Endpoint>) -> Self {
        self.endpoint = Some(Reference::Direct(endpoint));
        self
    }

    /// Endpoint looked up by name through the reference resolver at execution time.
    pub fn endpoint_name(mut self, name: impl Into<String>) -> Self {
        self.endpoint = Some(Reference::named(name));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn actor(mut self, actor: TestActor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.message.payload = Some(TemplateSource::data(payload));
        self
    }

    pub fn payload_resource(mut self, path: impl Into<String>) -> Self {
        self.message.payload = Some(TemplateSource::resource(path));
        self
    }

    pub fn payload_resource_with_charset(mut self, path: impl Into<String>, charset: impl Into<String>) -> Self {
        self.message.payload = Some(TemplateSource::resource_with_charset(path, charset));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.message.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: IndexMap<String, Value>) -> Self {
        self.message.headers.extend(headers);
        self
    }

    pub fn header_data(mut self, data: impl Into<String>) -> Self {
        self.message.header_data.push(TemplateSource::data(data));
        self
    }

    pub fn header_resource(mut self, path: impl Into<String>) -> Self {
        self.message.header_data.push(TemplateSource::resource(path));
        self
    }

    /// Send a copy of a pre-built message.
    pub fn message(mut self, message: Message) -> Self {
        self.message.message = Some(message);
        self
    }

    pub fn message_name(mut self, name: impl Into<String>) -> Self {
        self.message.name = Some(name.into());
        self
    }

    pub fn script(mut self, script: impl Into<String>) -> Self {
        self.message.script = Some(TemplateSource::data(script));
        self
    }

    pub fn script_resource(mut self, path: impl Into<String>) -> Self {
        self.message.script = Some(TemplateSource::resource(path));
        self
    }

    pub fn message_builder(mut self, builder: MessageBuilder) -> Self {
        self.message.explicit = Some(builder);
        self
    }

    /// Replace the whole message description at once.
    pub(crate) fn message_spec(mut self, spec: MessageSpec) -> Self {
        self.message = spec;
        self
    }

    pub fn message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn dictionary(mut self, dictionary: Arc<dyn DataDictionary>) -> Self {
        self.dictionary = Some(Reference::Direct(dictionary));
        self
    }

    pub fn dictionary_name(mut self, name: impl Into<String>) -> Self {
        self.dictionary = Some(Reference::named(name));
        self
    }

    /// Add a processor (e.g. a variable extractor) run after dictionaries.
    pub fn process(mut self, processor: impl MessageProcessor + 'static) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    pub fn build(self) -> Result<SendMessageAction> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| CourierError::Config("send action requires an endpoint".to_string()))?;

        Ok(SendMessageAction {
            name: self.name.unwrap_or_else(|| "send".to_string()),
            actor: self.actor,
            endpoint,
            builder: self.message.into_builder()?,
            message_type: self.message_type,
            dictionary: self.dictionary,
            processors: self.processors,
        })
    }
}
