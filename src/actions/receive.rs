//! Receive message action.

use std::sync::Arc;
use std::time::Duration;
use serde_json::Value;

use crate::actions::send::MessageSpec;
use crate::actions::{endpoint_action_disabled, TestAction};
use crate::actor::TestActor;
use crate::dictionary::{apply_dictionaries, DataDictionary};
use crate::endpoint::Endpoint;
use crate::error::{CourierError, Result};
use crate::message::{
    apply_global_processors, MessageBuilder, MessageDirection, MessageProcessor, MessageType,
    TemplateSource,
};
use crate::reference::Reference;
use crate::runtime::TestContext;
use crate::validation::validate_message;

/// Receives a message from the endpoint's consumer and validates it.
///
/// Pipeline: receive (bounded by the action or endpoint timeout), inbound
/// dictionaries, global inbound processors, control message validation,
/// action processors, store.
pub struct ReceiveMessageAction {
    name: String,
    actor: Option<TestActor>,
    endpoint: Reference<Arc<dyn Endpoint>>,
    control: Option<MessageBuilder>,
    message_type: MessageType,
    timeout: Option<Duration>,
    dictionary: Option<Reference<Arc<dyn DataDictionary>>>,
    processors: Vec<Arc<dyn MessageProcessor>>,
}

impl ReceiveMessageAction {
    pub fn builder() -> ReceiveMessageActionBuilder {
        ReceiveMessageActionBuilder::default()
    }
}

impl TestAction for ReceiveMessageAction {
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
        let consumer = endpoint.create_consumer()?;
        let timeout = self.timeout.unwrap_or_else(|| endpoint.timeout());

        tracing::info!("Waiting up to {:?} for message on endpoint '{}'", timeout, endpoint.name());
        let mut message = consumer.receive(context, timeout)?;

        let dictionary = self
            .dictionary
            .as_ref()
            .map(|reference| reference.resolve(context))
            .transpose()?;
        apply_dictionaries(&mut message, MessageDirection::Inbound, dictionary.as_ref(), context)?;
        apply_global_processors(&mut message, MessageDirection::Inbound, context)?;

        if let Some(builder) = &self.control {
            let control = builder.build(context, &self.message_type)?;
            validate_message(&message, &control, &self.message_type, context)?;
        }

        for processor in &self.processors {
            processor.process(&mut message, context)?;
        }

        let key = message
            .name
            .clone()
            .unwrap_or_else(|| format!("receive({})", endpoint.name()));
        context.message_store_mut().store(key, message);
        Ok(())
    }
}

/// Entry point of the receive DSL.
pub fn receive(endpoint: Arc<dyn Endpoint>) -> ReceiveMessageActionBuilder {
    ReceiveMessageActionBuilder::default().endpoint(endpoint)
}

/// Fluent builder for [`ReceiveMessageAction`]; message methods describe the control message.
#[derive(Default)]
pub struct ReceiveMessageActionBuilder {
    name: Option<String>,
    actor: Option<TestActor>,
    endpoint: Option<Reference<Arc<dyn Endpoint>>>,
    message: MessageSpec,
    message_type: MessageType,
    timeout: Option<Duration>,
    dictionary: Option<Reference<Arc<dyn DataDictionary>>>,
    processors: Vec<Arc<dyn MessageProcessor>>,
}

impl ReceiveMessageActionBuilder {
    pub fn endpoint(mut self, endpoint: Arc<dyn Endpoint>) -> Self {
        self.endpoint = Some(Reference::Direct(endpoint));
        self
    }

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

    pub fn header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.message.headers.insert(name.into(), value.into());
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

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
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

    pub fn process(mut self, processor: impl MessageProcessor + 'static) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    pub fn build(self) -> Result<ReceiveMessageAction> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| CourierError::Config("receive action requires an endpoint".to_string()))?;

        let control = if self.message.is_empty() {
            None
        } else {
            Some(self.message.into_builder()?)
        };

        Ok(ReceiveMessageAction {
            name: self.name.unwrap_or_else(|| "receive".to_string()),
            actor: self.actor,
            endpoint,
            control,
            message_type: self.message_type,
            timeout: self.timeout,
            dictionary: self.dictionary,
            processors: self.processors,
        })
    }
}
