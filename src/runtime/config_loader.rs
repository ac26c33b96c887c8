//! YAML test case loader.
//!
//! A test case file declares variables, actors, in-memory endpoints, data
//! dictionaries and a tree of actions. Endpoints and dictionaries are bound
//! by name in a reference resolver; actions look them up at execution time.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::actions::send::MessageSpec;
use crate::actions::{
    CreateVariablesAction, EchoAction, FailAction, ReceiveMessageAction, SendMessageAction,
    SleepAction, TestAction,
};
use crate::actor::TestActor;
use crate::config::CourierConfig;
use crate::container::{Conditional, Sequence};
use crate::dictionary::{
    DataDictionary, JsonPathMappingDictionary, PathMappingStrategy, SimpleMappingDictionary,
};
use crate::endpoint::{ChannelEndpoint, ChannelEndpointConfig, Endpoint};
use crate::error::{CourierError, Result};
use crate::extractors::{JsonPathVariableExtractor, MessageHeaderVariableExtractor};
use crate::message::{MessageDirection, MessageProcessor, MessageType, TemplateSource};
use crate::reference::SimpleReferenceResolver;
use crate::runtime::{TestContext, TestContextFactory};
use crate::test_case::TestCase;

/// Test case as declared in YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseDefinition {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Declared variables, evaluated in order
    #[serde(default)]
    pub variables: IndexMap<String, String>,

    #[serde(default)]
    pub actors: Vec<TestActor>,

    #[serde(default)]
    pub endpoints: Vec<EndpointDefinition>,

    #[serde(default)]
    pub dictionaries: Vec<DictionaryDefinition>,

    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDefinition {
    pub name: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DictionaryKind {
    #[default]
    Simple,
    JsonPath,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryDefinition {
    pub name: String,
    #[serde(default)]
    pub kind: DictionaryKind,
    #[serde(default)]
    pub direction: MessageDirection,
    /// Register in the context's processor chain
    #[serde(default)]
    pub global: bool,
    /// Path matching strategy, json_path dictionaries only
    #[serde(default)]
    pub strategy: PathMappingStrategy,
    #[serde(default)]
    pub mappings: IndexMap<String, String>,
    #[serde(default)]
    pub mappings_resource: Option<String>,
}

/// Message description shared by send actions and receive control messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageDefinition {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub message_type: Option<MessageType>,
    pub payload: Option<String>,
    pub payload_resource: Option<String>,
    pub charset: Option<String>,
    pub script: Option<String>,
    pub script_resource: Option<String>,
    pub headers: IndexMap<String, JsonValue>,
    pub header_data: Vec<String>,
    pub header_resource: Option<String>,
}

/// Values copied into variables after a message was sent or received.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractDefinition {
    /// header name -> variable name
    pub headers: IndexMap<String, String>,
    /// JSON path -> variable name
    pub json: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendDefinition {
    #[serde(default)]
    pub name: Option<String>,
    pub endpoint: String,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub message: MessageDefinition,
    #[serde(default)]
    pub dictionary: Option<String>,
    #[serde(default)]
    pub extract: ExtractDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveDefinition {
    #[serde(default)]
    pub name: Option<String>,
    pub endpoint: String,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub message: MessageDefinition,
    #[serde(default)]
    pub dictionary: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub extract: ExtractDefinition,
}

/// One action, tagged by its `action:` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionDefinition {
    Echo {
        message: String,
    },
    Send(SendDefinition),
    Receive(ReceiveDefinition),
    Sequence {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        actor: Option<String>,
        actions: Vec<ActionDefinition>,
    },
    Conditional {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        actor: Option<String>,
        when: String,
        actions: Vec<ActionDefinition>,
    },
    CreateVariables {
        variables: IndexMap<String, String>,
    },
    Sleep {
        milliseconds: u64,
    },
    Fail {
        message: String,
    },
}

impl TestCaseDefinition {
    /// Load a test case definition from a YAML file.
    ///
    /// # Arguments
    /// * `path` - Path to the test case file
    ///
    /// # Errors
    /// `Resource` when the file cannot be read, `Config` when it is not a
    /// valid test case
    ///
    /// # Example
    /// ```ignore
    /// use courier::runtime::TestCaseDefinition;
    ///
    /// let definition = TestCaseDefinition::load_from_file("cases/greeting.yaml")?;
    /// println!("Loaded '{}' with {} actions", definition.name, definition.actions.len());
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| CourierError::Resource {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| CourierError::Config(format!("Failed to parse test case YAML: {}", e)))
    }

    /// Build endpoints, dictionaries and actions into a runnable test case.
    pub fn into_test_case(self, config: &CourierConfig) -> Result<LoadedTestCase> {
        self.into_test_case_with(TestContextFactory::from_config(config), config)
    }

    /// Like [`TestCaseDefinition::into_test_case`], starting from a prepared factory.
    pub fn into_test_case_with(
        self,
        mut factory: TestContextFactory,
        config: &CourierConfig,
    ) -> Result<LoadedTestCase> {
        let actors: IndexMap<String, TestActor> = self
            .actors
            .into_iter()
            .map(|actor| (actor.name.clone(), actor))
            .collect();
        let lookup_actor = |name: &Option<String>| -> Result<Option<TestActor>> {
            name.as_ref()
                .map(|name| {
                    actors
                        .get(name)
                        .cloned()
                        .ok_or_else(|| CourierError::Config(format!("unknown actor '{}'", name)))
                })
                .transpose()
        };

        let mut resolver = SimpleReferenceResolver::new();
        let mut endpoints = IndexMap::new();
        for definition in &self.endpoints {
            let timeout = definition
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(config.default_timeout);
            let mut endpoint = ChannelEndpoint::with_config(
                definition.name.clone(),
                ChannelEndpointConfig { timeout, capacity: None },
            );
            if let Some(actor) = lookup_actor(&definition.actor)? {
                endpoint = endpoint.with_actor(actor);
            }
            let endpoint = Arc::new(endpoint);
            let shared: Arc<dyn Endpoint> = endpoint.clone();
            resolver.bind(definition.name.clone(), shared);
            endpoints.insert(definition.name.clone(), endpoint);
        }

        // Mapping resources are loaded through the factory's resource loader.
        let loading_context = factory.create_context();
        let mut dictionary_names = Vec::new();
        for definition in self.dictionaries {
            let (dictionary, processor) = build_dictionary(definition.clone(), &loading_context)?;
            if definition.global {
                factory = factory.with_processor(processor);
            }
            resolver.bind(definition.name.clone(), dictionary);
            dictionary_names.push(definition.name);
        }

        let builder = ActionFactory {
            lookup_actor: &lookup_actor,
            endpoints: &endpoints,
            dictionaries: &dictionary_names,
        };

        let mut test_case = TestCase::new(self.name);
        for (name, value) in self.variables {
            test_case.set_variable(name, value);
        }
        for action in &self.actions {
            test_case.add_action(builder.build(action)?);
        }

        tracing::info!(
            "Loaded test case '{}' with {} actions, {} endpoints",
            test_case.name(),
            test_case.actions().len(),
            endpoints.len()
        );

        Ok(LoadedTestCase {
            test_case,
            factory: factory.with_reference_resolver(Arc::new(resolver)),
            endpoints,
        })
    }
}

fn build_dictionary(
    definition: DictionaryDefinition,
    context: &TestContext,
) -> Result<(Arc<dyn DataDictionary>, Arc<dyn MessageProcessor>)> {
    match definition.kind {
        DictionaryKind::Simple => {
            let mut dictionary =
                SimpleMappingDictionary::new(definition.name).with_direction(definition.direction);
            if definition.global {
                dictionary = dictionary.global();
            }
            for (key, value) in definition.mappings {
                dictionary = dictionary.with_mapping(key, value);
            }
            if let Some(path) = &definition.mappings_resource {
                dictionary = dictionary.with_mappings_resource(path, context)?;
            }
            let dictionary = Arc::new(dictionary);
            let processor: Arc<dyn MessageProcessor> = dictionary.clone();
            let dictionary: Arc<dyn DataDictionary> = dictionary;
            Ok((dictionary, processor))
        }
        DictionaryKind::JsonPath => {
            let mut dictionary = JsonPathMappingDictionary::new(definition.name)
                .with_direction(definition.direction)
                .with_strategy(definition.strategy);
            if definition.global {
                dictionary = dictionary.global();
            }
            for (path, value) in definition.mappings {
                dictionary = dictionary.with_mapping(path, value);
            }
            if let Some(path) = &definition.mappings_resource {
                dictionary = dictionary.with_mappings_resource(path, context)?;
            }
            let dictionary = Arc::new(dictionary);
            let processor: Arc<dyn MessageProcessor> = dictionary.clone();
            let dictionary: Arc<dyn DataDictionary> = dictionary;
            Ok((dictionary, processor))
        }
    }
}

impl MessageDefinition {
    fn to_spec(&self) -> MessageSpec {
        let payload = match (&self.payload, &self.payload_resource) {
            (Some(payload), _) => Some(TemplateSource::data(payload.clone())),
            (None, Some(path)) => Some(match &self.charset {
                Some(charset) => TemplateSource::resource_with_charset(path.clone(), charset.clone()),
                None => TemplateSource::resource(path.clone()),
            }),
            (None, None) => None,
        };
        let script = match (&self.script, &self.script_resource) {
            (Some(script), _) => Some(TemplateSource::data(script.clone())),
            (None, Some(path)) => Some(TemplateSource::resource(path.clone())),
            (None, None) => None,
        };

        let mut header_data: Vec<TemplateSource> = self
            .header_data
            .iter()
            .map(|data| TemplateSource::data(data.clone()))
            .collect();
        if let Some(path) = &self.header_resource {
            header_data.push(TemplateSource::resource(path.clone()));
        }

        MessageSpec {
            explicit: None,
            name: self.name.clone(),
            payload,
            script,
            message: None,
            headers: self.headers.clone(),
            header_data,
        }
    }
}

struct ActionFactory<'a, F>
where
    F: Fn(&Option<String>) -> Result<Option<TestActor>>,
{
    lookup_actor: &'a F,
    endpoints: &'a IndexMap<String, Arc<ChannelEndpoint>>,
    dictionaries: &'a [String],
}

impl<F> ActionFactory<'_, F>
where
    F: Fn(&Option<String>) -> Result<Option<TestActor>>,
{
    fn check_endpoint(&self, name: &str) -> Result<()> {
        if self.endpoints.contains_key(name) {
            Ok(())
        } else {
            Err(CourierError::Config(format!("unknown endpoint '{}'", name)))
        }
    }

    fn check_dictionary(&self, name: &Option<String>) -> Result<()> {
        match name {
            Some(name) if !self.dictionaries.contains(name) => {
                Err(CourierError::Config(format!("unknown dictionary '{}'", name)))
            }
            _ => Ok(()),
        }
    }

    fn build(&self, definition: &ActionDefinition) -> Result<Box<dyn TestAction>> {
        let action: Box<dyn TestAction> = match definition {
            ActionDefinition::Echo { message } => Box::new(EchoAction::new(message.clone())),
            ActionDefinition::Fail { message } => Box::new(FailAction::new(message.clone())),
            ActionDefinition::Sleep { milliseconds } => Box::new(SleepAction::millis(*milliseconds)),
            ActionDefinition::CreateVariables { variables } => {
                Box::new(CreateVariablesAction::with_variables(variables.clone()))
            }
            ActionDefinition::Send(send) => Box::new(self.build_send(send)?),
            ActionDefinition::Receive(receive) => Box::new(self.build_receive(receive)?),
            ActionDefinition::Sequence { name, actor, actions } => {
                let mut sequence = Sequence::new(name.clone().unwrap_or_else(|| "sequence".to_string()));
                if let Some(actor) = (self.lookup_actor)(actor)? {
                    sequence = sequence.with_actor(actor);
                }
                for child in actions {
                    sequence.add(self.build(child)?);
                }
                Box::new(sequence)
            }
            ActionDefinition::Conditional { name, actor, when, actions } => {
                let mut conditional = Conditional::new(when.clone());
                if let Some(name) = name {
                    conditional = conditional.with_name(name.clone());
                }
                if let Some(actor) = (self.lookup_actor)(actor)? {
                    conditional = conditional.with_actor(actor);
                }
                for child in actions {
                    conditional.add(self.build(child)?);
                }
                Box::new(conditional)
            }
        };
        Ok(action)
    }

    fn build_send(&self, definition: &SendDefinition) -> Result<SendMessageAction> {
        self.check_endpoint(&definition.endpoint)?;
        self.check_dictionary(&definition.dictionary)?;

        let mut builder = SendMessageAction::builder()
            .endpoint_name(definition.endpoint.clone())
            .message_spec(definition.message.to_spec());
        if let Some(name) = &definition.name {
            builder = builder.name(name.clone());
        }
        if let Some(actor) = (self.lookup_actor)(&definition.actor)? {
            builder = builder.actor(actor);
        }
        if let Some(message_type) = definition.message.message_type {
            builder = builder.message_type(message_type);
        }
        if let Some(dictionary) = &definition.dictionary {
            builder = builder.dictionary_name(dictionary.clone());
        }
        if !definition.extract.headers.is_empty() {
            builder = builder.process(
                MessageHeaderVariableExtractor::new().with_mappings(definition.extract.headers.clone()),
            );
        }
        if !definition.extract.json.is_empty() {
            builder = builder
                .process(JsonPathVariableExtractor::new().with_mappings(definition.extract.json.clone()));
        }
        builder.build()
    }

    fn build_receive(&self, definition: &ReceiveDefinition) -> Result<ReceiveMessageAction> {
        self.check_endpoint(&definition.endpoint)?;
        self.check_dictionary(&definition.dictionary)?;

        let mut builder = ReceiveMessageAction::builder()
            .endpoint_name(definition.endpoint.clone())
            .message_spec(definition.message.to_spec());
        if let Some(name) = &definition.name {
            builder = builder.name(name.clone());
        }
        if let Some(actor) = (self.lookup_actor)(&definition.actor)? {
            builder = builder.actor(actor);
        }
        if let Some(message_type) = definition.message.message_type {
            builder = builder.message_type(message_type);
        }
        if let Some(timeout) = definition.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout));
        }
        if let Some(dictionary) = &definition.dictionary {
            builder = builder.dictionary_name(dictionary.clone());
        }
        if !definition.extract.headers.is_empty() {
            builder = builder.process(
                MessageHeaderVariableExtractor::new().with_mappings(definition.extract.headers.clone()),
            );
        }
        if !definition.extract.json.is_empty() {
            builder = builder
                .process(JsonPathVariableExtractor::new().with_mappings(definition.extract.json.clone()));
        }
        builder.build()
    }
}

/// A test case ready to run, with the collaborators it was declared with.
pub struct LoadedTestCase {
    pub test_case: TestCase,
    pub factory: TestContextFactory,
    /// Declared endpoints, by name
    pub endpoints: IndexMap<String, Arc<ChannelEndpoint>>,
}

impl LoadedTestCase {
    pub fn name(&self) -> &str {
        self.test_case.name()
    }

    /// Override (or add) a declared variable before running.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.test_case.set_variable(name, value);
    }

    pub fn endpoint(&self, name: &str) -> Option<&Arc<ChannelEndpoint>> {
        self.endpoints.get(name)
    }

    /// Run the test case in a fresh context.
    ///
    /// # Returns
    /// The context after the run and the outcome of the case
    pub fn run(&mut self) -> (TestContext, Result<()>) {
        let mut context = self.factory.create_context();
        let outcome = self.test_case.run(&mut context);
        (context, outcome)
    }
}
