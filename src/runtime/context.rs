//! Runtime context of a single test case execution.
//!
//! The context owns the variable store, the function and validation-matcher
//! registries, the ordered message processor chain, the reference resolver
//! and the collaborators used while building messages (resource loader and
//! optional script engine). A fresh context is created for every test case.

use std::fmt;
use std::sync::Arc;
use serde_json::Value;

use crate::error::Result;
use crate::functions::FunctionRegistry;
use crate::message::{MessageProcessor, MessageProcessors, MessageStore, ScriptEngine};
use crate::reference::{ReferenceResolver, SimpleReferenceResolver};
use crate::resource::{FileResourceLoader, ResourceLoader};
use crate::runtime::variables::{split_template, TemplateSegment, VariableStore};
use crate::validation::ValidationMatcherRegistry;

/// Mutable state shared by every action of one running test case.
pub struct TestContext {
    variables: VariableStore,
    functions: FunctionRegistry,
    validation_matchers: ValidationMatcherRegistry,
    message_processors: MessageProcessors,
    reference_resolver: Arc<dyn ReferenceResolver>,
    resource_loader: Arc<dyn ResourceLoader>,
    script_engine: Option<Arc<dyn ScriptEngine>>,
    messages: MessageStore,
}

impl TestContext {
    /// Create a context with the default function and matcher libraries.
    ///
    /// # Example
    /// ```
    /// use courier::runtime::TestContext;
    ///
    /// let mut context = TestContext::new();
    /// context.set_variable("text", "Hello World!");
    /// assert_eq!(context.resolve("<M>${text}</M>").unwrap(), "<M>Hello World!</M>");
    /// ```
    pub fn new() -> Self {
        Self {
            variables: VariableStore::new(),
            functions: FunctionRegistry::with_defaults(),
            validation_matchers: ValidationMatcherRegistry::with_defaults(),
            message_processors: MessageProcessors::new(),
            reference_resolver: Arc::new(SimpleReferenceResolver::new()),
            resource_loader: Arc::new(FileResourceLoader::new()),
            script_engine: None,
            messages: MessageStore::default(),
        }
    }

    /// Resolve every `${...}` placeholder in `template`.
    ///
    /// Placeholders whose body is a call into a registered function library
    /// are evaluated as functions; all others are variable lookups. Substituted
    /// text is inserted verbatim and never scanned again. Text outside
    /// placeholders is never evaluated, even when it looks like a call.
    ///
    /// # Arguments
    /// * `template` - Text possibly containing placeholders
    ///
    /// # Returns
    /// The resolved text, `UnknownVariable` for unbound names, or
    /// `InvalidExpression` for an unterminated placeholder
    pub fn resolve(&self, template: &str) -> Result<String> {
        let mut resolved = String::with_capacity(template.len());
        for segment in split_template(template)? {
            match segment {
                TemplateSegment::Literal(text) => resolved.push_str(text),
                TemplateSegment::Placeholder(expression) => {
                    match self.functions.parse_call(expression) {
                        Some(call) => resolved.push_str(&self.functions.invoke(&call, self)?),
                        None => resolved.push_str(&self.variables.get_string(expression.trim())?),
                    }
                }
            }
        }
        Ok(resolved)
    }

    /// Resolve a JSON value: strings are templated, everything else is kept as-is.
    pub fn resolve_value(&self, value: &Value) -> Result<Value> {
        match value {
            Value::String(text) => Ok(Value::String(self.resolve(text)?)),
            other => Ok(other.clone()),
        }
    }

    /// Bind a variable, replacing any previous value.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.set(name, value);
    }

    /// Get a variable.
    ///
    /// # Errors
    /// Returns `UnknownVariable` when the name is unbound.
    pub fn get_variable(&self, name: &str) -> Result<&Value> {
        self.variables.get(name)
    }

    /// Get a variable rendered as text.
    pub fn get_variable_string(&self, name: &str) -> Result<String> {
        self.variables.get_string(name)
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.variables
    }

    pub fn function_registry(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn function_registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    pub fn validation_matchers(&self) -> &ValidationMatcherRegistry {
        &self.validation_matchers
    }

    pub fn validation_matchers_mut(&mut self) -> &mut ValidationMatcherRegistry {
        &mut self.validation_matchers
    }

    /// The live, ordered processor chain.
    pub fn message_processors(&self) -> &MessageProcessors {
        &self.message_processors
    }

    pub fn message_processors_mut(&mut self) -> &mut MessageProcessors {
        &mut self.message_processors
    }

    pub fn reference_resolver(&self) -> &dyn ReferenceResolver {
        self.reference_resolver.as_ref()
    }

    pub fn set_reference_resolver(&mut self, resolver: Arc<dyn ReferenceResolver>) {
        self.reference_resolver = resolver;
    }

    pub fn resource_loader(&self) -> &dyn ResourceLoader {
        self.resource_loader.as_ref()
    }

    pub fn set_resource_loader(&mut self, loader: Arc<dyn ResourceLoader>) {
        self.resource_loader = loader;
    }

    pub fn script_engine(&self) -> Option<&Arc<dyn ScriptEngine>> {
        self.script_engine.as_ref()
    }

    pub fn set_script_engine(&mut self, engine: Arc<dyn ScriptEngine>) {
        self.script_engine = Some(engine);
    }

    /// Messages sent or received so far.
    pub fn message_store(&self) -> &MessageStore {
        &self.messages
    }

    pub fn message_store_mut(&mut self) -> &mut MessageStore {
        &mut self.messages
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("variables", &self.variables)
            .field("functions", &self.functions)
            .field("message_processors", &self.message_processors)
            .field("references", &self.reference_resolver.names())
            .field("script_engine", &self.script_engine.is_some())
            .field("messages", &self.messages.len())
            .finish()
    }
}

/// Produces fresh contexts sharing registries and collaborators.
///
/// Global processors registered here are copied into every context, so a
/// globally scoped dictionary only needs to be registered once.
#[derive(Clone)]
pub struct TestContextFactory {
    functions: FunctionRegistry,
    validation_matchers: ValidationMatcherRegistry,
    message_processors: MessageProcessors,
    reference_resolver: Arc<dyn ReferenceResolver>,
    resource_loader: Arc<dyn ResourceLoader>,
    script_engine: Option<Arc<dyn ScriptEngine>>,
}

impl TestContextFactory {
    pub fn new() -> Self {
        Self {
            functions: FunctionRegistry::with_defaults(),
            validation_matchers: ValidationMatcherRegistry::with_defaults(),
            message_processors: MessageProcessors::new(),
            reference_resolver: Arc::new(SimpleReferenceResolver::new()),
            resource_loader: Arc::new(FileResourceLoader::new()),
            script_engine: None,
        }
    }

    /// Factory reading resources relative to the configured resource directory.
    pub fn from_config(config: &crate::config::CourierConfig) -> Self {
        let loader = match &config.resource_dir {
            Some(dir) => FileResourceLoader::with_base_dir(dir),
            None => FileResourceLoader::new(),
        };
        Self::new().with_resource_loader(Arc::new(loader))
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_validation_matchers(mut self, matchers: ValidationMatcherRegistry) -> Self {
        self.validation_matchers = matchers;
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn MessageProcessor>) -> Self {
        self.message_processors.add(processor);
        self
    }

    pub fn with_reference_resolver(mut self, resolver: Arc<dyn ReferenceResolver>) -> Self {
        self.reference_resolver = resolver;
        self
    }

    pub fn with_resource_loader(mut self, loader: Arc<dyn ResourceLoader>) -> Self {
        self.resource_loader = loader;
        self
    }

    pub fn with_script_engine(mut self, engine: Arc<dyn ScriptEngine>) -> Self {
        self.script_engine = Some(engine);
        self
    }

    /// Create a context with an empty variable store.
    pub fn create_context(&self) -> TestContext {
        TestContext {
            variables: VariableStore::new(),
            functions: self.functions.clone(),
            validation_matchers: self.validation_matchers.clone(),
            message_processors: self.message_processors.clone(),
            reference_resolver: Arc::clone(&self.reference_resolver),
            resource_loader: Arc::clone(&self.resource_loader),
            script_engine: self.script_engine.clone(),
            messages: MessageStore::default(),
        }
    }
}

impl Default for TestContextFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CourierError;
    use crate::functions::FunctionLibrary;
    use crate::message::Message;
    use serde_json::json;

    #[test]
    fn test_resolve_variables() {
        let mut context = TestContext::new();
        context.set_variable("text", "Hello World!");
        context.set_variable("count", 2);

        assert_eq!(
            context.resolve("<Req><M>${text}</M><C>${count}</C></Req>").unwrap(),
            "<Req><M>Hello World!</M><C>2</C></Req>"
        );
    }

    #[test]
    fn test_resolve_unknown_variable() {
        let context = TestContext::new();
        let err = context.resolve("Hello ${myText}").unwrap_err();
        assert_eq!(err.to_string(), "Unknown variable 'myText'");
    }

    #[test]
    fn test_resolve_is_single_pass() {
        let mut context = TestContext::new();
        context.set_variable("a", "${b}");
        assert_eq!(context.resolve("${a}").unwrap(), "${b}");
    }

    #[test]
    fn test_resolve_function_with_nested_placeholder() {
        let mut context = TestContext::new();
        context.set_variable("name", "World");
        assert_eq!(
            context.resolve("${courier:concat('Hello ', ${name})}!").unwrap(),
            "Hello World!"
        );
    }

    #[test]
    fn test_unregistered_prefix_is_a_variable_name() {
        let mut context = TestContext::new();
        context.set_variable("other:value", "plain");
        assert_eq!(context.resolve("${other:value}").unwrap(), "plain");
        assert!(matches!(
            context.resolve("${other:f()}"),
            Err(CourierError::UnknownVariable(name)) if name == "other:f()"
        ));
    }

    #[test]
    fn test_resolve_value_keeps_non_strings() {
        let mut context = TestContext::new();
        context.set_variable("x", "1");
        assert_eq!(context.resolve_value(&json!("${x}")).unwrap(), json!("1"));
        assert_eq!(context.resolve_value(&json!(5)).unwrap(), json!(5));
    }

    #[test]
    fn test_get_variable_missing() {
        let context = TestContext::new();
        assert!(matches!(
            context.get_variable("nope"),
            Err(CourierError::UnknownVariable(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_custom_function_library() {
        let mut context = TestContext::new();
        context.function_registry_mut().add_library(
            FunctionLibrary::new("custom", "my:")
                .with_function("shout", |args: &[String], _: &TestContext| -> Result<String> {
                    Ok(format!("{}!", args.join(" ").to_uppercase()))
                }),
        );
        context.set_variable("who", "world");
        assert_eq!(context.resolve("${my:shout('hello', ${who})}").unwrap(), "HELLO WORLD!");
    }

    #[test]
    fn test_factory_creates_independent_contexts() {
        let factory = TestContextFactory::new().with_processor(Arc::new(
            |_: &mut Message, _: &mut TestContext| -> Result<()> { Ok(()) },
        ));

        let mut first = factory.create_context();
        first.set_variable("a", 1);
        let second = factory.create_context();

        assert!(second.get_variable("a").is_err());
        assert_eq!(first.message_processors().len(), 1);
        assert_eq!(second.message_processors().len(), 1);
    }
}
