//! Scripted message builder.
//!
//! The scripting language itself is not part of this crate. A [`ScriptEngine`]
//! is injected into the context and receives the resolved script text along
//! with a [`MarkupBuilder`] it can use to produce XML payloads.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{CourierError, Result};
use crate::message::builder::{resolve_header_data, resolve_headers, TemplateSource};
use crate::message::{Message, Payload};
use crate::runtime::TestContext;

/// Executes a script body and returns the rendered payload text.
pub trait ScriptEngine: Send + Sync {
    fn render(&self, script: &str, builder: &mut MarkupBuilder) -> std::result::Result<String, String>;
}

impl<F> ScriptEngine for F
where
    F: Fn(&str, &mut MarkupBuilder) -> std::result::Result<String, String> + Send + Sync,
{
    fn render(&self, script: &str, builder: &mut MarkupBuilder) -> std::result::Result<String, String> {
        self(script, builder)
    }
}

/// Streaming XML writer exposed to scripts.
///
/// Nested elements are indented by two spaces; elements holding only text
/// stay on one line.
#[derive(Debug, Default)]
pub struct MarkupBuilder {
    output: String,
    open: Vec<(String, bool)>,
}

impl MarkupBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> &mut Self {
        self.new_line();
        self.output.push('<');
        self.output.push_str(name);
        for (key, value) in attributes {
            self.output.push_str(&format!(" {}=\"{}\"", key, escape(value)));
        }
        self.output.push('>');
        self.open.push((name.to_string(), false));
        self
    }

    pub fn text(&mut self, text: &str) -> &mut Self {
        self.output.push_str(&escape(text));
        self
    }

    /// Close the innermost open element.
    pub fn end_element(&mut self) -> std::result::Result<&mut Self, String> {
        let (name, has_children) = self
            .open
            .pop()
            .ok_or_else(|| "end_element called without an open element".to_string())?;
        if has_children {
            self.output.push('\n');
            self.indent(self.open.len());
        }
        self.output.push_str(&format!("</{}>", name));
        Ok(self)
    }

    /// Write `<name>text</name>`.
    pub fn element(&mut self, name: &str, text: &str) -> &mut Self {
        self.new_line();
        self.output.push_str(&format!("<{}>{}</{}>", name, escape(text), name));
        self
    }

    /// Finish the document; fails if elements are still open.
    pub fn finish(self) -> std::result::Result<String, String> {
        match self.open.last() {
            Some((name, _)) => Err(format!("element '{}' was never closed", name)),
            None => Ok(self.output),
        }
    }

    /// Start a line for a child of the innermost open element.
    fn new_line(&mut self) {
        if let Some((_, has_children)) = self.open.last_mut() {
            *has_children = true;
        }
        if !self.output.is_empty() {
            self.output.push('\n');
        }
        self.indent(self.open.len());
    }

    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.output.push_str("  ");
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Builds the payload by running a script through the context's engine.
#[derive(Debug, Clone)]
pub struct ScriptMessageBuilder {
    pub name: Option<String>,
    pub script: TemplateSource,
    pub headers: IndexMap<String, Value>,
    pub header_data: Vec<TemplateSource>,
}

impl ScriptMessageBuilder {
    pub fn new(script: TemplateSource) -> Self {
        Self {
            name: None,
            script,
            headers: IndexMap::new(),
            header_data: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn build(&self, context: &TestContext) -> Result<Message> {
        let engine = context
            .script_engine()
            .ok_or_else(|| CourierError::Script("no script engine is configured".to_string()))?;

        let script = self.script.resolve(context)?;
        let mut markup = MarkupBuilder::new();
        let payload = engine.render(&script, &mut markup).map_err(CourierError::Script)?;

        let mut message = Message::new(Payload::from(payload));
        message.name = self.name.clone();
        message.headers = resolve_headers(&self.headers, context)?;
        message.header_data = resolve_header_data(&self.header_data, context)?;
        Ok(message)
    }
}
