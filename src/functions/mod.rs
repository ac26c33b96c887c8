//! Function registry for calling named functions from templates.
//!
//! Functions are grouped in libraries that share a prefix (for example
//! `courier:`). A template placeholder such as
//! `${courier:concat('Hello ', ${name})}` is detected as a function call when
//! its prefix belongs to a registered library.

pub mod default_library;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use regex::Regex;

use crate::error::{CourierError, Result};
use crate::runtime::TestContext;

pub use default_library::{default_function_library, DEFAULT_PREFIX};

/// Trait for template functions.
///
/// Arguments arrive already resolved against the test context; the returned
/// text is inserted into the template verbatim.
pub trait Function: Send + Sync {
    fn execute(&self, args: &[String], context: &TestContext) -> Result<String>;
}

/// Simple closure-based implementation of Function
impl<F> Function for F
where
    F: Fn(&[String], &TestContext) -> Result<String> + Send + Sync,
{
    fn execute(&self, args: &[String], context: &TestContext) -> Result<String> {
        self(args, context)
    }
}

/// A parsed `prefix:name(args)` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub prefix: String,
    pub name: String,
    /// Raw arguments with surrounding quotes removed, not yet resolved.
    pub args: Vec<String>,
}

impl FunctionCall {
    /// Parse a function call expression.
    ///
    /// Returns `None` when the expression does not have the
    /// `prefix:name(args)` shape.
    pub fn parse(expression: &str) -> Option<Self> {
        static CALL: OnceLock<Regex> = OnceLock::new();
        let re = CALL.get_or_init(|| {
            Regex::new(r"(?s)^([A-Za-z_][\w.\-]*:)([A-Za-z_]\w*)\((.*)\)$")
                .expect("function call pattern is valid")
        });

        let caps = re.captures(expression.trim())?;
        Some(Self {
            prefix: caps[1].to_string(),
            name: caps[2].to_string(),
            args: split_arguments(&caps[3]),
        })
    }

    /// Fully qualified function name, e.g. `courier:concat`.
    pub fn qualified_name(&self) -> String {
        format!("{}{}", self.prefix, self.name)
    }
}

/// Split a raw argument list on top-level commas.
///
/// Commas inside single quotes, parentheses or placeholders do not split.
/// Surrounding single quotes are removed from each argument.
pub fn split_arguments(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut depth = 0i32;

    for c in raw.chars() {
        match c {
            '\'' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '(' | '{' if !in_quotes => {
                depth += 1;
                current.push(c);
            }
            ')' | '}' if !in_quotes => {
                depth -= 1;
                current.push(c);
            }
            ',' if !in_quotes && depth == 0 => {
                args.push(unquote(current.trim()));
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if !current.trim().is_empty() || !args.is_empty() {
        args.push(unquote(current.trim()));
    }

    args
}

fn unquote(arg: &str) -> String {
    if arg.len() >= 2 && arg.starts_with('\'') && arg.ends_with('\'') {
        arg[1..arg.len() - 1].to_string()
    } else {
        arg.to_string()
    }
}

/// Named group of functions sharing one prefix.
pub struct FunctionLibrary {
    name: String,
    prefix: String,
    functions: HashMap<String, Arc<dyn Function>>,
}

impl FunctionLibrary {
    /// Create an empty library. The prefix should end with `:`.
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            functions: HashMap::new(),
        }
    }

    /// Register a function under `name` (case-sensitive).
    pub fn register(&mut self, name: impl Into<String>, function: impl Function + 'static) {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn with_function(mut self, name: impl Into<String>, function: impl Function + 'static) -> Self {
        self.register(name, function);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.functions.get(name)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Get list of all registered function names
    pub fn function_names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }
}

impl std::fmt::Debug for FunctionLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionLibrary")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("functions", &self.functions.len())
            .finish()
    }
}

/// Ordered set of function libraries.
///
/// Lookup walks libraries in registration order, so the first registered
/// library wins on name collisions. [`FunctionRegistry::override_library`]
/// puts a library in front of all others.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    libraries: Vec<Arc<FunctionLibrary>>,
}

impl FunctionRegistry {
    /// Create a new empty function registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the default `courier:` library.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.add_library(default_function_library());
        registry
    }

    pub fn add_library(&mut self, library: FunctionLibrary) {
        self.libraries.push(Arc::new(library));
    }

    /// Register a library that takes precedence over all existing ones.
    pub fn override_library(&mut self, library: FunctionLibrary) {
        self.libraries.insert(0, Arc::new(library));
    }

    pub fn libraries(&self) -> &[Arc<FunctionLibrary>] {
        &self.libraries
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.libraries.iter().any(|lib| lib.prefix() == prefix)
    }

    /// Parse `expression` as a call into one of the registered libraries.
    pub fn parse_call(&self, expression: &str) -> Option<FunctionCall> {
        FunctionCall::parse(expression).filter(|call| self.has_prefix(&call.prefix))
    }

    /// Look up a function by prefix and name.
    ///
    /// # Errors
    /// Returns `UnknownFunction` if no library with that prefix has the function.
    pub fn lookup(&self, prefix: &str, name: &str) -> Result<Arc<dyn Function>> {
        self.libraries
            .iter()
            .filter(|lib| lib.prefix() == prefix)
            .find_map(|lib| lib.get(name).cloned())
            .ok_or_else(|| CourierError::UnknownFunction(format!("{}{}", prefix, name)))
    }

    /// Invoke a parsed call, resolving every argument through the context first.
    ///
    /// An argument that is itself a call (`courier:upperCase(courier:concat('a', 'b'))`)
    /// is evaluated; any other argument goes through placeholder resolution.
    pub fn invoke(&self, call: &FunctionCall, context: &TestContext) -> Result<String> {
        let function = self.lookup(&call.prefix, &call.name)?;

        let args = call
            .args
            .iter()
            .map(|arg| match self.parse_call(arg) {
                Some(nested) => self.invoke(&nested, context),
                None => context.resolve(arg),
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::trace!("Calling function {} with {} arguments", call.qualified_name(), args.len());
        function.execute(&args, context)
    }
}
