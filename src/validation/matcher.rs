//! Validation matchers usable inside expected values.
//!
//! An expected value of the form `@name(args)@` is not compared literally but
//! handed to the named matcher, e.g. `@startsWith('Hello')@` or `@ignore@`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use regex::Regex;
use uuid::Uuid;

use crate::error::{CourierError, Result};
use crate::functions::split_arguments;
use crate::runtime::TestContext;

/// Delimiter around matcher expressions.
pub const MATCHER_DELIMITER: char = '@';

/// Predicate validating a received value against control arguments.
pub trait ValidationMatcher: Send + Sync {
    fn validate(&self, field: &str, value: &str, control: &[String], context: &TestContext) -> Result<()>;
}

impl<F> ValidationMatcher for F
where
    F: Fn(&str, &str, &[String], &TestContext) -> Result<()> + Send + Sync,
{
    fn validate(&self, field: &str, value: &str, control: &[String], context: &TestContext) -> Result<()> {
        self(field, value, control, context)
    }
}

/// Parsed `@prefix:name(args)@` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherCall {
    pub prefix: String,
    pub name: String,
    pub args: Vec<String>,
}

impl MatcherCall {
    pub fn parse(expression: &str) -> Result<Self> {
        static MATCHER: OnceLock<Regex> = OnceLock::new();
        let re = MATCHER.get_or_init(|| {
            Regex::new(r"(?s)^([A-Za-z_][\w.\-]*:)?([A-Za-z_]\w*)(?:\((.*)\))?$")
                .expect("matcher pattern is valid")
        });

        let inner = strip_delimiters(expression).ok_or_else(|| {
            CourierError::InvalidExpression(format!("'{}' is not a matcher expression", expression))
        })?;

        let caps = re.captures(inner.trim()).ok_or_else(|| {
            CourierError::InvalidExpression(format!("malformed matcher expression '{}'", expression))
        })?;

        Ok(Self {
            prefix: caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
            name: caps[2].to_string(),
            args: caps.get(3).map(|m| split_arguments(m.as_str())).unwrap_or_default(),
        })
    }
}

fn strip_delimiters(expression: &str) -> Option<&str> {
    let trimmed = expression.trim();
    if trimmed.len() >= 2
        && trimmed.starts_with(MATCHER_DELIMITER)
        && trimmed.ends_with(MATCHER_DELIMITER)
    {
        Some(&trimmed[1..trimmed.len() - 1])
    } else {
        None
    }
}

/// Named group of matchers sharing one prefix (empty for the default library).
pub struct ValidationMatcherLibrary {
    name: String,
    prefix: String,
    matchers: HashMap<String, Arc<dyn ValidationMatcher>>,
}

impl ValidationMatcherLibrary {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            matchers: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, matcher: impl ValidationMatcher + 'static) {
        self.matchers.insert(name.into(), Arc::new(matcher));
    }

    pub fn with_matcher(mut self, name: impl Into<String>, matcher: impl ValidationMatcher + 'static) -> Self {
        self.register(name, matcher);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ValidationMatcher>> {
        self.matchers.get(name)
    }
}

impl std::fmt::Debug for ValidationMatcherLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationMatcherLibrary")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("matchers", &self.matchers.len())
            .finish()
    }
}

/// Ordered set of matcher libraries; first registered wins on collisions.
#[derive(Debug, Clone, Default)]
pub struct ValidationMatcherRegistry {
    libraries: Vec<Arc<ValidationMatcherLibrary>>,
}

impl ValidationMatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.add_library(default_matcher_library());
        registry
    }

    pub fn add_library(&mut self, library: ValidationMatcherLibrary) {
        self.libraries.push(Arc::new(library));
    }

    /// Check whether an expected value is a matcher expression.
    pub fn is_matcher_expression(expression: &str) -> bool {
        strip_delimiters(expression).is_some()
    }

    pub fn lookup(&self, prefix: &str, name: &str) -> Result<Arc<dyn ValidationMatcher>> {
        self.libraries
            .iter()
            .filter(|lib| lib.prefix() == prefix)
            .find_map(|lib| lib.get(name).cloned())
            .ok_or_else(|| CourierError::UnknownValidationMatcher(format!("{}{}", prefix, name)))
    }

    /// Validate `value` of `field` against a matcher expression.
    ///
    /// Control arguments are resolved through the context before the matcher runs.
    pub fn validate(&self, field: &str, value: &str, expression: &str, context: &TestContext) -> Result<()> {
        let call = MatcherCall::parse(expression)?;
        let matcher = self.lookup(&call.prefix, &call.name)?;

        let control = call
            .args
            .iter()
            .map(|arg| context.resolve(arg))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("Validating '{}' with matcher {}{}", field, call.prefix, call.name);
        matcher.validate(field, value, &control, context)
    }
}

fn single_arg<'a>(matcher: &str, control: &'a [String]) -> Result<&'a str> {
    match control {
        [arg] => Ok(arg.as_str()),
        _ => Err(CourierError::InvalidExpression(format!(
            "matcher '{}' expects exactly one argument, got {}",
            matcher,
            control.len()
        ))),
    }
}

fn check(condition: bool, field: &str, value: &str, expectation: String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(CourierError::Validation(format!(
            "'{}' value '{}' {}",
            field, value, expectation
        )))
    }
}

fn parse_f64(matcher: &str, text: &str) -> Result<f64> {
    text.trim().parse::<f64>().map_err(|_| {
        CourierError::Validation(format!("{}: '{}' is not a number", matcher, text))
    })
}

/// Default matcher library with an empty prefix.
pub fn default_matcher_library() -> ValidationMatcherLibrary {
    ValidationMatcherLibrary::new("courier-matchers", "")
        .with_matcher("ignore", |_: &str, _: &str, _: &[String], _: &TestContext| -> Result<()> { Ok(()) })
        .with_matcher("equalsIgnoreCase", |field: &str, value: &str, control: &[String], _: &TestContext| {
            let expected = single_arg("equalsIgnoreCase", control)?;
            check(
                value.to_lowercase() == expected.to_lowercase(),
                field,
                value,
                format!("does not equal '{}' ignoring case", expected),
            )
        })
        .with_matcher("contains", |field: &str, value: &str, control: &[String], _: &TestContext| {
            let expected = single_arg("contains", control)?;
            check(value.contains(expected), field, value, format!("does not contain '{}'", expected))
        })
        .with_matcher("containsIgnoreCase", |field: &str, value: &str, control: &[String], _: &TestContext| {
            let expected = single_arg("containsIgnoreCase", control)?;
            check(
                value.to_lowercase().contains(&expected.to_lowercase()),
                field,
                value,
                format!("does not contain '{}' ignoring case", expected),
            )
        })
        .with_matcher("startsWith", |field: &str, value: &str, control: &[String], _: &TestContext| {
            let expected = single_arg("startsWith", control)?;
            check(value.starts_with(expected), field, value, format!("does not start with '{}'", expected))
        })
        .with_matcher("endsWith", |field: &str, value: &str, control: &[String], _: &TestContext| {
            let expected = single_arg("endsWith", control)?;
            check(value.ends_with(expected), field, value, format!("does not end with '{}'", expected))
        })
        .with_matcher("matches", |field: &str, value: &str, control: &[String], _: &TestContext| {
            let pattern = single_arg("matches", control)?;
            let re = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                CourierError::InvalidExpression(format!("invalid pattern '{}': {}", pattern, e))
            })?;
            check(re.is_match(value), field, value, format!("does not match '{}'", pattern))
        })
        .with_matcher("isNumber", |field: &str, value: &str, _: &[String], _: &TestContext| {
            check(value.trim().parse::<f64>().is_ok(), field, value, "is not a number".to_string())
        })
        .with_matcher("greaterThan", |field: &str, value: &str, control: &[String], _: &TestContext| {
            let limit = parse_f64("greaterThan", single_arg("greaterThan", control)?)?;
            let actual = parse_f64("greaterThan", value)?;
            check(actual > limit, field, value, format!("is not greater than {}", limit))
        })
        .with_matcher("lowerThan", |field: &str, value: &str, control: &[String], _: &TestContext| {
            let limit = parse_f64("lowerThan", single_arg("lowerThan", control)?)?;
            let actual = parse_f64("lowerThan", value)?;
            check(actual < limit, field, value, format!("is not lower than {}", limit))
        })
        .with_matcher("isUUID", |field: &str, value: &str, _: &[String], _: &TestContext| {
            check(Uuid::parse_str(value.trim()).is_ok(), field, value, "is not a UUID".to_string())
        })
        .with_matcher("isEmpty", |field: &str, value: &str, _: &[String], _: &TestContext| {
            check(value.is_empty(), field, value, "is not empty".to_string())
        })
        .with_matcher("notEmpty", |field: &str, value: &str, _: &[String], _: &TestContext| {
            check(!value.is_empty(), field, value, "is empty".to_string())
        })
        .with_matcher("stringLength", |field: &str, value: &str, control: &[String], _: &TestContext| {
            let expected = single_arg("stringLength", control)?;
            let expected: usize = expected.trim().parse().map_err(|_| {
                CourierError::InvalidExpression(format!("stringLength: '{}' is not a length", expected))
            })?;
            check(
                value.chars().count() == expected,
                field,
                value,
                format!("does not have length {}", expected),
            )
        })
}
