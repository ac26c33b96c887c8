//! Error taxonomy shared by every stage of the engine.
//!
//! All fallible operations return [`Result`]. Failures raised inside a test
//! action are wrapped exactly once per container level in
//! [`CourierError::Execution`], so the original cause stays reachable through
//! [`CourierError::root_cause`].

use std::time::Duration;

/// Failure while decoding resource bytes into text.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported charset '{0}'")]
    UnsupportedCharset(String),

    #[error("malformed {charset} input at byte {offset}")]
    Malformed { charset: &'static str, offset: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum CourierError {
    /// A template references a variable that is not bound in the context.
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    /// Resource content could not be decoded with its declared or detected charset.
    #[error("Unable to decode content with charset '{charset}'")]
    Encoding {
        charset: String,
        #[source]
        source: DecodeError,
    },

    /// Any failure inside an action pipeline, tagged with the failing action.
    #[error("Action '{action}' failed: {source}")]
    Execution {
        action: String,
        #[source]
        source: Box<CourierError>,
    },

    #[error("Data dictionary '{dictionary}' failed: {reason}")]
    Dictionary { dictionary: String, reason: String },

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Invalid arguments for function '{function}': {reason}")]
    InvalidFunctionArgs { function: String, reason: String },

    #[error("Unknown validation matcher '{0}'")]
    UnknownValidationMatcher(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unable to resolve reference '{name}' as {type_name}")]
    ReferenceNotFound {
        name: String,
        type_name: &'static str,
    },

    #[error("Failed to load resource '{path}'")]
    Resource {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Script execution failed: {0}")]
    Script(String),

    #[error("Endpoint '{endpoint}' failed: {reason}")]
    Endpoint { endpoint: String, reason: String },

    #[error("Timed out after {timeout:?} waiting for a message on endpoint '{endpoint}'")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("Message processing failed: {0}")]
    Processing(String),

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Raised when a runner is asked to continue after its test case failed.
    #[error("Test case '{0}' already failed, no further actions are executed")]
    Aborted(String),
}

pub type Result<T> = std::result::Result<T, CourierError>;

impl CourierError {
    /// Wrap a failure raised while executing `action`.
    pub fn execution(action: impl Into<String>, source: CourierError) -> Self {
        CourierError::Execution {
            action: action.into(),
            source: Box::new(source),
        }
    }

    pub fn dictionary(dictionary: impl Into<String>, reason: impl Into<String>) -> Self {
        CourierError::Dictionary {
            dictionary: dictionary.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_args(function: impl Into<String>, reason: impl Into<String>) -> Self {
        CourierError::InvalidFunctionArgs {
            function: function.into(),
            reason: reason.into(),
        }
    }

    /// The original failure underneath all `Execution` wrappers.
    pub fn root_cause(&self) -> &CourierError {
        let mut current = self;
        while let CourierError::Execution { source, .. } = current {
            current = source;
        }
        current
    }

    /// Name of the innermost action that failed, if the error came from an action.
    pub fn failed_action(&self) -> Option<&str> {
        let mut action = None;
        let mut current = self;
        while let CourierError::Execution { action: name, source } = current {
            action = Some(name.as_str());
            current = source;
        }
        action
    }

    /// Number of `Execution` wrappers around the root cause.
    pub fn wrap_depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self;
        while let CourierError::Execution { source, .. } = current {
            depth += 1;
            current = source;
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_variable_message() {
        let err = CourierError::UnknownVariable("myText".to_string());
        assert_eq!(err.to_string(), "Unknown variable 'myText'");
    }

    #[test]
    fn test_root_cause_and_failed_action() {
        let inner = CourierError::UnknownVariable("op".to_string());
        let err = CourierError::execution("outer", CourierError::execution("send", inner));

        assert!(matches!(err.root_cause(), CourierError::UnknownVariable(name) if name == "op"));
        assert_eq!(err.failed_action(), Some("send"));
        assert_eq!(err.wrap_depth(), 2);
    }

    #[test]
    fn test_plain_error_has_no_action() {
        let err = CourierError::Validation("boom".to_string());
        assert_eq!(err.failed_action(), None);
        assert_eq!(err.wrap_depth(), 0);
    }
}
