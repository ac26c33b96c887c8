//! Validation of received messages against a control message.
//!
//! Control values may be literal or matcher expressions (`@contains('x')@`).
//! JSON payloads are compared structurally; all other payload types are
//! compared as trimmed text.

pub mod matcher;

use serde_json::Value;

use crate::error::{CourierError, Result};
use crate::message::{Message, MessageType};
use crate::runtime::value_to_string;
use crate::runtime::TestContext;

pub use matcher::{
    default_matcher_library, MatcherCall, ValidationMatcher, ValidationMatcherLibrary,
    ValidationMatcherRegistry,
};

/// Validate a received message against a control message.
///
/// # Arguments
/// * `received` - Message delivered by the endpoint
/// * `control` - Expected message; empty payloads are not validated
/// * `message_type` - Selects structural JSON comparison or text comparison
/// * `context` - Provides the validation matchers
///
/// # Returns
/// `Validation` error describing the first mismatch
pub fn validate_message(
    received: &Message,
    control: &Message,
    message_type: &MessageType,
    context: &TestContext,
) -> Result<()> {
    validate_payload(received, control, message_type, context)?;
    validate_headers(received, control, context)?;
    validate_header_data(received, control, context)?;
    tracing::debug!("Message {} validated successfully", received.id);
    Ok(())
}

fn validate_payload(
    received: &Message,
    control: &Message,
    message_type: &MessageType,
    context: &TestContext,
) -> Result<()> {
    if control.payload.is_empty() {
        return Ok(());
    }

    let expected = control.payload_text();
    let actual = received.payload_text();

    if ValidationMatcherRegistry::is_matcher_expression(&expected) {
        return context
            .validation_matchers()
            .validate("payload", &actual, &expected, context);
    }

    match message_type {
        MessageType::Json => {
            let expected = control.payload.to_json().map_err(|e| {
                CourierError::Validation(format!("control payload is not valid JSON: {}", e))
            })?;
            let actual = received.payload.to_json().map_err(|e| {
                CourierError::Validation(format!("received payload is not valid JSON: {}", e))
            })?;
            validate_json("$", &actual, &expected, context)
        }
        _ => {
            if actual.trim() == expected.trim() {
                Ok(())
            } else {
                Err(CourierError::Validation(format!(
                    "payload mismatch, expected '{}' but was '{}'",
                    expected.trim(),
                    actual.trim()
                )))
            }
        }
    }
}

fn validate_json(path: &str, actual: &Value, expected: &Value, context: &TestContext) -> Result<()> {
    match (expected, actual) {
        (Value::String(expected), actual) if ValidationMatcherRegistry::is_matcher_expression(expected) => {
            context
                .validation_matchers()
                .validate(path, &value_to_string(actual), expected, context)
        }
        (Value::Object(expected), Value::Object(actual)) => {
            if let Some(extra) = actual.keys().find(|key| !expected.contains_key(*key)) {
                return Err(CourierError::Validation(format!(
                    "unexpected field '{}.{}' in received payload",
                    path, extra
                )));
            }
            for (key, expected_value) in expected {
                let child = format!("{}.{}", path, key);
                let actual_value = actual.get(key).ok_or_else(|| {
                    CourierError::Validation(format!("missing field '{}' in received payload", child))
                })?;
                validate_json(&child, actual_value, expected_value, context)?;
            }
            Ok(())
        }
        (Value::Array(expected), Value::Array(actual)) => {
            if expected.len() != actual.len() {
                return Err(CourierError::Validation(format!(
                    "array '{}' has {} elements, expected {}",
                    path,
                    actual.len(),
                    expected.len()
                )));
            }
            for (idx, (expected_value, actual_value)) in expected.iter().zip(actual).enumerate() {
                validate_json(&format!("{}[{}]", path, idx), actual_value, expected_value, context)?;
            }
            Ok(())
        }
        (expected, actual) if expected == actual => Ok(()),
        (expected, actual) => Err(CourierError::Validation(format!(
            "value mismatch at '{}', expected {} but was {}",
            path, expected, actual
        ))),
    }
}

fn validate_headers(received: &Message, control: &Message, context: &TestContext) -> Result<()> {
    for (name, expected) in &control.headers {
        let actual = received.header(name).ok_or_else(|| {
            CourierError::Validation(format!("missing header '{}' in received message", name))
        })?;

        match expected {
            Value::String(expression) if ValidationMatcherRegistry::is_matcher_expression(expression) => {
                context
                    .validation_matchers()
                    .validate(name, &value_to_string(&actual), expression, context)?;
            }
            expected if value_to_string(expected) == value_to_string(&actual) => {}
            expected => {
                return Err(CourierError::Validation(format!(
                    "header '{}' mismatch, expected '{}' but was '{}'",
                    name,
                    value_to_string(expected),
                    value_to_string(&actual)
                )))
            }
        }
    }
    Ok(())
}

fn validate_header_data(received: &Message, control: &Message, context: &TestContext) -> Result<()> {
    if control.header_data.len() > received.header_data.len() {
        return Err(CourierError::Validation(format!(
            "expected {} header data blocks but received {}",
            control.header_data.len(),
            received.header_data.len()
        )));
    }

    for (idx, (expected, actual)) in control.header_data.iter().zip(&received.header_data).enumerate() {
        if ValidationMatcherRegistry::is_matcher_expression(expected) {
            context
                .validation_matchers()
                .validate(&format!("header-data[{}]", idx), actual, expected, context)?;
        } else if expected.trim() != actual.trim() {
            return Err(CourierError::Validation(format!(
                "header data block {} mismatch, expected '{}' but was '{}'",
                idx,
                expected.trim(),
                actual.trim()
            )));
        }
    }
    Ok(())
}
