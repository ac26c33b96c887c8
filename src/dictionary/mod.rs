//! Data dictionaries: direction and scope filtered message translation.
//!
//! A dictionary is either attached explicitly to a single action or
//! registered with global scope in the context's processor chain, in which
//! case it runs for every message travelling in a matching direction.

pub mod json_path;
pub mod simple;

use std::sync::Arc;
use indexmap::IndexMap;

use crate::error::{CourierError, Result};
use crate::message::{Message, MessageDirection};
use crate::runtime::TestContext;

pub use json_path::{JsonPathMappingDictionary, PathMappingStrategy};
pub use simple::SimpleMappingDictionary;

pub trait DataDictionary: Send + Sync {
    fn name(&self) -> &str;

    fn direction(&self) -> MessageDirection;

    /// Global dictionaries apply to every message of matching direction.
    fn is_global_scope(&self) -> bool;

    /// Translate the message in place.
    fn translate(&self, message: &mut Message, context: &TestContext) -> Result<()>;
}

fn same_dictionary(a: &dyn DataDictionary, b: &dyn DataDictionary) -> bool {
    std::ptr::addr_eq(a, b)
}

/// Apply the explicit dictionary, then every global dictionary in the chain.
///
/// # Arguments
/// * `message` - Message to translate in place
/// * `direction` - Direction the message travels
/// * `explicit` - Dictionary attached to the current action, if any
/// * `context` - Context owning the processor chain
///
/// # Returns
/// The first dictionary failure, if any
pub fn apply_dictionaries(
    message: &mut Message,
    direction: MessageDirection,
    explicit: Option<&Arc<dyn DataDictionary>>,
    context: &TestContext,
) -> Result<()> {
    if let Some(dictionary) = explicit {
        if dictionary.direction().applies_to(direction) {
            tracing::debug!("Applying explicit data dictionary '{}'", dictionary.name());
            dictionary.translate(message, context)?;
        }
    }

    let chain = context.message_processors().snapshot();
    for processor in &chain {
        let Some(dictionary) = processor.as_dictionary() else {
            continue;
        };

        if !dictionary.is_global_scope() || !dictionary.direction().applies_to(direction) {
            continue;
        }

        if explicit.is_some_and(|e| same_dictionary(e.as_ref(), dictionary)) {
            continue;
        }

        tracing::debug!("Applying global data dictionary '{}'", dictionary.name());
        dictionary.translate(message, context)?;
    }

    Ok(())
}

/// Load `key: value` mappings from a YAML resource.
pub fn load_mappings(path: &str, context: &TestContext) -> Result<IndexMap<String, String>> {
    let text = context.resource_loader().load(path)?.read_to_string(None)?;
    serde_yaml::from_str(&text).map_err(|e| {
        CourierError::Config(format!("invalid dictionary mappings in '{}': {}", path, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageProcessor;
    use std::sync::Mutex;

    /// Appends its name to the payload so ordering is observable.
    struct Recording {
        name: String,
        direction: MessageDirection,
        global: bool,
        calls: Mutex<usize>,
    }

    impl Recording {
        fn new(name: &str, direction: MessageDirection, global: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                direction,
                global,
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl DataDictionary for Recording {
        fn name(&self) -> &str {
            &self.name
        }

        fn direction(&self) -> MessageDirection {
            self.direction
        }

        fn is_global_scope(&self) -> bool {
            self.global
        }

        fn translate(&self, message: &mut Message, _context: &TestContext) -> Result<()> {
            *self.calls.lock().unwrap() += 1;
            let payload = format!("{}[{}]", message.payload_text(), self.name);
            message.payload = payload.into();
            Ok(())
        }
    }

    impl MessageProcessor for Recording {
        fn process(&self, message: &mut Message, context: &mut TestContext) -> Result<()> {
            self.translate(message, context)
        }

        fn as_dictionary(&self) -> Option<&dyn DataDictionary> {
            Some(self)
        }
    }

    #[test]
    fn test_explicit_before_global() {
        let mut context = TestContext::new();
        context
            .message_processors_mut()
            .add(Recording::new("global", MessageDirection::Outbound, true));

        let explicit: Arc<dyn DataDictionary> = Recording::new("explicit", MessageDirection::Outbound, false);
        let mut message = Message::new("msg");
        apply_dictionaries(&mut message, MessageDirection::Outbound, Some(&explicit), &context).unwrap();

        assert_eq!(message.payload_text(), "msg[explicit][global]");
    }

    #[test]
    fn test_direction_and_scope_filter() {
        let inbound = Recording::new("inbound", MessageDirection::Inbound, true);
        let not_global = Recording::new("explicit-only", MessageDirection::Outbound, false);

        let mut context = TestContext::new();
        context.message_processors_mut().add(inbound.clone());
        context.message_processors_mut().add(not_global.clone());

        let mut message = Message::new("msg");
        apply_dictionaries(&mut message, MessageDirection::Outbound, None, &context).unwrap();

        assert_eq!(message.payload_text(), "msg");
        assert_eq!(inbound.calls(), 0);
        assert_eq!(not_global.calls(), 0);
    }

    #[test]
    fn test_explicit_registered_globally_runs_once() {
        let dictionary = Recording::new("both", MessageDirection::Unbound, true);
        let mut context = TestContext::new();
        context.message_processors_mut().add(dictionary.clone());

        let explicit: Arc<dyn DataDictionary> = dictionary.clone();
        let mut message = Message::new("msg");
        apply_dictionaries(&mut message, MessageDirection::Outbound, Some(&explicit), &context).unwrap();

        assert_eq!(dictionary.calls(), 1);
    }

    #[test]
    fn test_explicit_with_wrong_direction_is_skipped() {
        let context = TestContext::new();
        let explicit: Arc<dyn DataDictionary> = Recording::new("inbound", MessageDirection::Inbound, false);
        let mut message = Message::new("msg");
        apply_dictionaries(&mut message, MessageDirection::Outbound, Some(&explicit), &context).unwrap();
        assert_eq!(message.payload_text(), "msg");
    }
}
