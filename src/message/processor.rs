//! Message processors run over built or received messages.
//!
//! Data dictionaries and variable extractors are processors. The context owns
//! an ordered chain of them; actions carry their own list on top.

use std::fmt;
use std::sync::Arc;

use crate::dictionary::DataDictionary;
use crate::error::Result;
use crate::message::{Message, MessageDirection};
use crate::runtime::TestContext;

pub trait MessageProcessor: Send + Sync {
    fn process(&self, message: &mut Message, context: &mut TestContext) -> Result<()>;

    /// Direction of messages this processor handles.
    fn direction(&self) -> MessageDirection {
        MessageDirection::Unbound
    }

    /// Downcast hook used by the dictionary pass.
    fn as_dictionary(&self) -> Option<&dyn DataDictionary> {
        None
    }

    fn name(&self) -> &str {
        "message-processor"
    }
}

impl<F> MessageProcessor for F
where
    F: Fn(&mut Message, &mut TestContext) -> Result<()> + Send + Sync,
{
    fn process(&self, message: &mut Message, context: &mut TestContext) -> Result<()> {
        self(message, context)
    }
}

/// Ordered processor chain.
#[derive(Clone, Default)]
pub struct MessageProcessors {
    processors: Vec<Arc<dyn MessageProcessor>>,
}

impl MessageProcessors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, processor: Arc<dyn MessageProcessor>) {
        self.processors.push(processor);
    }

    pub fn push(&mut self, processor: impl MessageProcessor + 'static) {
        self.add(Arc::new(processor));
    }

    pub fn set(&mut self, processors: Vec<Arc<dyn MessageProcessor>>) {
        self.processors = processors;
    }

    pub fn clear(&mut self) {
        self.processors.clear();
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn MessageProcessor>> {
        self.processors.iter()
    }

    /// Cloned handles, so the chain can run while the context is borrowed mutably.
    pub fn snapshot(&self) -> Vec<Arc<dyn MessageProcessor>> {
        self.processors.clone()
    }
}

impl fmt::Debug for MessageProcessors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.processors.iter().map(|p| p.name()))
            .finish()
    }
}

/// Run every non-dictionary processor in the context chain whose direction matches.
///
/// Dictionaries are handled separately by [`crate::dictionary::apply_dictionaries`].
pub fn apply_global_processors(
    message: &mut Message,
    direction: MessageDirection,
    context: &mut TestContext,
) -> Result<()> {
    let chain = context.message_processors().snapshot();
    for processor in chain
        .iter()
        .filter(|p| p.as_dictionary().is_none() && p.direction().applies_to(direction))
    {
        tracing::debug!("Applying global message processor '{}'", processor.name());
        processor.process(message, context)?;
    }
    Ok(())
}
