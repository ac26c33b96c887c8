//! Endpoint abstraction consumed by send and receive actions.
//!
//! Transports are external collaborators. The crate ships only the in-memory
//! [`ChannelEndpoint`].

pub mod channel;

use std::sync::Arc;
use std::time::Duration;

use crate::actor::TestActor;
use crate::error::Result;
use crate::message::Message;
use crate::runtime::TestContext;

pub use channel::{ChannelEndpoint, ChannelEndpointConfig};

/// Default receive timeout when neither action nor endpoint sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

pub trait Endpoint: Send + Sync {
    fn name(&self) -> &str;

    /// Actor owning this endpoint, inherited by actions without their own actor.
    fn actor(&self) -> Option<&TestActor> {
        None
    }

    fn create_producer(&self) -> Result<Arc<dyn Producer>>;

    fn create_consumer(&self) -> Result<Arc<dyn Consumer>>;

    /// Default receive timeout.
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }
}

pub trait Producer: Send + Sync {
    fn send(&self, message: &Message, context: &TestContext) -> Result<()>;
}

pub trait Consumer: Send + Sync {
    /// Block until a message arrives or `timeout` expires.
    fn receive(&self, context: &TestContext, timeout: Duration) -> Result<Message>;
}
