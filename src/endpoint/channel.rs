//! In-memory channel endpoint
//!
//! Messages sent through the producer are queued and handed out in FIFO
//! order by the consumer. The queue is a crossbeam channel, so other threads
//! may feed or drain it.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::actor::TestActor;
use crate::endpoint::{Consumer, Endpoint, Producer, DEFAULT_TIMEOUT};
use crate::error::{CourierError, Result};
use crate::message::Message;
use crate::runtime::TestContext;

#[derive(Debug, Clone)]
pub struct ChannelEndpointConfig {
    pub timeout: Duration,
    /// Maximum queued messages, unbounded when `None`.
    pub capacity: Option<usize>,
}

impl Default for ChannelEndpointConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            capacity: None,
        }
    }
}

/// Both ends of the queue. Clones of an endpoint share them.
#[derive(Debug, Clone)]
struct Channel {
    sender: Sender<Message>,
    receiver: Receiver<Message>,
}

impl Channel {
    fn new(capacity: Option<usize>) -> Self {
        let (sender, receiver) = match capacity {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };
        Self { sender, receiver }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelEndpoint {
    name: String,
    actor: Option<TestActor>,
    config: ChannelEndpointConfig,
    channel: Channel,
}

impl ChannelEndpoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, ChannelEndpointConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: ChannelEndpointConfig) -> Self {
        Self {
            name: name.into(),
            actor: None,
            channel: Channel::new(config.capacity),
            config,
        }
    }

    pub fn with_actor(mut self, actor: TestActor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Number of queued messages.
    pub fn pending(&self) -> usize {
        self.channel.receiver.len()
    }

    /// Remove and return all queued messages.
    pub fn drain(&self) -> Vec<Message> {
        self.channel.receiver.try_iter().collect()
    }
}

impl Endpoint for ChannelEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn actor(&self) -> Option<&TestActor> {
        self.actor.as_ref()
    }

    fn create_producer(&self) -> Result<Arc<dyn Producer>> {
        Ok(Arc::new(self.clone()))
    }

    fn create_consumer(&self) -> Result<Arc<dyn Consumer>> {
        Ok(Arc::new(self.clone()))
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }
}

impl Producer for ChannelEndpoint {
    fn send(&self, message: &Message, _context: &TestContext) -> Result<()> {
        self.channel
            .sender
            .try_send(message.clone())
            .map_err(|e| CourierError::Endpoint {
                endpoint: self.name.clone(),
                reason: match e {
                    TrySendError::Full(_) => format!(
                        "channel is full ({} messages)",
                        self.config.capacity.unwrap_or_default()
                    ),
                    TrySendError::Disconnected(_) => "channel disconnected".to_string(),
                },
            })?;

        tracing::info!("Sent message {} to channel '{}'", message.id, self.name);
        Ok(())
    }
}

impl Consumer for ChannelEndpoint {
    fn receive(&self, _context: &TestContext, timeout: Duration) -> Result<Message> {
        match self.channel.receiver.recv_timeout(timeout) {
            Ok(message) => {
                tracing::info!("Received message {} from channel '{}'", message.id, self.name);
                Ok(message)
            }
            Err(RecvTimeoutError::Timeout) => Err(CourierError::Timeout {
                endpoint: self.name.clone(),
                timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(CourierError::Endpoint {
                endpoint: self.name.clone(),
                reason: "channel disconnected".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_delivery() {
        let endpoint = ChannelEndpoint::new("queue");
        let context = TestContext::new();
        let producer = endpoint.create_producer().unwrap();
        producer.send(&Message::new("first"), &context).unwrap();
        producer.send(&Message::new("second"), &context).unwrap();
        assert_eq!(endpoint.pending(), 2);

        let consumer = endpoint.create_consumer().unwrap();
        let timeout = Duration::from_millis(10);
        assert_eq!(consumer.receive(&context, timeout).unwrap().payload_text(), "first");
        assert_eq!(consumer.receive(&context, timeout).unwrap().payload_text(), "second");
    }

    #[test]
    fn test_receive_times_out() {
        let endpoint = ChannelEndpoint::new("empty");
        let context = TestContext::new();
        let err = endpoint
            .create_consumer()
            .unwrap()
            .receive(&context, Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, CourierError::Timeout { endpoint, .. } if endpoint == "empty"));
    }

    #[test]
    fn test_message_from_other_thread() {
        let endpoint = ChannelEndpoint::new("threaded");
        let feeder = endpoint.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            feeder.send(&Message::new("late"), &TestContext::new()).unwrap();
        });

        let message = endpoint
            .receive(&TestContext::new(), Duration::from_secs(5))
            .unwrap();
        assert_eq!(message.payload_text(), "late");
        handle.join().unwrap();
    }

    #[test]
    fn test_capacity_limit() {
        let config = ChannelEndpointConfig {
            timeout: Duration::from_millis(10),
            capacity: Some(1),
        };
        let endpoint = ChannelEndpoint::with_config("small", config);
        let context = TestContext::new();
        endpoint.send(&Message::new("a"), &context).unwrap();
        assert!(matches!(
            endpoint.send(&Message::new("b"), &context),
            Err(CourierError::Endpoint { reason, .. }) if reason.contains("full")
        ));
        assert_eq!(endpoint.pending(), 1);
    }

    #[test]
    fn test_drain_empties_shared_queue() {
        let endpoint = ChannelEndpoint::new("shared");
        let clone = endpoint.clone();
        let context = TestContext::new();
        clone.send(&Message::new("one"), &context).unwrap();
        clone.send(&Message::new("two"), &context).unwrap();

        let drained = endpoint.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].payload_text(), "two");
        assert_eq!(clone.pending(), 0);
    }

    #[test]
    fn test_default_config_timeout() {
        assert_eq!(ChannelEndpointConfig::default().timeout, DEFAULT_TIMEOUT);
        assert_eq!(ChannelEndpoint::new("defaults").timeout(), DEFAULT_TIMEOUT);
    }
}
