use std::sync::Arc;

use crate::{AgentId, Broker, Envelope, Payload, Priority};

/// Topic vocabulary over [`Broker`] routing.
pub struct PubSub<P: Payload> {
    broker: Broker<P>,
}

impl<P: Payload> PubSub<P> {
    pub fn new(broker: &Broker<P>) -> Self {
        Self {
            broker: broker.clone(),
        }
    }

    /// Returns `true` if at least one subscriber got a copy.
    pub fn publish<S, T>(&self, sender: S, topic: T, content: P) -> bool
    where
        S: Into<AgentId>,
        T: Into<Arc<str>>,
    {
        self.broker.send(Envelope::topic(sender, topic, content))
    }

    pub fn publish_with_priority<S, T>(
        &self,
        sender: S,
        topic: T,
        content: P,
        priority: Priority,
    ) -> bool
    where
        S: Into<AgentId>,
        T: Into<Arc<str>>,
    {
        let envelope = Envelope::topic(sender, topic, content).with_priority(priority);
        self.broker.send(envelope)
    }

    pub fn subscribe<N, T>(&self, agent: N, topic: T) -> bool
    where
        N: Into<AgentId>,
        T: Into<Arc<str>>,
    {
        self.broker.subscribe_to_topic(agent, topic)
    }

    pub fn unsubscribe<N: Into<AgentId>>(&self, agent: N, topic: &str) -> bool {
        self.broker.unsubscribe_from_topic(agent, topic)
    }

    pub fn subscribers(&self, topic: &str) -> Vec<AgentId> {
        self.broker.subscribers(topic)
    }
}
