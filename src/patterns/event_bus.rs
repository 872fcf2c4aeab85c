use std::future::Future;

use crate::{
    AgentId, Broker, Envelope, Handler, HandlerId, MessageFilter, MessageKind, Payload, Result,
};

/// Metadata key carrying the event type of an emitted envelope.
pub const EVENT_TYPE_KEY: &str = "event_type";

/// Named events over topics.
///
/// An event of type `t` travels on topic `event.t` as an
/// [`Event`](MessageKind::Event) envelope with its type under
/// [`EVENT_TYPE_KEY`]. Agents `listen` to receive events in their mailbox;
/// callbacks registered with `on` run when the event is emitted.
pub struct EventBus<P: Payload> {
    broker: Broker<P>,
}

impl<P: Payload> EventBus<P> {
    pub fn new(broker: &Broker<P>) -> Self {
        Self {
            broker: broker.clone(),
        }
    }

    pub fn topic_for(event_type: &str) -> String {
        format!("event.{event_type}")
    }

    /// Publish an event and run the callbacks registered for its type.
    ///
    /// Returns `true` if at least one listener or callback took it.
    pub async fn emit<S: Into<AgentId>>(&self, sender: S, event_type: &str, content: P) -> bool {
        let mut envelope = Envelope::topic(sender, Self::topic_for(event_type), content)
            .with_kind(MessageKind::Event)
            .with_metadata(EVENT_TYPE_KEY, event_type);

        let delivered = self.broker.try_send(envelope.clone()).is_ok();
        let handled = self.broker.process_message_handlers(&mut envelope).await;
        delivered || handled > 0
    }

    /// Subscribe `agent` to events of `event_type`.
    pub fn listen<N: Into<AgentId>>(&self, agent: N, event_type: &str) -> bool {
        let topic = Self::topic_for(event_type);
        self.broker.subscribe_to_topic(agent, topic)
    }

    pub fn ignore<N: Into<AgentId>>(&self, agent: N, event_type: &str) -> bool {
        let topic = Self::topic_for(event_type);
        self.broker.unsubscribe_from_topic(agent, &topic)
    }

    /// Run `callback` for every event of `event_type` emitted through this bus.
    pub fn on<F, Fut>(&self, event_type: &str, callback: F) -> HandlerId
    where
        F: Fn(Envelope<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let filter = MessageFilter::new()
            .topic(Self::topic_for(event_type))
            .kind(MessageKind::Event);
        let handler = Handler::new(filter, callback).with_description(format!("on {event_type}"));
        self.broker.register_handler(handler)
    }

    pub fn off(&self, id: HandlerId) -> bool {
        self.broker.unregister_handler(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[tokio::test]
    async fn listeners_and_callbacks_see_events() {
        let broker: Broker<String> = Broker::default();
        let bus = EventBus::new(&broker);
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        bus.on("deployed", move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        bus.listen("auditor", "deployed");

        assert!(bus.emit("ci", "deployed", "v2".into()).await);
        assert!(!bus.emit("ci", "rolled_back", "v1".into()).await);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        let event = broker.try_receive("auditor");
        assert_eq!(
            event.as_ref().and_then(|e| e.meta.get(EVENT_TYPE_KEY)),
            Some("deployed")
        );
        assert_eq!(
            event.and_then(|e| e.topic_name().map(String::from)),
            Some("event.deployed".into())
        );
    }
}
