use tracing::warn;

use crate::{AgentId, Broker, Envelope, Payload};

type Predicate<P> = Box<dyn Fn(&Envelope<P>) -> bool + Send + Sync>;

/// Content-based routing: the first rule whose predicate matches picks the
/// recipient, the fallback catches the rest.
///
/// ```rust
/// use switchboard::{Broker, Envelope, MessageKind, patterns::ConditionalRouter};
///
/// let broker = Broker::<String>::default();
/// let router = ConditionalRouter::new(&broker)
///     .rule(|e| e.kind() == MessageKind::Error, "oncall")
///     .rule(|e| e.payload().starts_with("bill"), "billing")
///     .fallback("triage");
///
/// assert!(router.route(Envelope::new("web", "billing address changed".into())));
/// assert_eq!(broker.queue_len("billing"), 1);
/// ```
pub struct ConditionalRouter<P: Payload> {
    broker: Broker<P>,
    rules: Vec<(Predicate<P>, AgentId)>,
    fallback: Option<AgentId>,
}

impl<P: Payload> ConditionalRouter<P> {
    pub fn new(broker: &Broker<P>) -> Self {
        Self {
            broker: broker.clone(),
            rules: Vec::new(),
            fallback: None,
        }
    }

    /// Append a rule. Rules are tried in the order they were added.
    pub fn rule<F, T>(mut self, predicate: F, target: T) -> Self
    where
        F: Fn(&Envelope<P>) -> bool + Send + Sync + 'static,
        T: Into<AgentId>,
    {
        self.rules.push((Box::new(predicate), target.into()));
        self
    }

    pub fn fallback<T: Into<AgentId>>(mut self, target: T) -> Self {
        self.fallback = Some(target.into());
        self
    }

    /// The agent `envelope` would be routed to.
    pub fn target_for(&self, envelope: &Envelope<P>) -> Option<&AgentId> {
        self.rules
            .iter()
            .find(|(predicate, _)| predicate(envelope))
            .map(|(_, target)| target)
            .or(self.fallback.as_ref())
    }

    /// Send `envelope` directly to its target, replacing any recipient or
    /// topic it had. Broadcast envelopes are sent unchanged.
    pub fn route(&self, envelope: Envelope<P>) -> bool {
        if envelope.kind().is_broadcast() {
            return self.broker.send(envelope);
        }
        let Some(target) = self.target_for(&envelope).cloned() else {
            warn!(envelope_id = %envelope.id(), "No routing rule matched");
            return false;
        };
        self.broker.send(envelope.redirect(target))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
