use std::{fmt, sync::Arc, time::Duration};

use crate::{
    AgentId, EnvelopeId, MessageKind, Meta, Payload, Priority, Status,
    meta::{Timestamp, now},
};

/// Where an envelope goes, as resolved by [`Envelope::route`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Every registered agent except the sender.
    Broadcast,
    /// Every subscriber of the topic at dispatch time.
    Topic(Arc<str>),
    /// A single mailbox.
    Direct(AgentId),
}

/// One message instance: payload, routing target, lifecycle and metadata.
///
/// An envelope is routed by precedence: `kind == Broadcast` goes to every
/// registered agent except the sender, otherwise a set `topic` fans out to the
/// topic's subscribers, otherwise `recipient` names a single mailbox. An
/// envelope with none of these has no route and is refused by the broker.
///
/// Fan-out produces per-recipient copies (see [`Envelope::copy_for`]) that share
/// the payload `Arc` but own their status and timestamps.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use switchboard::{Envelope, MessageKind, Priority};
///
/// let envelope = Envelope::direct("planner", "coder", String::from("write tests"))
///     .with_kind(MessageKind::Command)
///     .with_priority(Priority::High)
///     .in_workflow("release-42")
///     .expires_in(Duration::from_secs(30));
///
/// assert_eq!(envelope.recipient().map(|r| r.name()), Some("coder"));
/// assert!(!envelope.is_expired());
/// ```
#[derive(Debug)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound(
        serialize = "P: serde::Serialize",
        deserialize = "P: serde::Deserialize<'de>"
    ))
)]
pub struct Envelope<P: Payload> {
    pub meta: Meta,
    recipient: Option<AgentId>,
    topic: Option<Arc<str>>,
    kind: MessageKind,
    priority: Priority,
    status: Status,
    sent_at: Option<Timestamp>,
    delivered_at: Option<Timestamp>,
    read_at: Option<Timestamp>,
    processed_at: Option<Timestamp>,
    expires_at: Option<Timestamp>,
    payload: Arc<P>,
}

impl<P: Payload> Envelope<P> {
    /// Create an envelope without a routing target.
    ///
    /// Set one with [`to`](Self::to), [`on_topic`](Self::on_topic) or
    /// [`as_broadcast`](Self::as_broadcast) before sending.
    pub fn new<N: Into<AgentId>>(sender: N, payload: P) -> Self {
        Self::from_shared(sender, Arc::new(payload))
    }

    /// Same as [`new`](Self::new) for a payload that is already shared.
    pub fn from_shared<N: Into<AgentId>>(sender: N, payload: Arc<P>) -> Self {
        Self {
            meta: Meta::new(sender.into()),
            recipient: None,
            topic: None,
            kind: MessageKind::Text,
            priority: Priority::Normal,
            status: Status::Created,
            sent_at: None,
            delivered_at: None,
            read_at: None,
            processed_at: None,
            expires_at: None,
            payload,
        }
    }

    /// Envelope addressed to a single agent.
    pub fn direct<S, R>(sender: S, recipient: R, payload: P) -> Self
    where
        S: Into<AgentId>,
        R: Into<AgentId>,
    {
        Self::new(sender, payload).to(recipient)
    }

    /// Envelope published on a topic.
    pub fn topic<S, T>(sender: S, topic: T, payload: P) -> Self
    where
        S: Into<AgentId>,
        T: Into<Arc<str>>,
    {
        Self::new(sender, payload).on_topic(topic)
    }

    /// Envelope broadcast to every registered agent except the sender.
    pub fn broadcast<S: Into<AgentId>>(sender: S, payload: P) -> Self {
        Self::new(sender, payload).as_broadcast()
    }

    pub fn to<R: Into<AgentId>>(mut self, recipient: R) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn on_topic<T: Into<Arc<str>>>(mut self, topic: T) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn as_broadcast(mut self) -> Self {
        self.kind = MessageKind::Broadcast;
        self
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Correlate this envelope with a workflow.
    pub fn in_workflow<W: Into<Arc<str>>>(mut self, workflow_id: W) -> Self {
        self.meta.workflow_id = Some(workflow_id.into());
        self
    }

    /// Mark this envelope as the answer to another one.
    pub fn reply_to(mut self, id: EnvelopeId) -> Self {
        self.meta.reply_to = Some(id);
        self
    }

    pub fn with_trace_id(mut self, trace_id: u128) -> Self {
        self.meta.set_trace_id(trace_id);
        self
    }

    pub fn with_metadata<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.meta.metadata.insert(key.into(), value.into());
        self
    }

    /// Absolute deadline after which the envelope is never delivered.
    pub fn expires_at(mut self, deadline: Timestamp) -> Self {
        self.expires_at = Some(deadline);
        self
    }

    /// Deadline relative to now.
    pub fn expires_in(self, ttl: Duration) -> Self {
        let deadline = now().saturating_add(ttl.as_nanos() as u64);
        self.expires_at(deadline)
    }

    /// Per-recipient copy used for topic and broadcast fan-out.
    ///
    /// The copy gets a new id and the given recipient, shares the payload and
    /// starts from this envelope's current status and timestamps.
    pub fn copy_for(&self, recipient: &AgentId) -> Self {
        Self {
            meta: self.meta.renewed(),
            recipient: Some(recipient.clone()),
            ..self.clone()
        }
    }

    pub fn id(&self) -> EnvelopeId {
        self.meta.id()
    }

    pub fn sender(&self) -> &AgentId {
        self.meta.sender()
    }

    pub fn recipient(&self) -> Option<&AgentId> {
        self.recipient.as_ref()
    }

    pub fn topic_name(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn workflow_id(&self) -> Option<&str> {
        self.meta.workflow_id()
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Shared handle to the payload, same allocation for every fan-out copy.
    pub fn shared_payload(&self) -> &Arc<P> {
        &self.payload
    }

    pub fn created_at(&self) -> Timestamp {
        self.meta.created_at()
    }

    pub fn sent_at(&self) -> Option<Timestamp> {
        self.sent_at
    }

    pub fn delivered_at(&self) -> Option<Timestamp> {
        self.delivered_at
    }

    pub fn read_at(&self) -> Option<Timestamp> {
        self.read_at
    }

    pub fn processed_at(&self) -> Option<Timestamp> {
        self.processed_at
    }

    pub fn expiry(&self) -> Option<Timestamp> {
        self.expires_at
    }

    /// True iff a deadline is set and the current time is past it.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now())
    }

    pub(crate) fn is_expired_at(&self, at: Timestamp) -> bool {
        self.expires_at.is_some_and(|deadline| at > deadline)
    }

    /// Resolve the routing target by precedence: broadcast, topic, recipient.
    pub fn route(&self) -> Option<Route> {
        if self.kind.is_broadcast() {
            Some(Route::Broadcast)
        } else if let Some(topic) = &self.topic {
            Some(Route::Topic(topic.clone()))
        } else {
            self.recipient.clone().map(Route::Direct)
        }
    }

    /// Make the envelope a direct one for `recipient`, dropping any topic.
    pub(crate) fn redirect(mut self, recipient: AgentId) -> Self {
        self.topic = None;
        self.recipient = Some(recipient);
        self
    }

    /// Whether the envelope names at least one routing target.
    pub fn has_route(&self) -> bool {
        self.route().is_some()
    }

    /// Record that the consumer has read the envelope.
    ///
    /// Returns `false` when the status can't move forward (already read,
    /// processed, failed or expired).
    pub fn mark_read(&mut self) -> bool {
        self.advance(Status::Read)
    }

    /// Record that the envelope has been fully processed.
    pub fn mark_processed(&mut self) -> bool {
        self.advance(Status::Processed)
    }

    /// Move the status forward and stamp the matching timestamp.
    ///
    /// Backward moves and anything after a terminal status are ignored.
    pub(crate) fn advance(&mut self, to: Status) -> bool {
        if !self.status.can_advance_to(to) {
            return false;
        }
        let at = now();
        match to {
            Status::Sent => self.sent_at = Some(at),
            Status::Delivered => self.delivered_at = Some(at),
            Status::Read => self.read_at = Some(at),
            Status::Processed => self.processed_at = Some(at),
            Status::Created | Status::Failed | Status::Expired => {}
        }
        self.status = to;
        true
    }
}

impl<P: Payload> Clone for Envelope<P> {
    fn clone(&self) -> Self {
        Self {
            meta: self.meta.clone(),
            recipient: self.recipient.clone(),
            topic: self.topic.clone(),
            kind: self.kind,
            priority: self.priority,
            status: self.status,
            sent_at: self.sent_at,
            delivered_at: self.delivered_at,
            read_at: self.read_at,
            processed_at: self.processed_at,
            expires_at: self.expires_at,
            payload: self.payload.clone(),
        }
    }
}

impl<P: Payload> fmt::Display for Envelope<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} {} {}] from {}",
            self.id(),
            self.kind,
            self.priority,
            self.status,
            self.sender()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_routing_fields() {
        let e = Envelope::topic("a", "news", String::from("hello"))
            .with_priority(Priority::Low)
            .in_workflow("wf")
            .with_metadata("event_type", "greeting");
        assert_eq!(e.topic_name(), Some("news"));
        assert_eq!(e.recipient(), None);
        assert_eq!(e.priority(), Priority::Low);
        assert_eq!(e.workflow_id(), Some("wf"));
        assert_eq!(e.meta.get("event_type"), Some("greeting"));
        assert_eq!(e.status(), Status::Created);
        assert!(e.has_route());
    }

    #[test]
    fn route_precedence() {
        let both = Envelope::topic("a", "news", ()).to("b");
        assert_eq!(both.route(), Some(Route::Topic(Arc::from("news"))));
        assert_eq!(both.as_broadcast().route(), Some(Route::Broadcast));
        assert_eq!(
            Envelope::direct("a", "b", ()).route(),
            Some(Route::Direct(AgentId::from("b")))
        );
    }

    #[test]
    fn no_route_without_target() {
        let e = Envelope::new("a", String::from("lost"));
        assert!(!e.has_route());
        assert!(Envelope::broadcast("a", ()).has_route());
    }

    #[test]
    fn copy_is_independent_but_shares_payload() {
        let mut original = Envelope::broadcast("a", String::from("all hands"));
        original.advance(Status::Sent);

        let mut copy = original.copy_for(&AgentId::from("b"));
        assert_ne!(copy.id(), original.id());
        assert!(Arc::ptr_eq(copy.shared_payload(), original.shared_payload()));
        assert_eq!(copy.status(), Status::Sent);
        assert_eq!(copy.recipient().map(|r| r.name()), Some("b"));

        copy.advance(Status::Delivered);
        assert_eq!(copy.status(), Status::Delivered);
        assert_eq!(original.status(), Status::Sent);
        assert!(original.delivered_at().is_none());
    }

    #[test]
    fn status_never_moves_backwards() {
        let mut e = Envelope::direct("a", "b", ());
        assert!(e.advance(Status::Sent));
        assert!(e.advance(Status::Delivered));
        assert!(!e.advance(Status::Sent));
        assert!(e.mark_read());
        assert!(!e.mark_read());
        assert!(e.mark_processed());
        assert_eq!(e.status(), Status::Processed);
    }

    #[test]
    fn terminal_status_freezes_timestamps() {
        let mut e = Envelope::direct("a", "b", ());
        e.advance(Status::Sent);
        assert!(e.advance(Status::Expired));
        assert!(!e.advance(Status::Delivered));
        assert!(!e.mark_processed());
        assert!(e.delivered_at().is_none());
        assert!(e.processed_at().is_none());
        assert_eq!(e.status(), Status::Expired);
    }

    #[test]
    fn expiry() {
        let past = Envelope::direct("a", "b", ()).expires_at(now() - 1_000_000_000);
        assert!(past.is_expired());

        let future = Envelope::direct("a", "b", ()).expires_in(Duration::from_secs(60));
        assert!(!future.is_expired());

        let never = Envelope::direct("a", "b", ());
        assert!(!never.is_expired());
    }
}
