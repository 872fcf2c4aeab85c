use std::sync::Arc;

use crate::{AgentId, Envelope, MessageKind, Payload, Priority, Status, meta::Timestamp};

/// Predicate over envelopes, built from optional match fields.
///
/// `matches` is a conjunction: every field that is set must match, fields that
/// are not set impose no constraint. An empty filter matches everything.
/// Time bounds are inclusive and compare against `created_at`.
///
/// # Example
///
/// ```rust
/// use switchboard::{Envelope, MessageFilter, MessageKind};
///
/// let filter = MessageFilter::new()
///     .sender("planner")
///     .kind(MessageKind::Command);
///
/// let envelope = Envelope::direct("planner", "coder", ()).with_kind(MessageKind::Command);
/// assert!(filter.matches(&envelope));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MessageFilter {
    pub sender: Option<AgentId>,
    pub recipient: Option<AgentId>,
    pub topic: Option<Arc<str>>,
    pub workflow_id: Option<Arc<str>>,
    pub kind: Option<MessageKind>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub since: Option<Timestamp>,
    pub until: Option<Timestamp>,
}

impl MessageFilter {
    /// Filter matching every envelope.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender<N: Into<AgentId>>(mut self, sender: N) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn recipient<N: Into<AgentId>>(mut self, recipient: N) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn topic<T: Into<Arc<str>>>(mut self, topic: T) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn workflow<W: Into<Arc<str>>>(mut self, workflow_id: W) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn kind(mut self, kind: MessageKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Only envelopes created at or after `from`.
    pub fn since(mut self, from: Timestamp) -> Self {
        self.since = Some(from);
        self
    }

    /// Only envelopes created at or before `to`.
    pub fn until(mut self, to: Timestamp) -> Self {
        self.until = Some(to);
        self
    }

    pub fn matches<P: Payload>(&self, envelope: &Envelope<P>) -> bool {
        fn field<T: PartialEq + ?Sized>(want: Option<&T>, have: Option<&T>) -> bool {
            want.is_none_or(|w| have == Some(w))
        }

        let created = envelope.created_at();
        field(self.sender.as_ref(), Some(envelope.sender()))
            && field(self.recipient.as_ref(), envelope.recipient())
            && field(self.topic.as_deref(), envelope.topic_name())
            && field(self.workflow_id.as_deref(), envelope.workflow_id())
            && self.kind.is_none_or(|k| k == envelope.kind())
            && self.priority.is_none_or(|p| p == envelope.priority())
            && self.status.is_none_or(|s| s == envelope.status())
            && self.since.is_none_or(|t| created >= t)
            && self.until.is_none_or(|t| created <= t)
    }
}
