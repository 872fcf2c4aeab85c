//! Statistics snapshots.
//!
//! Every accessor on [`Broker`](crate::Broker) returns an owned copy of these
//! structs. They are derived from dispatch activity and can be rebuilt from the
//! envelope stream; nothing in the broker reads them back to make decisions.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{AgentId, MessageKind, Priority, meta::Timestamp};

/// Broker-wide counters.
///
/// Counters are monotonic. `enqueued` counts mailbox pushes (one per fan-out
/// copy), while `delivered` counts envelopes actually handed to a consumer by
/// `receive`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BrokerStats {
    /// Envelopes accepted by `send` (one per call, regardless of fan-out).
    pub total_messages: u64,
    pub enqueued: u64,
    pub delivered: u64,
    /// Sends that reached no mailbox at all.
    pub failed: u64,
    pub expired: u64,
    /// Envelopes marked processed by at least one handler.
    pub processed: u64,
    pub handler_errors: u64,
    pub messages_by_kind: BTreeMap<MessageKind, u64>,
    pub messages_by_priority: BTreeMap<Priority, u64>,
    /// Rolling gauge refreshed by the throughput sampler.
    pub messages_per_second: f64,
    pub active_agents: usize,
    pub active_topics: usize,
    pub registered_handlers: usize,
    pub history_size: usize,
    pub started_at: Timestamp,
}

/// Per-agent counters.
///
/// `sent_count` moves when the agent sends; `received_count` only when the
/// agent pops an envelope with `receive`. Envelopes still waiting in the
/// mailbox show up in `queue_depth`, not in `received_count`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AgentStats {
    pub agent: AgentId,
    pub sent_count: u64,
    pub received_count: u64,
    pub last_sent_at: Option<Timestamp>,
    pub last_received_at: Option<Timestamp>,
    pub subscribed_topics: BTreeSet<Arc<str>>,
    /// Envelopes waiting in the mailbox when the snapshot was taken.
    pub queue_depth: usize,
    pub registered_at: Timestamp,
}

impl AgentStats {
    pub(crate) fn new(agent: AgentId, at: Timestamp) -> Self {
        Self {
            agent,
            sent_count: 0,
            received_count: 0,
            last_sent_at: None,
            last_received_at: None,
            subscribed_topics: BTreeSet::new(),
            queue_depth: 0,
            registered_at: at,
        }
    }

    /// Most recent send or receive, if any.
    pub fn last_activity(&self) -> Option<Timestamp> {
        self.last_sent_at.max(self.last_received_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TopicStats {
    pub topic: Arc<str>,
    pub message_count: u64,
    pub subscriber_count: usize,
    pub last_message_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl TopicStats {
    pub(crate) fn new(topic: Arc<str>, at: Timestamp) -> Self {
        Self {
            topic,
            message_count: 0,
            subscriber_count: 0,
            last_message_at: None,
            created_at: at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkflowStats {
    pub workflow_id: Arc<str>,
    pub message_count: u64,
    /// Senders and recipients seen on this workflow.
    pub participants: BTreeSet<AgentId>,
    pub first_message_at: Timestamp,
    pub last_message_at: Timestamp,
}

/// Point-in-time view of the whole broker.
///
/// # Example
///
/// ```ignore
/// let snapshot = broker.snapshot();
/// for agent in &snapshot.agents {
///     println!("{}: sent {} received {} (queue: {})",
///         agent.agent, agent.sent_count, agent.received_count, agent.queue_depth);
/// }
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BrokerSnapshot {
    /// Nanoseconds since Unix epoch when the snapshot was taken.
    pub timestamp: Timestamp,
    pub stats: BrokerStats,
    /// Registered agents, ordered by name.
    pub agents: Vec<AgentStats>,
}
