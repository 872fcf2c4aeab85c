use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::{
    AgentId, Envelope, Payload,
    meta::{Timestamp, now},
    stats::{AgentStats, BrokerStats, TopicStats, WorkflowStats},
};

/// Mutable aggregate behind every statistics snapshot.
///
/// Lives under one mutex in the broker so each update is applied exactly once.
pub(crate) struct StatsBook {
    global: BrokerStats,
    agents: HashMap<AgentId, AgentStats>,
    topics: HashMap<Arc<str>, TopicStats>,
    workflows: HashMap<Arc<str>, WorkflowStats>,
    last_sampled_total: u64,
}

impl StatsBook {
    pub fn new() -> Self {
        Self {
            global: BrokerStats {
                started_at: now(),
                ..BrokerStats::default()
            },
            agents: HashMap::new(),
            topics: HashMap::new(),
            workflows: HashMap::new(),
            last_sampled_total: 0,
        }
    }

    fn agent_mut(&mut self, agent: &AgentId) -> &mut AgentStats {
        self.agents
            .entry(agent.clone())
            .or_insert_with(|| AgentStats::new(agent.clone(), now()))
    }

    fn workflow_mut(&mut self, workflow_id: &Arc<str>, at: Timestamp) -> &mut WorkflowStats {
        self.workflows
            .entry(workflow_id.clone())
            .or_insert_with(|| WorkflowStats {
                workflow_id: workflow_id.clone(),
                message_count: 0,
                participants: Default::default(),
                first_message_at: at,
                last_message_at: at,
            })
    }

    pub fn agent_registered(&mut self, agent: &AgentId) {
        self.agent_mut(agent);
    }

    pub fn agent_unregistered(&mut self, agent: &str) {
        self.agents.remove(agent);
    }

    pub fn subscribed(&mut self, topic: &Arc<str>, agent: &AgentId, subscriber_count: usize) {
        let stats = self.agent_mut(agent);
        stats.subscribed_topics.insert(topic.clone());
        self.topics
            .entry(topic.clone())
            .or_insert_with(|| TopicStats::new(topic.clone(), now()))
            .subscriber_count = subscriber_count;
    }

    /// Drop the agent from `topic`; a count of zero retires the topic stats.
    pub fn unsubscribed(&mut self, topic: &str, agent: &str, subscriber_count: usize) {
        if let Some(stats) = self.agents.get_mut(agent) {
            stats.subscribed_topics.remove(topic);
        }
        if subscriber_count == 0 {
            self.topics.remove(topic);
        } else if let Some(stats) = self.topics.get_mut(topic) {
            stats.subscriber_count = subscriber_count;
        }
    }

    /// An envelope left its sender and is about to be routed.
    pub fn record_sent<P: Payload>(&mut self, envelope: &Envelope<P>) {
        let at = envelope.sent_at().unwrap_or_else(now);

        self.global.total_messages += 1;
        *self
            .global
            .messages_by_kind
            .entry(envelope.kind())
            .or_default() += 1;
        *self
            .global
            .messages_by_priority
            .entry(envelope.priority())
            .or_default() += 1;

        let sender = self.agent_mut(envelope.sender());
        sender.sent_count += 1;
        sender.last_sent_at = Some(at);

        if let Some(workflow_id) = envelope.meta.workflow_id.as_ref() {
            let workflow = self.workflow_mut(workflow_id, at);
            workflow.message_count += 1;
            workflow.participants.insert(envelope.sender().clone());
            workflow.last_message_at = at;
        }
    }

    pub fn record_topic_message(&mut self, topic: &str) {
        if let Some(stats) = self.topics.get_mut(topic) {
            stats.message_count += 1;
            stats.last_message_at = Some(now());
        }
    }

    /// One copy landed in `recipient`'s mailbox.
    pub fn record_enqueued(&mut self, recipient: &AgentId, workflow_id: Option<&Arc<str>>) {
        self.global.enqueued += 1;
        if let Some(workflow) = workflow_id.and_then(|id| self.workflows.get_mut(id)) {
            workflow.participants.insert(recipient.clone());
        }
    }

    pub fn record_received(&mut self, agent: &AgentId) {
        self.global.delivered += 1;
        let stats = self.agent_mut(agent);
        stats.received_count += 1;
        stats.last_received_at = Some(now());
    }

    pub fn record_failed(&mut self) {
        self.global.failed += 1;
    }

    pub fn record_expired(&mut self, count: usize) {
        self.global.expired += count as u64;
    }

    pub fn record_processed(&mut self) {
        self.global.processed += 1;
    }

    pub fn record_handler_errors(&mut self, count: usize) {
        self.global.handler_errors += count as u64;
    }

    /// Refresh the messages-per-second gauge from the count delta since the
    /// previous sample.
    pub fn sample_throughput(&mut self, elapsed: Duration) -> f64 {
        let total = self.global.total_messages;
        let delta = total.saturating_sub(self.last_sampled_total);
        self.last_sampled_total = total;
        let secs = elapsed.as_secs_f64();
        self.global.messages_per_second = if secs > 0.0 {
            delta as f64 / secs
        } else {
            0.0
        };
        self.global.messages_per_second
    }

    pub fn broker(&self) -> BrokerStats {
        self.global.clone()
    }

    pub fn agent(&self, agent: &str) -> Option<AgentStats> {
        self.agents.get(agent).cloned()
    }

    pub fn topic(&self, topic: &str) -> Option<TopicStats> {
        self.topics.get(topic).cloned()
    }

    pub fn workflow(&self, workflow_id: &str) -> Option<WorkflowStats> {
        self.workflows.get(workflow_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MessageKind, Priority, Status};

    fn sent(envelope: Envelope<()>) -> Envelope<()> {
        let mut envelope = envelope;
        envelope.advance(Status::Sent);
        envelope
    }

    #[test]
    fn sent_and_received_are_tracked_separately() {
        let mut book = StatsBook::new();
        for _ in 0..3 {
            book.record_sent(&sent(Envelope::direct("s", "r", ())));
        }
        book.record_received(&AgentId::from("r"));

        assert_eq!(book.agent("s").map(|a| a.sent_count), Some(3));
        assert_eq!(book.agent("s").map(|a| a.received_count), Some(0));
        assert_eq!(book.agent("r").map(|a| a.received_count), Some(1));
        assert_eq!(book.broker().total_messages, 3);
        assert_eq!(book.broker().delivered, 1);
    }

    #[test]
    fn kind_and_priority_breakdown() {
        let mut book = StatsBook::new();
        book.record_sent(&sent(Envelope::direct("s", "r", ()).with_kind(MessageKind::Command)));
        book.record_sent(&sent(Envelope::direct("s", "r", ()).with_priority(Priority::Critical)));

        let stats = book.broker();
        assert_eq!(stats.messages_by_kind.get(&MessageKind::Command), Some(&1));
        assert_eq!(stats.messages_by_kind.get(&MessageKind::Text), Some(&1));
        let by_priority = &stats.messages_by_priority;
        assert_eq!(by_priority.get(&Priority::Critical), Some(&1));
        assert_eq!(by_priority.get(&Priority::Normal), Some(&1));
    }

    #[test]
    fn workflow_participants_include_recipients() {
        let mut book = StatsBook::new();
        let envelope = sent(Envelope::direct("s", "r", ()).in_workflow("wf"));
        book.record_sent(&envelope);
        book.record_enqueued(&AgentId::from("r"), envelope.meta.workflow_id.as_ref());

        let wf = book.workflow("wf");
        assert_eq!(wf.as_ref().map(|w| w.message_count), Some(1));
        let participants: Vec<_> = wf
            .map(|w| w.participants.iter().map(|p| p.to_string()).collect())
            .unwrap_or_default();
        assert_eq!(participants, vec!["r", "s"]);
    }

    #[test]
    fn topic_stats_follow_subscriptions() {
        let mut book = StatsBook::new();
        let news: Arc<str> = Arc::from("news");
        book.subscribed(&news, &AgentId::from("a"), 1);
        book.record_topic_message("news");
        assert_eq!(book.topic("news").map(|t| t.message_count), Some(1));
        assert!(
            book.agent("a")
                .is_some_and(|a| a.subscribed_topics.contains("news"))
        );

        book.unsubscribed("news", "a", 0);
        assert!(book.topic("news").is_none());
        assert!(
            book.agent("a")
                .is_some_and(|a| a.subscribed_topics.is_empty())
        );

    }

    #[test]
    fn throughput_uses_delta_since_last_sample() {
        let mut book = StatsBook::new();
        for _ in 0..10 {
            book.record_sent(&sent(Envelope::direct("s", "r", ())));
        }
        assert_eq!(book.sample_throughput(Duration::from_secs(5)), 2.0);
        assert_eq!(book.sample_throughput(Duration::from_secs(5)), 0.0);
    }
}
