use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use crate::AgentId;

/// Topic name to subscriber set.
///
/// A topic exists while it has at least one subscriber; the last unsubscribe
/// retires it. Subscriber sets are ordered so fan-out visits recipients in a
/// stable order.
#[derive(Debug, Default)]
pub(crate) struct TopicRegistry {
    topics: HashMap<Arc<str>, BTreeSet<AgentId>>,
}

impl TopicRegistry {
    /// Returns `true` if the agent was not subscribed yet.
    pub fn subscribe(&mut self, topic: &Arc<str>, agent: &AgentId) -> bool {
        self.topics
            .entry(topic.clone())
            .or_default()
            .insert(agent.clone())
    }

    /// Returns `true` if the agent was subscribed.
    pub fn unsubscribe(&mut self, topic: &str, agent: &str) -> bool {
        let Some(subscribers) = self.topics.get_mut(topic) else {
            return false;
        };
        let removed = subscribers.remove(agent);
        if subscribers.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }

    /// Remove the agent from every topic, returning the topics it left.
    pub fn remove_agent(&mut self, agent: &str) -> Vec<Arc<str>> {
        let mut left = Vec::new();
        self.topics.retain(|topic, subscribers| {
            if subscribers.remove(agent) {
                left.push(topic.clone());
            }
            !subscribers.is_empty()
        });
        left
    }

    /// Snapshot of the subscribers at call time.
    pub fn subscribers(&self, topic: &str) -> Vec<AgentId> {
        self.topics
            .get(topic)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, BTreeSet::len)
    }

    pub fn topics(&self) -> Vec<Arc<str>> {
        let mut topics: Vec<_> = self.topics.keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }
}
