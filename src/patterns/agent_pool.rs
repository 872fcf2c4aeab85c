use std::sync::{
    Arc, RwLock,
    atomic::{AtomicUsize, Ordering},
};

use tracing::{debug, warn};

use crate::{
    AgentId, Broker, Envelope, Payload,
    internal::{read, write},
};

/// Metadata key naming the pool an envelope was dispatched through.
pub const POOL_KEY: &str = "pool";

/// A named group of interchangeable agents.
///
/// `submit` hands work to one member in round-robin order, skipping members
/// whose mailbox refuses it; `broadcast` gives every member a copy.
pub struct AgentPool<P: Payload> {
    broker: Broker<P>,
    name: Arc<str>,
    members: RwLock<Vec<AgentId>>,
    next: AtomicUsize,
}

impl<P: Payload> AgentPool<P> {
    /// Create a pool and register its members on the broker.
    pub fn new<N, I, M>(broker: &Broker<P>, name: N, members: I) -> Self
    where
        N: Into<Arc<str>>,
        I: IntoIterator<Item = M>,
        M: Into<AgentId>,
    {
        let pool = Self {
            broker: broker.clone(),
            name: name.into(),
            members: RwLock::new(Vec::new()),
            next: AtomicUsize::new(0),
        };
        for member in members {
            pool.add_member(member);
        }
        pool
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `false` if the agent already belongs to the pool.
    pub fn add_member<M: Into<AgentId>>(&self, agent: M) -> bool {
        let agent = agent.into();
        let mut members = write(&self.members);
        if members.contains(&agent) {
            return false;
        }
        self.broker.register_agent(agent.clone());
        debug!(pool = %self.name, agent = %agent, "Pool member added");
        members.push(agent);
        true
    }

    /// Leave the pool. The agent stays registered on the broker.
    pub fn remove_member(&self, agent: &str) -> bool {
        let mut members = write(&self.members);
        let before = members.len();
        members.retain(|m| m.name() != agent);
        before != members.len()
    }

    pub fn members(&self) -> Vec<AgentId> {
        read(&self.members).clone()
    }

    pub fn len(&self) -> usize {
        read(&self.members).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.members).is_empty()
    }

    /// Send `content` to the next member, returning who took it.
    pub fn submit<S: Into<AgentId>>(&self, sender: S, content: P) -> Option<AgentId> {
        let sender = sender.into();
        let content = Arc::new(content);
        let members = self.members();
        if members.is_empty() {
            warn!(pool = %self.name, "Submit to empty pool");
            return None;
        }

        let start = self.next.fetch_add(1, Ordering::Relaxed);
        for offset in 0..members.len() {
            let member = &members[(start + offset) % members.len()];
            if self.broker.send(self.envelope(&sender, &content, member)) {
                return Some(member.clone());
            }
        }
        None
    }

    /// Send a copy of `content` to every member, returning how many got one.
    pub fn broadcast<S: Into<AgentId>>(&self, sender: S, content: P) -> usize {
        let sender = sender.into();
        let content = Arc::new(content);
        self.members()
            .iter()
            .filter(|member| self.broker.send(self.envelope(&sender, &content, member)))
            .count()
    }

    fn envelope(&self, sender: &AgentId, content: &Arc<P>, member: &AgentId) -> Envelope<P> {
        Envelope::from_shared(sender.clone(), content.clone())
            .to(member.clone())
            .with_metadata(POOL_KEY, &*self.name)
    }
}
