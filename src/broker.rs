use std::{
    collections::HashMap,
    panic::AssertUnwindSafe,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use futures_util::{FutureExt, future::join_all};
use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::{
    AgentId, Config, Envelope, Error, Handler, HandlerId, MessageFilter, Payload, Result, Route,
    Status,
    internal::{
        History, Mailbox, Popped, StatsBook, Tick, TopicRegistry, lock, read, run_periodic, write,
    },
    meta::now,
    stats::{AgentStats, BrokerSnapshot, BrokerStats, TopicStats, WorkflowStats},
};

// Lock order when more than one is held: mailboxes, topics, stats, history.
struct BrokerState<P: Payload> {
    config: Config,
    mailboxes: RwLock<HashMap<AgentId, Arc<Mailbox<P>>>>,
    topics: Mutex<TopicRegistry>,
    handlers: RwLock<Vec<Handler<P>>>,
    history: Mutex<History<P>>,
    stats: Mutex<StatsBook>,
    cancel_token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl<P: Payload> BrokerState<P> {
    fn sweep(&self) {
        let at = now();
        let mailboxes: Vec<_> = read(&self.mailboxes).values().cloned().collect();
        let expired: usize = mailboxes.iter().map(|m| m.sweep_expired(at).len()).sum();
        if expired > 0 {
            lock(&self.stats).record_expired(expired);
        }
        let trimmed = lock(&self.history).trim();
        debug!(expired, trimmed, "Expiry sweep finished");
    }

    fn sample_throughput(&self, elapsed: Duration) {
        let rate = lock(&self.stats).sample_throughput(elapsed);
        trace!(messages_per_second = rate, "Throughput sampled");
    }
}

impl<P: Payload> Drop for BrokerState<P> {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// The message broker: agent mailboxes, topic routing, handlers, history and
/// statistics behind one cheaply cloneable handle.
///
/// - `send(envelope)` routes by precedence: broadcast, topic, direct recipient.
/// - `receive(agent, timeout)` pops the most urgent live envelope, waiting if
///   the mailbox is empty.
/// - `register_handler(handler)` + `process_message_handlers(&mut envelope)`
///   runs filter-gated callbacks concurrently.
/// - `start()` spawns the expiry sweep and throughput sampler; `shutdown()`
///   stops them and wakes every pending `receive`.
///
/// Every clone shares the same state. Sends and receives may run concurrently
/// from any number of tasks.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use switchboard::{Broker, Config, Envelope};
///
/// # #[tokio::main]
/// # async fn main() -> switchboard::Result<()> {
/// let broker = Broker::<String>::new(Config::default());
/// broker.start().await?;
///
/// broker.register_agent("coder");
/// broker.send(Envelope::direct("planner", "coder", "write tests".to_string()));
///
/// let envelope = broker.receive("coder", Some(Duration::from_secs(1))).await;
/// assert_eq!(envelope.map(|e| e.payload().clone()), Some("write tests".into()));
///
/// broker.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Broker<P: Payload> {
    state: Arc<BrokerState<P>>,
}

impl<P: Payload> Clone for Broker<P> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<P: Payload> Default for Broker<P> {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<P: Payload> Broker<P> {
    /// Create a broker. Background maintenance begins with [`start`](Self::start).
    pub fn new(config: Config) -> Self {
        let history = History::new(config.max_history);
        Self {
            state: Arc::new(BrokerState {
                config,
                mailboxes: RwLock::new(HashMap::new()),
                topics: Mutex::new(TopicRegistry::default()),
                handlers: RwLock::new(Vec::new()),
                history: Mutex::new(history),
                stats: Mutex::new(StatsBook::new()),
                cancel_token: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.state.config
    }

    /// Spawn the expiry sweep and throughput sampler. Calling it again is a no-op.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(&self) -> Result<()> {
        if self.state.cancel_token.is_cancelled() {
            return Err(Error::ShuttingDown);
        }
        if self.state.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let config = &self.state.config;
        let weak = Arc::downgrade(&self.state);
        let sweep = tokio::spawn(run_periodic(
            "expiry-sweep",
            config.sweep_interval,
            self.state.cancel_token.clone(),
            move |_| match weak.upgrade() {
                Some(state) => {
                    state.sweep();
                    Tick::Continue
                }
                None => Tick::Stop,
            },
        ));

        let weak = Arc::downgrade(&self.state);
        let sampler = tokio::spawn(run_periodic(
            "throughput-sampler",
            config.stats_interval,
            self.state.cancel_token.clone(),
            move |elapsed| match weak.upgrade() {
                Some(state) => {
                    state.sample_throughput(elapsed);
                    Tick::Continue
                }
                None => Tick::Stop,
            },
        ));

        lock(&self.state.tasks).extend([sweep, sampler]);
        debug!(
            sweep_interval = ?config.sweep_interval,
            stats_interval = ?config.stats_interval,
            "Broker started"
        );
        Ok(())
    }

    /// Stop background maintenance and wake every pending `receive`.
    ///
    /// Envelopes already queued can still be taken with `try_receive`; new sends
    /// are refused. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        self.state.cancel_token.cancel();
        let tasks = std::mem::take(&mut *lock(&self.state.tasks));
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Maintenance task ended abnormally");
            }
        }
        debug!("Broker shut down");
    }

    pub fn is_running(&self) -> bool {
        self.state.started.load(Ordering::Acquire) && !self.state.cancel_token.is_cancelled()
    }

    /// Create a mailbox for `agent`. Returns `false` if it already had one.
    pub fn register_agent<N: Into<AgentId>>(&self, agent: N) -> bool {
        let (_, created) = self.ensure_mailbox(&agent.into());
        created
    }

    /// Remove the agent's mailbox, subscriptions and statistics.
    ///
    /// Queued envelopes are discarded and a pending `receive` on the mailbox
    /// returns `None`. Returns `false` if the agent was not registered.
    pub fn unregister_agent(&self, agent: &str) -> bool {
        let mut mailboxes = write(&self.state.mailboxes);
        let Some(mailbox) = mailboxes.remove(agent) else {
            return false;
        };
        mailbox.close();

        let mut topics = lock(&self.state.topics);
        let left = topics.remove_agent(agent);
        let mut stats = lock(&self.state.stats);
        for topic in &left {
            stats.unsubscribed(topic, agent, topics.subscriber_count(topic));
        }
        stats.agent_unregistered(agent);

        debug!(agent, discarded = mailbox.len(), "Agent unregistered");
        true
    }

    pub fn is_registered(&self, agent: &str) -> bool {
        read(&self.state.mailboxes).contains_key(agent)
    }

    /// Registered agents, sorted by name.
    pub fn agents(&self) -> Vec<AgentId> {
        let mut agents: Vec<_> = read(&self.state.mailboxes).keys().cloned().collect();
        agents.sort();
        agents
    }

    /// Subscribe `agent` to `topic`, registering the agent if needed.
    ///
    /// Returns `false` if the agent was already subscribed.
    pub fn subscribe_to_topic<N, T>(&self, agent: N, topic: T) -> bool
    where
        N: Into<AgentId>,
        T: Into<Arc<str>>,
    {
        let agent = agent.into();
        let topic = topic.into();
        let mut mailboxes = write(&self.state.mailboxes);
        self.insert_mailbox(&mut mailboxes, &agent);

        let mut topics = lock(&self.state.topics);
        if !topics.subscribe(&topic, &agent) {
            return false;
        }
        lock(&self.state.stats).subscribed(&topic, &agent, topics.subscriber_count(&topic));
        debug!(agent = %agent, topic = %topic, "Subscribed");
        true
    }

    /// Drop a subscription, registering the agent if needed. A topic without
    /// subscribers ceases to exist.
    ///
    /// Returns `false` if the agent was not subscribed.
    pub fn unsubscribe_from_topic<N: Into<AgentId>>(&self, agent: N, topic: &str) -> bool {
        let agent = agent.into();
        let mut mailboxes = write(&self.state.mailboxes);
        self.insert_mailbox(&mut mailboxes, &agent);

        let mut topics = lock(&self.state.topics);
        if !topics.unsubscribe(topic, &agent) {
            return false;
        }
        lock(&self.state.stats).unsubscribed(topic, &agent, topics.subscriber_count(topic));
        debug!(agent = %agent, topic, "Unsubscribed");
        true
    }

    /// Topics with at least one subscriber, sorted.
    pub fn topics(&self) -> Vec<Arc<str>> {
        lock(&self.state.topics).topics()
    }

    /// Snapshot of the topic's subscribers, sorted.
    pub fn subscribers(&self, topic: &str) -> Vec<AgentId> {
        lock(&self.state.topics).subscribers(topic)
    }

    /// Route an envelope. Returns `true` iff at least one copy was enqueued.
    ///
    /// Failures are logged; use [`try_send`](Self::try_send) to inspect them.
    pub fn send(&self, envelope: Envelope<P>) -> bool {
        match self.try_send(envelope) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Send failed");
                false
            }
        }
    }

    /// Route an envelope, returning how many copies were enqueued.
    ///
    /// Broadcast goes to every registered agent except the sender and topic
    /// envelopes go to the current subscribers; both succeed if at least one
    /// copy is enqueued. A direct envelope registers its recipient if needed
    /// and succeeds only if that single enqueue does.
    ///
    /// Every envelope that gets past validation is recorded in history with its
    /// final status, `Sent` or `Failed`.
    pub fn try_send(&self, mut envelope: Envelope<P>) -> Result<usize> {
        let id = envelope.id();
        if self.state.cancel_token.is_cancelled() {
            return Err(Error::ShuttingDown);
        }
        let Some(route) = envelope.route() else {
            envelope.advance(Status::Failed);
            lock(&self.state.stats).record_failed();
            return Err(Error::NoRoute(id));
        };
        if envelope.is_expired() {
            envelope.advance(Status::Expired);
            lock(&self.state.stats).record_expired(1);
            return Err(Error::Expired(id));
        }

        envelope.advance(Status::Sent);
        lock(&self.state.stats).record_sent(&envelope);

        let outcome = match route {
            Route::Broadcast => {
                let recipients: Vec<_> = self
                    .agents()
                    .into_iter()
                    .filter(|agent| agent != envelope.sender())
                    .collect();
                self.fan_out(&envelope, &recipients)
            }
            Route::Topic(topic) => {
                let recipients = lock(&self.state.topics).subscribers(&topic);
                let outcome = self.fan_out(&envelope, &recipients);
                if outcome.is_ok() {
                    lock(&self.state.stats).record_topic_message(&topic);
                }
                outcome
            }
            Route::Direct(recipient) => {
                let mailbox = self.ensure_mailbox(&recipient).0;
                self.enqueue(&mailbox, envelope.clone()).map(|()| 1)
            }
        };

        match &outcome {
            Ok(copies) => trace!(envelope_id = %id, copies, "Envelope sent"),
            Err(_) => {
                envelope.advance(Status::Failed);
                lock(&self.state.stats).record_failed();
            }
        }
        if self.state.config.history_enabled {
            lock(&self.state.history).push(envelope);
        }
        outcome
    }

    fn fan_out(&self, envelope: &Envelope<P>, recipients: &[AgentId]) -> Result<usize> {
        let mut enqueued = 0;
        for recipient in recipients {
            // Fan-out never re-registers an agent that left after the snapshot.
            let mailbox = read(&self.state.mailboxes).get(recipient).cloned();
            let result = match mailbox {
                Some(mailbox) => self.enqueue(&mailbox, envelope.copy_for(recipient)),
                None => Err(Error::UnknownAgent(recipient.clone())),
            };
            match result {
                Ok(()) => enqueued += 1,
                Err(e) => warn!(
                    envelope_id = %envelope.id(),
                    recipient = %recipient,
                    error = %e,
                    "Copy not delivered"
                ),
            }
        }
        if enqueued == 0 {
            return Err(Error::Undelivered(envelope.id()));
        }
        Ok(enqueued)
    }

    fn enqueue(&self, mailbox: &Mailbox<P>, envelope: Envelope<P>) -> Result<()> {
        let workflow_id = envelope.meta.workflow_id.clone();
        mailbox.push(envelope)?;
        lock(&self.state.stats).record_enqueued(mailbox.owner(), workflow_id.as_ref());
        Ok(())
    }

    /// Take the most urgent live envelope from the agent's mailbox, registering
    /// the agent if needed.
    ///
    /// Waits up to `timeout` (forever with `None`) for one to arrive. Returns
    /// `None` on timeout, on shutdown, or when the agent is unregistered while
    /// waiting. Expired envelopes are discarded on the way.
    pub async fn receive<N: Into<AgentId>>(
        &self,
        agent: N,
        timeout: Option<Duration>,
    ) -> Option<Envelope<P>> {
        let agent = agent.into();
        let mailbox = self.ensure_mailbox(&agent).0;
        let deadline = timeout.map(|t| Instant::now() + t);
        let popped = mailbox.pop(deadline, &self.state.cancel_token).await;
        self.delivered(&agent, popped)
    }

    /// Non-blocking [`receive`](Self::receive).
    pub fn try_receive<N: Into<AgentId>>(&self, agent: N) -> Option<Envelope<P>> {
        let agent = agent.into();
        let mailbox = self.ensure_mailbox(&agent).0;
        let popped = mailbox.try_pop();
        self.delivered(&agent, popped)
    }

    fn delivered(&self, agent: &AgentId, popped: Popped<P>) -> Option<Envelope<P>> {
        let mut stats = lock(&self.state.stats);
        if popped.expired > 0 {
            stats.record_expired(popped.expired);
            debug!(agent = %agent, expired = popped.expired, "Expired envelopes discarded");
        }
        let mut envelope = popped.envelope?;
        envelope.advance(Status::Delivered);
        stats.record_received(agent);
        Some(envelope)
    }

    /// Discard every envelope queued for `agent`, returning how many there were.
    pub fn clear_agent_queue(&self, agent: &str) -> usize {
        let Some(mailbox) = read(&self.state.mailboxes).get(agent).cloned() else {
            return 0;
        };
        let discarded = mailbox.clear();
        debug!(agent, discarded, "Mailbox cleared");
        discarded
    }

    pub fn queue_len(&self, agent: &str) -> usize {
        read(&self.state.mailboxes)
            .get(agent)
            .map_or(0, |mailbox| mailbox.len())
    }

    pub fn register_handler(&self, handler: Handler<P>) -> HandlerId {
        let id = handler.id();
        debug!(handler = %handler.label(), "Handler registered");
        write(&self.state.handlers).push(handler);
        id
    }

    /// Returns `false` if no handler has this id.
    pub fn unregister_handler(&self, id: HandlerId) -> bool {
        let mut handlers = write(&self.state.handlers);
        let before = handlers.len();
        handlers.retain(|h| h.id() != id);
        before != handlers.len()
    }

    pub fn handler_count(&self) -> usize {
        read(&self.state.handlers).len()
    }

    /// Run every handler whose filter matches, concurrently.
    ///
    /// Each handler gets its own clone of the envelope. Errors and panics are
    /// logged and counted, never propagated. If at least one handler succeeds
    /// the envelope becomes `Processed`. Returns how many handlers succeeded.
    pub async fn process_message_handlers(&self, envelope: &mut Envelope<P>) -> usize {
        let matching: Vec<_> = read(&self.state.handlers)
            .iter()
            .filter(|h| h.matches(envelope))
            .cloned()
            .collect();
        if matching.is_empty() {
            return 0;
        }

        let runs = matching.iter().map(|handler| {
            let copy = envelope.clone();
            async move {
                let outcome = AssertUnwindSafe(async { handler.invoke(copy).await })
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(Error::HandlerFailed(handler.label(), e.to_string().into())),
                    Err(_) => Err(Error::HandlerPanicked(handler.label())),
                }
            }
        });
        let results = join_all(runs).await;

        let mut succeeded = 0;
        let mut failed = 0;
        for result in results {
            match result {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    failed += 1;
                    error!(envelope_id = %envelope.id(), error = %e, "Handler failed");
                }
            }
        }

        let mut stats = lock(&self.state.stats);
        if failed > 0 {
            stats.record_handler_errors(failed);
        }
        if succeeded > 0 && envelope.mark_processed() {
            stats.record_processed();
        }
        succeeded
    }

    /// Sent envelopes matching `filter`, oldest first. Empty when history is
    /// disabled.
    pub fn get_messages(&self, filter: &MessageFilter) -> Vec<Envelope<P>> {
        if !self.state.config.history_enabled {
            return Vec::new();
        }
        lock(&self.state.history).query(filter)
    }

    pub fn history_len(&self) -> usize {
        lock(&self.state.history).len()
    }

    pub fn clear_history(&self) {
        lock(&self.state.history).clear();
    }

    /// Write the history as JSON Lines, returning how many envelopes were written.
    #[cfg(feature = "serde")]
    pub fn export_history<W: std::io::Write>(&self, writer: W) -> Result<usize>
    where
        P: serde::Serialize,
    {
        lock(&self.state.history).write_jsonl(writer)
    }

    pub fn broker_stats(&self) -> BrokerStats {
        let mut stats = lock(&self.state.stats).broker();
        stats.active_agents = read(&self.state.mailboxes).len();
        stats.active_topics = lock(&self.state.topics).len();
        stats.registered_handlers = read(&self.state.handlers).len();
        stats.history_size = lock(&self.state.history).len();
        stats
    }

    pub fn agent_stats(&self, agent: &str) -> Option<AgentStats> {
        let mut stats = lock(&self.state.stats).agent(agent)?;
        stats.queue_depth = self.queue_len(agent);
        Some(stats)
    }

    pub fn topic_stats(&self, topic: &str) -> Option<TopicStats> {
        lock(&self.state.stats).topic(topic)
    }

    pub fn workflow_stats(&self, workflow_id: &str) -> Option<WorkflowStats> {
        lock(&self.state.stats).workflow(workflow_id)
    }

    /// Broker statistics plus every registered agent's statistics.
    pub fn snapshot(&self) -> BrokerSnapshot {
        let agents = self
            .agents()
            .iter()
            .filter_map(|agent| self.agent_stats(agent))
            .collect();
        BrokerSnapshot {
            timestamp: now(),
            stats: self.broker_stats(),
            agents,
        }
    }

    fn ensure_mailbox(&self, agent: &AgentId) -> (Arc<Mailbox<P>>, bool) {
        if let Some(mailbox) = read(&self.state.mailboxes).get(agent) {
            return (mailbox.clone(), false);
        }

        self.insert_mailbox(&mut write(&self.state.mailboxes), agent)
    }

    /// Mailbox creation and agent stats happen under the caller's write guard,
    /// so `unregister_agent` never sees one without the other.
    fn insert_mailbox(
        &self,
        mailboxes: &mut HashMap<AgentId, Arc<Mailbox<P>>>,
        agent: &AgentId,
    ) -> (Arc<Mailbox<P>>, bool) {
        if let Some(mailbox) = mailboxes.get(agent) {
            return (mailbox.clone(), false);
        }
        let capacity = self.state.config.mailbox_capacity;
        let mailbox = Arc::new(Mailbox::new(agent.clone(), capacity));
        mailboxes.insert(agent.clone(), mailbox.clone());
        lock(&self.state.stats).agent_registered(agent);
        debug!(agent = %agent, "Agent registered");
        (mailbox, true)
    }
}
