use std::sync::Arc;

use crate::{
    AgentId, Broker, Envelope, MessageFilter, MessageKind, Payload, stats::WorkflowStats,
};

/// Metadata key carrying the workflow step of an envelope.
pub const STEP_ID_KEY: &str = "step_id";

/// Workflow-correlated messaging: every step carries its workflow id and step
/// id, so history and statistics can be read per workflow.
pub struct WorkflowMessenger<P: Payload> {
    broker: Broker<P>,
}

impl<P: Payload> WorkflowMessenger<P> {
    pub fn new(broker: &Broker<P>) -> Self {
        Self {
            broker: broker.clone(),
        }
    }

    /// Hand a step to one agent.
    pub fn send_step<W, F, T>(
        &self,
        workflow_id: W,
        step_id: &str,
        from: F,
        to: T,
        content: P,
    ) -> bool
    where
        W: Into<Arc<str>>,
        F: Into<AgentId>,
        T: Into<AgentId>,
    {
        let envelope = Envelope::direct(from, to, content)
            .with_kind(MessageKind::Workflow)
            .in_workflow(workflow_id)
            .with_metadata(STEP_ID_KEY, step_id);
        self.broker.send(envelope)
    }

    /// Announce a step to every registered agent except the sender.
    pub fn broadcast_step<W, F>(&self, workflow_id: W, step_id: &str, from: F, content: P) -> bool
    where
        W: Into<Arc<str>>,
        F: Into<AgentId>,
    {
        let envelope = Envelope::broadcast(from, content)
            .in_workflow(workflow_id)
            .with_metadata(STEP_ID_KEY, step_id);
        self.broker.send(envelope)
    }

    /// Every retained envelope of the workflow, oldest first.
    pub fn history(&self, workflow_id: &str) -> Vec<Envelope<P>> {
        let filter = MessageFilter::new().workflow(workflow_id);
        self.broker.get_messages(&filter)
    }

    pub fn stats(&self, workflow_id: &str) -> Option<WorkflowStats> {
        self.broker.workflow_stats(workflow_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn steps_are_correlated() {
        let broker: Broker<String> = Broker::default();
        let workflow = WorkflowMessenger::new(&broker);
        broker.register_agent("planner");
        broker.register_agent("reviewer");

        assert!(workflow.send_step("wf-1", "plan", "lead", "planner", "draft".into()));
        assert!(workflow.broadcast_step("wf-1", "review", "planner", "ready".into()));
        assert!(workflow.send_step("wf-2", "plan", "lead", "planner", "other".into()));

        let history = workflow.history("wf-1");
        let steps: Vec<_> = history
            .iter()
            .filter_map(|e| e.meta.get(STEP_ID_KEY))
            .collect();

        assert_eq!(steps, vec!["plan", "review"]);

        let stats = workflow.stats("wf-1");
        assert_eq!(stats.as_ref().map(|s| s.message_count), Some(2));
        let participants: Vec<_> = stats
            .map(|s| s.participants.into_iter().map(|p| p.to_string()).collect())
            .unwrap_or_default();
        assert_eq!(participants, vec!["lead", "planner", "reviewer"]);
    }
}
