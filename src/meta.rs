use std::{collections::HashMap, sync::Arc, time::SystemTime};

use uuid::Uuid;

use crate::{AgentId, EnvelopeId};

/// Nanoseconds since Unix epoch (truncated to `u64`).
pub type Timestamp = u64;

/// Current wall-clock time as a [`Timestamp`].
///
/// A clock set before the Unix epoch reads as `0`.
pub fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

pub(crate) fn new_id() -> EnvelopeId {
    Uuid::new_v4().as_u128()
}

/// Identity and correlation data attached to every envelope.
///
/// - `id`: unique identifier, regenerated for each fan-out copy.
/// - `created_at`: construction time, shared by an original and its copies.
/// - `sender`: agent the envelope originates from.
/// - `trace_id`: cross-cutting tracing id, fresh unless set explicitly.
/// - `workflow_id`: optional id grouping envelopes into one logical workflow.
/// - `reply_to`: id of the envelope this one answers.
/// - `metadata`: open string map for extension fields (event type, step id, ...).
///
/// The broker routes and aggregates statistics on `sender` and `workflow_id`.
/// `trace_id`, `reply_to` and `metadata` carry no meaning for the broker
/// itself; patterns and handlers interpret them.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Meta {
    id: EnvelopeId,
    created_at: Timestamp,
    sender: AgentId,
    trace_id: u128,
    pub(crate) workflow_id: Option<Arc<str>>,
    pub(crate) reply_to: Option<EnvelopeId>,
    pub(crate) metadata: HashMap<String, String>,
}

impl Meta {
    /// Construct metadata for the given sender with fresh id and trace id.
    pub fn new(sender: AgentId) -> Self {
        Self {
            id: new_id(),
            created_at: now(),
            sender,
            trace_id: new_id(),
            workflow_id: None,
            reply_to: None,
            metadata: HashMap::new(),
        }
    }

    /// Same metadata under a new id, used for per-recipient copies.
    pub(crate) fn renewed(&self) -> Self {
        Self {
            id: new_id(),
            ..self.clone()
        }
    }

    /// Unique identifier for this envelope.
    pub fn id(&self) -> EnvelopeId {
        self.id
    }

    /// Creation time in nanoseconds since Unix epoch.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Agent that sent the envelope.
    pub fn sender(&self) -> &AgentId {
        &self.sender
    }

    pub fn trace_id(&self) -> u128 {
        self.trace_id
    }

    pub(crate) fn set_trace_id(&mut self, trace_id: u128) {
        self.trace_id = trace_id;
    }

    pub fn workflow_id(&self) -> Option<&str> {
        self.workflow_id.as_deref()
    }

    pub fn reply_to(&self) -> Option<EnvelopeId> {
        self.reply_to
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Single metadata value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renewed_keeps_everything_but_id() {
        let mut meta = Meta::new(AgentId::from("a"));
        meta.workflow_id = Some(Arc::from("wf-1"));
        meta.metadata.insert("step_id".into(), "s1".into());

        let copy = meta.renewed();
        assert_ne!(copy.id(), meta.id());
        assert_eq!(copy.created_at(), meta.created_at());
        assert_eq!(copy.trace_id(), meta.trace_id());
        assert_eq!(copy.workflow_id(), Some("wf-1"));
        assert_eq!(copy.get("step_id"), Some("s1"));
    }

    #[test]
    fn trace_id_defaults_to_fresh_value() {
        let a = Meta::new(AgentId::from("a"));
        let b = Meta::new(AgentId::from("a"));
        assert_ne!(a.trace_id(), b.trace_id());
        assert_ne!(a.trace_id(), a.id());
    }
}
