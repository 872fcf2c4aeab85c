use std::{borrow::Borrow, hash::Hash, ops::Deref, sync::Arc};

/// Name of an agent known to the broker.
///
/// A cheap, cloneable handle around an `Arc<str>`. Mailboxes, topic subscriber
/// sets and statistics are all keyed by `AgentId`, and it borrows as `str` so
/// lookups by plain name work without allocating.
///
/// # Example
///
/// ```rust
/// use switchboard::AgentId;
///
/// let planner = AgentId::from("planner");
/// assert_eq!(planner.name(), "planner");
/// assert_eq!(planner, AgentId::from(String::from("planner")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AgentId(Arc<str>);

impl AgentId {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Returns the agent's name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Hash for AgentId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Deref for AgentId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<str> for AgentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentId {
    fn from(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl From<String> for AgentId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&AgentId> for AgentId {
    fn from(id: &AgentId) -> Self {
        id.clone()
    }
}

impl From<Arc<str>> for AgentId {
    fn from(name: Arc<str>) -> Self {
        Self(name)
    }
}
