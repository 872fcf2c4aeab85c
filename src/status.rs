use std::fmt;

/// Lifecycle state of an envelope.
///
/// ```text
/// Created → Sent → Delivered → Read → Processed
///    └───────┴─────────┴────────┴──────────┴──→ Failed | Expired
/// ```
///
/// Status only moves forward. `Failed` and `Expired` are terminal: once
/// reached, nothing about the envelope's delivery changes any more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Status {
    #[default]
    Created,
    Sent,
    Delivered,
    Read,
    Processed,
    Failed,
    Expired,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Failed | Status::Expired)
    }

    fn rank(&self) -> u8 {
        match self {
            Status::Created => 0,
            Status::Sent => 1,
            Status::Delivered => 2,
            Status::Read => 3,
            Status::Processed => 4,
            Status::Failed | Status::Expired => 5,
        }
    }

    /// Whether moving from `self` to `next` is a forward transition.
    pub fn can_advance_to(&self, next: Status) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Created => "created",
            Status::Sent => "sent",
            Status::Delivered => "delivered",
            Status::Read => "read",
            Status::Processed => "processed",
            Status::Failed => "failed",
            Status::Expired => "expired",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_only() {
        assert!(Status::Created.can_advance_to(Status::Sent));
        assert!(Status::Sent.can_advance_to(Status::Processed));
        assert!(!Status::Delivered.can_advance_to(Status::Sent));
        assert!(!Status::Read.can_advance_to(Status::Read));
    }

    #[test]
    fn terminal_states_are_final() {
        assert!(Status::Delivered.can_advance_to(Status::Expired));
        assert!(!Status::Expired.can_advance_to(Status::Failed));
        assert!(!Status::Failed.can_advance_to(Status::Processed));
    }
}
