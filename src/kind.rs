use std::fmt;

/// What an envelope is for.
///
/// The broker only treats [`MessageKind::Broadcast`] specially (it routes to
/// every registered agent except the sender). All other kinds are routing-neutral
/// labels that filters, handlers and the higher-level patterns key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MessageKind {
    #[default]
    Text,
    Command,
    Event,
    Workflow,
    Response,
    Error,
    Broadcast,
    System,
    Ping,
    Ack,
}

impl MessageKind {
    pub const ALL: [MessageKind; 10] = [
        MessageKind::Text,
        MessageKind::Command,
        MessageKind::Event,
        MessageKind::Workflow,
        MessageKind::Response,
        MessageKind::Error,
        MessageKind::Broadcast,
        MessageKind::System,
        MessageKind::Ping,
        MessageKind::Ack,
    ];

    pub fn is_broadcast(&self) -> bool {
        matches!(self, MessageKind::Broadcast)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Command => "command",
            MessageKind::Event => "event",
            MessageKind::Workflow => "workflow",
            MessageKind::Response => "response",
            MessageKind::Error => "error",
            MessageKind::Broadcast => "broadcast",
            MessageKind::System => "system",
            MessageKind::Ping => "ping",
            MessageKind::Ack => "ack",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
