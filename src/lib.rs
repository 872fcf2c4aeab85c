//! Switchboard: an in-process message broker for cooperating agents
//!
//! Agents are named mailboxes. Envelopes travel between them directly, through
//! topics or as broadcasts, are delivered in priority order and may expire on
//! the way. Filter-gated handlers, a bounded message history and live
//! statistics sit alongside, and the [`patterns`] module layers
//! request/response, pub/sub, event bus, workflow, routing and pool idioms on
//! top of the same [`Broker`].
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use switchboard::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> switchboard::Result<()> {
//! let broker = Broker::<String>::default();
//! broker.start().await?;
//!
//! broker.subscribe_to_topic("auditor", "deployments");
//! broker.send(Envelope::topic("release-bot", "deployments", "v1.4.2 is live".into()));
//!
//! if let Some(envelope) = broker.receive("auditor", Some(Duration::from_secs(1))).await {
//!     println!("{} says {}", envelope.sender(), envelope.payload());
//! }
//! broker.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod agent_id;
mod broker;
mod config;
mod envelope;
mod error;
mod filter;
mod handler;
mod internal;
mod kind;
mod meta;
mod payload;
mod priority;
mod status;

pub mod patterns;
pub mod stats;

pub use agent_id::AgentId;
pub use broker::Broker;
pub use config::Config;
pub use envelope::{Envelope, Route};
pub use error::Error;
pub use filter::MessageFilter;
pub use handler::{Handler, HandlerId};
pub use kind::MessageKind;
pub use meta::{Meta, Timestamp, now};
pub use payload::Payload;
pub use priority::Priority;
pub use status::Status;

#[cfg(feature = "macros")]
pub use switchboard_macros::Payload;

pub type Result<T = ()> = std::result::Result<T, Error>;

/// Unique envelope identifier.
pub type EnvelopeId = u128;

pub mod prelude {
    pub use crate::{
        AgentId, Broker, Config, Envelope, Error as SwitchboardError, Handler, MessageFilter,
        MessageKind, Payload, Priority, Status,
    };
}
