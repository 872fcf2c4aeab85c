//! Messaging idioms built on [`Broker`](crate::Broker).
//!
//! Each type here holds a broker handle and maps its own vocabulary (requests,
//! topics, event types, workflow steps, routing rules, pool membership) onto
//! `send`, `subscribe_to_topic` and `register_handler`. None of them keeps
//! routing state of its own beyond what that vocabulary needs.

mod agent_pool;
mod event_bus;
mod pubsub;
mod request_response;
mod router;
mod workflow;

pub use agent_pool::{AgentPool, POOL_KEY};
pub use event_bus::{EVENT_TYPE_KEY, EventBus};
pub use pubsub::PubSub;
pub use request_response::RequestResponse;
pub use router::ConditionalRouter;
pub use workflow::{STEP_ID_KEY, WorkflowMessenger};
