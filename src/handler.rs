use std::{fmt, future::Future, sync::Arc};

use futures_util::future::BoxFuture;

use crate::{Envelope, MessageFilter, Payload, Result, meta::new_id};

pub type HandlerId = u128;

type Callback<P> = Arc<dyn Fn(Envelope<P>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A filter-gated async callback.
///
/// Handlers run when [`Broker::process_message_handlers`](crate::Broker::process_message_handlers)
/// is called with an envelope their filter matches. They are independent of the
/// mailbox pull model: a handler sees an envelope whether or not anyone
/// `receive`s it.
///
/// The callback gets its own clone of the envelope (payload shared). Returning
/// `Err` or panicking is contained by the broker and only affects this handler's
/// success count.
///
/// # Example
///
/// ```rust
/// use switchboard::{Handler, MessageFilter, MessageKind};
///
/// let audit = Handler::<String>::new(MessageFilter::new().kind(MessageKind::Error), |envelope| async move {
///     tracing::warn!(from = %envelope.sender(), "error reported");
///     Ok(())
/// })
/// .with_description("log every error envelope");
/// ```
pub struct Handler<P: Payload> {
    id: HandlerId,
    filter: MessageFilter,
    description: Arc<str>,
    callback: Callback<P>,
}

impl<P: Payload> Handler<P> {
    pub fn new<F, Fut>(filter: MessageFilter, callback: F) -> Self
    where
        F: Fn(Envelope<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            id: new_id(),
            filter,
            description: Arc::from(""),
            callback: Arc::new(move |envelope| Box::pin(callback(envelope))),
        }
    }

    pub fn with_description<D: Into<Arc<str>>>(mut self, description: D) -> Self {
        self.description = description.into();
        self
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn filter(&self) -> &MessageFilter {
        &self.filter
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn label(&self) -> Arc<str> {
        if self.description.is_empty() {
            Arc::from(self.id.to_string())
        } else {
            self.description.clone()
        }
    }

    pub fn matches(&self, envelope: &Envelope<P>) -> bool {
        self.filter.matches(envelope)
    }

    pub(crate) fn invoke(&self, envelope: Envelope<P>) -> BoxFuture<'static, Result<()>> {
        (self.callback)(envelope)
    }
}

impl<P: Payload> Clone for Handler<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            filter: self.filter.clone(),
            description: self.description.clone(),
            callback: self.callback.clone(),
        }
    }
}

impl<P: Payload> fmt::Debug for Handler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
