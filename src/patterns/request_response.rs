use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::sync::oneshot;
use tracing::debug;

use crate::{
    AgentId, Broker, Envelope, EnvelopeId, Handler, HandlerId, MessageFilter, MessageKind,
    Payload, internal::lock,
};

type Pending<P> = Arc<Mutex<HashMap<EnvelopeId, oneshot::Sender<Envelope<P>>>>>;

/// Ask an agent something and wait for the answer.
///
/// `request` sends a [`Command`](MessageKind::Command) and parks until an
/// envelope with a matching `reply_to` is resolved, or the timeout passes.
/// `respond` hands an awaited answer straight to the waiting requester and
/// runs the broker's handlers on it. An answer nobody waits for any more is
/// enqueued in the requester's mailbox like any direct envelope. Answers sent
/// by other means are resolved by a [`Response`](MessageKind::Response) handler
/// this type registers on the broker.
///
/// Dropping the value unregisters its handler.
pub struct RequestResponse<P: Payload> {
    broker: Broker<P>,
    pending: Pending<P>,
    handler_id: HandlerId,
}

impl<P: Payload> RequestResponse<P> {
    pub fn new(broker: &Broker<P>) -> Self {
        let pending: Pending<P> = Arc::default();
        let waiting = pending.clone();
        let handler = Handler::new(
            MessageFilter::new().kind(MessageKind::Response),
            move |response: Envelope<P>| {
                let waiting = waiting.clone();
                async move {
                    let waiter = response
                        .meta
                        .reply_to()
                        .and_then(|id| lock(&waiting).remove(&id));
                    if let Some(waiter) = waiter {
                        // The requester may have timed out in the meantime.
                        let _ = waiter.send(response);
                    }
                    Ok(())
                }
            },
        )
        .with_description("request-response resolver");

        Self {
            handler_id: broker.register_handler(handler),
            broker: broker.clone(),
            pending,
        }
    }

    /// Send `content` from `from` to `to` and wait up to `timeout` for a reply.
    ///
    /// Returns `None` if the request could not be sent or nobody answered in
    /// time. The pending entry is removed either way.
    pub async fn request<F, T>(
        &self,
        from: F,
        to: T,
        content: P,
        timeout: Duration,
    ) -> Option<Envelope<P>>
    where
        F: Into<AgentId>,
        T: Into<AgentId>,
    {
        let request = Envelope::direct(from, to, content).with_kind(MessageKind::Command);
        let id = request.id();
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        if !self.broker.send(request) {
            lock(&self.pending).remove(&id);
            return None;
        }

        let outcome = tokio::time::timeout(timeout, rx).await;
        lock(&self.pending).remove(&id);
        match outcome {
            Ok(Ok(response)) => Some(response),
            _ => {
                debug!(request_id = %id, ?timeout, "Request got no response");
                None
            }
        }
    }

    /// Answer `request` with `content`.
    ///
    /// Returns `true` if the waiting requester got the answer, or if a late
    /// answer was enqueued in the requester's mailbox.
    pub async fn respond<F: Into<AgentId>>(
        &self,
        request: &Envelope<P>,
        from: F,
        content: P,
    ) -> bool {
        let mut response = Envelope::direct(from, request.sender().clone(), content)
            .with_kind(MessageKind::Response)
            .reply_to(request.id())
            .with_trace_id(request.meta.trace_id());
        if let Some(workflow_id) = request.workflow_id() {
            response = response.in_workflow(workflow_id);
        }

        let waiter = lock(&self.pending).remove(&request.id());
        let answered = match waiter {
            Some(waiter) => waiter.send(response.clone()).is_ok(),
            None => false,
        };
        if !answered && !self.broker.send(response.clone()) {
            return false;
        }
        self.broker.process_message_handlers(&mut response).await;
        true
    }

    /// Requests still waiting for an answer.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

impl<P: Payload> Drop for RequestResponse<P> {
    fn drop(&mut self) {
        self.broker.unregister_handler(self.handler_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    #[tokio::test]
    async fn answered_request_resolves() {
        let broker: Broker<String> = Broker::new(Config::default());
        let rr = Arc::new(RequestResponse::new(&broker));

        let responder = {
            let broker = broker.clone();
            let rr = rr.clone();
            tokio::spawn(async move {
                if let Some(request) = broker.receive("calc", Some(Duration::from_secs(1))).await {
                    let answer = format!("{}!", request.payload());
                    rr.respond(&request, "calc", answer).await;
                }
            })
        };

        let response = rr
            .request("client", "calc", "2+2".to_string(), Duration::from_secs(1))
            .await;
        assert!(responder.await.is_ok());

        let response = response.map(|r| (r.payload().clone(), r.kind()));
        assert_eq!(response, Some(("2+2!".to_string(), MessageKind::Response)));
        assert_eq!(rr.pending_count(), 0);
    }

    #[tokio::test]
    async fn unanswered_request_times_out_without_leaking() {
        let broker: Broker<String> = Broker::new(Config::default());
        let rr = RequestResponse::new(&broker);

        let response = rr
            .request("a", "b", "ping".to_string(), Duration::from_millis(20))
            .await;
        assert!(response.is_none());
        assert_eq!(rr.pending_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn answers_bypass_requester_mailbox() {
        let broker: Broker<String> = Broker::new(Config::default().with_mailbox_capacity(2));
        let rr = Arc::new(RequestResponse::new(&broker));

        let responder = {
            let broker = broker.clone();
            let rr = rr.clone();
            tokio::spawn(async move {
                let mut answered = Vec::new();
                for _ in 0..4 {
                    let Some(request) = broker
                        .receive("calc", Some(Duration::from_secs(1)))
                        .await
                    else {
                        break;
                    };
                    let answer = request.payload().to_uppercase();
                    answered.push(rr.respond(&request, "calc", answer).await);
                }
                answered
            })
        };

        let mut resolved = Vec::new();
        for word in ["one", "two", "three", "four"] {
            let response = rr
                .request("client", "calc", word.to_string(), Duration::from_secs(1))
                .await;
            resolved.push(response.map(|r| r.payload().clone()));
        }

        assert_eq!(responder.await.ok(), Some(vec![true, true, true, true]));
        assert_eq!(
            resolved,
            ["ONE", "TWO", "THREE", "FOUR"].map(|w| Some(w.to_string()))
        );
        assert_eq!(broker.queue_len("client"), 0);
        assert_eq!(rr.pending_count(), 0);
    }

    #[tokio::test]
    async fn drop_unregisters_resolver() {
        let broker: Broker<String> = Broker::new(Config::default());
        let rr = RequestResponse::new(&broker);
        assert_eq!(broker.handler_count(), 1);
        drop(rr);
        assert_eq!(broker.handler_count(), 0);
    }
}
