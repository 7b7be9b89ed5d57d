//! The outbound result of processing a request.

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::AbortHandle;
use futures::stream::Abortable;
use http::HeaderMap;
use http::StatusCode;
use parking_lot::Mutex;

use crate::graphql;
use crate::graphql::ResponseStream;

/// What the transport layer should send back for one request.
///
/// Exactly one variant is produced per request.
#[derive(Debug)]
pub enum ProcessRequestResult {
    /// A single response: a one-shot result or a request failure.
    Response(Response),
    /// An incremental (`@defer`/`@stream`) result of a query or mutation.
    MultipartResponse(ResponseSubscription),
    /// The event feed of a subscription.
    Push(ResponseSubscription),
}

impl ProcessRequestResult {
    /// The single response, if this is one.
    pub fn into_response(self) -> Option<Response> {
        match self {
            ProcessRequestResult::Response(response) => Some(response),
            ProcessRequestResult::MultipartResponse(_) | ProcessRequestResult::Push(_) => None,
        }
    }

    /// The subscription handle of a multipart or push result.
    pub fn into_subscription(self) -> Option<ResponseSubscription> {
        match self {
            ProcessRequestResult::Response(_) => None,
            ProcessRequestResult::MultipartResponse(subscription)
            | ProcessRequestResult::Push(subscription) => Some(subscription),
        }
    }
}

/// A single response with its transport metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub payload: graphql::Response,
}

impl Response {
    /// A 200 response carrying an execution result.
    pub(crate) fn ok(payload: graphql::Response) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            payload,
        }
    }
}

/// A handle on a lazy sequence of responses.
///
/// [`subscribe`](Self::subscribe) pulls responses one at a time, and
/// [`unsubscribe`](Self::unsubscribe) stops the sequence and releases it. Clones
/// share the same sequence, so one task can consume it while another cancels it.
#[derive(Clone)]
pub struct ResponseSubscription {
    inner: Arc<Inner>,
}

struct Inner {
    stream: Mutex<Option<Abortable<ResponseStream>>>,
    abort_handle: AbortHandle,
}

impl ResponseSubscription {
    pub(crate) fn new(stream: ResponseStream) -> Self {
        let (abort_handle, abort_registration) = AbortHandle::new_pair();
        Self {
            inner: Arc::new(Inner {
                stream: Mutex::new(Some(Abortable::new(stream, abort_registration))),
                abort_handle,
            }),
        }
    }

    /// Calls `on_result` with every response, in order, and returns once the sequence
    /// is exhausted or unsubscribed.
    ///
    /// The next response is only requested after `on_result` returned. A sequence can
    /// only be consumed once: later calls return immediately.
    pub async fn subscribe<F>(&self, mut on_result: F)
    where
        F: FnMut(graphql::Response),
    {
        let Some(mut stream) = self.inner.stream.lock().take() else {
            tracing::debug!("response stream already consumed");
            return;
        };

        while let Some(response) = stream.next().await {
            on_result(response);
        }

        tracing::debug!(
            unsubscribed = self.is_unsubscribed(),
            "response stream ended"
        );
    }

    /// Stops the sequence. Pending and future [`subscribe`](Self::subscribe) calls
    /// return without delivering any more responses.
    ///
    /// Calling it more than once, before subscribing or after the end of the sequence
    /// is fine.
    pub fn unsubscribe(&self) {
        self.inner.abort_handle.abort();
        // not consumed yet: release it now
        drop(self.inner.stream.lock().take());
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.inner.abort_handle.is_aborted()
    }
}

impl fmt::Debug for ResponseSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseSubscription")
            .field("unsubscribed", &self.is_unsubscribed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;

    use futures::Stream;
    use futures::channel::mpsc;
    use pretty_assertions::assert_eq;
    use serde_json_bytes::json;
    use test_log::test;

    use super::*;

    fn response(index: usize) -> graphql::Response {
        graphql::Response::builder()
            .data(json!({ "count": index }))
            .build()
    }

    fn responses(count: usize) -> ResponseStream {
        Box::pin(futures::stream::iter((0..count).map(response)))
    }

    /// Sets its flag when dropped.
    struct DropGuard(Arc<AtomicBool>);

    impl Drop for DropGuard {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn guarded(
        stream: impl Stream<Item = graphql::Response> + Send + 'static,
    ) -> (ResponseStream, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        let guard = DropGuard(dropped.clone());
        let stream = stream.map(move |response| {
            let _guard = &guard;
            response
        });
        (Box::pin(stream), dropped)
    }

    #[test(tokio::test)]
    async fn subscribe_delivers_every_response_in_order() {
        let subscription = ResponseSubscription::new(responses(3));
        let mut received = Vec::new();

        subscription.subscribe(|response| received.push(response)).await;

        assert_eq!(received, vec![response(0), response(1), response(2)]);
    }

    #[test(tokio::test)]
    async fn second_subscribe_returns_immediately() {
        let subscription = ResponseSubscription::new(responses(2));
        subscription.subscribe(|_| {}).await;

        let mut calls = 0;
        subscription.subscribe(|_| calls += 1).await;
        assert_eq!(calls, 0);
    }

    #[test(tokio::test)]
    async fn unsubscribe_from_the_callback_stops_delivery() {
        let subscription = ResponseSubscription::new(responses(10));
        let handle = subscription.clone();
        let mut received = Vec::new();

        subscription
            .subscribe(|response| {
                received.push(response);
                if received.len() == 2 {
                    handle.unsubscribe();
                }
            })
            .await;

        assert_eq!(received.len(), 2);
        assert!(subscription.is_unsubscribed());
    }

    #[test(tokio::test)]
    async fn unsubscribe_is_idempotent() {
        let subscription = ResponseSubscription::new(responses(1));
        subscription.subscribe(|_| {}).await;

        subscription.unsubscribe();
        subscription.unsubscribe();
        assert!(subscription.is_unsubscribed());
    }

    #[test(tokio::test)]
    async fn unsubscribe_before_subscribe_releases_the_stream() {
        let (stream, dropped) = guarded(futures::stream::iter((0..3).map(response)));
        let subscription = ResponseSubscription::new(stream);

        subscription.unsubscribe();
        assert!(dropped.load(Ordering::SeqCst));

        let mut calls = 0;
        subscription.subscribe(|_| calls += 1).await;
        assert_eq!(calls, 0);
    }

    #[test(tokio::test)]
    async fn unsubscribe_from_another_task_wakes_a_pending_subscribe() {
        let (sender, receiver) = mpsc::unbounded();
        let (stream, dropped) = guarded(receiver);
        let subscription = ResponseSubscription::new(stream);
        let handle = subscription.clone();

        sender.unbounded_send(response(0)).unwrap();
        let consumer = tokio::spawn(async move {
            let mut received = Vec::new();
            subscription.subscribe(|response| received.push(response)).await;
            received
        });

        // nothing else is ever sent: only unsubscribe can end the subscription
        tokio::task::yield_now().await;
        handle.unsubscribe();

        let received = consumer.await.unwrap();
        assert!(received.len() <= 1);
        assert!(dropped.load(Ordering::SeqCst));
        assert!(sender.is_closed());
    }
}
