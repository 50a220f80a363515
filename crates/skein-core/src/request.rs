// ── One-shot request wrapper ──
//
// The non-paginated sibling of `Collection`: wraps a single async call and
// tracks `{data, loading, error, success}` with the same currency check.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use skein_api::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::collection::ErrorFn;
use crate::coordinator::{Coordinator, RequestTicket};

/// The wrapped call. Receives the caller's arguments and a token that
/// fires when the call is superseded.
pub type RequestFn<A> =
    Arc<dyn Fn(A, CancellationToken) -> BoxFuture<'static, Result<Value, Error>> + Send + Sync>;

/// Observable state of an [`ApiRequest`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub success: bool,
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            success: false,
        }
    }
}

/// Builder for [`ApiRequest`].
pub struct ApiRequestBuilder<A, T> {
    call: RequestFn<A>,
    transform: Option<Arc<dyn Fn(T) -> T + Send + Sync>>,
    on_success: Option<Arc<dyn Fn(&T) + Send + Sync>>,
    on_error: Option<ErrorFn>,
    immediate: Option<A>,
}

impl<A, T> ApiRequestBuilder<A, T>
where
    A: Send + 'static,
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn transform(mut self, f: impl Fn(T) -> T + Send + Sync + 'static) -> Self {
        self.transform = Some(Arc::new(f));
        self
    }

    pub fn on_success(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Execute with `args` as soon as the request is activated.
    pub fn immediate(mut self, args: A) -> Self {
        self.immediate = Some(args);
        self
    }

    pub fn build(self) -> ApiRequest<A, T> {
        let (state, _) = watch::channel(RequestState::default());
        ApiRequest {
            inner: Arc::new(RequestInner {
                call: self.call,
                transform: self.transform,
                on_success: self.on_success,
                on_error: self.on_error,
                immediate: Mutex::new(self.immediate),
                coordinator: Coordinator::new(),
                state,
            }),
        }
    }
}

/// A single async call with tracked state.
///
/// Cheaply cloneable. A newer `execute` supersedes an older one still in
/// flight; nothing is written after [`unmount`](Self::unmount).
pub struct ApiRequest<A, T> {
    inner: Arc<RequestInner<A, T>>,
}

impl<A, T> Clone for ApiRequest<A, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct RequestInner<A, T> {
    call: RequestFn<A>,
    transform: Option<Arc<dyn Fn(T) -> T + Send + Sync>>,
    on_success: Option<Arc<dyn Fn(&T) + Send + Sync>>,
    on_error: Option<ErrorFn>,
    immediate: Mutex<Option<A>>,
    coordinator: Coordinator,
    state: watch::Sender<RequestState<T>>,
}

impl<A, T> fmt::Debug for ApiRequest<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("coordinator", &self.inner.coordinator)
            .finish_non_exhaustive()
    }
}

impl<A, T> ApiRequest<A, T>
where
    A: Send + 'static,
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn builder<F, Fut>(call: F) -> ApiRequestBuilder<A, T>
    where
        F: Fn(A, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        ApiRequestBuilder {
            call: Arc::new(
                move |args: A, cancel: CancellationToken| -> BoxFuture<'static, Result<Value, Error>> {
                    Box::pin(call(args, cancel))
                },
            ),
            transform: None,
            on_success: None,
            on_error: None,
            immediate: None,
        }
    }

    /// Run the `immediate` call, if one was configured. Later calls are no-ops.
    pub fn activate(&self) -> Option<JoinHandle<Option<T>>> {
        let args = self
            .inner
            .immediate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        let this = self.clone();
        Some(tokio::spawn(async move { this.execute(args).await }))
    }

    /// Run the call. Returns the stored data on success; `None` on failure,
    /// after unmount, or when a newer call superseded this one.
    pub async fn execute(&self, args: A) -> Option<T> {
        let ticket = self.inner.coordinator.begin()?;
        self.commit(&ticket, |state| {
            state.loading = true;
            state.error = None;
            state.success = false;
        })?;

        debug!(generation = ticket.generation(), "executing request");
        let result = (self.inner.call)(args, ticket.cancel_token()).await;
        let outcome = match result {
            Ok(value) => self.apply_success(&ticket, value),
            Err(err) if err.is_cancelled() => {
                trace!(generation = ticket.generation(), "request cancelled");
                None
            }
            Err(err) => {
                self.apply_failure(&ticket, &err);
                None
            }
        };

        self.inner.coordinator.settle(&ticket);
        outcome
    }

    /// Return to the initial state. An in-flight call is superseded so its
    /// result cannot repopulate the state.
    pub fn reset(&self) {
        if let Some(ticket) = self.inner.coordinator.begin() {
            self.commit(&ticket, |state| *state = RequestState::default());
            self.inner.coordinator.settle(&ticket);
        }
    }

    pub fn clear_error(&self) {
        self.inner.coordinator.while_mounted(|| {
            self.inner.state.send_modify(|state| state.error = None);
        });
    }

    pub fn unmount(&self) {
        self.inner.coordinator.unmount();
    }

    pub fn snapshot(&self) -> RequestState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RequestState<T>> {
        self.inner.state.subscribe()
    }

    fn apply_success(&self, ticket: &RequestTicket, value: Value) -> Option<T> {
        let decoded: T = match serde_json::from_value(value) {
            Ok(decoded) => decoded,
            Err(e) => {
                let err = Error::Deserialization {
                    message: format!("failed to decode response: {e}"),
                    body: String::new(),
                };
                self.apply_failure(ticket, &err);
                return None;
            }
        };
        let data = match self.inner.transform {
            Some(ref transform) => transform(decoded),
            None => decoded,
        };

        let stored = data.clone();
        self.commit(ticket, move |state| {
            state.data = Some(stored);
            state.loading = false;
            state.error = None;
            state.success = true;
        })?;

        if let Some(ref callback) = self.inner.on_success {
            callback(&data);
        }
        Some(data)
    }

    fn apply_failure(&self, ticket: &RequestTicket, err: &Error) {
        let message = err.user_message();
        let applied = self.commit(ticket, move |state| {
            state.loading = false;
            state.error = Some(message);
            state.success = false;
        });
        if applied.is_none() {
            return;
        }

        warn!(error = %err, "request failed");
        if let Some(ref callback) = self.inner.on_error {
            callback(err);
        }
    }

    fn commit(
        &self,
        ticket: &RequestTicket,
        modify: impl FnOnce(&mut RequestState<T>),
    ) -> Option<()> {
        self.inner
            .coordinator
            .with_current(ticket, || self.inner.state.send_modify(modify))
    }
}
