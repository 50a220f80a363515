// Scripted fetch client for ordering fetch completions by hand.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use skein_core::{Envelope, Error, FetchClient, FetchFuture};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Appointment {
    pub id: u64,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

enum Reply {
    Ready(Result<Envelope, Error>),
    Deferred(oneshot::Receiver<Result<Envelope, Error>>),
}

/// Replies are consumed in call order. With no reply queued, a call
/// answers with an empty envelope.
#[derive(Default)]
pub struct ScriptedClient {
    calls: Mutex<Vec<Call>>,
    replies: Mutex<VecDeque<Reply>>,
    honour_cancel: bool,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A client that aborts deferred replies when the token fires.
    pub fn cancellable() -> Arc<Self> {
        Arc::new(Self {
            honour_cancel: true,
            ..Self::default()
        })
    }

    pub fn reply(&self, result: Result<Envelope, Error>) {
        self.replies.lock().unwrap().push_back(Reply::Ready(result));
    }

    pub fn reply_items(&self, items: Value) {
        self.reply(Ok(envelope(items)));
    }

    pub fn defer(&self) -> oneshot::Sender<Result<Envelope, Error>> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().unwrap().push_back(Reply::Deferred(rx));
        tx
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn respond(&self, call: Call, cancel: CancellationToken) -> FetchFuture<'_> {
        self.calls.lock().unwrap().push(call);
        let reply = self.replies.lock().unwrap().pop_front();
        let honour_cancel = self.honour_cancel;

        Box::pin(async move {
            match reply {
                None => Ok(Envelope::default()),
                Some(Reply::Ready(result)) => result,
                Some(Reply::Deferred(rx)) if honour_cancel => tokio::select! {
                    () = cancel.cancelled() => Err(Error::Cancelled),
                    result = rx => result.unwrap_or(Err(Error::Cancelled)),
                },
                Some(Reply::Deferred(rx)) => rx
                    .await
                    .unwrap_or_else(|_| Err(Error::Other("reply dropped".into()))),
            }
        })
    }
}

impl FetchClient for ScriptedClient {
    fn get<'a>(&'a self, url: &'a str, cancel: CancellationToken) -> FetchFuture<'a> {
        self.respond(
            Call {
                method: Method::Get,
                url: url.to_owned(),
                body: None,
            },
            cancel,
        )
    }

    fn post<'a>(
        &'a self,
        url: &'a str,
        body: &'a Value,
        cancel: CancellationToken,
    ) -> FetchFuture<'a> {
        self.respond(
            Call {
                method: Method::Post,
                url: url.to_owned(),
                body: Some(body.clone()),
            },
            cancel,
        )
    }
}

pub fn envelope(items: Value) -> Envelope {
    serde_json::from_value(json!({ "data": items })).unwrap()
}

pub fn not_found() -> Error {
    Error::Api {
        status: 404,
        message: Some("Not found".into()),
        body: r#"{"message":"Not found"}"#.into(),
    }
}

/// Yield until the client has seen `n` calls.
pub async fn wait_for_calls(client: &ScriptedClient, n: usize) {
    for _ in 0..1000 {
        if client.call_count() >= n {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("expected {n} calls, saw {}", client.call_count());
}

/// Shared invocation counter for callbacks.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
