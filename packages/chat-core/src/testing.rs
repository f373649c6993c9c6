//! Scripted transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::transport::{FetchError, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

enum Reply {
    Ready(Result<Value, FetchError>),
    Held(oneshot::Receiver<Result<Value, FetchError>>),
}

/// Answers each request with the next reply queued for its method and path.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, method: Method, path: &str, result: Result<Value, FetchError>) -> &Self {
        self.queue(method, path, Reply::Ready(result));
        self
    }

    /// Queue a reply that only resolves when the returned sender fires.
    pub fn hold(&self, method: Method, path: &str) -> oneshot::Sender<Result<Value, FetchError>> {
        let (tx, rx) = oneshot::channel();
        self.queue(method, path, Reply::Held(rx));
        tx
    }

    fn queue(&self, method: Method, path: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, method: Method) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    async fn answer(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, FetchError> {
        self.calls.lock().unwrap().push(Call {
            method,
            path: path.to_string(),
            body,
        });
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&(method, path.to_string()))
            .and_then(|queue| queue.pop_front());

        match reply {
            Some(Reply::Ready(result)) => result,
            Some(Reply::Held(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(FetchError::Network("held reply dropped".to_string()))),
            None => Err(FetchError::Network(format!("no scripted reply for {path}"))),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, path: &str) -> Result<Value, FetchError> {
        self.answer(Method::Get, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, FetchError> {
        self.answer(Method::Post, path, Some(body)).await
    }
}
