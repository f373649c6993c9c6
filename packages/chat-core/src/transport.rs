//! Transport contract between the session core and the network.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::AgentId;

/// Failure reported by a [`Transport`]. Status codes are normalized here so the
/// session core never has to look at them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request failed: {status} {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// Performs the actual network I/O for the chat core.
///
/// Both methods resolve to the parsed response body. An empty successful body is
/// `Value::Null`, never an error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value, FetchError>;

    async fn post(&self, path: &str, body: Value) -> Result<Value, FetchError>;
}

/// `GET` path of an agent's persisted transcript.
pub fn chat_history_path(agent_id: &AgentId) -> String {
    format!("/api/v1/agents/{}/chat-history", agent_id)
}

/// `POST` path for sending a message to an agent.
pub fn chat_path(agent_id: &AgentId) -> String {
    format!("/api/v1/agents/{}/chat", agent_id)
}

/// `GET` path of the usage dashboard summary.
pub const USAGE_METRICS_PATH: &str = "/api/v1/analytics/usage-metrics";

/// Bound a suspension point; running out of time counts as a fetch failure.
pub(crate) async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(limit)),
    }
}

/// Decode a response body into a typed value.
pub(crate) fn decode<T: DeserializeOwned>(body: Value) -> Result<T, FetchError> {
    serde_json::from_value(body).map_err(|e| FetchError::Malformed(e.to_string()))
}
