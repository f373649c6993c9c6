//! Message dispatcher: the send protocol of a chat session.
//!
//! `idle -> sending -> idle`. The user message is appended before the remote call
//! is issued so it shows up immediately; the reply is appended when the call
//! succeeds, after which the session's history is invalidated. A failed call leaves
//! the user message in place, tagged [`DeliveryStatus::Orphaned`].
//!
//! [`DeliveryStatus::Orphaned`]: crate::types::DeliveryStatus::Orphaned

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::invalidation::{InvalidationRegistry, QueryKey};
use crate::store::SessionStore;
use crate::transport::{chat_path, decode, with_timeout, FetchError, Transport};
use crate::types::{ChatReply, ChatRequest, Message, MessageId};
use crate::{Error, Result};

/// Result of a [`MessageDispatcher::send`] call that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The agent replied; `reply` is the assistant message as stored.
    Delivered {
        reply: Message,
        metadata: Option<Map<String, Value>>,
    },
    /// Another send is in flight. Nothing was appended or sent.
    Busy,
    /// The session was discarded while the call was outstanding. Nothing was applied.
    Stale,
}

/// Drives sends for one session.
pub struct MessageDispatcher {
    store: Arc<SessionStore>,
    transport: Arc<dyn Transport>,
    invalidation: Arc<InvalidationRegistry>,
    timeout: Duration,
}

impl MessageDispatcher {
    pub fn new(
        store: Arc<SessionStore>,
        transport: Arc<dyn Transport>,
        invalidation: Arc<InvalidationRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            transport,
            invalidation,
            timeout,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Send `text` to the session's agent.
    ///
    /// Whitespace-only text is rejected with [`Error::Validation`] before anything
    /// happens. Transport failures come back as [`Error::Fetch`]; the session stays
    /// usable and the same text can simply be sent again.
    pub async fn send(&self, text: &str) -> Result<SendOutcome> {
        if text.trim().is_empty() {
            return Err(Error::Validation("message text is empty".to_string()));
        }

        let user_id = match self.store.begin_send(Message::optimistic_user(text)) {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::debug!("Send ignored, agent {} is busy", self.store.agent_id());
                return Ok(SendOutcome::Busy);
            }
            Err(stale) => {
                tracing::debug!("Send ignored: {}", stale);
                return Ok(SendOutcome::Stale);
            }
        };

        let in_flight = InFlight::new(&self.store, user_id);
        let result = self.exchange(text).await;
        in_flight.disarm();

        match result {
            Ok(reply) => self.settle_success(user_id, reply),
            Err(e) => self.settle_failure(user_id, e),
        }
    }

    async fn exchange(&self, text: &str) -> std::result::Result<ChatReply, FetchError> {
        let request = ChatRequest {
            message: text.to_string(),
        };
        let body = serde_json::to_value(&request).map_err(|e| FetchError::Malformed(e.to_string()))?;
        let path = chat_path(self.store.agent_id());
        let response = with_timeout(self.timeout, self.transport.post(&path, body)).await?;
        decode(response)
    }

    fn settle_success(&self, user_id: MessageId, reply: ChatReply) -> Result<SendOutcome> {
        let ChatReply { response, metadata } = reply;
        match self.store.complete_send(user_id, Message::assistant(response)) {
            Ok(stored) => {
                // Refetch happens on the watcher's task; the caller does not wait for it.
                self.invalidation
                    .invalidate(QueryKey::chat_history(self.store.agent_id().clone()));
                Ok(SendOutcome::Delivered {
                    reply: stored,
                    metadata,
                })
            }
            Err(stale) => {
                tracing::debug!("Dropping reply: {}", stale);
                Ok(SendOutcome::Stale)
            }
        }
    }

    fn settle_failure(&self, user_id: MessageId, error: FetchError) -> Result<SendOutcome> {
        match self.store.fail_send(user_id) {
            Ok(()) => {
                tracing::warn!("Failed to send message to {}: {}", self.store.agent_id(), error);
                Err(Error::Fetch(error))
            }
            Err(stale) => {
                tracing::debug!("Dropping send failure: {}", stale);
                Ok(SendOutcome::Stale)
            }
        }
    }
}

/// Settles a send as failed if its future is dropped before the call resolves.
struct InFlight<'a> {
    store: &'a SessionStore,
    user_id: MessageId,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(store: &'a SessionStore, user_id: MessageId) -> Self {
        Self {
            store,
            user_id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("Send to {} abandoned mid-flight", self.store.agent_id());
            let _ = self.store.fail_send(self.user_id);
        }
    }
}
