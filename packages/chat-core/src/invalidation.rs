//! Keyed invalidation signals.
//!
//! The registry is an explicit service handed to whoever needs it, never a global.
//! Invalidating a key wakes every subscriber; subscribers decide whether the key
//! concerns them and refetch on their own task.

use std::fmt;

use tokio::sync::broadcast;

use crate::types::AgentId;

pub(crate) const CHANNEL_CAPACITY: usize = 64;

/// Kind of cached server resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ChatHistory,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ChatHistory => "chat-history",
        }
    }
}

/// Cache key: resource kind scoped to one agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub kind: ResourceKind,
    pub agent_id: AgentId,
}

impl QueryKey {
    pub fn new(kind: ResourceKind, agent_id: AgentId) -> Self {
        Self { kind, agent_id }
    }

    pub fn chat_history(agent_id: AgentId) -> Self {
        Self::new(ResourceKind::ChatHistory, agent_id)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.agent_id)
    }
}

/// Broadcasts invalidated keys to interested loaders.
#[derive(Debug)]
pub struct InvalidationRegistry {
    tx: broadcast::Sender<QueryKey>,
}

impl InvalidationRegistry {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Mark a key stale. Returns how many subscribers were notified.
    pub fn invalidate(&self, key: QueryKey) -> usize {
        tracing::debug!("Invalidating {}", key);
        // No subscribers is fine: nothing is cached under that key.
        self.tx.send(key).unwrap_or(0)
    }

    /// Subscribe to invalidations.
    pub fn subscribe(&self) -> broadcast::Receiver<QueryKey> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for InvalidationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
