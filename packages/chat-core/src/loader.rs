//! History loader: seeds and refreshes a session from the server transcript.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::invalidation::{InvalidationRegistry, QueryKey};
use crate::store::SessionStore;
use crate::transport::{chat_history_path, decode, with_timeout, FetchError, Transport};
use crate::types::{AgentId, Message};

/// What happened to a fetched snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The snapshot was folded into the live session; carries its length.
    Applied(usize),
    /// The session was discarded before the snapshot landed. Nothing was touched.
    Stale,
}

/// Fetches persisted transcripts through a [`Transport`].
#[derive(Clone)]
pub struct HistoryLoader {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl HistoryLoader {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Fetch the ordered transcript persisted for `agent_id`.
    pub async fn load(&self, agent_id: &AgentId) -> Result<Vec<Message>, FetchError> {
        let path = chat_history_path(agent_id);
        let body = with_timeout(self.timeout, self.transport.get(&path)).await?;
        decode(body)
    }

    /// Load the store's history and reconcile it into the store.
    ///
    /// On failure the store keeps its last-known transcript.
    pub async fn refresh(&self, store: &SessionStore) -> Result<RefreshOutcome, FetchError> {
        let messages = match self.load(store.agent_id()).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!("Failed to load chat history for {}: {}", store.agent_id(), e);
                return Err(e);
            }
        };

        let count = messages.len();
        match store.reconcile(messages) {
            Ok(()) => {
                tracing::debug!("Loaded {} messages for agent {}", count, store.agent_id());
                Ok(RefreshOutcome::Applied(count))
            }
            Err(stale) => {
                tracing::debug!("Dropping history snapshot: {}", stale);
                Ok(RefreshOutcome::Stale)
            }
        }
    }

    /// Refetch into `store` every time its chat-history key is invalidated.
    ///
    /// The task only holds a weak reference to the store and ends once the store is
    /// discarded, dropped, or the registry goes away.
    pub fn watch(&self, store: &Arc<SessionStore>, registry: &InvalidationRegistry) -> JoinHandle<()> {
        let loader = self.clone();
        let key = QueryKey::chat_history(store.agent_id().clone());
        let store: Weak<SessionStore> = Arc::downgrade(store);
        let mut rx = registry.subscribe();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(invalidated) if invalidated == key => {}
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Invalidation watcher for {} lagged by {}", key, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }

                let Some(target) = store.upgrade() else { break };
                if !target.is_live() {
                    break;
                }
                // Failures are already logged; the transcript stays as it was.
                let _ = loader.refresh(&target).await;
            }
            tracing::debug!("Invalidation watcher for {} stopped", key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconcilePolicy;
    use crate::invalidation::CHANNEL_CAPACITY;
    use crate::testing::{Method, ScriptedTransport};
    use crate::types::Role;
    use serde_json::json;

    const HISTORY: &str = "/api/v1/agents/a1/chat-history";

    fn history_body() -> serde_json::Value {
        json!([
            { "role": "user", "content": "Hello", "timestamp": "2024-05-01T10:00:00Z" },
            { "role": "assistant", "content": "Hi there", "timestamp": "2024-05-01T10:00:01Z" }
        ])
    }

    fn setup() -> (Arc<ScriptedTransport>, HistoryLoader, Arc<SessionStore>) {
        let transport = Arc::new(ScriptedTransport::new());
        let loader = HistoryLoader::new(transport.clone(), Duration::from_secs(5));
        let store = Arc::new(SessionStore::new(AgentId::new("a1"), ReconcilePolicy::Replace));
        (transport, loader, store)
    }

    #[tokio::test]
    async fn test_refresh_replaces_transcript() {
        let (transport, loader, store) = setup();
        transport.reply(Method::Get, HISTORY, Ok(history_body()));
        store.append(Message::new(Role::User, "local only")).unwrap();

        let outcome = loader.refresh(&store).await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Applied(2));
        let contents: Vec<_> = store.messages().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["Hello", "Hi there"]);
    }

    #[tokio::test]
    async fn test_replaying_same_history_is_idempotent() {
        let (transport, loader, store) = setup();
        transport
            .reply(Method::Get, HISTORY, Ok(history_body()))
            .reply(Method::Get, HISTORY, Ok(history_body()));

        loader.refresh(&store).await.unwrap();
        let first = store.messages();
        loader.refresh(&store).await.unwrap();

        assert_eq!(store.messages(), first);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_last_known_transcript() {
        let (transport, loader, store) = setup();
        transport.reply(Method::Get, HISTORY, Ok(history_body()));
        transport.reply(
            Method::Get,
            HISTORY,
            Err(FetchError::Status {
                status: 500,
                message: "boom".to_string(),
            }),
        );

        loader.refresh(&store).await.unwrap();
        let result = loader.refresh(&store).await;

        assert!(matches!(result, Err(FetchError::Status { status: 500, .. })));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_history_is_a_fetch_error() {
        let (transport, loader, store) = setup();
        transport.reply(Method::Get, HISTORY, Ok(json!({ "detail": "nope" })));

        let result = loader.refresh(&store).await;
        assert!(matches!(result, Err(FetchError::Malformed(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_landing_after_discard_is_dropped() {
        let (transport, loader, store) = setup();
        let release = transport.hold(Method::Get, HISTORY);

        let refresh = tokio::spawn({
            let loader = loader.clone();
            let store = store.clone();
            async move { loader.refresh(&store).await }
        });
        tokio::task::yield_now().await;

        store.discard();
        release.send(Ok(history_body())).unwrap();

        assert_eq!(refresh.await.unwrap().unwrap(), RefreshOutcome::Stale);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_watch_refetches_on_matching_key_only() {
        let (transport, loader, store) = setup();
        transport.reply(Method::Get, HISTORY, Ok(history_body()));
        let registry = InvalidationRegistry::new();
        let mut changes = store.subscribe();

        let handle = loader.watch(&store, &registry);
        registry.invalidate(QueryKey::chat_history(AgentId::new("other")));
        registry.invalidate(QueryKey::chat_history(AgentId::new("a1")));

        changes.changed().await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(transport.call_count(Method::Get), 1);

        store.discard();
        registry.invalidate(QueryKey::chat_history(AgentId::new("a1")));
        handle.await.unwrap();
        assert_eq!(transport.call_count(Method::Get), 1);
    }

    #[tokio::test]
    async fn test_watch_refetches_after_lagging_behind() {
        let (transport, loader, store) = setup();
        transport.reply(Method::Get, HISTORY, Ok(history_body()));
        let registry = InvalidationRegistry::new();
        let mut changes = store.subscribe();

        let handle = loader.watch(&store, &registry);
        // Overflow the channel before the watcher gets to run.
        for _ in 0..=CHANNEL_CAPACITY {
            registry.invalidate(QueryKey::chat_history(AgentId::new("other")));
        }

        changes.changed().await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(transport.call_count(Method::Get), 1);

        store.discard();
        registry.invalidate(QueryKey::chat_history(AgentId::new("a1")));
        handle.await.unwrap();
    }
}
