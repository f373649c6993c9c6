//! A chat session: store, loader, dispatcher and invalidation watcher for one agent.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::dispatcher::{MessageDispatcher, SendOutcome};
use crate::invalidation::InvalidationRegistry;
use crate::loader::{HistoryLoader, RefreshOutcome};
use crate::store::SessionStore;
use crate::transport::Transport;
use crate::types::{AgentId, Message, SessionId};
use crate::Result;

/// Conversation with one agent.
///
/// Dropping the session discards its store and stops its watcher, so replies and
/// snapshots still in flight land on a dead store and are ignored.
pub struct ChatSession {
    store: Arc<SessionStore>,
    loader: HistoryLoader,
    dispatcher: Arc<MessageDispatcher>,
    watcher: JoinHandle<()>,
}

impl ChatSession {
    /// Open a fresh session for `agent_id`. Must be called inside a tokio runtime.
    ///
    /// The transcript starts empty; call [`ChatSession::load_history`] to seed it.
    pub fn open(
        agent_id: AgentId,
        transport: Arc<dyn Transport>,
        registry: Arc<InvalidationRegistry>,
        config: SessionConfig,
    ) -> Self {
        let store = Arc::new(SessionStore::new(agent_id, config.reconcile));
        let loader = HistoryLoader::new(transport.clone(), config.request_timeout);
        let watcher = loader.watch(&store, &registry);
        let dispatcher = Arc::new(MessageDispatcher::new(
            store.clone(),
            transport,
            registry,
            config.request_timeout,
        ));

        tracing::info!(
            "Opened session {} for agent {}",
            store.session_id(),
            store.agent_id()
        );

        Self {
            store,
            loader,
            dispatcher,
            watcher,
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        self.store.agent_id()
    }

    pub fn session_id(&self) -> SessionId {
        self.store.session_id()
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Shared handle to the dispatcher, for running a send on another task.
    pub fn dispatcher(&self) -> Arc<MessageDispatcher> {
        self.dispatcher.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.store.messages()
    }

    pub fn is_pending(&self) -> bool {
        self.store.is_pending()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.store.subscribe()
    }

    /// Seed (or reload) the transcript from the server.
    pub async fn load_history(&self) -> Result<RefreshOutcome> {
        Ok(self.loader.refresh(&self.store).await?)
    }

    pub async fn send(&self, text: &str) -> Result<SendOutcome> {
        self.dispatcher.send(text).await
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.store.discard();
        self.watcher.abort();
        tracing::info!(
            "Closed session {} for agent {}",
            self.store.session_id(),
            self.store.agent_id()
        );
    }
}
