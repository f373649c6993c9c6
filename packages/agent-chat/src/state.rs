//! Centralized application state
//!
//! Owns the active chat session and the services it is built from. All mutation
//! happens on the prompt loop; sends run on their own tasks and report back
//! through notices.

use std::sync::Arc;

use agent_chat_core::{
    AgentId, ChatSession, Error, InvalidationRegistry, RefreshOutcome, SendOutcome,
    SessionConfig, Transport, UsageMetrics, UsageMetricsLoader,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Transient message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Warning(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Notice::Info(text) | Notice::Warning(text) => text,
        }
    }
}

/// Application state
pub struct AppState {
    transport: Arc<dyn Transport>,
    registry: Arc<InvalidationRegistry>,
    session_config: SessionConfig,
    metrics_loader: UsageMetricsLoader,

    // Session state
    session: Option<ChatSession>,

    // Dashboard
    pub metrics: Option<UsageMetrics>,

    notices: mpsc::UnboundedSender<Notice>,
}

impl AppState {
    pub fn new(
        transport: Arc<dyn Transport>,
        session_config: SessionConfig,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Self {
        let metrics_loader = UsageMetricsLoader::new(transport.clone(), session_config.request_timeout);
        Self {
            transport,
            registry: Arc::new(InvalidationRegistry::new()),
            session_config,
            metrics_loader,
            session: None,
            metrics: None,
            notices,
        }
    }

    pub fn session(&self) -> Option<&ChatSession> {
        self.session.as_ref()
    }

    pub fn active_agent(&self) -> Option<&AgentId> {
        self.session.as_ref().map(ChatSession::agent_id)
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    // ========================================================================
    // Session Actions
    // ========================================================================

    /// Switch to `agent_id` with a fresh session seeded from its history.
    ///
    /// The previous session is discarded first, so nothing it still has in flight
    /// can reach the new transcript.
    pub async fn open_agent(&mut self, agent_id: AgentId) -> &ChatSession {
        if let Some(previous) = self.session.take() {
            tracing::info!("Switching agent {} -> {}", previous.agent_id(), agent_id);
        }

        let session = self.session.insert(ChatSession::open(
            agent_id,
            self.transport.clone(),
            self.registry.clone(),
            self.session_config.clone(),
        ));

        if let Err(e) = session.load_history().await {
            let _ = self.notices.send(Notice::Warning(format!(
                "Could not load history for {}: {}",
                session.agent_id(),
                e
            )));
        }
        session
    }

    /// Reload the active transcript from the server.
    pub async fn reload_history(&self) {
        let Some(session) = self.session.as_ref() else {
            self.notify(no_agent());
            return;
        };

        match session.load_history().await {
            Ok(RefreshOutcome::Applied(count)) => {
                self.notify(Notice::Info(format!("Loaded {} messages", count)));
            }
            Ok(RefreshOutcome::Stale) => {}
            Err(e) => self.notify(Notice::Warning(format!("Could not load history: {}", e))),
        }
    }

    /// Send `text` on a background task so the prompt stays responsive.
    pub fn send(&self, text: String) -> Option<JoinHandle<()>> {
        let Some(session) = self.session.as_ref() else {
            self.notify(no_agent());
            return None;
        };

        let dispatcher = session.dispatcher();
        let notices = self.notices.clone();

        Some(tokio::spawn(async move {
            let notice = match dispatcher.send(&text).await {
                Ok(SendOutcome::Delivered { .. }) | Ok(SendOutcome::Stale) => None,
                Ok(SendOutcome::Busy) => Some(Notice::Info(
                    "Still waiting for the previous reply".to_string(),
                )),
                // Blank input simply does not go anywhere.
                Err(Error::Validation(_)) => None,
                Err(Error::Fetch(e)) => Some(Notice::Warning(format!(
                    "Message not delivered ({}). Send it again to retry.",
                    e
                ))),
            };
            if let Some(notice) = notice {
                let _ = notices.send(notice);
            }
        }))
    }

    // ========================================================================
    // Metrics
    // ========================================================================

    pub async fn refresh_metrics(&mut self) -> Option<&UsageMetrics> {
        match self.metrics_loader.fetch().await {
            Ok(metrics) => {
                self.metrics = Some(metrics);
            }
            Err(e) => {
                tracing::warn!("Failed to load usage metrics: {}", e);
                self.notify(Notice::Warning(format!("Could not load metrics: {}", e)));
            }
        }
        self.metrics.as_ref()
    }
}

fn no_agent() -> Notice {
    Notice::Info("No agent selected. Use /agent <id> first.".to_string())
}
