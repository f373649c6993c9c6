//! Agent Chat Core - conversation state for a remote agent service.
//!
//! This crate keeps the transcript the chat view renders in step with the server:
//!
//! - **Session store**: ordered transcript, send gate and liveness for one agent
//! - **History loader**: seeds and refreshes the transcript from the server
//! - **Message dispatcher**: optimistic send protocol with explicit delivery status
//! - **Invalidation registry**: keyed refetch signals passed in explicitly
//! - **Usage metrics**: token and cost summary for the dashboard
//!
//! Network I/O is delegated to a [`Transport`] implementation supplied by the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agent_chat_core::{AgentId, ChatSession, InvalidationRegistry, SessionConfig, Transport};
//!
//! async fn chat(transport: Arc<dyn Transport>) -> agent_chat_core::Result<()> {
//!     let registry = Arc::new(InvalidationRegistry::new());
//!     let session = ChatSession::open(
//!         AgentId::new("a1"),
//!         transport,
//!         registry,
//!         SessionConfig::default(),
//!     );
//!
//!     session.load_history().await?;
//!     session.send("Hello").await?;
//!
//!     for message in session.messages() {
//!         println!("{}: {}", message.role, message.content);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod invalidation;
pub mod loader;
pub mod metrics;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{ReconcilePolicy, SessionConfig};
pub use dispatcher::{MessageDispatcher, SendOutcome};
pub use invalidation::{InvalidationRegistry, QueryKey, ResourceKind};
pub use loader::{HistoryLoader, RefreshOutcome};
pub use metrics::{UsageMetrics, UsageMetricsLoader};
pub use session::ChatSession;
pub use store::SessionStore;
pub use transport::{FetchError, Transport};
pub use types::{AgentId, DeliveryStatus, Message, MessageId, Role, SessionId};

/// Error types for agent-chat-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid message: {0}")]
    Validation(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Result type for agent-chat-core operations.
pub type Result<T> = std::result::Result<T, Error>;
