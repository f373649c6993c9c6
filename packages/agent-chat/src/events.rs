//! Transcript change handling
//!
//! Watches the active session's store and pushes freshly rendered lines to the
//! terminal whenever the transcript changes.

use std::sync::Arc;

use agent_chat_core::SessionStore;
use tokio::task::JoinHandle;

use crate::views::chat::TranscriptView;

/// Start the render loop for one session
///
/// The loop stops on its own once the store is discarded.
pub fn start_render_loop<F>(store: Arc<SessionStore>, mut emit: F) -> JoinHandle<()>
where
    F: FnMut(String) + Send + 'static,
{
    let mut changes = store.subscribe();

    tokio::spawn(async move {
        let mut view = TranscriptView::new();

        loop {
            if !store.is_live() {
                break;
            }

            for line in view.update(&store.messages()) {
                emit(line);
            }

            if changes.changed().await.is_err() {
                break;
            }
        }

        tracing::trace!("Render loop for {} stopped", store.agent_id());
    })
}
