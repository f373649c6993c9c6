//! Session store: the ordered transcript of one agent conversation.
//!
//! The store is the single source of truth the view renders. Every mutation takes
//! the transcript lock, checks that the session is still live, applies the change
//! and bumps a revision counter that views can watch.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;

use crate::config::ReconcilePolicy;
use crate::types::{AgentId, DeliveryStatus, Message, MessageId, Role, SessionId};

/// A mutation reached a session that has already been discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session {0} was discarded")]
pub struct StaleSession(pub SessionId);

#[derive(Debug)]
struct Transcript {
    messages: Vec<Message>,
    pending: bool,
    live: bool,
}

impl Transcript {
    /// Push keeping timestamps non-decreasing.
    fn push(&mut self, mut message: Message) -> &Message {
        if let Some(last) = self.messages.last() {
            if message.timestamp < last.timestamp {
                message.timestamp = last.timestamp;
            }
        }
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    fn settle(&mut self, id: MessageId, status: DeliveryStatus) {
        // A refetch may have replaced the optimistic entry already.
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == id) {
            message.delivery = status;
        }
    }
}

/// In-memory transcript and send state for one agent.
#[derive(Debug)]
pub struct SessionStore {
    session_id: SessionId,
    agent_id: AgentId,
    reconcile: ReconcilePolicy,
    transcript: Mutex<Transcript>,
    revision: watch::Sender<u64>,
}

impl SessionStore {
    /// Create an empty, live store for `agent_id`.
    pub fn new(agent_id: AgentId, reconcile: ReconcilePolicy) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            session_id: SessionId::new(),
            agent_id,
            reconcile,
            transcript: Mutex::new(Transcript {
                messages: Vec::new(),
                pending: false,
                live: true,
            }),
            revision,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    pub fn reconcile_policy(&self) -> ReconcilePolicy {
        self.reconcile
    }

    fn lock(&self) -> MutexGuard<'_, Transcript> {
        self.transcript
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn live_lock(&self) -> Result<MutexGuard<'_, Transcript>, StaleSession> {
        let guard = self.lock();
        if guard.live {
            Ok(guard)
        } else {
            Err(StaleSession(self.session_id))
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Snapshot of the ordered transcript.
    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().messages.is_empty()
    }

    /// True while a send is in flight.
    pub fn is_pending(&self) -> bool {
        self.lock().pending
    }

    pub fn is_live(&self) -> bool {
        self.lock().live
    }

    /// Watch the revision counter; it changes on every applied mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Append a message to the end of the transcript.
    pub fn append(&self, message: Message) -> Result<(), StaleSession> {
        self.live_lock()?.push(message);
        self.bump();
        Ok(())
    }

    /// Fold a server snapshot into the transcript according to the store's policy.
    ///
    /// This is the only place a fetched history touches the transcript. Under
    /// [`ReconcilePolicy::Replace`] it races with a concurrent append: whichever
    /// lands last wins.
    pub fn reconcile(&self, snapshot: Vec<Message>) -> Result<(), StaleSession> {
        let mut transcript = self.live_lock()?;
        let merged = match self.reconcile {
            ReconcilePolicy::Replace => snapshot,
            ReconcilePolicy::KeepUnconfirmed => keep_unconfirmed(&transcript.messages, snapshot),
        };
        transcript.messages = merged;
        drop(transcript);
        self.bump();
        Ok(())
    }

    /// Open the send gate: append the optimistic user message and mark the session
    /// pending in one step.
    ///
    /// Returns `Ok(None)` without touching anything when a send is already in flight.
    pub fn begin_send(&self, message: Message) -> Result<Option<MessageId>, StaleSession> {
        let mut transcript = self.live_lock()?;
        if transcript.pending {
            return Ok(None);
        }
        let id = transcript.push(message).id;
        transcript.pending = true;
        drop(transcript);
        self.bump();
        Ok(Some(id))
    }

    /// Close the gate after a successful exchange: confirm the user message, append
    /// the reply and clear `pending`. Returns the reply as stored.
    pub fn complete_send(&self, user_id: MessageId, reply: Message) -> Result<Message, StaleSession> {
        let mut transcript = self.live_lock()?;
        transcript.settle(user_id, DeliveryStatus::Confirmed);
        let stored = transcript.push(reply).clone();
        transcript.pending = false;
        drop(transcript);
        self.bump();
        Ok(stored)
    }

    /// Close the gate after a failed exchange. The user message stays, tagged orphaned.
    pub fn fail_send(&self, user_id: MessageId) -> Result<(), StaleSession> {
        let mut transcript = self.live_lock()?;
        transcript.settle(user_id, DeliveryStatus::Orphaned);
        transcript.pending = false;
        drop(transcript);
        self.bump();
        Ok(())
    }

    /// Retire the session. Every later mutation is rejected as stale.
    pub fn discard(&self) {
        let mut transcript = self.lock();
        if !transcript.live {
            return;
        }
        transcript.live = false;
        transcript.pending = false;
        drop(transcript);
        tracing::debug!("Session {} for agent {} discarded", self.session_id, self.agent_id);
        self.bump();
    }
}

/// Snapshot first, then local user messages the server has not echoed.
///
/// An echo has to sit after the last snapshot entry that matches a confirmed
/// local message, so an earlier turn with the same text never claims a re-send.
fn keep_unconfirmed(local: &[Message], snapshot: Vec<Message>) -> Vec<Message> {
    let mut start = 0;
    for message in local.iter().filter(|m| m.delivery == DeliveryStatus::Confirmed) {
        if let Some(offset) = snapshot[start..].iter().position(|s| s.same_utterance(message)) {
            start += offset + 1;
        }
    }

    let mut echoed = vec![false; snapshot.len()];
    let mut carried = Vec::new();

    for message in local
        .iter()
        .filter(|m| m.role == Role::User && m.delivery != DeliveryStatus::Confirmed)
    {
        let echo = (start..snapshot.len())
            .find(|&i| !echoed[i] && snapshot[i].same_utterance(message));
        match echo {
            Some(i) => echoed[i] = true,
            None => carried.push(message.clone()),
        }
    }

    let mut merged = snapshot;
    let floor = merged.last().map(|m| m.timestamp);
    for mut message in carried {
        if let Some(floor) = floor {
            message.timestamp = message.timestamp.max(floor);
        }
        merged.push(message);
    }
    merged
}
