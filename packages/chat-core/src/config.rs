//! Per-session tuning.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bound on every network suspension point.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How a fetched history snapshot is folded into the live transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcilePolicy {
    /// The snapshot replaces the transcript wholesale. Optimistic messages the server
    /// has not echoed yet are dropped.
    #[default]
    Replace,
    /// Like `Replace`, but pending and orphaned user messages missing from the snapshot
    /// are carried over after it.
    KeepUnconfirmed,
}

/// Settings shared by the loader and dispatcher of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub request_timeout: Duration,
    pub reconcile: ReconcilePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reconcile: ReconcilePolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_reconcile(mut self, reconcile: ReconcilePolicy) -> Self {
        self.reconcile = reconcile;
        self
    }
}
