//! Usage and cost summary shown on the dashboard.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transport::{decode, with_timeout, FetchError, Transport, USAGE_METRICS_PATH};

/// Aggregated usage over the reporting window. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetrics {
    /// Tokens consumed in the last 30 days
    #[serde(default)]
    pub total_tokens: Option<u64>,
    /// Percent change in tokens against the previous month
    #[serde(default)]
    pub tokens_trend: Option<f64>,
    /// Total cost in the last 30 days
    #[serde(default)]
    pub total_cost: Option<f64>,
    #[serde(default)]
    pub cost_trend: Option<f64>,
    /// Agents active right now
    #[serde(default)]
    pub active_agents: Option<u64>,
    /// Average over the last hour
    #[serde(default)]
    pub requests_per_minute: Option<f64>,
    #[serde(default)]
    pub requests_trend: Option<f64>,
}

impl UsageMetrics {
    /// Format the cost as currency, or a dash when unknown.
    pub fn cost_display(&self) -> String {
        self.total_cost
            .map(|cost| format!("${:.2}", cost))
            .unwrap_or_else(|| "-".to_string())
    }
}

/// Fetches [`UsageMetrics`].
#[derive(Clone)]
pub struct UsageMetricsLoader {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl UsageMetricsLoader {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub async fn fetch(&self) -> Result<UsageMetrics, FetchError> {
        let body = with_timeout(self.timeout, self.transport.get(USAGE_METRICS_PATH)).await?;
        decode(body)
    }
}
