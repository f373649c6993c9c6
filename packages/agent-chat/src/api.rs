//! HTTP transport for the agent API
//!
//! Talks to the backend under `/api/v1` and normalizes every failure into the
//! chat core's `FetchError`.

pub mod client;
pub mod types;

pub use client::*;

use crate::config::AppConfig;

/// Build the API client described by the configuration
pub fn connect(config: &AppConfig) -> AgentApiClient {
    let mut client = AgentApiClient::new(&config.base_url, config.request_timeout());

    if let Some(ref tenant) = config.tenant_id {
        client = client.with_tenant(tenant.clone());
    }
    if let Some(ref token) = config.api_token {
        client = client.with_token(token.clone());
    }

    tracing::debug!("API client initialized for {}", client.base_url());
    client
}
