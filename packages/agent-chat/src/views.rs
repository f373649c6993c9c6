//! Terminal views for Agent Chat

pub mod chat;
pub mod metrics;
