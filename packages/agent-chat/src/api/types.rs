//! Wire types specific to the agent API transport

use serde::Deserialize;

/// Error body returned by the agent API on non-2xx responses.
///
/// `detail` is either a plain message or a list of validation errors.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Validation(Vec<ValidationIssue>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationIssue {
    #[serde(default)]
    pub loc: Vec<serde_json::Value>,
    pub msg: String,
}

impl ErrorDetail {
    /// Flatten to a single human-readable line.
    pub fn summary(&self) -> String {
        match self {
            ErrorDetail::Message(message) => message.clone(),
            ErrorDetail::Validation(issues) => issues
                .iter()
                .map(|issue| {
                    let field = issue
                        .loc
                        .iter()
                        .map(|part| match part {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(".");
                    if field.is_empty() {
                        issue.msg.clone()
                    } else {
                        format!("{}: {}", field, issue.msg)
                    }
                })
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

/// Best-effort message for a failed response body.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.detail.summary(),
        Err(_) => body.trim().to_string(),
    }
}
