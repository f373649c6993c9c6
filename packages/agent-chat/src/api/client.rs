//! Agent API HTTP client implementing the chat core transport

use std::time::Duration;

use agent_chat_core::{FetchError, Transport};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use super::types::error_message;

const TENANT_HEADER: &str = "x-tenant-id";

/// HTTP client for the agent API
#[derive(Debug, Clone)]
pub struct AgentApiClient {
    base_url: String,
    client: Client,
    tenant_id: Option<String>,
    api_token: Option<String>,
    timeout: Duration,
}

impl AgentApiClient {
    /// Create a new client with the given base URL
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            tenant_id: None,
            api_token: None,
            timeout,
        }
    }

    /// Scope every request to a tenant
    pub fn with_tenant(mut self, tenant_id: String) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Authenticate every request with a bearer token
    pub fn with_token(mut self, api_token: String) -> Self {
        self.api_token = Some(api_token);
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ========================================================================
    // Internal HTTP Methods
    // ========================================================================

    fn request(&self, request: RequestBuilder) -> RequestBuilder {
        let mut request = request.timeout(self.timeout);

        if let Some(ref tenant) = self.tenant_id {
            request = request.header(TENANT_HEADER, tenant);
        }
        if let Some(ref token) = self.api_token {
            request = request.bearer_auth(token);
        }

        request
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Value, FetchError> {
        let response = self
            .request(request)
            .send()
            .await
            .map_err(|e| self.normalize(e))?;

        read_body(response).await.map_err(|e| match e {
            BodyError::Transport(e) => self.normalize(e),
            BodyError::Fetch(e) => e,
        })
    }

    fn normalize(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(error.to_string())
        }
    }
}

enum BodyError {
    Transport(reqwest::Error),
    Fetch(FetchError),
}

/// Turn a response into a parsed body, folding non-2xx statuses into `FetchError`.
async fn read_body(response: Response) -> Result<Value, BodyError> {
    let status = response.status();
    let text = response.text().await.map_err(BodyError::Transport)?;

    if !status.is_success() {
        return Err(BodyError::Fetch(FetchError::Status {
            status: status.as_u16(),
            message: error_message(&text),
        }));
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&text).map_err(|e| BodyError::Fetch(FetchError::Malformed(e.to_string())))
}

#[async_trait]
impl Transport for AgentApiClient {
    async fn get(&self, path: &str) -> Result<Value, FetchError> {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        self.execute(request).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, FetchError> {
        let request = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body);
        self.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answers every connection with one canned response and records the raw request.
    struct ScriptedServer {
        base_url: String,
        requests: Arc<Mutex<Vec<String>>>,
        handle: JoinHandle<()>,
    }

    impl ScriptedServer {
        async fn new(status: u16, body: &'static str) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));

            let handle = tokio::spawn({
                let requests = requests.clone();
                async move {
                    while let Ok((mut socket, _)) = listener.accept().await {
                        let raw = read_request(&mut socket).await;
                        requests.lock().unwrap().push(raw);

                        let response = format!(
                            "HTTP/1.1 {} Scripted\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                            status,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    }
                }
            });

            Self {
                base_url,
                requests,
                handle,
            }
        }

        fn last_request(&self) -> String {
            self.requests.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    /// Read headers plus `content-length` bytes of body.
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            let read = socket.read(&mut buf).await.unwrap_or(0);
            if read == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..read]);

            let text = String::from_utf8_lossy(&raw).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }

        String::from_utf8_lossy(&raw).to_string()
    }

    impl Drop for ScriptedServer {
        fn drop(&mut self) {
            self.handle.abort();
        }
    }

    #[tokio::test]
    async fn test_post_sends_json_and_tenant_header() {
        let server = ScriptedServer::new(200, r#"{"response":"Hi there"}"#).await;
        let client = AgentApiClient::new(&server.base_url, Duration::from_secs(5))
            .with_tenant("tenant123".to_string());

        let body = client
            .post("/api/v1/agents/a1/chat", json!({ "message": "Hello" }))
            .await
            .unwrap();

        assert_eq!(body, json!({ "response": "Hi there" }));
        let request = server.last_request().to_lowercase();
        assert!(request.starts_with("post /api/v1/agents/a1/chat "));
        assert!(request.contains("x-tenant-id: tenant123"));
        assert!(request.contains(r#"{"message":"hello"}"#));
    }

    #[tokio::test]
    async fn test_non_success_status_is_normalized() {
        let server = ScriptedServer::new(500, r#"{"detail":"Erro ao processar consulta"}"#).await;
        let client = AgentApiClient::new(&server.base_url, Duration::from_secs(5));

        let result = client.get("/api/v1/agents/a1/chat-history").await;

        assert_eq!(
            result,
            Err(FetchError::Status {
                status: 500,
                message: "Erro ao processar consulta".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_empty_body_is_null_not_error() {
        let server = ScriptedServer::new(200, "").await;
        let client = AgentApiClient::new(&server.base_url, Duration::from_secs(5));

        assert_eq!(client.get("/anything").await, Ok(Value::Null));
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed() {
        let server = ScriptedServer::new(200, "<html>oops</html>").await;
        let client = AgentApiClient::new(&server.base_url, Duration::from_secs(5));

        assert!(matches!(
            client.get("/anything").await,
            Err(FetchError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = AgentApiClient::new(&format!("http://{}", addr), Duration::from_secs(5));

        assert!(matches!(
            client.get("/anything").await,
            Err(FetchError::Network(_))
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = AgentApiClient::new("http://localhost:8000/", Duration::from_secs(1));
        assert_eq!(client.base_url(), "http://localhost:8000");
    }
}
