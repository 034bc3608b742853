use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Duration;

use crate::config::Config;
use crate::session::Session;

/// Outcome of a completion request, delivered once per submission.
#[derive(Debug, Clone)]
pub enum CompletionEvent {
    /// Endpoint returned a generated response
    Completed(String),
    /// Request failed; carries detail for the status line, the transcript
    /// only ever shows the fixed error text
    Failed(String),
}

/// Request body for the completion endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub context_enabled: bool,
}

impl CompletionRequest {
    pub fn new(query: String, session: &Session) -> Self {
        Self {
            query,
            thread_id: Some(session.thread_id.clone()),
            context_enabled: session.context_enabled,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    response: String,
}

/// HTTP client for the completion endpoint
#[derive(Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    endpoint: String,
}

impl CompletionClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// One-shot completion, awaited in place. Used by the `ask` subcommand.
    pub async fn complete(&self, query: String, session: &Session) -> Result<String> {
        let request = CompletionRequest::new(query, session);
        self.fetch(request).await
    }

    /// Dispatch a completion request onto the runtime and hand back a
    /// receiver that yields exactly one event. The UI loop drains it with
    /// `try_recv` so the transcript is only ever mutated from the event loop.
    pub fn request(&self, query: String, session: &Session) -> mpsc::Receiver<CompletionEvent> {
        let (tx, rx) = mpsc::channel(1);
        let client = self.clone();
        let request = CompletionRequest::new(query, session);

        tokio::spawn(async move {
            let event = match client.fetch(request).await {
                Ok(response) => CompletionEvent::Completed(response),
                Err(e) => CompletionEvent::Failed(e.to_string()),
            };
            let _ = tx.send(event).await;
        });

        rx
    }

    async fn fetch(&self, request: CompletionRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "completion request failed with status {}",
                response.status()
            ));
        }

        let body: CompletionResponse = response.json().await?;
        Ok(body.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session(context_enabled: bool) -> Session {
        Session {
            thread_id: "thread-123".to_string(),
            context_enabled,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn request_carries_session_fields() {
        let request = CompletionRequest::new("What is an API?".to_string(), &session(false));
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["query"], "What is an API?");
        assert_eq!(json["thread_id"], "thread-123");
        assert_eq!(json["context_enabled"], false);
    }

    #[test]
    fn absent_thread_id_is_left_off_the_wire() {
        let request = CompletionRequest {
            query: "hello".to_string(),
            thread_id: None,
            context_enabled: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("thread_id").is_none());
    }

    #[test]
    fn response_body_deserializes() {
        let body: CompletionResponse =
            serde_json::from_str(r#"{"response":"**Hello** there"}"#).unwrap();
        assert_eq!(body.response, "**Hello** there");
    }

    #[test]
    fn unknown_response_fields_are_ignored() {
        let body: CompletionResponse =
            serde_json::from_str(r#"{"response":"hi","elapsed_ms":120}"#).unwrap();
        assert_eq!(body.response, "hi");
    }

    #[tokio::test]
    async fn unreachable_endpoint_reports_failure_event() {
        let mut config = Config::default();
        // Reserved TEST-NET-1 address, nothing listens there.
        config.endpoint = "http://192.0.2.1:9/query".to_string();
        config.request_timeout_secs = 1;

        let client = CompletionClient::new(&config).unwrap();
        let mut rx = client.request("hello".to_string(), &session(false));

        match rx.recv().await {
            Some(CompletionEvent::Failed(detail)) => assert!(!detail.is_empty()),
            other => panic!("expected failure event, got {:?}", other),
        }
    }
}
