use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::models::{BackendReply, ChatRequest};

/// Seam between the session controller and the remote refinement service.
/// The production implementation is [`RefineClient`]; tests script replies
/// through a mock.
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    async fn dispatch(&self, request: &ChatRequest) -> Result<BackendReply>;
}

/// JSON-over-HTTP client for the summarization service's refinement
/// endpoints: `/chat` rewrites the summary, `/answer-question` answers
/// without touching it.
#[derive(Clone)]
pub struct RefineClient {
    client: Client,
    base_url: String,
}

impl RefineClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn post_json(&self, path: &str, body: &impl Serialize) -> Result<BackendReply> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to call refinement endpoint /{path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "refinement endpoint /{path} returned {status}: {}",
                normalize_err_body(&body)
            );
        }

        response
            .json::<BackendReply>()
            .await
            .with_context(|| format!("failed to decode refinement endpoint /{path} response"))
    }
}

#[async_trait]
impl SummaryBackend for RefineClient {
    async fn dispatch(&self, request: &ChatRequest) -> Result<BackendReply> {
        match request {
            ChatRequest::Update(update) => self.post_json("chat", update).await,
            ChatRequest::Question(question) => self.post_json("answer-question", question).await,
        }
    }
}

fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(err) = json.get("error").and_then(|v| v.as_str()) {
            return err.to_string();
        }
    }

    trimmed.to_string()
}
