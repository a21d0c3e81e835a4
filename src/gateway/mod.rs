//! Chat-completion gateway client
//!
//! Talks to an OpenAI-compatible `/chat/completions` endpoint. A mock backend
//! answers from a closure so handlers can be tested without the network.

mod fences;

pub use fences::strip_code_fences;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::GatewayConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway API key is not configured")]
    MissingApiKey,
    #[error("gateway rate limit exceeded")]
    RateLimited,
    #[error("gateway credits exhausted")]
    QuotaExhausted,
    #[error("gateway returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway reply had no content")]
    EmptyCompletion,
    #[error("cannot parse gateway reply: {0}")]
    Parse(#[source] serde_json::Error),
}

impl GatewayError {
    /// Map a non-success HTTP status of the gateway
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => GatewayError::RateLimited,
            402 => GatewayError::QuotaExhausted,
            _ => GatewayError::Upstream { status, body },
        }
    }
}

/// Message author. Both functions send a single user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One part of a multi-part user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// User message carrying a prompt and an image
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.into(),
                    },
                },
            ]),
        }
    }

    /// Plain text of the message, images left out
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

type MockFn = Arc<dyn Fn(&[ChatMessage]) -> Result<String, GatewayError> + Send + Sync>;

enum GatewayBackend {
    Http {
        client: reqwest::Client,
        url: String,
        api_key: Option<String>,
        model: String,
    },
    Mock {
        responder: MockFn,
    },
}

pub struct Gateway {
    backend: GatewayBackend,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        info!("Gateway::new url={} model={}", config.url, config.model);
        Self {
            backend: GatewayBackend::Http {
                client: reqwest::Client::new(),
                url: config.url,
                api_key: config.api_key,
                model: config.model,
            },
        }
    }

    pub fn new_mock_fn(
        f: impl Fn(&[ChatMessage]) -> Result<String, GatewayError> + Send + Sync + 'static,
    ) -> Self {
        debug!("Gateway::new_mock_fn creating mock backend");
        Self {
            backend: GatewayBackend::Mock {
                responder: Arc::new(f),
            },
        }
    }

    /// Whether a call can be attempted at all
    pub fn is_configured(&self) -> bool {
        match &self.backend {
            GatewayBackend::Http { api_key, .. } => api_key.is_some(),
            GatewayBackend::Mock { .. } => true,
        }
    }

    /// Send the messages and return the text of the first choice
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, GatewayError> {
        match &self.backend {
            GatewayBackend::Http {
                client,
                url,
                api_key,
                model,
            } => {
                let api_key = api_key.as_ref().ok_or(GatewayError::MissingApiKey)?;
                debug!("Gateway call model={} messages={}", model, messages.len());

                let response = client
                    .post(url)
                    .bearer_auth(api_key)
                    .json(&CompletionRequest { model, messages })
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    error!("Gateway error: {} {}", status.as_u16(), body);
                    return Err(GatewayError::from_status(status.as_u16(), body));
                }

                let completion: CompletionResponse = response.json().await?;
                let content = completion
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .map(|content| content.trim().to_string())
                    .filter(|content| !content.is_empty())
                    .ok_or(GatewayError::EmptyCompletion)?;

                debug!("Gateway response length={}", content.len());
                Ok(content)
            }
            GatewayBackend::Mock { responder } => {
                debug!("Mock gateway responder invoked");
                let reply = responder(messages)?;
                let reply = reply.trim().to_string();
                if reply.is_empty() {
                    return Err(GatewayError::EmptyCompletion);
                }
                Ok(reply)
            }
        }
    }

    /// Like [`Gateway::complete`], then strip fences and parse the reply as JSON
    pub async fn complete_json<T>(&self, messages: &[ChatMessage]) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        let raw = self.complete(messages).await?;
        let stripped = strip_code_fences(&raw);
        serde_json::from_str(stripped).map_err(|e| {
            error!("Cannot parse gateway JSON output: {} -- error: {}", stripped, e);
            GatewayError::Parse(e)
        })
    }
}
