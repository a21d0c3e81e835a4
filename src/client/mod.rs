//! Client for the functions server

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::exercises::{AnalyzeRequest, ExercisePlan, GenerateRequest, MachineGuess};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The function answered with `{ "error": … }`
    #[error("{message}")]
    Endpoint { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The two AI-backed calls the views depend on
#[allow(async_fn_in_trait)]
pub trait FunctionsApi {
    /// Identify the machine shown in a `data:` URL
    async fn analyze_machine(&self, image_data_url: &str) -> Result<MachineGuess, ClientError>;
    async fn generate_exercises(&self, request: &GenerateRequest) -> Result<ExercisePlan, ClientError>;
}

/// HTTP implementation talking to `<base_url>/analyze-machine` and
/// `<base_url>/generate-exercises`
#[derive(Clone)]
pub struct HttpFunctions {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpFunctions {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn invoke<B, T>(&self, function: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, function);
        debug!("invoking {}", url);

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        let status = response.status();
        let value: Value = response.json().await?;

        // A `{ "error" }` body is a failure even when the status says otherwise
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            error!("{} failed with {}: {}", function, status.as_u16(), message);
            return Err(ClientError::Endpoint {
                status: status.as_u16(),
                message: message.to_string(),
            });
        }
        if status != StatusCode::OK {
            error!("{} failed with {}", function, status.as_u16());
            return Err(ClientError::Endpoint {
                status: status.as_u16(),
                message: format!("{} failed", function),
            });
        }

        Ok(serde_json::from_value(value)?)
    }
}

impl FunctionsApi for HttpFunctions {
    async fn analyze_machine(&self, image_data_url: &str) -> Result<MachineGuess, ClientError> {
        let body = AnalyzeRequest {
            image_base64: image_data_url.to_string(),
        };
        self.invoke("analyze-machine", &body).await
    }

    async fn generate_exercises(&self, request: &GenerateRequest) -> Result<ExercisePlan, ClientError> {
        self.invoke("generate-exercises", request).await
    }
}
