//! Functions server - the analyze-machine and generate-exercises endpoints
//!
//! Each handler validates its JSON body, builds a prompt, forwards it to the
//! chat-completion gateway and answers with parsed JSON or `{ "error": … }`.

mod analyze;
mod generate;

pub use analyze::analyze_machine;
pub use generate::generate_exercises;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::gateway::{Gateway, GatewayError};

#[derive(Clone)]
pub struct FunctionsState {
    pub gateway: Arc<Gateway>,
}

impl FunctionsState {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Failure of a function call, rendered as a status code and `{ "error" }`
#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("Invalid request body")]
    InvalidBody,
    #[error("API configuration error")]
    Configuration,
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,
    #[error("AI credits exhausted. Please add credits to continue.")]
    QuotaExhausted,
    /// Any other gateway failure, with the per-function message
    #[error("{0}")]
    Upstream(&'static str),
    #[error("{0}")]
    NoContent(&'static str),
    #[error("{0}")]
    Parse(&'static str),
}

impl FunctionError {
    pub fn status(&self) -> StatusCode {
        match self {
            FunctionError::MissingFields(_) | FunctionError::InvalidBody => StatusCode::BAD_REQUEST,
            FunctionError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            FunctionError::QuotaExhausted => StatusCode::PAYMENT_REQUIRED,
            FunctionError::Configuration
            | FunctionError::Upstream(_)
            | FunctionError::NoContent(_)
            | FunctionError::Parse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Per-function wording for the generic 500 responses
pub(crate) struct Messages {
    pub upstream: &'static str,
    pub no_content: &'static str,
    pub parse: &'static str,
}

impl FunctionError {
    pub(crate) fn from_gateway(err: GatewayError, messages: &Messages) -> Self {
        match err {
            GatewayError::MissingApiKey => FunctionError::Configuration,
            GatewayError::RateLimited => FunctionError::RateLimited,
            GatewayError::QuotaExhausted => FunctionError::QuotaExhausted,
            GatewayError::Upstream { .. } | GatewayError::Transport(_) => {
                FunctionError::Upstream(messages.upstream)
            }
            GatewayError::EmptyCompletion => FunctionError::NoContent(messages.no_content),
            GatewayError::Parse(_) => FunctionError::Parse(messages.parse),
        }
    }
}

impl IntoResponse for FunctionError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}

/// Non-empty string field, `None` when absent or blank
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Permissive CORS, preflight included
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Request body cap. Images arrive base64 encoded inside the JSON body,
/// so a 20 MB photo needs about 27 MB.
pub const MAX_BODY_BYTES: usize = 28 * 1024 * 1024;

pub fn router(state: FunctionsState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/functions/v1/analyze-machine", post(analyze_machine))
        .route("/functions/v1/generate-exercises", post(generate_exercises))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer())
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(bind: &str, state: FunctionsState) -> anyhow::Result<()> {
    if !state.gateway.is_configured() {
        error!("AI gateway API key not found, function calls will fail");
    }

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Functions server running on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::to_bytes;

    /// Status and JSON body of a handler response
    pub(crate) async fn read_response(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_missing_fields_message() {
        let err = FunctionError::MissingFields(vec!["machineName", "workoutGoal"]);
        assert_eq!(err.to_string(), "Missing required fields: machineName, workoutGoal");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_gateway_error_mapping() {
        let messages = Messages {
            upstream: "Failed",
            no_content: "Nothing",
            parse: "Unparsable",
        };
        let cases = [
            (GatewayError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (GatewayError::QuotaExhausted, StatusCode::PAYMENT_REQUIRED),
            (GatewayError::MissingApiKey, StatusCode::INTERNAL_SERVER_ERROR),
            (
                GatewayError::Upstream {
                    status: 500,
                    body: String::new(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(FunctionError::from_gateway(err, &messages).status(), status);
        }

        let parse_err = serde_json::from_str::<Value>("nope").unwrap_err();
        let err = FunctionError::from_gateway(GatewayError::Parse(parse_err), &messages);
        assert_eq!(err.to_string(), "Unparsable");
    }

    #[tokio::test]
    async fn test_error_response_body() {
        let (status, body) = read_response(FunctionError::QuotaExhausted.into_response()).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["error"], "AI credits exhausted. Please add credits to continue.");
    }
}
