use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::{FunctionError, FunctionsState, Messages, present};
use crate::exercises::MachineGuess;
use crate::gateway::ChatMessage;
use crate::muscles::normalize_muscles;

const MESSAGES: Messages = Messages {
    upstream: "Failed to analyze machine",
    no_content: "No machine identified",
    parse: "Failed to parse machine data",
};

const PROMPT: &str = "You are a fitness equipment expert. Identify the gym machine in this photo \
and the muscles it primarily targets.

Return ONLY a JSON object with this structure (no markdown, no code blocks):
{
  \"name\": \"Common name of the machine\",
  \"muscles\": [\"target muscle\", \"another target muscle\"]
}";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBody {
    image_base64: Option<String>,
}

/// Accept either a full data URL or a bare base64 payload
fn as_data_url(image: &str) -> String {
    if image.starts_with("data:") {
        image.to_string()
    } else {
        format!("data:image/jpeg;base64,{}", image)
    }
}

/// `POST /analyze-machine`: `{ imageBase64 }` -> `{ name, muscles }`
pub async fn analyze_machine(
    State(state): State<FunctionsState>,
    payload: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Json<MachineGuess>, FunctionError> {
    let Json(body) = payload.map_err(|e| {
        warn!("analyze-machine: rejected body: {}", e);
        FunctionError::InvalidBody
    })?;

    let image = present(&body.image_base64).ok_or_else(|| {
        warn!("analyze-machine: imageBase64 missing");
        FunctionError::MissingFields(vec!["imageBase64"])
    })?;

    info!("analyze-machine: calling AI gateway, image length={}", image.len());
    let messages = [ChatMessage::user_with_image(PROMPT, as_data_url(image))];

    let guess: MachineGuess = state
        .gateway
        .complete_json(&messages)
        .await
        .map_err(|e| {
            error!("analyze-machine: gateway call failed: {}", e);
            FunctionError::from_gateway(e, &MESSAGES)
        })?;

    let guess = MachineGuess {
        name: guess.name.trim().to_string(),
        muscles: normalize_muscles(&guess.muscles),
    };
    if guess.name.is_empty() {
        error!("analyze-machine: model returned an empty machine name");
        return Err(FunctionError::NoContent(MESSAGES.no_content));
    }

    info!("analyze-machine: identified {} ({} muscles)", guess.name, guess.muscles.len());
    Ok(Json(guess))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::tests::read_response;
    use crate::gateway::{Gateway, GatewayError, MessageContent, ContentPart};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    fn body(image: Option<&str>) -> Result<Json<AnalyzeBody>, JsonRejection> {
        Ok(Json(AnalyzeBody {
            image_base64: image.map(str::to_string),
        }))
    }

    #[tokio::test]
    async fn test_identifies_machine() {
        let state = FunctionsState::new(Gateway::new_mock_fn(|messages| {
            let MessageContent::Parts(parts) = &messages[0].content else {
                panic!("expected multi-part message");
            };
            assert!(matches!(
                &parts[1],
                ContentPart::ImageUrl { image_url } if image_url.url == "data:image/jpeg;base64,QUJD"
            ));
            Ok("```json\n{\"name\": \" Lat Pulldown \", \"muscles\": [\"Lats\", \"lats\", \" biceps\"]}\n```".into())
        }));

        let Json(guess) = analyze_machine(State(state), body(Some("QUJD"))).await.unwrap();
        assert_eq!(guess.name, "Lat Pulldown");
        assert_eq!(guess.muscles, vec!["Lats", "biceps"]);
    }

    #[tokio::test]
    async fn test_missing_image_is_bad_request() {
        let state = FunctionsState::new(Gateway::new_mock_fn(|_| panic!("gateway must not be called")));
        let err = analyze_machine(State(state), body(Some("  "))).await.unwrap_err();

        let (status, json) = read_response(err.into_response()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Missing required fields: imageBase64");
    }

    #[tokio::test]
    async fn test_rate_limit_passes_through() {
        let state = FunctionsState::new(Gateway::new_mock_fn(|_| Err(GatewayError::RateLimited)));
        let err = analyze_machine(State(state), body(Some("data:image/png;base64,AAAA")))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_unparsable_reply() {
        let state = FunctionsState::new(Gateway::new_mock_fn(|_| Ok("It looks like a rowing machine.".into())));
        let err = analyze_machine(State(state), body(Some("AAAA"))).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Failed to parse machine data");
    }

    #[test]
    fn test_data_url_passthrough() {
        assert_eq!(as_data_url("data:image/webp;base64,AA"), "data:image/webp;base64,AA");
        assert_eq!(as_data_url("AA"), "data:image/jpeg;base64,AA");
    }
}
