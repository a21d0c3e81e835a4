use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::{FunctionError, FunctionsState, Messages, present};
use crate::exercises::ExercisePlan;
use crate::gateway::ChatMessage;

const MESSAGES: Messages = Messages {
    upstream: "Failed to generate exercises",
    no_content: "No exercises generated",
    parse: "Failed to parse exercise data",
};

/// Exercises requested per plan
const PLAN_SIZE: usize = 6;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    machine_name: Option<String>,
    muscles: Option<Vec<String>>,
    workout_goal: Option<String>,
}

fn build_prompt(machine_name: &str, muscles: &[String], workout_goal: &str) -> String {
    format!(
        "You are a professional fitness trainer. Generate exactly {count} specific exercises \
for the following gym machine and workout goal.

Machine: {machine_name}
Machine targets: {muscles}
User's workout goal: {workout_goal}

Provide {count} exercises that:
1. Are specifically designed for this machine
2. Target the user's stated workout goal
3. Include proper form and technique tips
4. Have appropriate sets, reps, and rest times

Return ONLY a JSON object with this structure (no markdown, no code blocks):
{{
  \"exercises\": [
    {{
      \"name\": \"Exercise name\",
      \"description\": \"Brief description of the exercise and proper form\",
      \"sets\": \"number of sets\",
      \"reps\": \"number of reps or duration\",
      \"rest\": \"rest time between sets\",
      \"tips\": \"1-2 sentence form tip\",
      \"youtubeSearch\": \"search query for a tutorial video of this exercise\"
    }}
  ]
}}",
        count = PLAN_SIZE,
        muscles = muscles.join(", "),
    )
}

/// `POST /generate-exercises`: `{ machineName, muscles, workoutGoal }` -> `{ exercises }`
pub async fn generate_exercises(
    State(state): State<FunctionsState>,
    payload: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<ExercisePlan>, FunctionError> {
    let Json(body) = payload.map_err(|e| {
        warn!("generate-exercises: rejected body: {}", e);
        FunctionError::InvalidBody
    })?;

    let machine_name = present(&body.machine_name);
    let workout_goal = present(&body.workout_goal);

    let mut missing = Vec::new();
    if machine_name.is_none() {
        missing.push("machineName");
    }
    if body.muscles.is_none() {
        missing.push("muscles");
    }
    if workout_goal.is_none() {
        missing.push("workoutGoal");
    }
    let (Some(machine_name), Some(muscles), Some(workout_goal)) =
        (machine_name, body.muscles.as_deref(), workout_goal)
    else {
        warn!("generate-exercises: missing fields {:?}", missing);
        return Err(FunctionError::MissingFields(missing));
    };

    info!(
        "generate-exercises: calling AI gateway for machine={} goal={}",
        machine_name, workout_goal
    );
    let messages = [ChatMessage::user(build_prompt(machine_name, muscles, workout_goal))];

    let plan: ExercisePlan = state
        .gateway
        .complete_json(&messages)
        .await
        .map_err(|e| {
            error!("generate-exercises: gateway call failed: {}", e);
            FunctionError::from_gateway(e, &MESSAGES)
        })?;

    if plan.exercises.is_empty() {
        error!("generate-exercises: model returned an empty plan");
        return Err(FunctionError::NoContent(MESSAGES.no_content));
    }

    let exercises = plan
        .exercises
        .into_iter()
        .map(|exercise| exercise.with_search_query(machine_name))
        .collect::<Vec<_>>();

    info!("generate-exercises: {} exercises for {}", exercises.len(), machine_name);
    Ok(Json(ExercisePlan { exercises }))
}
