//! Exercise plan types shared by the functions server and the client

use serde::{Deserialize, Deserializer, Serialize};

const VIDEO_SEARCH_URL: &str = "https://www.youtube.com/results";

/// Accept `"3"`, `3`, `3.0` or `null` for free-text fields like sets and reps.
/// Models are told to answer with strings but do not always listen.
fn deserialize_loose_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<TextOrNumber>::deserialize(deserializer)? {
        Some(TextOrNumber::Text(s)) => s,
        Some(TextOrNumber::Int(i)) => i.to_string(),
        Some(TextOrNumber::Float(f)) => f.to_string(),
        None => String::new(),
    })
}

/// `null` reads as the type's empty value
fn deserialize_nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A single generated exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    #[serde(default, deserialize_with = "deserialize_loose_text")]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_loose_text")]
    pub sets: String,
    #[serde(default, deserialize_with = "deserialize_loose_text")]
    pub reps: String,
    #[serde(default, deserialize_with = "deserialize_loose_text")]
    pub rest: String,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub tips: String,
    /// Query for the tutorial video search
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub youtube_search: String,
}

impl Exercise {
    /// Fill in the tutorial query if the model left it out
    pub fn with_search_query(mut self, machine_name: &str) -> Self {
        if self.youtube_search.trim().is_empty() {
            self.youtube_search = format!("{} {} tutorial", self.name.trim(), machine_name.trim());
        }
        self
    }

    /// External video search link for this exercise
    pub fn tutorial_url(&self) -> String {
        let query = if self.youtube_search.trim().is_empty() {
            self.name.as_str()
        } else {
            self.youtube_search.as_str()
        };
        match reqwest::Url::parse_with_params(VIDEO_SEARCH_URL, &[("search_query", query)]) {
            Ok(url) => url.to_string(),
            Err(_) => VIDEO_SEARCH_URL.to_string(),
        }
    }
}

/// Reply of the generate-exercises function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExercisePlan {
    pub exercises: Vec<Exercise>,
}

/// Reply of the analyze-machine function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineGuess {
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub muscles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub image_base64: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub machine_name: String,
    pub muscles: Vec<String>,
    pub workout_goal: String,
}
