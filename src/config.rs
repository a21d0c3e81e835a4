//! Configuration - gateway credentials, endpoints and clip assets
//!
//! Values come from the environment (a `.env` file is loaded by `main`) and
//! can be overridden on the command line.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "gymlens.db";
pub const DEFAULT_BIND: &str = "0.0.0.0:54321";
pub const DEFAULT_FUNCTIONS_URL: &str = "http://localhost:54321/functions/v1";
pub const DEFAULT_GATEWAY_URL: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

/// Pause after a successful upload so the notification can be read
pub const REDIRECT_DELAY: Duration = Duration::from_millis(1500);

/// Chat-completion gateway settings used by the functions server
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl GatewayConfig {
    /// Read `AI_GATEWAY_URL`, `AI_GATEWAY_API_KEY` (or `LOVABLE_API_KEY`) and `AI_MODEL`
    pub fn from_env() -> Self {
        let api_key = env::var("AI_GATEWAY_API_KEY")
            .or_else(|_| env::var("LOVABLE_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());

        Self {
            url: env::var("AI_GATEWAY_URL").unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string()),
            api_key,
            model: env::var("AI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        }
    }
}

/// A video asset with a known running time
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub path: PathBuf,
    pub duration: Duration,
}

impl Clip {
    pub fn new(path: impl Into<PathBuf>, duration: Duration) -> Self {
        Self {
            path: path.into(),
            duration,
        }
    }

    /// Door opening video on the landing screen
    pub fn intro() -> Self {
        Self::from_env("GYMLENS_INTRO_CLIP", "assets/door-video.mp4", Duration::from_secs(4))
    }

    /// Video shown while the exercise plan is generated
    pub fn transition() -> Self {
        Self::from_env(
            "GYMLENS_TRANSITION_CLIP",
            "assets/transition-video.mp4",
            Duration::from_secs(5),
        )
    }

    fn from_env(var: &str, default_path: &str, duration: Duration) -> Self {
        let path = env::var(var).unwrap_or_else(|_| default_path.to_string());
        Self::new(path, duration)
    }
}

/// Everything the client side (CLI and TUI) needs
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub database_path: String,
    pub functions_url: String,
    /// Sent as bearer token to the functions server, if set
    pub api_key: Option<String>,
    pub intro: Clip,
    pub transition: Clip,
    pub redirect_delay: Duration,
}

impl ClientConfig {
    pub fn new(database_path: String, functions_url: String, api_key: Option<String>) -> Self {
        Self {
            database_path,
            functions_url,
            api_key,
            intro: Clip::intro(),
            transition: Clip::transition(),
            redirect_delay: REDIRECT_DELAY,
        }
    }
}
