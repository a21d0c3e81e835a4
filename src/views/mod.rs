//! Client views - explicit, owned state for each screen
//!
//! The terminal UI and the one-shot CLI commands both drive these. Nothing
//! here touches the terminal, so every flow is testable on its own.

pub mod intro;
pub mod machines;
pub mod results;
pub mod upload;

pub use intro::IntroGate;
pub use machines::{EditForm, MachineList};
pub use results::{ExerciseResults, PlanState};
pub use upload::{ImageFile, UploadForm};

use crate::config::Clip;

/// Where the app should go next
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Intro,
    Machines,
    Exercises(PlanState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Toast-style notification
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Notices {
    items: Vec<Notice>,
}

impl Notices {
    pub fn success(&mut self, message: impl Into<String>) {
        self.items.push(Notice {
            level: NoticeLevel::Success,
            message: message.into(),
        });
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.items.push(Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        });
    }

    pub fn last(&self) -> Option<&Notice> {
        self.items.last()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Notice> {
        self.items.iter().filter(|n| n.level == NoticeLevel::Error)
    }

    /// Take all pending notices
    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.items)
    }
}

/// Plays a clip to its end
#[allow(async_fn_in_trait)]
pub trait ClipPlayer {
    async fn play(&self, clip: &Clip);
}

/// Terminal stand-in for a video element: waits for the clip's running time
pub struct TimedPlayer;

impl ClipPlayer for TimedPlayer {
    async fn play(&self, clip: &Clip) {
        tracing::debug!("playing {} for {:?}", clip.path.display(), clip.duration);
        tokio::time::sleep(clip.duration).await;
    }
}
