//! Landing screen: the door video gates the upload affordance

use std::time::{Duration, Instant};

use crate::config::Clip;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntroPhase {
    /// Overlay asks the user to open the door
    Waiting,
    Playing,
    /// Video over, upload is visible
    Revealed,
}

#[derive(Debug)]
pub struct IntroGate {
    clip: Clip,
    phase: IntroPhase,
    started_at: Option<Instant>,
}

impl IntroGate {
    pub fn new(clip: Clip) -> Self {
        Self {
            clip,
            phase: IntroPhase::Waiting,
            started_at: None,
        }
    }

    pub fn phase(&self) -> IntroPhase {
        self.phase
    }

    pub fn upload_visible(&self) -> bool {
        self.phase == IntroPhase::Revealed
    }

    /// Click or key press: starts the video, or skips it while playing
    pub fn click(&mut self, now: Instant) {
        match self.phase {
            IntroPhase::Waiting => {
                self.phase = IntroPhase::Playing;
                self.started_at = Some(now);
            }
            IntroPhase::Playing => self.video_ended(),
            IntroPhase::Revealed => {}
        }
    }

    pub fn video_ended(&mut self) {
        self.phase = IntroPhase::Revealed;
    }

    /// Advance playback; ends the video once its running time has elapsed
    pub fn tick(&mut self, now: Instant) {
        if self.phase == IntroPhase::Playing && self.elapsed(now) >= self.clip.duration {
            self.video_ended();
        }
    }

    fn elapsed(&self, now: Instant) -> Duration {
        self.started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default()
    }

    /// Playback position in `0.0..=1.0`
    pub fn progress(&self, now: Instant) -> f64 {
        match self.phase {
            IntroPhase::Waiting => 0.0,
            IntroPhase::Revealed => 1.0,
            IntroPhase::Playing if self.clip.duration.is_zero() => 1.0,
            IntroPhase::Playing => {
                (self.elapsed(now).as_secs_f64() / self.clip.duration.as_secs_f64()).min(1.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> IntroGate {
        IntroGate::new(Clip::new("door.mp4", Duration::from_secs(4)))
    }

    #[test]
    fn test_video_end_reveals_upload() {
        let mut gate = gate();
        let start = Instant::now();
        assert!(!gate.upload_visible());

        gate.click(start);
        assert_eq!(gate.phase(), IntroPhase::Playing);
        gate.tick(start + Duration::from_secs(2));
        assert!(!gate.upload_visible());
        assert!((gate.progress(start + Duration::from_secs(2)) - 0.5).abs() < 1e-9);

        gate.tick(start + Duration::from_secs(4));
        assert!(gate.upload_visible());
    }

    #[test]
    fn test_second_click_skips() {
        let mut gate = gate();
        let start = Instant::now();
        gate.click(start);
        gate.click(start + Duration::from_millis(10));
        assert!(gate.upload_visible());
        assert_eq!(gate.progress(start), 1.0);
    }

    #[test]
    fn test_tick_before_click_does_nothing() {
        let mut gate = gate();
        gate.tick(Instant::now() + Duration::from_secs(60));
        assert_eq!(gate.phase(), IntroPhase::Waiting);
    }
}
