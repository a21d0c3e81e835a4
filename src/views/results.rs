//! Generated plan view

use crate::exercises::Exercise;

/// What the machine list hands over on navigation
#[derive(Debug, Clone, PartialEq)]
pub struct PlanState {
    pub machine_name: String,
    pub workout_goal: String,
    pub exercises: Vec<Exercise>,
}

/// Results screen. Without state (opened directly) it shows the empty message.
#[derive(Debug, Default)]
pub struct ExerciseResults {
    state: Option<PlanState>,
}

impl ExerciseResults {
    pub const EMPTY_MESSAGE: &'static str = "No exercise data found";

    pub fn new(state: Option<PlanState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> Option<&PlanState> {
        self.state.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_none()
    }

    pub fn title(&self) -> String {
        match &self.state {
            Some(state) => format!("{} - {}", state.machine_name, state.workout_goal),
            None => Self::EMPTY_MESSAGE.to_string(),
        }
    }

    pub fn exercises(&self) -> &[Exercise] {
        self.state
            .as_ref()
            .map(|s| s.exercises.as_slice())
            .unwrap_or_default()
    }

    /// Tutorial search link for one card
    pub fn tutorial_url(&self, index: usize) -> Option<String> {
        self.exercises().get(index).map(Exercise::tutorial_url)
    }

    /// Plain text rendering, used by the `generate` command
    pub fn render_text(&self) -> String {
        let Some(state) = &self.state else {
            return format!("{}\n", Self::EMPTY_MESSAGE);
        };

        let mut out = format!("{}\nGoal: {}\n", state.machine_name, state.workout_goal);
        for (i, ex) in state.exercises.iter().enumerate() {
            out.push_str(&format!("\n{}. {}\n", i + 1, ex.name));
            if !ex.description.is_empty() {
                out.push_str(&format!("   {}\n", ex.description));
            }
            out.push_str(&format!("   Sets: {}  Reps: {}  Rest: {}\n", ex.sets, ex.reps, ex.rest));
            if !ex.tips.is_empty() {
                out.push_str(&format!("   Tip: {}\n", ex.tips));
            }
            out.push_str(&format!("   Tutorial: {}\n", ex.tutorial_url()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> PlanState {
        PlanState {
            machine_name: "Leg Press".into(),
            workout_goal: "hypertrophy".into(),
            exercises: vec![Exercise {
                name: "High Foot Press".into(),
                description: "Feet high on the platform".into(),
                sets: "3".into(),
                reps: "10-12".into(),
                rest: "90s".into(),
                tips: "Keep your lower back flat".into(),
                youtube_search: "high foot leg press".into(),
            }],
        }
    }

    #[test]
    fn test_missing_state_shows_empty_message() {
        let results = ExerciseResults::new(None);
        assert!(results.is_empty());
        assert_eq!(results.title(), "No exercise data found");
        assert!(results.exercises().is_empty());
        assert_eq!(results.tutorial_url(0), None);
        assert_eq!(results.render_text(), "No exercise data found\n");
    }

    #[test]
    fn test_cards_and_links() {
        let results = ExerciseResults::new(Some(state()));
        assert_eq!(results.title(), "Leg Press - hypertrophy");
        assert_eq!(results.exercises().len(), 1);

        let url = results.tutorial_url(0).unwrap();
        assert!(url.starts_with("https://www.youtube.com/results?search_query="));
        assert!(url.contains("high+foot+leg+press"));
        assert_eq!(results.tutorial_url(1), None);
    }

    #[test]
    fn test_render_text() {
        let text = ExerciseResults::new(Some(state())).render_text();
        assert!(text.starts_with("Leg Press\nGoal: hypertrophy\n"));
        assert!(text.contains("1. High Foot Press"));
        assert!(text.contains("Sets: 3  Reps: 10-12  Rest: 90s"));
        assert!(text.contains("Tip: Keep your lower back flat"));
        assert!(text.contains("Tutorial: https://www.youtube.com/results?search_query="));
    }
}
