//! Muscle list normalization
//!
//! Muscle labels come from two places: the comma separated field of the edit
//! form and the JSON reply of the vision model. Both end up as the same
//! trimmed, deduplicated list.

use std::collections::HashSet;

/// Split a comma separated list typed by the user
pub fn parse_muscle_list(input: &str) -> Vec<String> {
    normalize_muscles(input.split(','))
}

/// Trim labels, drop empty ones and remove case-insensitive duplicates.
/// The first spelling of a label wins and order is preserved.
pub fn normalize_muscles<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut muscles = Vec::new();

    for label in labels {
        let label = label.as_ref().trim();
        if label.is_empty() {
            continue;
        }
        if seen.insert(label.to_lowercase()) {
            muscles.push(label.to_string());
        }
    }

    muscles
}

/// Render a muscle list back into the edit form representation
pub fn join_muscles(muscles: &[String]) -> String {
    muscles.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_drops_empty() {
        let muscles = parse_muscle_list(" chest , ,triceps,, front delts ");
        assert_eq!(muscles, vec!["chest", "triceps", "front delts"]);
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_muscle_list("").is_empty());
        assert!(parse_muscle_list(" , ,  ").is_empty());
    }

    #[test]
    fn test_dedup_keeps_first_spelling() {
        let muscles = normalize_muscles(["Lats", "biceps", "lats", " LATS "]);
        assert_eq!(muscles, vec!["Lats", "biceps"]);
    }

    #[test]
    fn test_join_then_parse_is_stable() {
        let muscles = vec!["Quadriceps".to_string(), "Glutes".to_string()];
        let joined = join_muscles(&muscles);
        assert_eq!(joined, "Quadriceps, Glutes");
        assert_eq!(parse_muscle_list(&joined), muscles);
    }
}
