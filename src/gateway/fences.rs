//! Markdown fence stripping for model replies

/// Remove a surrounding ```` ```json ```` / ```` ``` ```` fence, if any.
/// Unfenced text is only trimmed.
pub fn strip_code_fences(s: &str) -> &str {
    let mut trimmed = s.trim();
    if let Some(stripped) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```JSON"))
    {
        trimmed = stripped;
    } else if let Some(stripped) = trimmed.strip_prefix("```") {
        trimmed = stripped;
    }
    if let Some(stripped) = trimmed.trim_end().strip_suffix("```") {
        trimmed = stripped;
    }
    trimmed.trim()
}
