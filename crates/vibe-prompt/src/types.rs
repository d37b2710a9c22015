//! Shared prompt helpers.

/// Sanitize input to prevent prompt injection through fence breaking.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("```", "\\`\\`\\`")
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect()
}
