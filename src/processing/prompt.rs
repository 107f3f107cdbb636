//! Builds the instruction string and prompt text sent to the speech backend.

use super::pace::Pace;

/// Join free-form style instructions with the pace hint.
///
/// Empty parts are dropped; the rest are joined with `". "`.
pub fn combined_instructions(instructions: &str, pace: Pace) -> String {
    [instructions.trim(), pace.hint().unwrap_or("")]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(". ")
}

/// Wrap `text` with a style preamble when instructions are present.
pub fn speech_prompt(text: &str, instructions: &str) -> String {
    let instructions = instructions.trim();
    if instructions.is_empty() {
        text.to_string()
    } else {
        format!(
            "Style Instruction: {}\n\nText to speak:\n{}",
            instructions, text
        )
    }
}

/// Append a style preset to existing instructions, separated by one space.
pub fn append_style(existing: &str, addition: &str) -> String {
    if existing.is_empty() {
        addition.to_string()
    } else {
        format!("{} {}", existing, addition)
    }
}
