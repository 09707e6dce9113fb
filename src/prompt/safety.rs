//! Blocked-term screening of style prompts

use thiserror::Error;

/// Terms that would change identity, age or push content out of bounds.
pub const BLOCKED_TERMS: &[&str] = &[
    "make her look like",
    "make him look like",
    "change face",
    "different person",
    "change identity",
    "change skin",
    "change body",
    "change age",
    "younger",
    "older",
    "change ethnicity",
    "change race",
    "nude",
    "naked",
    "sexual",
    "explicit",
    "nsfw",
    "child",
    "minor",
    "underage",
    "kid",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Blocked term detected: \"{term}\". Only hairstyle changes are allowed.")]
pub struct SafetyViolation {
    pub term: &'static str,
}

fn screen(text: &str) -> Result<(), SafetyViolation> {
    let lower = text.to_lowercase();
    match BLOCKED_TERMS.iter().copied().find(|term| lower.contains(term)) {
        Some(term) => Err(SafetyViolation { term }),
        None => Ok(()),
    }
}

/// Check a style prompt and its optional negative prompt
pub fn validate_prompt_safety(prompt: &str, negative_prompt: Option<&str>) -> Result<(), SafetyViolation> {
    screen(prompt)?;
    if let Some(negative) = negative_prompt {
        screen(negative)?;
    }
    Ok(())
}
