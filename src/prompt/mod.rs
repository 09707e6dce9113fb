//! Prompt composition and content screening

pub mod compose;
pub mod portrait;
pub mod safety;

pub use compose::{compose_prompt, ComposeInput, ComposedPrompt, PromptMetadata};
pub use portrait::{compose_portrait_prompt, PORTRAIT_NEGATIVE};
pub use safety::{validate_prompt_safety, SafetyViolation};
