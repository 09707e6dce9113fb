//! Composition of the outbound prompt for one slide
//!
//! The composed prompt always opens with the identity lock, followed by the
//! subject's locked scene attributes, the template prompt and finally the
//! hairstyle. Nothing here performs I/O.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::TemplatePrompt;

pub const DEFAULT_STYLE: &str = "photorealistic";
pub const DEFAULT_ASPECT_RATIO: &str = "3:4";

/// Delimiter between negative prompt fragments
pub const NEGATIVE_DELIMITER: &str = ", ";

pub const IDENTITY_LOCK: &str = "CRITICAL RULES - MUST FOLLOW:
You are looking at the SAME PERSON shown in the reference image(s).
Generate a new image of this EXACT SAME PERSON with ONLY the hairstyle changed.

You MUST preserve ALL of the following EXACTLY as they appear in the reference:
- IMAGE LAYOUT AND FORMAT (CRITICAL: If the reference is a stacked vertical diptych with a top panel and bottom panel, you MUST generate a stacked vertical diptych with a top panel and bottom panel)
- Face (every facial feature, shape, symmetry)
- Skin tone and texture
- Body type, build, proportions
- Age and expression
- Pose and posture
- Framing, camera angle, and cropping
- Wardrobe / clothing
- Background and environment
- Lighting and color grading
- Camera lens and depth of field

The ONLY thing that changes is the HAIRSTYLE described below.
Do NOT alter ANYTHING else. The person MUST be recognizably the same individual.";

/// Identity and layout drift terms every slide forbids
pub const BASE_NEGATIVE_TERMS: &[&str] = &[
    "single image",
    "missing panels",
    "merged image",
    "different layout",
    "different person",
    "different identity",
    "face change",
    "altered face",
    "different skin tone",
    "altered body",
    "different age",
    "different expression",
    "different wardrobe",
    "different clothing",
    "background change",
    "different lighting",
    "different pose",
    "different camera angle",
    "different framing",
];

pub const SCENE_HEADING: &str = "SCENE ATTRIBUTES TO PRESERVE:";
pub const STYLE_HEADING: &str = "IMAGE STYLE:";
pub const HAIRSTYLE_HEADING: &str = "HAIRSTYLE (the ONLY change):";

/// Everything that feeds one composed prompt
#[derive(Debug, Clone, Copy)]
pub struct ComposeInput<'a> {
    pub locked_attributes: &'a BTreeMap<String, String>,
    pub base_prompt: &'a TemplatePrompt,
    pub style_prompt: &'a str,
    pub negative_style_prompt: Option<&'a str>,
}

/// Metadata echoed alongside the composed prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMetadata {
    pub style: String,
    pub aspect_ratio: String,
    pub lighting: String,
    pub background: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedPrompt {
    pub prompt: String,
    pub negative_prompt: String,
    pub metadata: PromptMetadata,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Merge identity lock, locked attributes, template and style into one request
pub fn compose_prompt(input: ComposeInput<'_>) -> ComposedPrompt {
    let mut parts: Vec<String> = vec![IDENTITY_LOCK.to_string()];

    if !input.locked_attributes.is_empty() {
        let lines: Vec<String> = input
            .locked_attributes
            .iter()
            .map(|(key, value)| format!("- {}: {}", key, value))
            .collect();
        parts.push(format!("\n{}\n{}", SCENE_HEADING, lines.join("\n")));
    }

    if let Some(template_prompt) = non_empty(&input.base_prompt.prompt) {
        parts.push(format!("\n{} {}", STYLE_HEADING, template_prompt));
    }

    parts.push(format!("\n{} {}", HAIRSTYLE_HEADING, input.style_prompt));

    let mut negative: Vec<String> = vec![BASE_NEGATIVE_TERMS.join(NEGATIVE_DELIMITER)];
    if let Some(template_negative) = non_empty(&input.base_prompt.negative_prompt) {
        negative.push(template_negative.to_string());
    }
    if let Some(style_negative) = input.negative_style_prompt.map(str::trim).filter(|n| !n.is_empty()) {
        negative.push(style_negative.to_string());
    }

    let base = input.base_prompt;
    ComposedPrompt {
        prompt: parts.join("\n"),
        negative_prompt: negative.join(NEGATIVE_DELIMITER),
        metadata: PromptMetadata {
            style: non_empty(&base.style).unwrap_or(DEFAULT_STYLE).to_string(),
            aspect_ratio: non_empty(&base.aspect_ratio)
                .unwrap_or(DEFAULT_ASPECT_RATIO)
                .to_string(),
            lighting: non_empty(&base.lighting).unwrap_or_default().to_string(),
            background: non_empty(&base.background).unwrap_or_default().to_string(),
        },
    }
}
