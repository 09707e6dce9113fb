//! Prompt for a model-variation stand-in portrait

use crate::models::ModelVariation;

pub const PORTRAIT_NEGATIVE: &str = "no phone, no mirror, no props, no text overlays, no watermark, \
no logos, no colored background, no gradients, no background texture, no studio elements visible, \
no heavy beauty filter, no uncanny valley, no distorted face, no extra limbs, no harsh shadows, \
no frizz, no flyaways, no hair covering eyes";

/// Build the instruction that swaps the person while keeping the scene.
pub fn compose_portrait_prompt(variation: &ModelVariation) -> String {
    format!(
        "CRITICAL RULES - MUST FOLLOW:
You are a world-class fashion photographer and retoucher.
Generate a new image where the EXACT SAME SCENE, POSE, AND WARDROBE are preserved from the reference image, but the PERSON is COMPLETELY DIFFERENT.

You MUST preserve ALL of the following EXACTLY as they appear in the reference:
- Pose and posture
- Framing and camera angle
- Wardrobe / clothing (must be the exact same clothes with the same colors and textures)
- Background and environment (must be the exact same setting)
- Lighting and color grading
- Camera lens and depth of field
- Overall image aesthetic and body type

The ONLY thing that changes is the IDENTITY of the person's face.
NEW IDENTITY: {persona}
No resemblance to the original person.

Do NOT alter the wardrobe, background, or pose.",
        persona = variation.persona.trim()
    )
}
