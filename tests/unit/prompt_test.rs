//! Unit tests for prompt composition and screening

use std::collections::BTreeMap;
use styleset_agent::models::{ModelVariation, TemplatePrompt};
use styleset_agent::prompt::compose::{BASE_NEGATIVE_TERMS, IDENTITY_LOCK};
use styleset_agent::prompt::{
    compose_portrait_prompt, compose_prompt, validate_prompt_safety, ComposeInput,
};

#[test]
fn test_fragments_appear_in_fixed_order() {
    let mut attrs = BTreeMap::new();
    attrs.insert("wardrobe".to_string(), "red dress".to_string());
    let base = TemplatePrompt {
        prompt: Some("studio photo".to_string()),
        ..Default::default()
    };

    let composed = compose_prompt(ComposeInput {
        locked_attributes: &attrs,
        base_prompt: &base,
        style_prompt: "bob cut",
        negative_style_prompt: Some("bangs"),
    });

    let lock = composed.prompt.find(IDENTITY_LOCK).expect("identity lock");
    let wardrobe = composed.prompt.find("- wardrobe: red dress").expect("locked attribute");
    let template = composed.prompt.find("studio photo").expect("template prompt");
    let style = composed.prompt.find("bob cut").expect("style");

    assert_eq!(lock, 0);
    assert!(lock < wardrobe);
    assert!(wardrobe < template);
    assert!(template < style);

    for term in BASE_NEGATIVE_TERMS {
        assert!(composed.negative_prompt.contains(term), "missing {}", term);
    }
    assert!(composed.negative_prompt.ends_with(", bangs"));
}

#[test]
fn test_negative_parts_joined_in_order() {
    let attrs = BTreeMap::new();
    let base = TemplatePrompt {
        negative_prompt: Some("blur".to_string()),
        aspect_ratio: Some("9:16".to_string()),
        lighting: Some("soft".to_string()),
        ..Default::default()
    };

    let composed = compose_prompt(ComposeInput {
        locked_attributes: &attrs,
        base_prompt: &base,
        style_prompt: "braids",
        negative_style_prompt: Some("frizz"),
    });

    let expected = format!("{}, blur, frizz", BASE_NEGATIVE_TERMS.join(", "));
    assert_eq!(composed.negative_prompt, expected);
    assert_eq!(composed.metadata.aspect_ratio, "9:16");
    assert_eq!(composed.metadata.lighting, "soft");
    assert_eq!(composed.metadata.background, "");
}

#[test]
fn test_safety_blocks_case_insensitively() {
    let err = validate_prompt_safety("Make her look YOUNGER with bangs", None).unwrap_err();
    assert_eq!(err.term, "younger");
    assert!(err.to_string().contains("Only hairstyle changes are allowed"));
}

#[test]
fn test_safety_checks_negative_text() {
    assert!(validate_prompt_safety("long layers", Some("nsfw")).is_err());
    assert!(validate_prompt_safety("long layers", Some("frizz, flyaways")).is_ok());
}

#[test]
fn test_portrait_prompt_keeps_scene() {
    let variation = ModelVariation::new("Kyoto", "Japanese woman, 25, jet black hair");
    let prompt = compose_portrait_prompt(&variation);
    assert!(prompt.contains("EXACT SAME SCENE"));
    assert!(prompt.contains("NEW IDENTITY: Japanese woman, 25, jet black hair"));
}
