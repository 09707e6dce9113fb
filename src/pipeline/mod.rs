//! Slide and set generation pipeline

pub mod manifest;
pub mod repair;
pub mod set;
pub mod slide;

pub use manifest::{ManifestHairstyle, ManifestSlide, SetManifest};
pub use repair::{repair_set, RepairReport};
pub use set::{create_set, SetGenerator, SetReport, SlideSpec};
pub use slide::{SlideContext, SlideGenerator, UNREADABLE_HASH};
