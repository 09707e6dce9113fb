//! Run orchestration

pub mod config;
pub mod model_variation;
pub mod orchestrator;
pub mod selection;

pub use self::config::{resolve_config, RunRequest};
pub use model_variation::{prepare_stand_in, StandIn};
pub use orchestrator::{set_name, Orchestrator, RunHandle};
pub use selection::select_presets;
