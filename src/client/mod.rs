//! Rate-limited generation client

pub mod backoff;
pub mod gate;
pub mod generation;

pub use backoff::BackoffPolicy;
pub use gate::{CallGate, IntervalGate, Unthrottled};
pub use generation::{GeneratedImage, GenerationClient, GenerationError, GenerationInput};
