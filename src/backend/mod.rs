//! Backend module - provider trait and the Gemini HTTP client

pub mod gemini;
pub mod traits;

pub use gemini::GeminiProvider;
pub use traits::{
    ImageProvider, ProviderError, ProviderRequest, ProviderResponse, ReferenceImage, ResponsePart,
};
