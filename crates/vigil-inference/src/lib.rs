//! Scene assessment through an external vision inference service.

use async_trait::async_trait;
use vigil_types::{frame::Frame, Result, VigilError};

mod ollama;
mod response;

pub use ollama::{build_prompt, encode_jpeg_base64, OllamaClient};
pub use response::{extract_json, parse_analysis};

#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Sends one sampled frame and returns the service's raw response text.
    async fn infer(&self, frame: &Frame) -> Result<String>;
}

pub fn inference_error(message: impl Into<String>) -> VigilError {
    VigilError::Inference(message.into())
}

pub fn invalid_response(message: impl Into<String>) -> VigilError {
    VigilError::InvalidResponse(message.into())
}
