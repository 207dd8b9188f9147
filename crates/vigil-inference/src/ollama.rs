use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, ColorType};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vigil_types::{config::InferenceConfig, frame::Frame, Result};

use crate::{inference_error, InferenceClient};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    images: Vec<String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    jpeg_quality: u8,
}

impl OllamaClient {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| inference_error(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            jpeg_quality: config.jpeg_quality,
        })
    }

    fn request_body(&self, frame: &Frame) -> Result<GenerateRequest<'_>> {
        Ok(GenerateRequest {
            model: &self.model,
            prompt: build_prompt(frame.timestamp_sec),
            images: vec![encode_jpeg_base64(frame, self.jpeg_quality)?],
            stream: false,
        })
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn infer(&self, frame: &Frame) -> Result<String> {
        let body = self.request_body(frame)?;
        debug!(
            timestamp_sec = frame.timestamp_sec,
            model = %self.model,
            "submitting frame for assessment"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| inference_error(format!("request to {} failed: {err}", self.endpoint)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(inference_error(format!(
                "service returned {status}: {}",
                detail.trim()
            )));
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|err| inference_error(format!("unreadable service reply: {err}")))?;
        Ok(payload.response)
    }
}

/// Instructions sent with every frame; the model must answer with JSON only.
pub fn build_prompt(timestamp_sec: u64) -> String {
    format!(
        r#"Return ONLY valid JSON.

{{
  "timestamp_sec": {timestamp_sec},
  "people_count": number,
  "crowd_density": "low" | "medium" | "high",
  "fire_detected": true | false,
  "weapons_visible": true | false,
  "fight_detected": true | false,
  "panic_or_running": true | false,
  "confidence": number between 0 and 1,
  "notes": "short observation"
}}
"#
    )
}

pub fn encode_jpeg_base64(frame: &Frame, quality: u8) -> Result<String> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode(
            frame.image.as_raw(),
            frame.width(),
            frame.height(),
            ColorType::Rgb8,
        )
        .map_err(|err| inference_error(format!("jpeg encoding failed: {err}")))?;
    Ok(STANDARD.encode(jpeg))
}
