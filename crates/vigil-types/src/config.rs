use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Result, VigilError};

/// Upper bound on frames waiting between the sampler and the inference worker.
pub const FRAME_QUEUE_SIZE: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Seconds between samples; also the step of the session timestamp.
    pub frame_interval_secs: u64,
    pub resize_width: u32,
    pub ffmpeg_path: String,
    /// ffmpeg demuxer used for numeric device sources.
    pub device_input_format: String,
    /// Pace recorded sources at their native rate instead of decoding flat out.
    pub realtime_playback: bool,
    pub directory_fps: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_interval_secs: 1,
            resize_width: 640,
            ffmpeg_path: "ffmpeg".into(),
            device_input_format: "v4l2".into(),
            realtime_playback: true,
            directory_fps: 25.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub dequeue_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: FRAME_QUEUE_SIZE,
            dequeue_timeout_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    pub jpeg_quality: u8,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/generate".into(),
            model: "qwen3-vl:2b".into(),
            timeout_secs: 120,
            jpeg_quality: 85,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_path: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_path: "cafe_security_output.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub log_level: String,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub capture: CaptureConfig,
    pub pipeline: PipelineConfig,
    pub inference: InferenceConfig,
    pub report: ReportConfig,
    pub ops: OpsConfig,
}

impl VigilConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            VigilError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            VigilError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.frame_interval_secs == 0 {
            return Err(VigilError::Configuration(
                "capture.frame_interval_secs must be greater than zero".into(),
            ));
        }
        if self.capture.resize_width == 0 {
            return Err(VigilError::Configuration(
                "capture.resize_width must be greater than zero".into(),
            ));
        }
        if self.capture.directory_fps.is_nan() || self.capture.directory_fps <= 0.0 {
            return Err(VigilError::Configuration(
                "capture.directory_fps must be greater than zero".into(),
            ));
        }
        if self.pipeline.queue_capacity == 0 {
            return Err(VigilError::Configuration(
                "pipeline.queue_capacity must be greater than zero".into(),
            ));
        }
        if self.pipeline.dequeue_timeout_ms == 0 {
            return Err(VigilError::Configuration(
                "pipeline.dequeue_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.inference.timeout_secs == 0 {
            return Err(VigilError::Configuration(
                "inference.timeout_secs must be greater than zero".into(),
            ));
        }
        if !(1..=100).contains(&self.inference.jpeg_quality) {
            return Err(VigilError::Configuration(
                "inference.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        if self.inference.endpoint.trim().is_empty() {
            return Err(VigilError::Configuration(
                "inference.endpoint must not be empty".into(),
            ));
        }
        if self.report.output_path.trim().is_empty() {
            return Err(VigilError::Configuration(
                "report.output_path must not be empty".into(),
            ));
        }
        Ok(())
    }
}
