use serde::{Deserialize, Serialize};

/// Counters describing how many frames moved through each pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Raw frames read from the source.
    pub frames_read: u64,
    /// Frames accepted by the handoff.
    pub frames_sampled: u64,
    /// Sampling opportunities skipped because the handoff was full.
    pub frames_dropped: u64,
    pub frames_analyzed: u64,
    pub inference_failures: u64,
}

impl PipelineStats {
    pub fn merge(self, other: PipelineStats) -> Self {
        Self {
            frames_read: self.frames_read + other.frames_read,
            frames_sampled: self.frames_sampled + other.frames_sampled,
            frames_dropped: self.frames_dropped + other.frames_dropped,
            frames_analyzed: self.frames_analyzed + other.frames_analyzed,
            inference_failures: self.inference_failures + other.inference_failures,
        }
    }
}
