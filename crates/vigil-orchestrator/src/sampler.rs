use std::time::{Duration, Instant};

use image::{imageops::FilterType, RgbImage};
use vigil_types::{
    config::CaptureConfig,
    frame::{CapturedFrame, Frame},
};

use crate::handoff::HandoffSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Enqueued { timestamp_sec: u64 },
    /// Less than one interval since the last emitted sample.
    NotDue,
    /// The interval elapsed but the handoff was full.
    Dropped,
}

/// Throttles a raw frame stream to at most one handoff per interval.
///
/// Emitted frames carry a synthetic timestamp that starts at zero and grows by
/// `timestamp_step` per emission, independent of actual elapsed time.
pub struct Sampler {
    interval: Duration,
    timestamp_step: u64,
    resize_width: Option<u32>,
    last_emit: Instant,
    next_timestamp: u64,
}

impl Sampler {
    pub fn new(interval: Duration, timestamp_step: u64, started_at: Instant) -> Self {
        Self {
            interval,
            timestamp_step,
            resize_width: None,
            last_emit: started_at,
            next_timestamp: 0,
        }
    }

    pub fn from_config(config: &CaptureConfig, started_at: Instant) -> Self {
        Self::new(
            Duration::from_secs(config.frame_interval_secs),
            config.frame_interval_secs,
            started_at,
        )
        .with_resize_width(config.resize_width)
    }

    pub fn with_resize_width(mut self, width: u32) -> Self {
        self.resize_width = Some(width).filter(|w| *w > 0);
        self
    }

    pub fn next_timestamp(&self) -> u64 {
        self.next_timestamp
    }

    pub fn offer(
        &mut self,
        captured: CapturedFrame,
        now: Instant,
        handoff: &HandoffSender,
    ) -> SampleOutcome {
        if now.saturating_duration_since(self.last_emit) < self.interval {
            return SampleOutcome::NotDue;
        }
        if !handoff.has_capacity() {
            return SampleOutcome::Dropped;
        }

        let captured = match self.resize_width {
            Some(width) => CapturedFrame {
                image: resize_to_width(captured.image, width),
                ..captured
            },
            None => captured,
        };
        let timestamp_sec = self.next_timestamp;
        if !handoff.try_enqueue(Frame::from_captured(captured, timestamp_sec)) {
            return SampleOutcome::Dropped;
        }

        self.next_timestamp += self.timestamp_step;
        self.last_emit = now;
        SampleOutcome::Enqueued { timestamp_sec }
    }
}

/// Scales to `width`, keeping the aspect ratio (height rounds down, minimum 1).
pub fn resize_to_width(image: RgbImage, width: u32) -> RgbImage {
    let (src_width, src_height) = image.dimensions();
    if src_width == width || src_width == 0 || width == 0 {
        return image;
    }
    let height = (u64::from(src_height) * u64::from(width) / u64::from(src_width)).max(1);
    let height = u32::try_from(height).unwrap_or(u32::MAX);
    image::imageops::resize(&image, width, height, FilterType::Triangle)
}
