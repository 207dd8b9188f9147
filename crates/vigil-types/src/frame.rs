use chrono::{DateTime, Duration, Utc};
use image::RgbImage;

/// A decoded frame as produced by a video source, before sampling.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub image: RgbImage,
    pub captured_at: DateTime<Utc>,
}

impl CapturedFrame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// A sampled frame tagged with its session timestamp.
///
/// `timestamp_sec` is a synthetic clock: it advances by the sampling interval
/// for every emitted frame and is unrelated to wall-clock time elapsed. The
/// image buffer is owned, so whichever pipeline stage holds the frame is its
/// only owner.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub timestamp_sec: u64,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn from_captured(captured: CapturedFrame, timestamp_sec: u64) -> Self {
        Self {
            image: captured.image,
            timestamp_sec,
            captured_at: captured.captured_at,
        }
    }

    /// Wall-clock time since the source decoded this frame.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.captured_at)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
