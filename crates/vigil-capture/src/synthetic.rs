use image::{Rgb, RgbImage};
use vigil_types::{frame::CapturedFrame, Result};

use crate::FrameSource;

/// Deterministic in-memory source yielding solid-colour frames.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    total: u64,
    emitted: u64,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, total: u64) -> Self {
        Self {
            width,
            height,
            total,
            emitted: 0,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn read(&mut self) -> Result<Option<CapturedFrame>> {
        if self.emitted >= self.total {
            return Ok(None);
        }
        let shade = (self.emitted % 256) as u8;
        self.emitted += 1;
        let image = RgbImage::from_pixel(self.width, self.height, Rgb([shade, shade, shade]));
        Ok(Some(CapturedFrame::new(image)))
    }

    fn close(&mut self) {
        self.emitted = self.total;
    }

    fn describe(&self) -> String {
        format!(
            "synthetic {}x{} ({} frames)",
            self.width, self.height, self.total
        )
    }
}
