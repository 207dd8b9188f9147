use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use vigil_types::{config::CaptureConfig, frame::CapturedFrame, Result};

use crate::{capture_error, source_unavailable, FrameSource};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Recorded footage stored as one image file per frame, replayed in name order.
pub struct DirectorySource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    frame_period: Option<Duration>,
    next_due: Option<Instant>,
    primed: Option<CapturedFrame>,
}

impl DirectorySource {
    pub fn open(dir: &Path, config: &CaptureConfig) -> Result<Self> {
        let entries = fs::read_dir(dir).map_err(|err| {
            source_unavailable(format!("cannot read directory {}: {err}", dir.display()))
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(source_unavailable(format!(
                "no image frames found in {}",
                dir.display()
            )));
        }

        let frame_period = config
            .realtime_playback
            .then(|| Duration::try_from_secs_f64(1.0 / config.directory_fps).ok())
            .flatten();

        // An undecodable first frame makes the whole source unusable.
        let primed = decode(&files[0]).map_err(|err| {
            source_unavailable(format!("{}: {err}", dir.display()))
        })?;

        tracing::debug!(
            "Directory source {} holds {} frames",
            dir.display(),
            files.len()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            cursor: 1,
            frame_period,
            next_due: None,
            primed: Some(primed),
        })
    }

    fn pace(&mut self) {
        let Some(period) = self.frame_period else {
            return;
        };
        if let Some(due) = self.next_due {
            let wait = due.saturating_duration_since(Instant::now());
            if !wait.is_zero() {
                thread::sleep(wait);
            }
        }
        self.next_due = Some(Instant::now() + period);
    }
}

fn decode(path: &Path) -> Result<CapturedFrame> {
    let image = image::open(path)
        .map_err(|err| capture_error(format!("failed to decode {}: {err}", path.display())))?;
    Ok(CapturedFrame::new(image.to_rgb8()))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

impl FrameSource for DirectorySource {
    fn read(&mut self) -> Result<Option<CapturedFrame>> {
        if let Some(frame) = self.primed.take() {
            self.pace();
            return Ok(Some(frame));
        }
        let Some(path) = self.files.get(self.cursor).cloned() else {
            return Ok(None);
        };
        self.pace();
        self.cursor += 1;
        decode(&path).map(Some)
    }

    fn close(&mut self) {
        self.primed = None;
        self.cursor = self.files.len();
    }

    fn describe(&self) -> String {
        format!("directory {} ({} frames)", self.dir.display(), self.files.len())
    }
}
