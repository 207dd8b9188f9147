//! Video frame sources.
//!
//! Every source yields decoded frames until its medium is exhausted, after
//! which it keeps reporting end-of-stream. Opening a source that cannot be
//! decoded fails with [`VigilError::SourceUnavailable`].

use std::path::PathBuf;

use vigil_types::{config::CaptureConfig, frame::CapturedFrame, Result, VigilError};

mod directory;
mod ffmpeg;
mod synthetic;

pub use directory::DirectorySource;
pub use ffmpeg::{FfmpegSource, JpegSplitter};
pub use synthetic::SyntheticSource;

pub trait FrameSource: Send {
    /// Returns the next frame, or `Ok(None)` once the source is exhausted.
    fn read(&mut self) -> Result<Option<CapturedFrame>>;
    fn close(&mut self);
    fn describe(&self) -> String;
}

/// What the user asked to monitor.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    /// Live capture device by index.
    Device(u32),
    /// Recorded video file.
    File(PathBuf),
    /// Directory of recorded still frames.
    Directory(PathBuf),
    Synthetic {
        width: u32,
        height: u32,
        frames: u64,
    },
}

const SYNTHETIC_SCHEME: &str = "synthetic://";

impl SourceSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(VigilError::SourceUnavailable("empty source".into()));
        }
        if let Some(rest) = trimmed.strip_prefix(SYNTHETIC_SCHEME) {
            return parse_synthetic(rest);
        }
        if trimmed.chars().all(|c| c.is_ascii_digit()) {
            let index = trimmed
                .parse()
                .map_err(|err| capture_error(format!("invalid device index {trimmed}: {err}")))?;
            return Ok(SourceSpec::Device(index));
        }
        let path = PathBuf::from(trimmed);
        if path.is_dir() {
            Ok(SourceSpec::Directory(path))
        } else {
            Ok(SourceSpec::File(path))
        }
    }
}

fn parse_synthetic(rest: &str) -> Result<SourceSpec> {
    let (dims, query) = rest.split_once('?').unwrap_or((rest, ""));
    let (width, height) = match dims.split_once('x') {
        Some((w, h)) => (
            w.parse()
                .map_err(|_| capture_error(format!("invalid synthetic width '{w}'")))?,
            h.parse()
                .map_err(|_| capture_error(format!("invalid synthetic height '{h}'")))?,
        ),
        None if dims.is_empty() => (640, 480),
        None => return Err(capture_error(format!("invalid synthetic size '{dims}'"))),
    };
    let mut frames = 100;
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some(("frames", value)) => {
                frames = value
                    .parse()
                    .map_err(|_| capture_error(format!("invalid frame count '{value}'")))?;
            }
            _ => return Err(capture_error(format!("unknown synthetic option '{pair}'"))),
        }
    }
    if width == 0 || height == 0 {
        return Err(capture_error("synthetic frames need a non-zero size"));
    }
    Ok(SourceSpec::Synthetic {
        width,
        height,
        frames,
    })
}

/// Opens the requested source. Failure here is fatal to the session.
pub fn open_source(spec: &SourceSpec, config: &CaptureConfig) -> Result<Box<dyn FrameSource>> {
    let source: Box<dyn FrameSource> = match spec {
        SourceSpec::Device(index) => Box::new(FfmpegSource::open_device(*index, config)?),
        SourceSpec::File(path) => Box::new(FfmpegSource::open_file(path, config)?),
        SourceSpec::Directory(path) => Box::new(DirectorySource::open(path, config)?),
        SourceSpec::Synthetic {
            width,
            height,
            frames,
        } => Box::new(SyntheticSource::new(*width, *height, *frames)),
    };
    tracing::info!("Opened video source {}", source.describe());
    Ok(source)
}

pub fn capture_error(message: impl Into<String>) -> VigilError {
    VigilError::Capture(message.into())
}

pub fn source_unavailable(message: impl Into<String>) -> VigilError {
    VigilError::SourceUnavailable(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_source_is_device() {
        assert_eq!(SourceSpec::parse("0").unwrap(), SourceSpec::Device(0));
        assert_eq!(SourceSpec::parse(" 2 ").unwrap(), SourceSpec::Device(2));
    }

    #[test]
    fn path_source_is_file_or_directory() {
        assert_eq!(
            SourceSpec::parse("/tmp/does-not-exist/cafe.mp4").unwrap(),
            SourceSpec::File(PathBuf::from("/tmp/does-not-exist/cafe.mp4"))
        );
        let dir = std::env::temp_dir();
        assert_eq!(
            SourceSpec::parse(dir.to_str().expect("utf8 temp dir")).unwrap(),
            SourceSpec::Directory(dir.clone())
        );
    }

    #[test]
    fn synthetic_source_options() {
        assert_eq!(
            SourceSpec::parse("synthetic://320x240?frames=12").unwrap(),
            SourceSpec::Synthetic {
                width: 320,
                height: 240,
                frames: 12
            }
        );
        assert_eq!(
            SourceSpec::parse("synthetic://").unwrap(),
            SourceSpec::Synthetic {
                width: 640,
                height: 480,
                frames: 100
            }
        );
        assert!(SourceSpec::parse("synthetic://0x10").is_err());
        assert!(SourceSpec::parse("synthetic://10x10?fps=3").is_err());
    }

    #[test]
    fn empty_source_is_unavailable() {
        assert!(matches!(
            SourceSpec::parse("   "),
            Err(VigilError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn missing_file_fails_to_open() {
        let spec = SourceSpec::File(PathBuf::from("/nonexistent/vigil/cafe.mp4"));
        let result = open_source(&spec, &CaptureConfig::default());
        assert!(matches!(result, Err(VigilError::SourceUnavailable(_))));
    }
}
