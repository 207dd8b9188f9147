//! Devices and video files decoded by an `ffmpeg` child process.
//!
//! ffmpeg re-encodes whatever it reads into an MJPEG stream on stdout; the
//! stream is split on JPEG start/end markers and each image decoded here.

use std::{
    collections::VecDeque,
    ffi::OsString,
    io::{self, BufRead, BufReader, Read},
    path::Path,
    process::{Child, ChildStderr, ChildStdout, Command, Stdio},
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
};

use image::ImageFormat;
use vigil_types::{config::CaptureConfig, frame::CapturedFrame, Result};

use crate::{capture_error, source_unavailable, FrameSource};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const READ_CHUNK: usize = 64 * 1024;
const STDERR_TAIL_LINES: usize = 16;
const STDERR_LINE_MAX: usize = 512;

/// Splits a concatenated JPEG byte stream into individual images.
#[derive(Debug, Default)]
pub struct JpegSplitter {
    buffer: Vec<u8>,
}

impl JpegSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads until one complete image is buffered. `Ok(None)` means the
    /// reader hit end of file; a trailing partial image is discarded.
    pub fn next_image<R: Read>(&mut self, reader: &mut R) -> io::Result<Option<Vec<u8>>> {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if let Some(image) = self.extract() {
                return Ok(Some(image));
            }
            let read = match reader.read(&mut chunk) {
                Ok(read) => read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            if read == 0 {
                self.buffer.clear();
                return Ok(None);
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }

    fn extract(&mut self) -> Option<Vec<u8>> {
        let Some(start) = find_marker(&self.buffer, SOI, 0) else {
            // A lone 0xFF may be the first half of the next start marker.
            let keep = usize::from(self.buffer.last() == Some(&0xFF));
            let discard = self.buffer.len() - keep;
            self.buffer.drain(..discard);
            return None;
        };
        self.buffer.drain(..start);
        let end = find_marker(&self.buffer, EOI, SOI.len())?;
        Some(self.buffer.drain(..end + EOI.len()).collect())
    }
}

fn find_marker(haystack: &[u8], marker: [u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(marker.len())
        .position(|window| window == marker.as_slice())
        .map(|pos| pos + from)
}

/// Keeps ffmpeg's stderr pipe empty so the process never stalls on it,
/// retaining only the last few lines for error reports.
struct StderrTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    reader: Option<JoinHandle<()>>,
}

impl StderrTail {
    fn spawn(stderr: ChildStderr, label: &str) -> io::Result<Self> {
        let lines = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let sink = Arc::clone(&lines);
        let label = label.to_string();
        let reader = thread::Builder::new()
            .name("ffmpeg-stderr".into())
            .spawn(move || drain_stderr(stderr, &label, &sink))?;
        Ok(Self {
            lines,
            reader: Some(reader),
        })
    }

    /// Waits for the pipe to close, then returns the retained lines.
    fn finish(&mut self) -> String {
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        match self.lines.lock() {
            Ok(lines) => lines.iter().cloned().collect::<Vec<_>>().join("\n"),
            Err(_) => String::new(),
        }
    }
}

fn drain_stderr(stderr: ChildStderr, label: &str, sink: &Mutex<VecDeque<String>>) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let line: String = String::from_utf8_lossy(&buf)
            .trim_end()
            .chars()
            .take(STDERR_LINE_MAX)
            .collect();
        if line.is_empty() {
            continue;
        }
        tracing::debug!("{label}: {line}");
        if let Ok(mut lines) = sink.lock() {
            if lines.len() == STDERR_TAIL_LINES {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }
}

pub struct FfmpegSource {
    label: String,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr: Option<StderrTail>,
    splitter: JpegSplitter,
    primed: Option<CapturedFrame>,
    exhausted: bool,
}

impl FfmpegSource {
    pub fn open_device(index: u32, config: &CaptureConfig) -> Result<Self> {
        let device = format!("/dev/video{index}");
        let input = vec![
            OsString::from("-f"),
            OsString::from(&config.device_input_format),
            OsString::from("-i"),
            OsString::from(&device),
        ];
        Self::spawn(format!("device {device}"), input, config)
    }

    pub fn open_file(path: &Path, config: &CaptureConfig) -> Result<Self> {
        if !path.is_file() {
            return Err(source_unavailable(format!(
                "video file {} does not exist",
                path.display()
            )));
        }
        let mut input = Vec::new();
        if config.realtime_playback {
            input.push(OsString::from("-re"));
        }
        input.push(OsString::from("-i"));
        input.push(path.as_os_str().to_os_string());
        Self::spawn(format!("file {}", path.display()), input, config)
    }

    fn spawn(label: String, input: Vec<OsString>, config: &CaptureConfig) -> Result<Self> {
        let mut child = Command::new(&config.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin"])
            .args(&input)
            .args(["-an", "-f", "image2pipe", "-vcodec", "mjpeg", "-q:v", "3", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                source_unavailable(format!("failed to launch {}: {err}", config.ffmpeg_path))
            })?;

        let stdout = child.stdout.take();
        let stderr = match child.stderr.take().map(|pipe| StderrTail::spawn(pipe, &label)) {
            Some(Ok(tail)) => Some(tail),
            Some(Err(err)) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(source_unavailable(format!(
                    "failed to watch {label} diagnostics: {err}"
                )));
            }
            None => None,
        };
        let mut source = Self {
            label,
            child: Some(child),
            stdout,
            stderr,
            splitter: JpegSplitter::new(),
            primed: None,
            exhausted: false,
        };

        // Decode one frame up front so an unreadable source fails at open time.
        match source.next_decoded() {
            Ok(Some(frame)) => {
                source.primed = Some(frame);
                Ok(source)
            }
            Ok(None) => {
                source.close();
                let detail = source.stderr_output();
                Err(source_unavailable(format!(
                    "{} produced no frames: {}",
                    source.label,
                    detail.trim()
                )))
            }
            Err(err) => {
                source.close();
                Err(source_unavailable(format!("{}: {err}", source.label)))
            }
        }
    }

    fn next_decoded(&mut self) -> Result<Option<CapturedFrame>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };
        let bytes = self
            .splitter
            .next_image(stdout)
            .map_err(|err| capture_error(format!("reading {} failed: {err}", self.label)))?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let image = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
            .map_err(|err| capture_error(format!("failed to decode frame: {err}")))?;
        Ok(Some(CapturedFrame::new(image.to_rgb8())))
    }

    fn stderr_output(&mut self) -> String {
        self.stderr
            .as_mut()
            .map(StderrTail::finish)
            .unwrap_or_default()
    }
}

impl FrameSource for FfmpegSource {
    fn read(&mut self) -> Result<Option<CapturedFrame>> {
        if let Some(frame) = self.primed.take() {
            return Ok(Some(frame));
        }
        if self.exhausted {
            return Ok(None);
        }
        match self.next_decoded()? {
            Some(frame) => Ok(Some(frame)),
            None => {
                tracing::debug!("{} reached end of stream", self.label);
                self.close();
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.exhausted = true;
        self.primed = None;
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn describe(&self) -> String {
        format!("ffmpeg {}", self.label)
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.close();
    }
}
