use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use vigil_capture::FrameSource;
use vigil_types::telemetry::PipelineStats;

use crate::{
    handoff::HandoffSender,
    sampler::{SampleOutcome, Sampler},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerExit {
    EndOfStream,
    StopRequested,
    SourceFailed,
}

#[derive(Debug, Clone)]
pub struct ProducerReport {
    pub exit: ProducerExit,
    pub stats: PipelineStats,
}

/// Reads the source until it ends, fails, or a stop is requested, offering
/// every raw frame to the sampler. Blocks only on the source itself.
pub fn run_producer(
    mut source: Box<dyn FrameSource>,
    mut sampler: Sampler,
    handoff: HandoffSender,
    stop: CancellationToken,
) -> ProducerReport {
    let mut stats = PipelineStats::default();

    let exit = loop {
        if stop.is_cancelled() {
            break ProducerExit::StopRequested;
        }
        let captured = match source.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => break ProducerExit::EndOfStream,
            Err(err) => {
                error!("Video source failed: {err}");
                break ProducerExit::SourceFailed;
            }
        };
        stats.frames_read += 1;

        match sampler.offer(captured, Instant::now(), &handoff) {
            SampleOutcome::Enqueued { timestamp_sec } => {
                stats.frames_sampled += 1;
                debug!(timestamp_sec, "frame handed to inference");
            }
            SampleOutcome::Dropped => {
                stats.frames_dropped += 1;
                debug!(
                    timestamp_sec = sampler.next_timestamp(),
                    "handoff full; sample skipped"
                );
            }
            SampleOutcome::NotDue => {}
        }
    };

    source.close();
    drop(handoff);
    info!(
        "Capture finished ({:?}): {} frames read, {} sampled, {} skipped",
        exit, stats.frames_read, stats.frames_sampled, stats.frames_dropped
    );
    ProducerReport { exit, stats }
}
