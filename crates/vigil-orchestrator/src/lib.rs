//! Session lifecycle: capture and inference running side by side, coordinated
//! shutdown, then aggregation of the result stream.

pub mod aggregate;
pub mod handoff;
pub mod producer;
pub mod sampler;
pub mod worker;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio_util::sync::CancellationToken;
use tracing::info;
use vigil_capture::FrameSource;
use vigil_inference::InferenceClient;
use vigil_ops::ReportSink;
use vigil_types::{
    config::{CaptureConfig, PipelineConfig},
    telemetry::PipelineStats,
    Result, VigilError,
};

use crate::{
    aggregate::{summarize, SessionOutcome},
    handoff::handoff,
    producer::{run_producer, ProducerExit},
    sampler::Sampler,
    worker::InferenceWorker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Running,
    Draining,
    Done,
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub stats: PipelineStats,
    pub producer_exit: ProducerExit,
}

/// Owns the stop signal and runs exactly one monitoring session.
pub struct LifecycleController<C: InferenceClient> {
    client: Arc<C>,
    capture: CaptureConfig,
    pipeline: PipelineConfig,
    stop: CancellationToken,
    state: LifecycleState,
}

impl<C: InferenceClient + 'static> LifecycleController<C> {
    pub fn new(client: C, capture: CaptureConfig, pipeline: PipelineConfig) -> Self {
        Self {
            client: Arc::new(client),
            capture,
            pipeline,
            stop: CancellationToken::new(),
            state: LifecycleState::Idle,
        }
    }

    /// Handle for requesting a stop from outside, e.g. a signal handler.
    /// Cancelling more than once has no further effect.
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Runs the session to completion and hands a non-empty summary to `sink`.
    ///
    /// The source must already be open; failing to open it is the caller's
    /// fatal error, raised before anything is spawned here.
    pub async fn run(
        &mut self,
        source: Box<dyn FrameSource>,
        sink: &dyn ReportSink,
    ) -> Result<SessionReport> {
        if self.state != LifecycleState::Idle {
            return Err(orchestrator_error(format!(
                "session cannot start from state {:?}",
                self.state
            )));
        }

        let (tx, rx) = handoff(self.pipeline.queue_capacity)?;
        let sampler = Sampler::from_config(&self.capture, Instant::now());
        let worker = InferenceWorker::new(
            Arc::clone(&self.client),
            rx,
            self.stop.clone(),
            Duration::from_millis(self.pipeline.dequeue_timeout_ms),
        );

        self.transition(LifecycleState::Running);
        let producer_stop = self.stop.clone();
        let producer =
            tokio::task::spawn_blocking(move || run_producer(source, sampler, tx, producer_stop));
        let worker = tokio::spawn(worker.run());

        let producer = producer.await;
        self.stop.cancel();
        self.transition(LifecycleState::Draining);
        // The worker is joined even when the capture task failed.
        let worker = worker.await;
        self.transition(LifecycleState::Done);

        let producer =
            producer.map_err(|err| orchestrator_error(format!("capture task failed: {err}")))?;
        let worker =
            worker.map_err(|err| orchestrator_error(format!("inference task failed: {err}")))?;

        let stats = producer.stats.merge(worker.stats);
        let outcome = summarize(worker.results);
        match &outcome {
            SessionOutcome::Summary(summary) => sink.persist(summary).await?,
            SessionOutcome::NothingAnalyzed => info!("No frames analyzed."),
        }

        Ok(SessionReport {
            outcome,
            stats,
            producer_exit: producer.exit,
        })
    }

    fn transition(&mut self, next: LifecycleState) {
        info!("Lifecycle {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

pub fn orchestrator_error(message: impl Into<String>) -> VigilError {
    VigilError::Orchestrator(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::tests::{response, ScriptedClient};
    use vigil_capture::SyntheticSource;
    use vigil_ops::MemoryReportSink;

    fn fast_pipeline() -> (CaptureConfig, PipelineConfig) {
        let capture = CaptureConfig {
            frame_interval_secs: 1,
            resize_width: 16,
            ..CaptureConfig::default()
        };
        let pipeline = PipelineConfig {
            dequeue_timeout_ms: 10,
            ..PipelineConfig::default()
        };
        (capture, pipeline)
    }

    #[tokio::test]
    async fn every_handed_off_frame_is_accounted_for() {
        let (capture, pipeline) = fast_pipeline();
        let client = ScriptedClient::new(vec![
            Ok(response(2, "low", false)),
            Ok("not json at all".into()),
            Ok(response(4, "low", false)),
        ])
        .with_delay(Duration::from_millis(300));
        let mut controller = LifecycleController::new(client, capture, pipeline);
        let sink = MemoryReportSink::new();

        let report = controller
            .run(Box::new(PacedSource::new(10, Duration::from_millis(250))), &sink)
            .await
            .expect("session runs");

        assert_eq!(controller.state(), LifecycleState::Done);
        assert_eq!(report.producer_exit, ProducerExit::EndOfStream);
        assert_eq!(report.stats.frames_read, 10);
        assert!(report.stats.frames_sampled >= 1);
        assert_eq!(
            report.stats.frames_sampled,
            report.stats.frames_analyzed + report.stats.inference_failures
        );
        if let SessionOutcome::Summary(summary) = &report.outcome {
            let timestamps: Vec<u64> = summary.frames.iter().map(|f| f.timestamp_sec()).collect();
            assert!(timestamps.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[tokio::test]
    async fn empty_session_reports_nothing_analyzed() {
        let (capture, pipeline) = fast_pipeline();
        let mut controller =
            LifecycleController::new(ScriptedClient::default(), capture, pipeline);
        let sink = MemoryReportSink::new();

        let report = controller
            .run(Box::new(SyntheticSource::new(8, 8, 0)), &sink)
            .await
            .expect("session runs");

        assert_eq!(report.outcome, SessionOutcome::NothingAnalyzed);
        assert!(sink.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn sampled_session_is_summarized_and_persisted() {
        let (capture, pipeline) = fast_pipeline();
        let client = ScriptedClient::new(vec![
            Ok(response(2, "low", false)),
            Ok(response(4, "low", true)),
        ]);
        let mut controller = LifecycleController::new(client, capture, pipeline);
        let sink = MemoryReportSink::new();

        let report = controller
            .run(Box::new(PacedSource::new(3, Duration::from_millis(600))), &sink)
            .await
            .expect("session runs");

        let SessionOutcome::Summary(summary) = report.outcome else {
            panic!("expected a summary, stats {:?}", report.stats);
        };
        assert_eq!(summary.frames.len(), 1);
        assert_eq!(summary.frames[0].timestamp_sec(), 0);
        assert_eq!(summary.max_people, 2);
        assert_eq!(sink.snapshot().await, vec![summary]);
    }

    #[tokio::test]
    async fn stop_request_ends_an_endless_source() {
        let (capture, pipeline) = fast_pipeline();
        let mut controller =
            LifecycleController::new(ScriptedClient::default(), capture, pipeline);
        let stop = controller.stop_handle();
        let sink = MemoryReportSink::new();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stop.cancel();
            stop.cancel();
        });
        let report = controller
            .run(Box::new(PacedSource::new(u32::MAX, Duration::from_millis(5))), &sink)
            .await
            .expect("session runs");

        assert_eq!(report.producer_exit, ProducerExit::StopRequested);
        assert_eq!(controller.state(), LifecycleState::Done);
    }

    #[tokio::test]
    async fn controller_runs_only_once() {
        let (capture, pipeline) = fast_pipeline();
        let mut controller =
            LifecycleController::new(ScriptedClient::default(), capture, pipeline);
        let sink = MemoryReportSink::new();
        controller
            .run(Box::new(SyntheticSource::new(4, 4, 1)), &sink)
            .await
            .expect("first run");
        let second = controller
            .run(Box::new(SyntheticSource::new(4, 4, 1)), &sink)
            .await;
        assert!(matches!(second, Err(VigilError::Orchestrator(_))));
    }

    #[tokio::test]
    async fn capture_panic_still_joins_the_worker() {
        let (capture, pipeline) = fast_pipeline();
        let client = Arc::new(ScriptedClient::default());
        let mut controller = LifecycleController {
            client: Arc::clone(&client),
            capture,
            pipeline,
            stop: CancellationToken::new(),
            state: LifecycleState::Idle,
        };
        let sink = MemoryReportSink::new();

        let result = controller
            .run(Box::new(PanickingSource { frames_left: 3 }), &sink)
            .await;

        assert!(matches!(result, Err(VigilError::Orchestrator(_))));
        assert_eq!(controller.state(), LifecycleState::Done);
        assert!(controller.stop_handle().is_cancelled());
        // The worker has been joined, so nothing holds the client but us.
        assert_eq!(Arc::strong_count(&client), 2);
        drop(controller);
        assert_eq!(Arc::strong_count(&client), 1);
        assert!(sink.snapshot().await.is_empty());
    }

    struct PanickingSource {
        frames_left: u32,
    }

    impl FrameSource for PanickingSource {
        fn read(&mut self) -> Result<Option<vigil_types::frame::CapturedFrame>> {
            if self.frames_left == 0 {
                panic!("decoder crashed");
            }
            self.frames_left -= 1;
            Ok(Some(vigil_types::frame::CapturedFrame::new(
                image::RgbImage::new(8, 8),
            )))
        }

        fn close(&mut self) {}

        fn describe(&self) -> String {
            "panicking".into()
        }
    }

    /// Emits frames at a fixed real-time pace.
    struct PacedSource {
        remaining: u32,
        period: Duration,
    }

    impl PacedSource {
        fn new(frames: u32, period: Duration) -> Self {
            Self {
                remaining: frames,
                period,
            }
        }
    }

    impl FrameSource for PacedSource {
        fn read(&mut self) -> Result<Option<vigil_types::frame::CapturedFrame>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            std::thread::sleep(self.period);
            Ok(Some(vigil_types::frame::CapturedFrame::new(
                image::RgbImage::new(32, 24),
            )))
        }

        fn close(&mut self) {
            self.remaining = 0;
        }

        fn describe(&self) -> String {
            "paced".into()
        }
    }
}
