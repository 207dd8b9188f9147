use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vigil_inference::{parse_analysis, InferenceClient};
use vigil_types::{analysis::AnalysisResult, frame::Frame, telemetry::PipelineStats, Result};

use crate::handoff::{Dequeued, HandoffReceiver};

#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    /// Completed results in processing order.
    pub results: Vec<AnalysisResult>,
    pub stats: PipelineStats,
}

/// Drains the handoff, assessing one frame at a time.
///
/// A failed call or an unusable response drops only that frame. Once a stop
/// is requested the handoff stops accepting frames and the worker exits after
/// processing what is already queued.
pub struct InferenceWorker<C: InferenceClient> {
    client: Arc<C>,
    handoff: HandoffReceiver,
    stop: CancellationToken,
    poll_timeout: Duration,
}

impl<C: InferenceClient> InferenceWorker<C> {
    pub fn new(
        client: Arc<C>,
        handoff: HandoffReceiver,
        stop: CancellationToken,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            client,
            handoff,
            stop,
            poll_timeout,
        }
    }

    pub async fn run(mut self) -> WorkerReport {
        let mut report = WorkerReport::default();
        let mut draining = false;

        loop {
            if !draining && self.stop.is_cancelled() {
                draining = true;
                self.handoff.close();
                debug!(pending = self.handoff.len(), "stop requested; draining handoff");
            }

            let frame = match self.handoff.dequeue(self.poll_timeout).await {
                Dequeued::Frame(frame) => frame,
                Dequeued::TimedOut => continue,
                Dequeued::Closed => break,
            };

            match self.analyze(&frame).await {
                Ok(result) => {
                    info!("{}", result.status_line());
                    report.stats.frames_analyzed += 1;
                    report.results.push(result);
                }
                Err(err) => {
                    report.stats.inference_failures += 1;
                    warn!(
                        timestamp_sec = frame.timestamp_sec,
                        "Inference error, frame dropped: {err}"
                    );
                }
            }
        }

        info!(
            "Inference finished: {} analyzed, {} failed",
            report.stats.frames_analyzed, report.stats.inference_failures
        );
        report
    }

    async fn analyze(&self, frame: &Frame) -> Result<AnalysisResult> {
        debug!(
            timestamp_sec = frame.timestamp_sec,
            captured_at = %frame.captured_at.to_rfc3339(),
            queued_ms = frame.age().num_milliseconds(),
            "assessing frame"
        );
        let text = self.client.infer(frame).await?;
        parse_analysis(&text, frame.timestamp_sec)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::handoff::handoff;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use vigil_types::{frame::CapturedFrame, VigilError};

    pub(crate) fn response(people: u32, density: &str, fire: bool) -> String {
        format!(
            r#"```json
{{"timestamp_sec": 0, "people_count": {people}, "crowd_density": "{density}",
"fire_detected": {fire}, "weapons_visible": false, "fight_detected": false,
"panic_or_running": false, "confidence": 0.8, "notes": "scripted"}}
```"#
        )
    }

    /// Replays scripted replies in order; answers with a valid empty scene once exhausted.
    #[derive(Default)]
    pub(crate) struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String>>>,
        pub(crate) seen: Mutex<Vec<u64>>,
        delay: Duration,
    }

    impl ScriptedClient {
        pub(crate) fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            }
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl InferenceClient for ScriptedClient {
        async fn infer(&self, frame: &Frame) -> Result<String> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.seen.lock().unwrap().push(frame.timestamp_sec);
            let next = self.replies.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(response(0, "low", false)))
        }
    }

    fn frame(timestamp_sec: u64) -> Frame {
        Frame::from_captured(
            CapturedFrame::new(image::RgbImage::new(2, 2)),
            timestamp_sec,
        )
    }

    #[tokio::test]
    async fn failed_items_are_dropped_and_loop_continues() {
        let (tx, rx) = handoff(4).expect("handoff");
        for t in 0..4 {
            assert!(tx.try_enqueue(frame(t)));
        }
        drop(tx);

        let client = Arc::new(ScriptedClient::new(vec![
            Ok(response(2, "low", false)),
            Ok("the model refused to answer".into()),
            Err(VigilError::Inference("503 Service Unavailable".into())),
            Ok(response(4, "high", true)),
        ]));
        let worker = InferenceWorker::new(
            Arc::clone(&client),
            rx,
            CancellationToken::new(),
            Duration::from_millis(20),
        );
        let report = worker.run().await;

        let timestamps: Vec<u64> = report.results.iter().map(|r| r.timestamp_sec()).collect();
        assert_eq!(timestamps, vec![0, 3]);
        assert_eq!(report.results[1].risk_score(), 0.9);
        assert_eq!(report.stats.frames_analyzed, 2);
        assert_eq!(report.stats.inference_failures, 2);
        assert_eq!(*client.seen.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn stop_drains_queued_frames_before_exit() {
        let (tx, rx) = handoff(2).expect("handoff");
        assert!(tx.try_enqueue(frame(0)));
        assert!(tx.try_enqueue(frame(1)));

        let stop = CancellationToken::new();
        stop.cancel();
        let client = Arc::new(ScriptedClient::default());
        let worker = InferenceWorker::new(
            Arc::clone(&client),
            rx,
            stop,
            Duration::from_millis(20),
        );
        // The sender is still alive: the worker must exit on the stop request alone.
        let report = worker.run().await;

        assert_eq!(report.results.len(), 2);
        assert!(!tx.try_enqueue(frame(2)));
    }

    #[tokio::test]
    async fn idle_worker_observes_stop_after_timeout() {
        let (_tx, rx) = handoff(2).expect("handoff");
        let stop = CancellationToken::new();
        let worker = InferenceWorker::new(
            Arc::new(ScriptedClient::default()),
            rx,
            stop.clone(),
            Duration::from_millis(10),
        );
        let handle = tokio::spawn(worker.run());
        tokio::time::sleep(Duration::from_millis(30)).await;
        stop.cancel();
        let report = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker exits promptly")
            .expect("worker task");
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn in_flight_item_completes_after_stop() {
        let (tx, rx) = handoff(2).expect("handoff");
        assert!(tx.try_enqueue(frame(0)));
        let stop = CancellationToken::new();
        let client =
            Arc::new(ScriptedClient::default().with_delay(Duration::from_millis(50)));
        let worker = InferenceWorker::new(client, rx, stop.clone(), Duration::from_millis(10));
        let handle = tokio::spawn(worker.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.cancel();
        let report = handle.await.expect("worker task");
        assert_eq!(report.results.len(), 1);
    }
}
