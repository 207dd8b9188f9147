//! Bounded frame handoff between the sampler and the inference worker.
//!
//! Enqueueing never blocks: a full handoff rejects the frame and stays as it
//! was, so a slow consumer costs samples rather than stalling the producer.

use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use vigil_types::{frame::Frame, Result};

use crate::orchestrator_error;

pub fn handoff(capacity: usize) -> Result<(HandoffSender, HandoffReceiver)> {
    if capacity == 0 {
        return Err(orchestrator_error("handoff capacity must be greater than zero"));
    }
    let (tx, rx) = mpsc::channel(capacity);
    Ok((HandoffSender { tx }, HandoffReceiver { rx }))
}

pub struct HandoffSender {
    tx: mpsc::Sender<Frame>,
}

impl HandoffSender {
    /// Returns false, leaving the handoff untouched, when it is full or the
    /// receiving side has shut down.
    pub fn try_enqueue(&self, frame: Frame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn has_capacity(&self) -> bool {
        !self.tx.is_closed() && self.tx.capacity() > 0
    }

    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

#[derive(Debug)]
pub enum Dequeued {
    Frame(Frame),
    TimedOut,
    /// The handoff is empty and will never receive another frame.
    Closed,
}

pub struct HandoffReceiver {
    rx: mpsc::Receiver<Frame>,
}

impl HandoffReceiver {
    pub async fn dequeue(&mut self, timeout: Duration) -> Dequeued {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(frame)) => Dequeued::Frame(frame),
            Ok(None) => Dequeued::Closed,
            Err(_) => Dequeued::TimedOut,
        }
    }

    pub fn try_dequeue(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    /// Rejects further frames; frames already queued can still be dequeued.
    pub fn close(&mut self) {
        self.rx.close();
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
