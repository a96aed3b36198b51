//! Progress and cancellation channel between a running batch and its observer.
//!
//! Workers hold a [`ProgressChannel`] (send side plus the cancellation token);
//! the observer holds the matching [`BatchHandle`]. Progress is informational
//! only; the pipeline never reads it back for control flow.

use rv_core::CancellationToken;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    ResiliencePrep,
    ResilienceSimulation,
    PostProcessing,
    AnnualPrep,
    AnnualSimulation,
    MetricExtraction,
    Export,
    Completed,
    Cancelled,
}

impl BatchStage {
    pub fn label(self) -> &'static str {
        match self {
            BatchStage::ResiliencePrep => "resilience prep",
            BatchStage::ResilienceSimulation => "resilience simulation",
            BatchStage::PostProcessing => "post-processing",
            BatchStage::AnnualPrep => "annual prep",
            BatchStage::AnnualSimulation => "annual simulation",
            BatchStage::MetricExtraction => "metric extraction",
            BatchStage::Export => "export",
            BatchStage::Completed => "completed",
            BatchStage::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Stage {
        stage: BatchStage,
        elapsed_wall_s: f64,
    },
    Progress {
        increment: f64,
        fraction: f64,
    },
    Error {
        message: String,
    },
}

/// Fraction stored as f64 bits so concurrent senders can add to it.
#[derive(Debug, Default)]
struct SharedFraction(AtomicU64);

impl SharedFraction {
    fn add(&self, increment: f64) -> f64 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + increment).clamp(0.0, 1.0);
            match self.0.compare_exchange_weak(
                current,
                next.to_bits(),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }
}

/// Worker side of the channel. Cloneable; safe for concurrent senders.
#[derive(Debug, Clone)]
pub struct ProgressChannel {
    tx: Sender<ProgressEvent>,
    cancel: CancellationToken,
    fraction: Arc<SharedFraction>,
    started: Instant,
}

impl ProgressChannel {
    pub fn send_progress(&self, increment: f64) {
        let fraction = self.fraction.add(increment);
        // A dropped observer only means nobody is watching.
        let _ = self.tx.send(ProgressEvent::Progress {
            increment,
            fraction,
        });
    }

    pub fn send_error(&self, message: impl Into<String>) {
        let _ = self.tx.send(ProgressEvent::Error {
            message: message.into(),
        });
    }

    pub fn send_stage(&self, stage: BatchStage) {
        let _ = self.tx.send(ProgressEvent::Stage {
            stage,
            elapsed_wall_s: self.started.elapsed().as_secs_f64(),
        });
    }

    pub fn poll_cancel(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn request_cancel(&self) {
        self.cancel.cancel();
    }

    pub fn fraction(&self) -> f64 {
        self.fraction.get()
    }
}

/// Observer side of the channel.
#[derive(Debug)]
pub struct BatchHandle {
    rx: Receiver<ProgressEvent>,
    cancel: CancellationToken,
    fraction: Arc<SharedFraction>,
}

impl BatchHandle {
    /// Completed fraction of all checkpoints, in [0, 1].
    pub fn progress(&self) -> f64 {
        self.fraction.get()
    }

    /// Drain every event received so far without blocking.
    pub fn try_events(&self) -> Vec<ProgressEvent> {
        self.rx.try_iter().collect()
    }

    /// Block until the next event, or `None` once every sender is gone.
    pub fn recv(&self) -> Option<ProgressEvent> {
        self.rx.recv().ok()
    }

    pub fn request_cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Create a connected (worker side, observer side) pair.
pub fn progress_channel() -> (ProgressChannel, BatchHandle) {
    let (tx, rx) = channel();
    let cancel = CancellationToken::new();
    let fraction = Arc::new(SharedFraction::default());
    (
        ProgressChannel {
            tx,
            cancel: cancel.clone(),
            fraction: Arc::clone(&fraction),
            started: Instant::now(),
        },
        BatchHandle {
            rx,
            cancel,
            fraction,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_accumulates_across_threads() {
        let (channel, handle) = progress_channel();
        std::thread::scope(|s| {
            for _ in 0..4 {
                let channel = channel.clone();
                s.spawn(move || {
                    for _ in 0..10 {
                        channel.send_progress(0.025);
                    }
                });
            }
        });
        assert!((handle.progress() - 1.0).abs() < 1e-9);
        let events = handle.try_events();
        assert_eq!(events.len(), 40);
    }

    #[test]
    fn fraction_is_clamped() {
        let (channel, handle) = progress_channel();
        channel.send_progress(0.75);
        channel.send_progress(0.75);
        assert_eq!(handle.progress(), 1.0);
    }

    #[test]
    fn cancel_flows_both_ways() {
        let (channel, handle) = progress_channel();
        assert!(!channel.poll_cancel());
        handle.request_cancel();
        assert!(channel.poll_cancel());
        channel.send_error("BASE: geometry missing");
        assert_eq!(
            handle.try_events(),
            vec![ProgressEvent::Error {
                message: "BASE: geometry missing".to_string()
            }]
        );
    }
}
