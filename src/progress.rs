// src/progress.rs

//! Progress reporting for ingestion requests.
//!
//! The pipeline reports through a [`Progress`] sender; consumers read
//! [`ProgressEvent`]s from the paired [`ProgressStream`]. Values are clamped
//! to be non-decreasing, so a late or out-of-order report never moves the bar
//! backwards. [`ProgressReporter`] abstracts over how events are displayed.

use crate::constants::PROGRESS_TOTAL;
use futures::{Stream, StreamExt};
#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;

/// A single progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub current: u64,
    /// Always 100.
    pub total: u64,
    pub message: String,
}

/// The sending half of a progress channel.
///
/// Cloning is cheap and clones share the same high-water mark. Clones may
/// report from different threads; events still arrive in non-decreasing order.
///
/// # Examples
///
/// ```
/// use futures::StreamExt;
/// use repodigest::progress::channel;
///
/// # tokio_test_block_on(async {
/// let (progress, mut events) = channel();
/// progress.report(40, "Cloning");
/// progress.report(10, "stale");
/// drop(progress);
///
/// assert_eq!(events.next().await.unwrap().current, 40);
/// assert_eq!(events.next().await.unwrap().current, 40);
/// assert!(events.next().await.is_none());
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Progress {
    tx: UnboundedSender<ProgressEvent>,
    high_water: Arc<Mutex<u64>>,
}

/// Creates a connected progress sender and stream.
pub fn channel() -> (Progress, ProgressStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Progress {
            tx,
            high_water: Arc::new(Mutex::new(0)),
        },
        ProgressStream {
            inner: UnboundedReceiverStream::new(rx),
        },
    )
}

impl Progress {
    /// A sender nobody listens to.
    pub fn disabled() -> Self {
        channel().0
    }

    /// Reports `current` (clamped to `[previous, 100]`) with a message.
    pub fn report(&self, current: u64, message: impl Into<String>) {
        let message = message.into();
        // Raising the mark and sending happen under one lock so clones cannot interleave.
        let mut high_water = self
            .high_water
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *high_water = (*high_water).max(current.min(PROGRESS_TOTAL));
        let event = ProgressEvent {
            current: *high_water,
            total: PROGRESS_TOTAL,
            message,
        };
        // A dropped receiver only means nobody is watching.
        let _ = self.tx.send(event);
    }

    /// Reports `done / total` of the way through the band `[start, end]`.
    pub fn report_fraction(
        &self,
        start: u64,
        end: u64,
        done: u64,
        total: u64,
        message: impl Into<String>,
    ) {
        let span = end.saturating_sub(start);
        let offset = if total == 0 {
            span
        } else {
            span * done.min(total) / total
        };
        self.report(start + offset, message);
    }

    /// The highest value reported so far.
    pub fn current(&self) -> u64 {
        *self
            .high_water
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The receiving half of a progress channel.
#[derive(Debug)]
pub struct ProgressStream {
    inner: UnboundedReceiverStream<ProgressEvent>,
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// A trait for reporting progress, abstracting over specific implementations like `indicatif`.
///
/// # Examples
///
/// ```
/// use repodigest::progress::ProgressReporter;
/// use std::sync::Mutex;
///
/// // A mock reporter that just stores the last message.
/// struct MockProgress {
///     last_message: Mutex<String>,
/// }
/// impl ProgressReporter for MockProgress {
///     fn set_length(&self, len: u64) {}
///     fn set_position(&self, pos: u64) {}
///     fn set_message(&self, msg: String) {
///         *self.last_message.lock().unwrap() = msg;
///     }
///     fn finish(&self) {}
///     fn finish_with_message(&self, msg: String) {
///         *self.last_message.lock().unwrap() = msg;
///     }
/// }
///
/// let reporter = MockProgress { last_message: Mutex::new("".to_string()) };
/// reporter.set_message("Cloning...".to_string());
/// assert_eq!(*reporter.last_message.lock().unwrap(), "Cloning...");
/// ```
pub trait ProgressReporter: Send + Sync {
    /// Sets the total number of steps.
    fn set_length(&self, len: u64);
    /// Sets the current position.
    fn set_position(&self, pos: u64);
    /// Sets a descriptive message for the current phase.
    fn set_message(&self, msg: String);
    /// Finishes the progress reporting, hiding the progress bar.
    fn finish(&self);
    /// Finishes the progress reporting with a final message.
    fn finish_with_message(&self, msg: String);
}

/// Forwards every event of `events` to `reporter` until the sender side is dropped.
pub async fn drive(mut events: ProgressStream, reporter: Arc<dyn ProgressReporter>) {
    reporter.set_length(PROGRESS_TOTAL);
    while let Some(event) = events.next().await {
        reporter.set_position(event.current);
        reporter.set_message(event.message);
    }
    reporter.finish();
}

/// An implementation of `ProgressReporter` using the `indicatif` crate.
#[cfg(feature = "progress")]
#[derive(Clone)]
pub struct IndicatifProgress {
    bar: ProgressBar,
}

#[cfg(feature = "progress")]
impl IndicatifProgress {
    /// Creates a new progress bar drawn on stderr.
    pub fn new() -> Self {
        let pb = ProgressBar::new(PROGRESS_TOTAL);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        Self { bar: pb }
    }
}

#[cfg(feature = "progress")]
impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "progress")]
impl ProgressReporter for IndicatifProgress {
    fn set_length(&self, len: u64) {
        self.bar.set_length(len);
    }

    fn set_position(&self, pos: u64) {
        self.bar.set_position(pos);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn finish_with_message(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording {
        positions: Mutex<Vec<u64>>,
        finished: Mutex<bool>,
    }

    impl ProgressReporter for Recording {
        fn set_length(&self, _len: u64) {}
        fn set_position(&self, pos: u64) {
            self.positions.lock().unwrap().push(pos);
        }
        fn set_message(&self, _msg: String) {}
        fn finish(&self) {
            *self.finished.lock().unwrap() = true;
        }
        fn finish_with_message(&self, _msg: String) {}
    }

    #[tokio::test]
    async fn test_events_are_monotonic_and_clamped() {
        let (progress, events) = channel();
        for v in [5, 50, 30, 70, 250, 90] {
            progress.report(v, "step");
        }
        drop(progress);
        let values: Vec<u64> = events.map(|e| e.current).collect().await;
        assert_eq!(values, vec![5, 50, 50, 70, 100, 100]);
    }

    #[tokio::test]
    async fn test_clones_share_high_water_mark() {
        let (a, _events) = channel();
        let b = a.clone();
        a.report(60, "a");
        b.report(20, "b");
        assert_eq!(b.current(), 60);
    }

    #[tokio::test]
    async fn test_clones_on_threads_keep_stream_ordered() {
        let (progress, events) = channel();
        let workers: Vec<_> = (0..4u64)
            .map(|offset| {
                let p = progress.clone();
                std::thread::spawn(move || {
                    for v in (offset..100).step_by(4) {
                        p.report(v, "worker");
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        drop(progress);
        let values: Vec<u64> = events.map(|e| e.current).collect().await;
        assert_eq!(values.len(), 100);
        assert!(values.windows(2).all(|w| w[0] <= w[1]), "{:?}", values);
        assert_eq!(values.last(), Some(&99));
    }

    #[test]
    fn test_report_fraction_bands() {
        let (p, _events) = channel();
        p.report_fraction(50, 100, 1, 4, "reading");
        assert_eq!(p.current(), 62);
        p.report_fraction(50, 100, 4, 4, "reading");
        assert_eq!(p.current(), 100);

        let (q, _events) = channel();
        q.report_fraction(50, 100, 0, 0, "nothing to read");
        assert_eq!(q.current(), 100);
    }

    #[test]
    fn test_disabled_sender_does_not_panic() {
        let p = Progress::disabled();
        p.report(10, "ignored");
        assert_eq!(p.current(), 10);
    }

    #[tokio::test]
    async fn test_drive_forwards_until_closed() {
        let (progress, events) = channel();
        let recorder = Arc::new(Recording::default());
        let handle = tokio::spawn(drive(events, recorder.clone()));
        progress.report(10, "a");
        progress.report(100, "b");
        drop(progress);
        handle.await.unwrap();
        assert_eq!(*recorder.positions.lock().unwrap(), vec![10, 100]);
        assert!(*recorder.finished.lock().unwrap());
    }
}
