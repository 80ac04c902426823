//! Import progress events and the stream that carries them.

use std::fmt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{ImportError, ImportResult};

/// Capacity of the progress channel. The pipeline never runs more than one
/// event ahead of its consumer.
pub const PROGRESS_BUFFER: usize = 1;

/// Pipeline state. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportPhase {
    Checking,
    Downloading,
    Extracting,
    ReadingShows,
    ImportingShows,
    ImportingRecordings,
    ImportingCollections,
    Finalizing,
    Completed,
    Failed,
}

impl ImportPhase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::ReadingShows => "reading shows",
            Self::ImportingShows => "importing shows",
            Self::ImportingRecordings => "importing recordings",
            Self::ImportingCollections => "importing collections",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One progress event.
///
/// A `total` of zero means the phase has no known size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportProgress {
    pub phase: ImportPhase,
    pub processed: u64,
    pub total: u64,
    pub message: String,
}

impl ImportProgress {
    pub fn new(phase: ImportPhase, processed: u64, total: u64, message: impl Into<String>) -> Self {
        Self {
            phase,
            processed,
            total,
            message: message.into(),
        }
    }

    /// An event with no determinate size.
    pub fn indeterminate(phase: ImportPhase, message: impl Into<String>) -> Self {
        Self::new(phase, 0, 0, message)
    }

    /// `processed / total`, or `None` when the total is unknown.
    #[must_use]
    pub fn fraction(&self) -> Option<f64> {
        (self.total > 0).then(|| self.processed as f64 / self.total as f64)
    }
}

impl fmt::Display for ImportProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total > 0 {
            write!(
                f,
                "[{}] {}/{} {}",
                self.phase, self.processed, self.total, self.message
            )
        } else {
            write!(f, "[{}] {}", self.phase, self.message)
        }
    }
}

/// Sending half, owned by the running pipeline.
#[derive(Debug, Clone)]
pub(crate) struct ProgressSink {
    tx: mpsc::Sender<ImportProgress>,
}

impl ProgressSink {
    /// Deliver an event, waiting for room in the channel.
    ///
    /// Fails with [`ImportError::Cancelled`] once the consumer has dropped
    /// its [`ProgressStream`].
    pub(crate) async fn emit(&self, event: ImportProgress) -> ImportResult<()> {
        log::debug!("{}", event);
        self.tx.send(event).await.map_err(|_| ImportError::Cancelled)
    }

    /// Fail with [`ImportError::Cancelled`] if the consumer is gone.
    ///
    /// Checked before every phase and every store write.
    pub(crate) fn ensure_open(&self) -> ImportResult<()> {
        if self.tx.is_closed() {
            return Err(ImportError::Cancelled);
        }
        Ok(())
    }
}

/// Receiving half of a run. Dropping it cancels the run at its next
/// check.
#[derive(Debug)]
pub struct ProgressStream {
    rx: mpsc::Receiver<ImportProgress>,
    handle: JoinHandle<()>,
}

impl ProgressStream {
    /// Spawn `task` with a fresh channel and return the stream it feeds.
    pub(crate) fn spawn<F, Fut>(task: F) -> Self
    where
        F: FnOnce(ProgressSink) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
        let handle = tokio::spawn(task(ProgressSink { tx }));
        Self { rx, handle }
    }

    /// The next event, or `None` once the run has ended.
    pub async fn next(&mut self) -> Option<ImportProgress> {
        self.rx.recv().await
    }

    /// Stop the run and wait for it to wind down.
    ///
    /// The pipeline stops at its next check, after finishing any store
    /// write in flight. Events not yet received are discarded.
    pub async fn cancel(mut self) {
        self.rx.close();
        while self.rx.recv().await.is_some() {}
        if let Err(e) = self.handle.await {
            log::error!("Import task ended abnormally: {}", e);
        }
    }

    /// Drain every remaining event and wait for the run to finish.
    pub async fn collect(mut self) -> Vec<ImportProgress> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        if let Err(e) = self.handle.await {
            log::error!("Import task ended abnormally: {}", e);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_phases() {
        assert!(ImportPhase::Completed.is_terminal());
        assert!(ImportPhase::Failed.is_terminal());
        assert!(!ImportPhase::Checking.is_terminal());
        assert!(!ImportPhase::ImportingRecordings.is_terminal());
    }

    #[test]
    fn test_fraction() {
        let event = ImportProgress::new(ImportPhase::ImportingShows, 25, 100, "");
        assert_eq!(event.fraction(), Some(0.25));
        assert!(ImportProgress::indeterminate(ImportPhase::Extracting, "")
            .fraction()
            .is_none());
    }

    #[test]
    fn test_display() {
        let event = ImportProgress::new(ImportPhase::ReadingShows, 3, 10, "shows");
        assert_eq!(event.to_string(), "[reading shows] 3/10 shows");
        let event = ImportProgress::indeterminate(ImportPhase::Checking, "Checking version");
        assert_eq!(event.to_string(), "[checking] Checking version");
    }

    #[tokio::test]
    async fn test_stream_collects_in_order() {
        let stream = ProgressStream::spawn(|sink| async move {
            for i in 0..3 {
                if sink
                    .emit(ImportProgress::new(ImportPhase::ImportingShows, i, 3, ""))
                    .await
                    .is_err()
                {
                    return;
                }
            }
        });

        let events = stream.collect().await;
        let processed: Vec<u64> = events.iter().map(|e| e.processed).collect();
        assert_eq!(processed, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_cancel_closes_sink() {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let mut stream = ProgressStream::spawn(|sink| async move {
            let first = sink
                .emit(ImportProgress::indeterminate(ImportPhase::Checking, ""))
                .await;
            let mut open = first.is_ok();
            while open {
                open = sink.ensure_open().is_ok();
                tokio::task::yield_now().await;
            }
            assert!(done_tx.send(sink.ensure_open()).is_ok());
        });

        assert!(stream.next().await.is_some());
        stream.cancel().await;

        let result = done_rx.await.unwrap();
        assert!(matches!(result, Err(ImportError::Cancelled)));
    }

    #[tokio::test]
    async fn test_dropped_stream_cancels_emit() {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let stream = ProgressStream::spawn(|sink| async move {
            let mut result = Ok(());
            for i in 0..(PROGRESS_BUFFER as u64 * 4) {
                result = sink
                    .emit(ImportProgress::new(ImportPhase::ImportingShows, i, 0, ""))
                    .await;
                if result.is_err() {
                    break;
                }
            }
            assert!(done_tx.send(result).is_ok());
        });
        drop(stream);

        let result = done_rx.await.unwrap();
        assert!(matches!(result, Err(ImportError::Cancelled)));
    }
}
