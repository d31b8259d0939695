//! `WriteSubscriber`: drains an upstream `Publisher<Buffer>` into a
//! [`BackendSink`], requesting one buffer at a time so the backend
//! never has more than one write in flight. See spec.md §4.5.

use crate::backend_client::BackendSink;
use crate::buffer::Buffer;
use crate::error::StorageError;
use crate::stage::{Subscriber, Subscription, Terminal};
use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// The outcome of a completed write, handed back through the
/// `WriteSubscriber::done()` future. Mirrors the write-audit spec.md
/// §4.5 asks for: total bytes accepted by the backend, or the first
/// error/cancellation encountered.
#[derive(Debug)]
pub enum WriteOutcome {
    Completed { bytes_written: u64 },
    Failed(StorageError),
    Cancelled,
}

/// Subscribes to an upstream byte publisher and writes each buffer to
/// a [`BackendSink`] one at a time, requesting replenishment only
/// after each write's `Ok` return -- this is what keeps at most one
/// write in flight, per spec.md §4.5.
pub struct WriteSubscriber {
    sink: Box<dyn BackendSink>,
    path: String,
    bytes_written: u64,
    subscription: Option<Subscription>,
    done_tx: Option<oneshot::Sender<WriteOutcome>>,
}

impl WriteSubscriber {
    /// Returns the subscriber to hand to a `Publisher<Buffer>::subscribe`
    /// call, and a future resolving to the final [`WriteOutcome`].
    pub fn new(
        sink: Box<dyn BackendSink>,
        path: impl Into<String>,
    ) -> (Self, oneshot::Receiver<WriteOutcome>) {
        let (done_tx, done_rx) = oneshot::channel();
        (
            Self {
                sink,
                path: path.into(),
                bytes_written: 0,
                subscription: None,
                done_tx: Some(done_tx),
            },
            done_rx,
        )
    }

    fn finish(&mut self, outcome: WriteOutcome) {
        if let Some(tx) = self.done_tx.take() {
            let _ = tx.send(outcome);
        }
    }
}

#[async_trait]
impl Subscriber<Buffer> for WriteSubscriber {
    async fn on_subscribe(&mut self, subscription: Subscription) {
        subscription.request(1);
        self.subscription = Some(subscription);
    }

    async fn on_next(&mut self, item: Buffer) {
        let len = item.len() as u64;
        match self.sink.write(item).await {
            Ok(accepted) => {
                self.bytes_written += accepted;
                if accepted != len {
                    warn!(
                        path = %self.path,
                        accepted,
                        sent = len,
                        "backend accepted fewer bytes than were written"
                    );
                }
                if let Some(sub) = &self.subscription {
                    sub.request(1);
                }
            }
            Err(e) => {
                self.sink.abort().await;
                if let Some(sub) = &self.subscription {
                    sub.cancel();
                }
                self.finish(WriteOutcome::Failed(e));
            }
        }
    }

    async fn on_terminal(&mut self, terminal: Terminal) {
        match terminal {
            Terminal::Complete => match self.sink.finish().await {
                Ok(()) => {
                    debug!(path = %self.path, bytes = self.bytes_written, "write completed");
                    self.finish(WriteOutcome::Completed {
                        bytes_written: self.bytes_written,
                    });
                }
                Err(e) => self.finish(WriteOutcome::Failed(e)),
            },
            Terminal::Error(e) => {
                self.sink.abort().await;
                self.finish(WriteOutcome::Failed(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageErrorKind;
    use crate::stage::{Publisher, SubscriptionSink};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct RecordingSink {
        total: Arc<AtomicU64>,
        finished: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl BackendSink for RecordingSink {
        async fn write(&mut self, buf: Buffer) -> Result<u64, StorageError> {
            self.total.fetch_add(buf.len() as u64, Ordering::SeqCst);
            Ok(buf.len() as u64)
        }
        async fn finish(&mut self) -> Result<(), StorageError> {
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn abort(&mut self) {}
    }

    /// A trivial in-process publisher that feeds two buffers then
    /// completes, for exercising `WriteSubscriber` without a full
    /// `ChunkedReader`.
    struct TwoBufferPublisher;

    #[async_trait]
    impl Publisher<Buffer> for TwoBufferPublisher {
        async fn subscribe(self: Box<Self>, mut subscriber: Box<dyn Subscriber<Buffer>>) {
            let (subscription, mut sink) = SubscriptionSink::pair();
            subscriber.on_subscribe(subscription).await;
            let _ = sink.recv().await; // first request(1)
            subscriber.on_next(Buffer::from(vec![1u8; 10])).await;
            let _ = sink.recv().await; // second request(1)
            subscriber.on_next(Buffer::from(vec![2u8; 5])).await;
            subscriber.on_terminal(Terminal::Complete).await;
        }
    }

    #[tokio::test]
    async fn writes_all_buffers_and_reports_total_bytes() {
        let total = Arc::new(AtomicU64::new(0));
        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let sink = RecordingSink {
            total: total.clone(),
            finished: finished.clone(),
        };
        let (subscriber, done) = WriteSubscriber::new(Box::new(sink), "out/path");

        Box::new(TwoBufferPublisher).subscribe(Box::new(subscriber)).await;

        match done.await.unwrap() {
            WriteOutcome::Completed { bytes_written } => assert_eq!(bytes_written, 15),
            other => panic!("expected Completed, got {other:?}"),
        }
        assert_eq!(total.load(Ordering::SeqCst), 15);
        assert!(finished.load(Ordering::SeqCst));
    }

    struct FailingSink;

    #[async_trait]
    impl BackendSink for FailingSink {
        async fn write(&mut self, _buf: Buffer) -> Result<u64, StorageError> {
            Err(StorageError::new(StorageErrorKind::IoError, "write", "out/path", "disk full"))
        }
        async fn finish(&mut self) -> Result<(), StorageError> {
            Ok(())
        }
        async fn abort(&mut self) {}
    }

    #[tokio::test]
    async fn write_error_aborts_sink_and_cancels_upstream() {
        let sink = FailingSink;
        let (subscriber, done) = WriteSubscriber::new(Box::new(sink), "out/path");
        Box::new(TwoBufferPublisher).subscribe(Box::new(subscriber)).await;
        match done.await.unwrap() {
            WriteOutcome::Failed(e) => assert!(e.is_kind(StorageErrorKind::IoError)),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
