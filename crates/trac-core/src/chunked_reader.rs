//! The streaming-read engine: an abstract `Publisher<Buffer>` driven
//! by a [`BackendClient`], with precise request accounting and
//! guaranteed buffer release on every exit path. See spec.md §4.4 --
//! this is the hardest component in the core.

use crate::backend_client::{BackendClient, BackendEvent};
use crate::buffer::{Buffer, BufferAccounting, BufferBuilder};
use crate::error::{StorageError, StorageErrorKind};
use crate::stage::{Publisher, Subscriber, SubscriptionSink, Terminal};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Target chunk size: 2 MiB.
pub const DEFAULT_TARGET_CHUNK_SIZE: usize = 2 * 1024 * 1024;
/// Outstanding full chunks to keep buffered downstream.
pub const DEFAULT_CHUNK_BUFFER_TARGET: usize = 2;
/// Outstanding provider-side reads to keep in flight.
pub const DEFAULT_CLIENT_BUFFER_TARGET: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct ChunkedReaderConfig {
    pub target_chunk_size: usize,
    pub chunk_buffer_target: usize,
    pub client_buffer_target: usize,
}

impl Default for ChunkedReaderConfig {
    fn default() -> Self {
        Self {
            target_chunk_size: DEFAULT_TARGET_CHUNK_SIZE,
            chunk_buffer_target: DEFAULT_CHUNK_BUFFER_TARGET,
            client_buffer_target: DEFAULT_CLIENT_BUFFER_TARGET,
        }
    }
}

/// Drives a [`BackendClient`] and presents the result as a
/// `Publisher<Buffer>`. Subscribing twice reports `DUPLICATE_SUBSCRIPTION`
/// to the second subscriber only; the first is unaffected.
pub struct ChunkedReader {
    client: Box<dyn BackendClient>,
    config: ChunkedReaderConfig,
    path: String,
    accounting: Arc<BufferAccounting>,
    subscribed: bool,
}

impl ChunkedReader {
    pub fn new(client: Box<dyn BackendClient>, path: impl Into<String>) -> Self {
        Self {
            client,
            config: ChunkedReaderConfig::default(),
            path: path.into(),
            accounting: Arc::new(BufferAccounting::new()),
            subscribed: false,
        }
    }

    pub fn with_config(mut self, config: ChunkedReaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn accounting(&self) -> Arc<BufferAccounting> {
        self.accounting.clone()
    }
}

#[async_trait]
impl Publisher<Buffer> for ChunkedReader {
    async fn subscribe(mut self: Box<Self>, mut subscriber: Box<dyn Subscriber<Buffer>>) {
        if self.subscribed {
            subscriber
                .on_terminal(Terminal::Error(StorageError::duplicate_subscription(
                    "reader",
                    self.path.clone(),
                )))
                .await;
            return;
        }
        self.subscribed = true;

        let (events_tx, events_rx) = mpsc::channel(self.config.client_buffer_target.max(1) * 2);
        let (subscription, sub_sink) = SubscriptionSink::pair();

        let mut client = self.client;
        // Schedule client_start before activating the subscription, so
        // an immediate backend failure (e.g. file not found) surfaces
        // via on_error rather than a hard exception -- spec.md §4.4.
        let start_handle = tokio::spawn(async move {
            client.start(events_tx).await;
            client
        });

        subscriber.on_subscribe(subscription).await;

        let client = match start_handle.await {
            Ok(client) => client,
            Err(join_err) => {
                warn!(error = %join_err, "backend start task panicked");
                subscriber
                    .on_terminal(Terminal::Error(StorageError::new(
                        StorageErrorKind::IoError,
                        "reader",
                        self.path.clone(),
                        "backend start task panicked",
                    )))
                    .await;
                return;
            }
        };

        let actor = ReaderActor {
            client,
            config: self.config,
            path: self.path,
            accounting: self.accounting,
            events_rx,
            sub_sink,
            subscriber,
            pending: VecDeque::new(),
            current: BufferBuilder::new(),
            n_requested: 0,
            n_delivered: 0,
            got_complete: false,
            got_cancel: false,
            got_error: false,
            terminal_sent: false,
        };
        actor.run().await;
    }
}

struct ReaderActor {
    client: Box<dyn BackendClient>,
    config: ChunkedReaderConfig,
    path: String,
    accounting: Arc<BufferAccounting>,
    events_rx: mpsc::Receiver<BackendEvent>,
    sub_sink: SubscriptionSink,
    subscriber: Box<dyn Subscriber<Buffer>>,
    pending: VecDeque<Buffer>,
    current: BufferBuilder,
    n_requested: u64,
    n_delivered: u64,
    got_complete: bool,
    got_cancel: bool,
    got_error: bool,
    terminal_sent: bool,
}

enum Event {
    Subscription { requested: u64, cancelled: bool },
    Backend(Option<BackendEvent>),
}

impl ReaderActor {
    async fn run(mut self) {
        // Kick off prefetch immediately; client-side flow control is
        // independent of downstream demand.
        self.client.request(self.config.client_buffer_target * 2).await;

        loop {
            if self.terminal_sent || self.got_cancel {
                break;
            }

            let event = tokio::select! {
                biased;
                maybe = self.sub_sink.recv() => {
                    match maybe {
                        Some((requested, cancelled)) => Event::Subscription { requested, cancelled },
                        None => continue,
                    }
                }
                ev = self.events_rx.recv() => Event::Backend(ev),
            };

            match event {
                Event::Subscription { requested, cancelled } => {
                    if cancelled {
                        self.on_cancel().await;
                        break;
                    }
                    self.n_requested = self.n_requested.saturating_add(requested);
                    self.drain_pending().await;
                    if self.terminal_sent {
                        break;
                    }
                    self.maybe_request_more().await;
                }
                Event::Backend(Some(BackendEvent::Chunk(bytes))) => {
                    if self.got_cancel {
                        continue; // cancellation observed before this read completed
                    }
                    self.on_chunk(bytes).await;
                    self.maybe_request_more().await;
                }
                Event::Backend(Some(BackendEvent::Complete)) => {
                    self.on_complete().await;
                    if self.terminal_sent {
                        break;
                    }
                }
                Event::Backend(Some(BackendEvent::Error(e))) => {
                    self.on_error(e).await;
                    break;
                }
                Event::Backend(None) => {
                    // Backend dropped its sender without signalling
                    // completion or error; treat as a surprising close.
                    if !self.got_complete && !self.got_error {
                        self.on_error(StorageError::new(
                            StorageErrorKind::IoError,
                            "reader",
                            self.path.clone(),
                            "backend event channel closed unexpectedly",
                        ))
                        .await;
                    }
                    break;
                }
            }
        }
    }

    async fn on_chunk(&mut self, bytes: Buffer) {
        self.current.extend_from_slice(&bytes);
        while self.current.len() >= self.config.target_chunk_size {
            let frozen = self.current.split_to(self.config.target_chunk_size).freeze();
            self.accounting.record_allocated();
            self.enqueue_or_deliver(frozen).await;
        }
    }

    async fn enqueue_or_deliver(&mut self, chunk: Buffer) {
        if self.pending.is_empty() && self.n_delivered < self.n_requested {
            trace!(bytes = chunk.len(), "delivering chunk directly");
            self.subscriber.on_next(chunk).await;
            self.n_delivered += 1;
            self.accounting.record_released();
        } else {
            self.pending.push_back(chunk);
        }
    }

    async fn drain_pending(&mut self) {
        while self.n_delivered < self.n_requested {
            let Some(chunk) = self.pending.pop_front() else {
                break;
            };
            self.subscriber.on_next(chunk).await;
            self.n_delivered += 1;
            self.accounting.record_released();
        }
        if self.pending.is_empty() && self.got_complete && !self.terminal_sent {
            self.terminal_sent = true;
            self.subscriber.on_terminal(Terminal::Complete).await;
        }
    }

    async fn maybe_request_more(&mut self) {
        if self.got_complete || self.got_error || self.got_cancel {
            return;
        }
        if self.pending.len() < self.config.chunk_buffer_target {
            self.client.request(self.config.client_buffer_target).await;
        }
    }

    async fn on_complete(&mut self) {
        if !self.current.is_empty() {
            let frozen = std::mem::take(&mut self.current).freeze();
            self.accounting.record_allocated();
            self.pending.push_back(frozen);
        }
        if self.pending.is_empty() {
            self.terminal_sent = true;
            self.subscriber.on_terminal(Terminal::Complete).await;
        } else {
            self.got_complete = true;
            self.drain_pending().await;
        }
    }

    async fn on_error(&mut self, e: StorageError) {
        if self.got_error {
            warn!(?e, "suppressing second error on an already-failed reader stream");
            return;
        }
        self.got_error = true;
        self.release_all();
        self.terminal_sent = true;
        self.subscriber.on_terminal(Terminal::Error(e)).await;
    }

    async fn on_cancel(&mut self) {
        self.got_cancel = true;
        self.client.cancel();
        self.release_all();
        debug!(path = %self.path, "reader cancelled");
        // No on_complete/on_error is signalled to the subscriber.
    }

    fn release_all(&mut self) {
        for _ in self.pending.drain(..) {
            self.accounting.record_released();
        }
        if !self.current.is_empty() {
            self.current.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Mutex as AsyncMutex;

    /// A backend that emits `segments` chunks of `segment_size` bytes
    /// each, honouring `request(n)` accounting, then completes.
    struct FakeBackend {
        segments: Vec<Buffer>,
        cursor: usize,
        cancelled: Arc<std::sync::atomic::AtomicBool>,
        events: Option<mpsc::Sender<BackendEvent>>,
        granted: usize,
        completed: bool,
    }

    impl FakeBackend {
        fn new(segment_count: usize, segment_size: usize) -> (Self, Arc<std::sync::atomic::AtomicBool>) {
            let segments = (0..segment_count)
                .map(|_| Buffer::from(vec![7u8; segment_size]))
                .collect();
            let cancelled = Arc::new(std::sync::atomic::AtomicBool::new(false));
            (
                Self {
                    segments,
                    cursor: 0,
                    cancelled: cancelled.clone(),
                    events: None,
                    granted: 0,
                    completed: false,
                },
                cancelled,
            )
        }
    }

    #[async_trait]
    impl BackendClient for FakeBackend {
        async fn start(&mut self, events: mpsc::Sender<BackendEvent>) {
            self.events = Some(events);
        }

        async fn request(&mut self, n: usize) {
            self.granted += n;
            let events = self.events.clone().expect("start must run before request");
            while self.granted > 0 && self.cursor < self.segments.len() {
                if self.cancelled.load(Ordering::SeqCst) {
                    return;
                }
                let seg = self.segments[self.cursor].clone();
                self.cursor += 1;
                self.granted -= 1;
                if events.send(BackendEvent::Chunk(seg)).await.is_err() {
                    return;
                }
            }
            if self.cursor >= self.segments.len() && !self.completed {
                self.completed = true;
                let _ = events.send(BackendEvent::Complete).await;
            }
        }

        fn cancel(&mut self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    struct RecordingSubscriber {
        next_count: Arc<AtomicUsize>,
        terminal: Arc<AsyncMutex<Option<Terminal>>>,
    }

    #[async_trait]
    impl Subscriber<Buffer> for RecordingSubscriber {
        async fn on_subscribe(&mut self, subscription: crate::stage::Subscription) {
            subscription.request(1000);
        }
        async fn on_next(&mut self, _item: Buffer) {
            self.next_count.fetch_add(1, Ordering::SeqCst);
        }
        async fn on_terminal(&mut self, terminal: Terminal) {
            *self.terminal.lock().await = Some(terminal);
        }
    }

    #[tokio::test]
    async fn delivers_all_segments_then_completes() {
        let (backend, _cancelled) = FakeBackend::new(4, 1024 * 1024); // 4 x 1MiB -> 2 x 2MiB chunks
        let reader = ChunkedReader::new(Box::new(backend), "test/path").with_config(ChunkedReaderConfig {
            target_chunk_size: 2 * 1024 * 1024,
            chunk_buffer_target: 2,
            client_buffer_target: 4,
        });

        let next_count = Arc::new(AtomicUsize::new(0));
        let terminal = Arc::new(AsyncMutex::new(None));
        let subscriber = RecordingSubscriber {
            next_count: next_count.clone(),
            terminal: terminal.clone(),
        };

        Box::new(reader).subscribe(Box::new(subscriber)).await;

        // subscribe() returns once the actor task has been spawned and
        // on_subscribe has fired; give the background actor a moment.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(next_count.load(Ordering::SeqCst), 2);
        assert!(matches!(*terminal.lock().await, Some(Terminal::Complete)));
    }

    struct DuplicateTarget {
        terminal: Arc<Mutex<Option<StorageErrorKind>>>,
    }

    #[async_trait]
    impl Subscriber<Buffer> for DuplicateTarget {
        async fn on_subscribe(&mut self, _subscription: crate::stage::Subscription) {}
        async fn on_next(&mut self, _item: Buffer) {}
        async fn on_terminal(&mut self, terminal: Terminal) {
            if let Terminal::Error(e) = terminal {
                *self.terminal.lock().unwrap() = Some(e.kind);
            }
        }
    }

    #[tokio::test]
    async fn second_subscribe_reports_duplicate_subscription_to_second_subscriber_only() {
        let (backend, _cancelled) = FakeBackend::new(1, 16);
        let mut reader = ChunkedReader::new(Box::new(backend), "dup/path");
        reader.subscribed = true; // simulate "already has a subscriber"

        let terminal = Arc::new(Mutex::new(None));
        let second = DuplicateTarget {
            terminal: terminal.clone(),
        };
        Box::new(reader).subscribe(Box::new(second)).await;

        assert_eq!(*terminal.lock().unwrap(), Some(StorageErrorKind::DuplicateSubscription));
    }
}
