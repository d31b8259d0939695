//! The demand-driven Publisher/Subscriber contract shared by byte
//! streams ([`crate::chunked_reader::ChunkedReader`]) and pipeline
//! stages (`trac-pipeline`'s `DataPipeline`).
//!
//! spec.md §9 translates the source's reactive-stream idioms as:
//! "capability: subscribe-once, delivers owned items to a subscriber
//! that obeys request/cancel. Encode as a trait with three methods
//! (on_subscribe, on_next, on_terminal)." This module is that
//! translation, generic over the item type `T` so the same machinery
//! drives both a `Publisher<Buffer>` (raw bytes off a backend) and a
//! `Publisher<RecordBatch>` (decoded rows flowing through a pipeline).

use crate::error::StorageError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Exactly one of these terminates a stream; nothing follows it
/// (spec.md §5 ordering guarantee: `on_subscribe` < any `on_next` <
/// (`on_complete` xor `on_error`)).
#[derive(Debug, Clone)]
pub enum Terminal {
    Complete,
    Error(StorageError),
}

/// Commands a subscriber issues back upstream through a
/// [`Subscription`]. Delivered on the owning event loop.
#[derive(Debug)]
enum SubscriptionCommand {
    Request(u64),
    Cancel,
}

/// The capability handed to a subscriber in `on_subscribe`, letting it
/// signal demand or cancel. Requests accumulate in `n_requested`;
/// cancellation is cooperative and one-shot (spec.md §5).
#[derive(Clone)]
pub struct Subscription {
    tx: mpsc::UnboundedSender<SubscriptionCommand>,
    cancelled: Arc<AtomicBool>,
}

impl Subscription {
    pub fn request(&self, n: u64) {
        if self.cancelled.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(SubscriptionCommand::Request(n));
    }

    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return; // a second cancel is a no-op
        }
        let _ = self.tx.send(SubscriptionCommand::Cancel);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// The receiving half a publisher holds to observe subscriber demand.
pub(crate) struct SubscriptionSink {
    rx: mpsc::UnboundedReceiver<SubscriptionCommand>,
    cancelled: Arc<AtomicBool>,
}

impl SubscriptionSink {
    pub(crate) fn pair() -> (Subscription, SubscriptionSink) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        (
            Subscription {
                tx,
                cancelled: cancelled.clone(),
            },
            SubscriptionSink { rx, cancelled },
        )
    }

    /// Drains all currently-queued commands without blocking,
    /// returning the total requested and whether cancel was seen.
    pub(crate) fn drain(&mut self) -> (u64, bool) {
        let mut requested = 0u64;
        let mut cancelled = false;
        while let Ok(cmd) = self.rx.try_recv() {
            match cmd {
                SubscriptionCommand::Request(n) => requested = requested.saturating_add(n),
                SubscriptionCommand::Cancel => cancelled = true,
            }
        }
        (requested, cancelled || self.cancelled.load(Ordering::SeqCst))
    }

    /// Awaits the next command, used while idle with no pending work.
    pub(crate) async fn recv(&mut self) -> Option<(u64, bool)> {
        let cmd = self.rx.recv().await?;
        match cmd {
            SubscriptionCommand::Request(n) => Some((n, self.cancelled.load(Ordering::SeqCst))),
            SubscriptionCommand::Cancel => Some((0, true)),
        }
    }
}

/// A subscriber of a demand-driven stream of `T`. All three methods
/// are delivered on the owning event loop; `on_terminal` is emitted at
/// most once and nothing follows it.
#[async_trait]
pub trait Subscriber<T>: Send {
    async fn on_subscribe(&mut self, subscription: Subscription);
    async fn on_next(&mut self, item: T);
    async fn on_terminal(&mut self, terminal: Terminal);
}

/// A capability that delivers a demand-driven stream of `T` to
/// exactly one subscriber. Subscribing twice delivers a
/// `DUPLICATE_SUBSCRIPTION` error to the *second* subscriber only,
/// per spec.md §7: "Duplicate subscription is reported to the
/// offending subscriber only".
#[async_trait]
pub trait Publisher<T>: Send {
    async fn subscribe(self: Box<Self>, subscriber: Box<dyn Subscriber<T>>);
}

/// A finite, already-in-memory `Publisher<T>` -- the `fromIterable`
/// every reactive-streams library carries, used here to republish
/// batches a codec has already decoded in one shot (`trac-pipeline`'s
/// decode stage) without a second bespoke demand loop.
pub struct VecPublisher<T> {
    items: Vec<T>,
    error: Option<StorageError>,
}

impl<T: Send + 'static> VecPublisher<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, error: None }
    }

    /// Delivers `items` (possibly empty) and then terminates with
    /// `error` instead of `Complete`.
    pub fn with_error(items: Vec<T>, error: StorageError) -> Self {
        Self {
            items,
            error: Some(error),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Publisher<T> for VecPublisher<T> {
    async fn subscribe(self: Box<Self>, mut subscriber: Box<dyn Subscriber<T>>) {
        let (subscription, mut sink) = SubscriptionSink::pair();
        let mut items = self.items.into_iter();
        let mut delivered = 0u64;
        let mut requested = 0u64;

        subscriber.on_subscribe(subscription).await;

        loop {
            if requested <= delivered {
                let Some((n, cancelled)) = sink.recv().await else {
                    return;
                };
                if cancelled {
                    return;
                }
                requested = requested.saturating_add(n);
                continue;
            }
            let (more, cancelled) = sink.drain();
            requested = requested.saturating_add(more);
            if cancelled {
                return;
            }
            match items.next() {
                Some(item) => {
                    subscriber.on_next(item).await;
                    delivered += 1;
                }
                None => break,
            }
        }

        match self.error {
            Some(e) => subscriber.on_terminal(Terminal::Error(e)).await,
            None => subscriber.on_terminal(Terminal::Complete).await,
        }
    }
}

/// Tracks `n_requested`/`n_delivered` bookkeeping shared by
/// `ChunkedReader` and pipeline stages, so the invariant
/// `n_delivered <= n_requested` (spec.md §4.4/§8) is centralised
/// rather than re-derived per implementation.
#[derive(Debug, Default)]
pub struct DemandCounter {
    requested: AtomicU64,
    delivered: AtomicU64,
}

impl DemandCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_requested(&self, n: u64) {
        self.requested.fetch_add(n, Ordering::SeqCst);
    }

    pub fn has_demand(&self) -> bool {
        self.delivered.load(Ordering::SeqCst) < self.requested.load(Ordering::SeqCst)
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::SeqCst);
    }

    pub fn requested(&self) -> u64 {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demand_counter_tracks_outstanding_requests() {
        let d = DemandCounter::new();
        assert!(!d.has_demand());
        d.add_requested(2);
        assert!(d.has_demand());
        d.record_delivered();
        assert!(d.has_demand());
        d.record_delivered();
        assert!(!d.has_demand());
        assert_eq!(d.requested(), 2);
        assert_eq!(d.delivered(), 2);
    }

    #[tokio::test]
    async fn subscription_cancel_is_idempotent() {
        let (sub, mut sink) = SubscriptionSink::pair();
        sub.cancel();
        sub.cancel();
        let (_, cancelled) = sink.drain();
        assert!(cancelled);
        assert!(sub.is_cancelled());
    }

    #[tokio::test]
    async fn subscription_request_accumulates_until_drained() {
        let (sub, mut sink) = SubscriptionSink::pair();
        sub.request(3);
        sub.request(4);
        let (requested, cancelled) = sink.drain();
        assert_eq!(requested, 7);
        assert!(!cancelled);
    }

    struct CollectingSubscriber {
        items: std::sync::Arc<tokio::sync::Mutex<Vec<u32>>>,
        terminal: std::sync::Arc<tokio::sync::Mutex<Option<Terminal>>>,
    }

    #[async_trait]
    impl Subscriber<u32> for CollectingSubscriber {
        async fn on_subscribe(&mut self, subscription: Subscription) {
            subscription.request(10);
        }
        async fn on_next(&mut self, item: u32) {
            self.items.lock().await.push(item);
        }
        async fn on_terminal(&mut self, terminal: Terminal) {
            *self.terminal.lock().await = Some(terminal);
        }
    }

    #[tokio::test]
    async fn vec_publisher_delivers_all_items_then_completes() {
        let items = std::sync::Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let terminal = std::sync::Arc::new(tokio::sync::Mutex::new(None));
        let subscriber = CollectingSubscriber {
            items: items.clone(),
            terminal: terminal.clone(),
        };

        Box::new(VecPublisher::new(vec![1u32, 2, 3]))
            .subscribe(Box::new(subscriber))
            .await;

        assert_eq!(*items.lock().await, vec![1, 2, 3]);
        assert!(matches!(*terminal.lock().await, Some(Terminal::Complete)));
    }
}
