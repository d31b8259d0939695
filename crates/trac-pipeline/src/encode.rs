//! Drains a `Publisher<RecordBatch>` into a [`BackendSink`], encoding
//! the accumulated batches with a [`Codec`] once the upstream
//! completes -- the write-side mirror of [`crate::decode::DecodingPublisher`].

use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;
use trac_codec::Codec;
use trac_core::{BackendSink, StorageError, Subscriber, Subscription, Terminal};

#[derive(Debug)]
pub enum EncodeOutcome {
    Completed { bytes_written: u64 },
    Failed(StorageError),
}

pub struct EncodingSubscriber {
    sink: Box<dyn BackendSink>,
    codec: Arc<dyn Codec>,
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
    subscription: Option<Subscription>,
    done_tx: Option<oneshot::Sender<EncodeOutcome>>,
}

impl EncodingSubscriber {
    pub fn new(
        sink: Box<dyn BackendSink>,
        codec: Arc<dyn Codec>,
        schema: SchemaRef,
    ) -> (Self, oneshot::Receiver<EncodeOutcome>) {
        let (done_tx, done_rx) = oneshot::channel();
        (
            Self {
                sink,
                codec,
                schema,
                batches: Vec::new(),
                subscription: None,
                done_tx: Some(done_tx),
            },
            done_rx,
        )
    }

    fn finish(&mut self, outcome: EncodeOutcome) {
        if let Some(tx) = self.done_tx.take() {
            let _ = tx.send(outcome);
        }
    }
}

#[async_trait]
impl Subscriber<RecordBatch> for EncodingSubscriber {
    async fn on_subscribe(&mut self, subscription: Subscription) {
        subscription.request(u64::MAX);
        self.subscription = Some(subscription);
    }

    async fn on_next(&mut self, item: RecordBatch) {
        self.batches.push(item);
    }

    async fn on_terminal(&mut self, terminal: Terminal) {
        match terminal {
            Terminal::Complete => {
                let encoded = self.codec.encode(self.schema.clone(), &self.batches);
                match encoded {
                    Ok(bytes) => {
                        let len = bytes.len() as u64;
                        match self.sink.write(bytes).await {
                            Ok(_) => match self.sink.finish().await {
                                Ok(()) => self.finish(EncodeOutcome::Completed { bytes_written: len }),
                                Err(e) => {
                                    self.sink.abort().await;
                                    self.finish(EncodeOutcome::Failed(e));
                                }
                            },
                            Err(e) => {
                                self.sink.abort().await;
                                self.finish(EncodeOutcome::Failed(e));
                            }
                        }
                    }
                    Err(e) => {
                        self.sink.abort().await;
                        self.finish(EncodeOutcome::Failed(e));
                    }
                }
            }
            Terminal::Error(e) => {
                self.sink.abort().await;
                self.finish(EncodeOutcome::Failed(e));
            }
        }
    }
}
