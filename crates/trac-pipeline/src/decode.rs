//! Bridges a backend's raw byte stream (a `Publisher<Buffer>`, e.g.
//! [`trac_core::ChunkedReader`]) into a `Publisher<RecordBatch>` by
//! assembling the complete chunk-0 object and handing it to a
//! [`Codec`] in one shot -- see the note on `Codec` about whole-object
//! decode. Re-publishes the decoded batches through
//! [`trac_core::VecPublisher`].

use arrow_array::RecordBatch;
use async_trait::async_trait;
use bytes::BytesMut;
use std::sync::Arc;
use tokio::sync::oneshot;
use trac_codec::Codec;
use trac_core::{Buffer, Publisher, StorageError, Subscriber, Subscription, Terminal, VecPublisher};

pub struct DecodingPublisher {
    upstream: Box<dyn Publisher<Buffer>>,
    codec: Arc<dyn Codec>,
}

impl DecodingPublisher {
    pub fn new(upstream: Box<dyn Publisher<Buffer>>, codec: Arc<dyn Codec>) -> Self {
        Self { upstream, codec }
    }
}

#[async_trait]
impl Publisher<RecordBatch> for DecodingPublisher {
    async fn subscribe(self: Box<Self>, downstream: Box<dyn Subscriber<RecordBatch>>) {
        let (result_tx, result_rx) = oneshot::channel();
        let collector = BufferCollector {
            buf: BytesMut::new(),
            result: Some(result_tx),
        };
        self.upstream.subscribe(Box::new(collector)).await;

        let decoded = match result_rx.await {
            Ok(Ok(bytes)) => self.codec.decode(&bytes),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(StorageError::new(
                trac_core::StorageErrorKind::IoError,
                "decode",
                "",
                "backend byte stream dropped before completion",
            )),
        };

        match decoded {
            Ok(batches) => Box::new(VecPublisher::new(batches)).subscribe(downstream).await,
            Err(e) => Box::new(VecPublisher::with_error(Vec::new(), e)).subscribe(downstream).await,
        }
    }
}

struct BufferCollector {
    buf: BytesMut,
    result: Option<oneshot::Sender<Result<Buffer, StorageError>>>,
}

#[async_trait]
impl Subscriber<Buffer> for BufferCollector {
    async fn on_subscribe(&mut self, subscription: Subscription) {
        subscription.request(u64::MAX);
    }

    async fn on_next(&mut self, item: Buffer) {
        self.buf.extend_from_slice(&item);
    }

    async fn on_terminal(&mut self, terminal: Terminal) {
        let Some(tx) = self.result.take() else {
            return;
        };
        match terminal {
            Terminal::Complete => {
                let _ = tx.send(Ok(std::mem::take(&mut self.buf).freeze()));
            }
            Terminal::Error(e) => {
                let _ = tx.send(Err(e));
            }
        }
    }
}
