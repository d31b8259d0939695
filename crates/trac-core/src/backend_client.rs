//! The capability a [`crate::chunked_reader::ChunkedReader`] is
//! generic over, replacing the source's deep reader/writer class
//! hierarchy (spec.md §9: "compose by capability, not inherit").

use crate::buffer::Buffer;
use crate::error::StorageError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Events a backend pushes back to the driving [`ChunkedReader`].
///
/// [`ChunkedReader`]: crate::chunked_reader::ChunkedReader
#[derive(Debug, Clone)]
pub enum BackendEvent {
    Chunk(Buffer),
    Complete,
    Error(StorageError),
}

/// A provider-native byte source, driven by a `ChunkedReader`.
/// `start` opens the resource and begins delivering [`BackendEvent`]s
/// on `events` as `request` grants permit further reads; `cancel`
/// stops delivery. Implementations own whatever I/O handle or
/// provider SDK client they wrap (local file handle, object store
/// `GetResult` stream, ...).
#[async_trait]
pub trait BackendClient: Send {
    async fn start(&mut self, events: mpsc::Sender<BackendEvent>);

    /// Grants the backend permission to push up to `n` more segments.
    async fn request(&mut self, n: usize);

    /// Cooperative, one-shot: a second `cancel` is a no-op.
    fn cancel(&mut self);
}

/// A backend sink a [`crate::write_subscriber::WriteSubscriber`]
/// drains buffers into.
#[async_trait]
pub trait BackendSink: Send {
    /// Writes one buffer and returns the number of bytes the backend
    /// reports having accepted, for the write-audit in spec.md §4.5.
    async fn write(&mut self, buf: Buffer) -> Result<u64, StorageError>;

    /// Finalises the sink after the upstream completes successfully.
    async fn finish(&mut self) -> Result<(), StorageError>;

    /// Aborts the sink after an upstream error or cancellation.
    async fn abort(&mut self);
}
