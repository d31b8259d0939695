//! `DataStorage`: the top-level facade spec.md §4.9 describes --
//! `pipelineReader`/`pipelineWriter` wired end to end from a
//! [`FileStorage`] backend, a [`CodecRegistry`], size-limit
//! enforcement with a human-readable message, and directory creation
//! gated the same way `FileStorage::mkdir` gates it.

use crate::decode::DecodingPublisher;
use crate::encode::{EncodeOutcome, EncodingSubscriber};
use crate::stage::DataPipeline;
use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use std::sync::Arc;
use tokio::sync::oneshot;
use trac_codec::CodecRegistry;
use trac_core::{format_bytes, ChunkedReader, StorageCopy, StorageError, StorageErrorKind, Subscriber};
use trac_storage::FileStorage;

pub struct DataStorage {
    storage: Arc<dyn FileStorage>,
    codecs: CodecRegistry,
}

impl DataStorage {
    pub fn new(storage: Arc<dyn FileStorage>, codecs: CodecRegistry) -> Self {
        Self { storage, codecs }
    }

    /// Builds a `DataPipeline` sourced from `copy`'s chunk-0 object,
    /// decoded into `RecordBatch`es, enforcing the bucket's
    /// `download_size_limit` before opening the backend read client.
    pub async fn pipeline_reader(&self, copy: &StorageCopy) -> Result<DataPipeline, StorageError> {
        let codec = self.codecs.get(copy.storage_format)?;
        let chunk_path = copy.chunk_path(codec.default_file_extension());

        let stat = self.storage.stat(&chunk_path).await?;
        let limit = self.storage.bucket_config().download_size_limit;
        if self.storage.bucket_config().exceeds_limit(stat.size) {
            return Err(StorageError::new(
                StorageErrorKind::DownloadTooLarge,
                "pipeline_reader",
                chunk_path.to_string(),
                format!(
                    "object is {} but the configured limit is {}",
                    format_bytes(stat.size),
                    format_bytes(limit)
                ),
            ));
        }

        let client = self.storage.read_client(&chunk_path).await?;
        let reader = ChunkedReader::new(client, chunk_path.to_string());
        let decoding = DecodingPublisher::new(Box::new(reader), codec);
        Ok(DataPipeline::new(Box::new(decoding)))
    }

    /// Builds the sink half of a write pipeline: creates `copy`'s
    /// parent directory, opens a backend write sink for its chunk-0
    /// object, and returns a subscriber plus a future resolving to the
    /// final [`EncodeOutcome`].
    pub async fn pipeline_writer(
        &self,
        copy: &StorageCopy,
        schema: SchemaRef,
    ) -> Result<(Box<dyn Subscriber<RecordBatch>>, oneshot::Receiver<EncodeOutcome>), StorageError> {
        if self.storage.bucket_config().read_only {
            return Err(StorageError::access_denied(
                "pipeline_writer",
                copy.storage_path.to_string(),
            ));
        }

        let codec = self.codecs.get(copy.storage_format)?;
        self.storage.mkdir(&copy.storage_path).await?;

        let chunk_path = copy.chunk_path(codec.default_file_extension());
        let sink = self.storage.write_sink(&chunk_path).await?;
        let (subscriber, done) = EncodingSubscriber::new(sink, codec, schema);
        Ok((Box::new(subscriber), done))
    }
}
