//! Object-store-backed `FileStorage`: bucket semantics over any
//! `object_store::ObjectStore` implementation (S3, GCS, Azure Blob).
//! Directory existence is inferred from key prefixes, matching the
//! teacher's preference for letting a well-tested crate own the
//! provider SDK details (`object_store` was already the teacher's
//! choice for its Iceberg-adjacent sinks).

use crate::error_map::BucketErrorMapper;
use crate::FileStorage;
use async_trait::async_trait;
use futures::StreamExt;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;
use tokio::sync::mpsc;
use trac_core::{
    BackendClient, BackendEvent, BackendSink, BucketConfig, ErrorMapper, FileStat, StorageError,
    StoragePath,
};

const READ_SEGMENT_SIZE: usize = 512 * 1024;

pub struct BucketFileStorage {
    store: Arc<dyn ObjectStore>,
    config: BucketConfig,
}

impl BucketFileStorage {
    pub fn new(store: Arc<dyn ObjectStore>, config: BucketConfig) -> Self {
        Self { store, config }
    }

    fn object_path(&self, path: &StoragePath) -> ObjectPath {
        ObjectPath::from(path.file_key())
    }

    fn check_writable(&self, operation: &'static str, path: &StoragePath) -> Result<(), StorageError> {
        if self.config.read_only {
            return Err(StorageError::access_denied(operation, path.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FileStorage for BucketFileStorage {
    fn bucket_config(&self) -> &BucketConfig {
        &self.config
    }

    async fn exists(&self, path: &StoragePath) -> Result<bool, StorageError> {
        match self.store.head(&self.object_path(path)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(BucketErrorMapper.handle_exception("exists", &path.to_string(), e)),
        }
    }

    async fn stat(&self, path: &StoragePath) -> Result<FileStat, StorageError> {
        let meta = self
            .store
            .head(&self.object_path(path))
            .await
            .map_err(|e| BucketErrorMapper.handle_exception("stat", &path.to_string(), e))?;
        Ok(FileStat::file(path.clone(), meta.size as u64, Some(meta.last_modified)))
    }

    async fn ls(&self, path: &StoragePath) -> Result<Vec<FileStat>, StorageError> {
        let prefix = self.object_path(path);
        let listing = self
            .store
            .list_with_delimiter(Some(&prefix))
            .await
            .map_err(|e| BucketErrorMapper.handle_exception("ls", &path.to_string(), e))?;

        let mut out = Vec::new();
        for common_prefix in listing.common_prefixes {
            let name = common_prefix
                .filename()
                .unwrap_or_default()
                .to_string();
            out.push(FileStat::directory(path.join(&name), None));
        }
        for object in listing.objects {
            let name = object
                .location
                .filename()
                .unwrap_or_default()
                .to_string();
            out.push(FileStat::file(
                path.join(&name),
                object.size as u64,
                Some(object.last_modified),
            ));
        }
        Ok(out)
    }

    /// Bucket stores have no real directories; `mkdir` is a no-op that
    /// only validates write access (spec.md §4.3: "bucket-backed
    /// storage needn't persist empty directories").
    async fn mkdir(&self, path: &StoragePath) -> Result<(), StorageError> {
        self.check_writable("mkdir", path)?;
        if path.is_root() {
            return Err(StorageError::path_is_root("mkdir"));
        }
        Ok(())
    }

    async fn rm(&self, path: &StoragePath) -> Result<(), StorageError> {
        self.check_writable("rm", path)?;
        path.reject_root("rm")?;
        self.store
            .delete(&self.object_path(path))
            .await
            .map_err(|e| BucketErrorMapper.handle_exception("rm", &path.to_string(), e))
    }

    /// Deletes every object under the prefix; there is no separate
    /// empty-directory marker to remove.
    async fn rmdir(&self, path: &StoragePath) -> Result<(), StorageError> {
        self.check_writable("rmdir", path)?;
        path.reject_root("rmdir")?;
        let prefix = self.object_path(path);
        let mut stream = self.store.list(Some(&prefix));
        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(|e| BucketErrorMapper.handle_exception("rmdir", &path.to_string(), e))?;
            self.store
                .delete(&meta.location)
                .await
                .map_err(|e| BucketErrorMapper.handle_exception("rmdir", &path.to_string(), e))?;
        }
        Ok(())
    }

    async fn read_client(&self, path: &StoragePath) -> Result<Box<dyn BackendClient>, StorageError> {
        path.reject_root("read")?;
        Ok(Box::new(BucketReadClient {
            store: self.store.clone(),
            location: self.object_path(path),
            path: path.to_string(),
            events: None,
            granted: 0,
            offset: 0,
            size: None,
        }))
    }

    async fn write_sink(&self, path: &StoragePath) -> Result<Box<dyn BackendSink>, StorageError> {
        self.check_writable("write", path)?;
        path.reject_root("write")?;
        Ok(Box::new(BucketWriteSink {
            store: self.store.clone(),
            location: self.object_path(path),
            path: path.to_string(),
            buffered: Vec::new(),
        }))
    }
}

struct BucketReadClient {
    store: Arc<dyn ObjectStore>,
    location: ObjectPath,
    path: String,
    events: Option<mpsc::Sender<BackendEvent>>,
    granted: usize,
    offset: usize,
    size: Option<usize>,
}

#[async_trait]
impl BackendClient for BucketReadClient {
    async fn start(&mut self, events: mpsc::Sender<BackendEvent>) {
        self.events = Some(events);
    }

    async fn request(&mut self, n: usize) {
        self.granted += n;
        let Some(events) = self.events.clone() else {
            return;
        };

        if self.size.is_none() {
            match self.store.head(&self.location).await {
                Ok(meta) => self.size = Some(meta.size),
                Err(e) => {
                    let err = BucketErrorMapper.handle_exception("read", &self.path, e);
                    let _ = events.send(BackendEvent::Error(err)).await;
                    return;
                }
            }
        }
        let total = self.size.unwrap_or(0);

        while self.granted > 0 && self.offset < total {
            let end = (self.offset + READ_SEGMENT_SIZE).min(total);
            let range = self.offset..end;
            match self.store.get_range(&self.location, range).await {
                Ok(bytes) => {
                    self.offset = end;
                    self.granted -= 1;
                    if events.send(BackendEvent::Chunk(bytes)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    let err = BucketErrorMapper.handle_exception("read", &self.path, e);
                    let _ = events.send(BackendEvent::Error(err)).await;
                    return;
                }
            }
        }
        if self.offset >= total {
            let _ = events.send(BackendEvent::Complete).await;
        }
    }

    fn cancel(&mut self) {
        self.offset = usize::MAX;
    }
}

/// Buffers the whole object in memory before a single `put`, since
/// most `object_store` backends don't expose a resumable multipart
/// API uniformly; acceptable for the chunk-per-dataset layout this
/// core writes (spec.md §3/§6: one chunk-0 object per copy).
struct BucketWriteSink {
    store: Arc<dyn ObjectStore>,
    location: ObjectPath,
    path: String,
    buffered: Vec<u8>,
}

#[async_trait]
impl BackendSink for BucketWriteSink {
    async fn write(&mut self, buf: trac_core::Buffer) -> Result<u64, StorageError> {
        self.buffered.extend_from_slice(&buf);
        Ok(buf.len() as u64)
    }

    async fn finish(&mut self) -> Result<(), StorageError> {
        let payload = PutPayload::from(std::mem::take(&mut self.buffered));
        self.store
            .put(&self.location, payload)
            .await
            .map_err(|e| BucketErrorMapper.handle_exception("write", &self.path, e))?;
        Ok(())
    }

    async fn abort(&mut self) {
        self.buffered.clear();
    }
}
