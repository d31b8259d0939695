//! Local-filesystem `FileStorage` backend: a rooted directory tree
//! accessed through `tokio::fs`, exactly the style the teacher used
//! for its CSV/stdout sources and sinks.

use crate::error_map::LocalErrorMapper;
use crate::FileStorage;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use trac_core::{
    BackendClient, BackendEvent, BackendSink, BucketConfig, ErrorMapper, FileStat, StorageError,
    StorageErrorKind, StoragePath,
};

/// Bytes read per backend segment before handing it to the
/// `ChunkedReader` for re-chunking to its own target size.
const READ_SEGMENT_SIZE: usize = 256 * 1024;

pub struct LocalFileStorage {
    root: PathBuf,
    config: BucketConfig,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, config: BucketConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    fn native_path(&self, path: &StoragePath) -> PathBuf {
        let mut native = self.root.clone();
        for segment in path.segments() {
            native.push(segment);
        }
        native
    }

    fn check_writable(&self, operation: &'static str, path: &StoragePath) -> Result<(), StorageError> {
        if self.config.read_only {
            return Err(StorageError::access_denied(operation, path.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    fn bucket_config(&self) -> &BucketConfig {
        &self.config
    }

    async fn exists(&self, path: &StoragePath) -> Result<bool, StorageError> {
        Ok(fs::metadata(self.native_path(path)).await.is_ok())
    }

    async fn stat(&self, path: &StoragePath) -> Result<FileStat, StorageError> {
        let native = self.native_path(path);
        let meta = fs::metadata(&native)
            .await
            .map_err(|e| LocalErrorMapper.handle_exception("stat", &path.to_string(), e))?;
        let mtime = meta.modified().ok().map(chrono::DateTime::<chrono::Utc>::from);
        if meta.is_dir() {
            Ok(FileStat::directory(path.clone(), mtime))
        } else {
            Ok(FileStat::file(path.clone(), meta.len(), mtime))
        }
    }

    async fn ls(&self, path: &StoragePath) -> Result<Vec<FileStat>, StorageError> {
        let native = self.native_path(path);
        let mut entries = fs::read_dir(&native)
            .await
            .map_err(|e| LocalErrorMapper.handle_exception("ls", &path.to_string(), e))?;
        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LocalErrorMapper.handle_exception("ls", &path.to_string(), e))?
        {
            let child_name = entry.file_name().to_string_lossy().into_owned();
            let child_path = path.join(&child_name);
            let meta = entry
                .metadata()
                .await
                .map_err(|e| LocalErrorMapper.handle_exception("ls", &child_path.to_string(), e))?;
            let mtime = meta.modified().ok().map(chrono::DateTime::<chrono::Utc>::from);
            out.push(if meta.is_dir() {
                FileStat::directory(child_path, mtime)
            } else {
                FileStat::file(child_path, meta.len(), mtime)
            });
        }
        Ok(out)
    }

    async fn mkdir(&self, path: &StoragePath) -> Result<(), StorageError> {
        self.check_writable("mkdir", path)?;
        if path.is_root() {
            return Err(StorageError::path_is_root("mkdir"));
        }
        fs::create_dir_all(self.native_path(path))
            .await
            .map_err(|e| LocalErrorMapper.handle_exception("mkdir", &path.to_string(), e))
    }

    async fn rm(&self, path: &StoragePath) -> Result<(), StorageError> {
        self.check_writable("rm", path)?;
        if path.is_root() {
            return Err(StorageError::path_is_root("rm"));
        }
        fs::remove_file(self.native_path(path))
            .await
            .map_err(|e| LocalErrorMapper.handle_exception("rm", &path.to_string(), e))
    }

    async fn rmdir(&self, path: &StoragePath) -> Result<(), StorageError> {
        self.check_writable("rmdir", path)?;
        if path.is_root() {
            return Err(StorageError::path_is_root("rmdir"));
        }
        fs::remove_dir(self.native_path(path))
            .await
            .map_err(|e| LocalErrorMapper.handle_exception("rmdir", &path.to_string(), e))
    }

    async fn read_client(&self, path: &StoragePath) -> Result<Box<dyn BackendClient>, StorageError> {
        let native = self.native_path(path);
        let file = fs::File::open(&native)
            .await
            .map_err(|e| LocalErrorMapper.handle_exception("read", &path.to_string(), e))?;
        Ok(Box::new(LocalReadClient {
            file: Some(file),
            path: path.to_string(),
            events: None,
            granted: 0,
        }))
    }

    async fn write_sink(&self, path: &StoragePath) -> Result<Box<dyn BackendSink>, StorageError> {
        self.check_writable("write", path)?;
        let native = self.native_path(path);
        if let Some(parent) = native.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| LocalErrorMapper.handle_exception("write", &path.to_string(), e))?;
        }
        let file = fs::File::create(&native)
            .await
            .map_err(|e| LocalErrorMapper.handle_exception("write", &path.to_string(), e))?;
        Ok(Box::new(LocalWriteSink {
            file,
            path: path.to_string(),
            native,
        }))
    }
}

struct LocalReadClient {
    file: Option<fs::File>,
    path: String,
    events: Option<mpsc::Sender<BackendEvent>>,
    granted: usize,
}

#[async_trait]
impl BackendClient for LocalReadClient {
    async fn start(&mut self, events: mpsc::Sender<BackendEvent>) {
        self.events = Some(events);
    }

    async fn request(&mut self, n: usize) {
        self.granted += n;
        let Some(events) = self.events.clone() else {
            return;
        };
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let mut buf = vec![0u8; READ_SEGMENT_SIZE];
        while self.granted > 0 {
            match file.read(&mut buf).await {
                Ok(0) => {
                    let _ = events.send(BackendEvent::Complete).await;
                    self.file = None;
                    return;
                }
                Ok(n) => {
                    self.granted -= 1;
                    let chunk = trac_core::Buffer::copy_from_slice(&buf[..n]);
                    if events.send(BackendEvent::Chunk(chunk)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    let err = LocalErrorMapper.handle_exception("read", &self.path, e);
                    let _ = events.send(BackendEvent::Error(err)).await;
                    self.file = None;
                    return;
                }
            }
        }
    }

    fn cancel(&mut self) {
        self.file = None;
    }
}

struct LocalWriteSink {
    file: fs::File,
    path: String,
    native: PathBuf,
}

#[async_trait]
impl BackendSink for LocalWriteSink {
    async fn write(&mut self, buf: trac_core::Buffer) -> Result<u64, StorageError> {
        self.file
            .write_all(&buf)
            .await
            .map_err(|e| LocalErrorMapper.handle_exception("write", &self.path, e))?;
        Ok(buf.len() as u64)
    }

    async fn finish(&mut self) -> Result<(), StorageError> {
        self.file
            .flush()
            .await
            .map_err(|e| LocalErrorMapper.handle_exception("write", &self.path, e))
    }

    async fn abort(&mut self) {
        drop_file_best_effort(&self.native).await;
    }
}

async fn drop_file_best_effort(native: &Path) {
    let _ = fs::remove_file(native).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn mkdir_then_stat_reports_directory() {
        let dir = tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path(), BucketConfig::default());
        let path = StoragePath::root().join("data");
        storage.mkdir(&path).await.unwrap();
        let stat = storage.stat(&path).await.unwrap();
        assert!(stat.is_directory());
    }

    #[tokio::test]
    async fn read_only_bucket_rejects_mkdir() {
        let dir = tempdir().unwrap();
        let storage = LocalFileStorage::new(
            dir.path(),
            BucketConfig {
                download_size_limit: 0,
                read_only: true,
            },
        );
        let path = StoragePath::root().join("data");
        let err = storage.mkdir(&path).await.unwrap_err();
        assert!(err.is_kind(StorageErrorKind::AccessDenied));
    }

    #[tokio::test]
    async fn write_then_read_round_trips_bytes() {
        let dir = tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path(), BucketConfig::default());
        let path = StoragePath::root().join("file.txt");

        let mut sink = storage.write_sink(&path).await.unwrap();
        sink.write(trac_core::Buffer::from_static(b"hello")).await.unwrap();
        sink.finish().await.unwrap();

        let stat = storage.stat(&path).await.unwrap();
        assert_eq!(stat.size, 5);
    }
}
