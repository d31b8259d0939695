//! `FileStorage`: the virtual file storage abstraction (spec.md §4.3),
//! plus its two concrete backends -- [`LocalFileStorage`] (a real
//! filesystem root) and [`BucketFileStorage`] (an `object_store`
//! bucket).

pub mod backend;
mod error_map;

use async_trait::async_trait;
use trac_core::{
    BackendClient, BackendSink, BucketConfig, FileStat, PathResolver, StorageError, StoragePath,
};

/// Operations every storage backend must support, resolved paths in,
/// classified errors out. Implementations hold their own
/// [`PathResolver`] configuration (bucket root, read-only flag) and
/// map backend-native failures through an [`trac_core::ErrorMapper`].
#[async_trait]
pub trait FileStorage: Send + Sync {
    fn bucket_config(&self) -> &BucketConfig;

    fn path_resolver(&self) -> &PathResolver {
        &PATH_RESOLVER
    }

    async fn exists(&self, path: &StoragePath) -> Result<bool, StorageError>;

    async fn stat(&self, path: &StoragePath) -> Result<FileStat, StorageError>;

    async fn size(&self, path: &StoragePath) -> Result<u64, StorageError> {
        let stat = self.stat(path).await?;
        if !stat.is_file() {
            return Err(StorageError::new(
                trac_core::StorageErrorKind::NotAFile,
                "size",
                path.to_string(),
                "size is only defined for files",
            ));
        }
        Ok(stat.size)
    }

    async fn ls(&self, path: &StoragePath) -> Result<Vec<FileStat>, StorageError>;

    async fn mkdir(&self, path: &StoragePath) -> Result<(), StorageError>;

    async fn rm(&self, path: &StoragePath) -> Result<(), StorageError>;

    async fn rmdir(&self, path: &StoragePath) -> Result<(), StorageError>;

    /// Opens a backend-native read client for `path`, to be driven by a
    /// [`trac_core::ChunkedReader`].
    async fn read_client(&self, path: &StoragePath) -> Result<Box<dyn BackendClient>, StorageError>;

    /// Opens a backend-native write sink for `path`, to be driven by a
    /// [`trac_core::WriteSubscriber`].
    async fn write_sink(&self, path: &StoragePath) -> Result<Box<dyn BackendSink>, StorageError>;
}

// A shared stateless resolver instance; path resolution carries no
// backend-specific configuration (spec.md §4.1 is backend-agnostic).
static PATH_RESOLVER: PathResolver = PathResolver;

pub use backend::bucket::BucketFileStorage;
pub use backend::local::LocalFileStorage;
