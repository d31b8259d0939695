//! File metadata returned by `FileStorage::stat`/`ls`.

use crate::path::StoragePath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

/// Metadata for one path. `size` is only meaningful when `kind` is
/// [`FileKind::File`] -- directory size is undefined per spec.md §3.
#[derive(Debug, Clone)]
pub struct FileStat {
    pub path: StoragePath,
    pub kind: FileKind,
    pub size: u64,
    pub mtime: Option<chrono::DateTime<chrono::Utc>>,
}

impl FileStat {
    pub fn file(path: StoragePath, size: u64, mtime: Option<chrono::DateTime<chrono::Utc>>) -> Self {
        Self {
            path,
            kind: FileKind::File,
            size,
            mtime,
        }
    }

    pub fn directory(path: StoragePath, mtime: Option<chrono::DateTime<chrono::Utc>>) -> Self {
        Self {
            path,
            kind: FileKind::Directory,
            size: 0,
            mtime,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, FileKind::File)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, FileKind::Directory)
    }
}
