//! Classified error taxonomy shared by every layer of the storage core.
//!
//! Backends and codecs raise their native errors; an [`ErrorMapper`]
//! (one per backend) classifies them into a [`StorageErrorKind`] before
//! they cross any API boundary. Once classified, later layers compare
//! kinds, never raw causes.

use std::fmt;

/// The two-axis taxonomy from the storage spec, flattened into one enum
/// for simplicity of matching. Category and target are recoverable from
/// the variant name where it matters (path/object/stream/codec).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    ObjectNotFound,
    ObjectAlreadyExists,
    AccessDenied,
    NotAFile,
    NotADirectory,
    NotAFileOrDirectory,
    StoragePathNullOrBlank,
    StoragePathNotRelative,
    StoragePathOutsideRoot,
    StoragePathIsRoot,
    StoragePathInvalid,
    StorageParamsInvalid,
    IoError,
    DataCorruption,
    DownloadTooLarge,
    DuplicateSubscription,
    ChunkNotFullyWritten,
    Unknown,
}

impl StorageErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ObjectNotFound => "OBJECT_NOT_FOUND",
            Self::ObjectAlreadyExists => "OBJECT_ALREADY_EXISTS",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::NotAFile => "NOT_A_FILE",
            Self::NotADirectory => "NOT_A_DIRECTORY",
            Self::NotAFileOrDirectory => "NOT_A_FILE_OR_DIRECTORY",
            Self::StoragePathNullOrBlank => "STORAGE_PATH_NULL_OR_BLANK",
            Self::StoragePathNotRelative => "STORAGE_PATH_NOT_RELATIVE",
            Self::StoragePathOutsideRoot => "STORAGE_PATH_OUTSIDE_ROOT",
            Self::StoragePathIsRoot => "STORAGE_PATH_IS_ROOT",
            Self::StoragePathInvalid => "STORAGE_PATH_INVALID",
            Self::StorageParamsInvalid => "STORAGE_PARAMS_INVALID",
            Self::IoError => "IO_ERROR",
            Self::DataCorruption => "DATA_CORRUPTION",
            Self::DownloadTooLarge => "DOWNLOAD_TOO_LARGE",
            Self::DuplicateSubscription => "DUPLICATE_SUBSCRIPTION",
            Self::ChunkNotFullyWritten => "CHUNK_NOT_FULLY_WRITTEN",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified error, carrying the operation and resolved path that
/// were in flight when it occurred, per spec.md's user-visible-message
/// requirement (operation name, storage key, resolved path).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{operation} failed for '{path}': {kind} ({message})")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub operation: &'static str,
    pub path: String,
    pub message: String,
}

impl StorageError {
    pub fn new(
        kind: StorageErrorKind,
        operation: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            operation,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn is_kind(&self, kind: StorageErrorKind) -> bool {
        self.kind == kind
    }

    /// Helper for constructing a `STORAGE_PATH_IS_ROOT` rejection, used
    /// by operations that cannot target the virtual root.
    pub fn path_is_root(operation: &'static str) -> Self {
        Self::new(
            StorageErrorKind::StoragePathIsRoot,
            operation,
            "",
            "operation cannot target the storage root",
        )
    }

    pub fn duplicate_subscription(operation: &'static str, path: impl Into<String>) -> Self {
        Self::new(
            StorageErrorKind::DuplicateSubscription,
            operation,
            path,
            "a subscriber is already attached to this publisher",
        )
    }

    pub fn access_denied(operation: &'static str, path: impl Into<String>) -> Self {
        Self::new(
            StorageErrorKind::AccessDenied,
            operation,
            path,
            "storage is read-only",
        )
    }
}

/// Classifies a backend-native error into a [`StorageError`]. Each
/// backend implements this with its own exception/error table (local
/// filesystem `io::Error` kinds, `object_store::Error` variants, HTTP
/// status codes for S3-style backends, ...). Already-classified errors
/// pass through unchanged -- callers should check with
/// [`AsStorageError`] before remapping.
pub trait ErrorMapper {
    type Cause;

    fn handle_exception(
        &self,
        operation: &'static str,
        path: &str,
        cause: Self::Cause,
    ) -> StorageError;
}

/// Formats a byte count using 1024-based units with one decimal place
/// from KB upward, exactly as spec.md §7/§4.9 requires for size-limit
/// messages.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: f64 = 1024.0;
    let bytes_f = bytes as f64;
    if bytes < 1024 {
        return format!("{bytes} bytes");
    }
    let exp = (bytes_f.ln() / UNIT.ln()).floor().min(3.0) as i32;
    let value = bytes_f / UNIT.powi(exp);
    let unit = match exp {
        1 => "KB",
        2 => "MB",
        _ => "GB",
    };
    format!("{value:.1} {unit}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_bytes_below_1024_without_decimal() {
        assert_eq!(format_bytes(512), "512 bytes");
    }

    #[test]
    fn formats_kb_mb_gb_with_one_decimal() {
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(2 * 1024 * 1024), "2.0 MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.0 GB");
    }

    #[test]
    fn error_display_includes_operation_and_path() {
        let err = StorageError::new(StorageErrorKind::ObjectNotFound, "stat", "a/b.csv", "missing");
        let rendered = err.to_string();
        assert!(rendered.contains("stat"));
        assert!(rendered.contains("a/b.csv"));
        assert!(rendered.contains("OBJECT_NOT_FOUND"));
    }
}
