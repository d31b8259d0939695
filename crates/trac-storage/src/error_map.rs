//! Per-backend [`ErrorMapper`] implementations, classifying native
//! I/O and object-store errors into [`StorageErrorKind`] (spec.md §7).

use std::io;
use trac_core::{ErrorMapper, StorageError, StorageErrorKind};

pub struct LocalErrorMapper;

impl ErrorMapper for LocalErrorMapper {
    type Cause = io::Error;

    fn handle_exception(&self, operation: &'static str, path: &str, cause: io::Error) -> StorageError {
        let kind = match cause.kind() {
            io::ErrorKind::NotFound => StorageErrorKind::ObjectNotFound,
            io::ErrorKind::AlreadyExists => StorageErrorKind::ObjectAlreadyExists,
            io::ErrorKind::PermissionDenied => StorageErrorKind::AccessDenied,
            _ => StorageErrorKind::IoError,
        };
        StorageError::new(kind, operation, path, cause.to_string())
    }
}

pub struct BucketErrorMapper;

impl ErrorMapper for BucketErrorMapper {
    type Cause = object_store::Error;

    fn handle_exception(&self, operation: &'static str, path: &str, cause: object_store::Error) -> StorageError {
        let kind = match &cause {
            object_store::Error::NotFound { .. } => StorageErrorKind::ObjectNotFound,
            object_store::Error::AlreadyExists { .. } => StorageErrorKind::ObjectAlreadyExists,
            object_store::Error::PermissionDenied { .. } | object_store::Error::Unauthenticated { .. } => {
                StorageErrorKind::AccessDenied
            }
            object_store::Error::InvalidPath { .. } => StorageErrorKind::StoragePathInvalid,
            _ => StorageErrorKind::IoError,
        };
        StorageError::new(kind, operation, path, cause.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_not_found_maps_to_object_not_found() {
        let mapper = LocalErrorMapper;
        let err = mapper.handle_exception(
            "stat",
            "a/b.csv",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert!(err.is_kind(StorageErrorKind::ObjectNotFound));
    }

    #[test]
    fn local_permission_denied_maps_to_access_denied() {
        let mapper = LocalErrorMapper;
        let err = mapper.handle_exception(
            "rm",
            "a/b.csv",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_kind(StorageErrorKind::AccessDenied));
    }
}
