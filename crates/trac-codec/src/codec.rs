//! `Codec`: translates between a complete dataset buffer and the
//! `RecordBatch`es it encodes, for one [`trac_core::StorageFormat`].
//! See spec.md §4.6.
//!
//! Each copy is laid out as a single `chunk-0` object (spec.md §3/§6),
//! so a codec operates on the whole assembled buffer rather than a
//! sub-file byte range -- the `ChunkedReader` already handles
//! re-chunking that buffer for memory pressure at the byte layer.

use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use std::collections::HashMap;
use std::sync::Arc;
use trac_core::{Buffer, StorageError, StorageErrorKind, StorageFormat};

/// One format's encode/decode pair.
pub trait Codec: Send + Sync {
    fn format(&self) -> StorageFormat;

    fn default_file_extension(&self) -> &'static str;

    /// Decodes a complete buffer into the batches it contains.
    /// Malformed input is classified `DATA_CORRUPTION` (spec.md §7).
    fn decode(&self, bytes: &Buffer) -> Result<Vec<RecordBatch>, StorageError>;

    /// Encodes a sequence of same-schema batches into one buffer.
    fn encode(&self, schema: SchemaRef, batches: &[RecordBatch]) -> Result<Buffer, StorageError>;
}

fn data_corruption(operation: &'static str, format: StorageFormat, cause: impl std::fmt::Display) -> StorageError {
    StorageError::new(
        StorageErrorKind::DataCorruption,
        operation,
        format.key(),
        cause.to_string(),
    )
}

pub(crate) fn corrupt_decode(format: StorageFormat, cause: impl std::fmt::Display) -> StorageError {
    data_corruption("decode", format, cause)
}

pub(crate) fn invalid_encode(format: StorageFormat, cause: impl std::fmt::Display) -> StorageError {
    StorageError::new(
        StorageErrorKind::StorageParamsInvalid,
        "encode",
        format.key(),
        cause.to_string(),
    )
}

/// Looks codecs up by [`StorageFormat`], case-insensitively on the
/// registry key the way `FileStorage` backends are chosen.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<&'static str, Arc<dyn Codec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// The registry with every built-in codec registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::arrow_ipc::ArrowStreamCodec));
        registry.register(Arc::new(crate::arrow_ipc::ArrowFileCodec));
        registry.register(Arc::new(crate::parquet_codec::ParquetCodec));
        registry.register(Arc::new(crate::csv_codec::CsvCodec));
        registry.register(Arc::new(crate::json_codec::JsonCodec));
        registry
    }

    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.codecs.insert(codec.format().key(), codec);
    }

    pub fn get(&self, format: StorageFormat) -> Result<Arc<dyn Codec>, StorageError> {
        self.codecs.get(format.key()).cloned().ok_or_else(|| {
            StorageError::new(
                StorageErrorKind::StorageParamsInvalid,
                "codec_lookup",
                format.key(),
                "no codec registered for this storage format",
            )
        })
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_resolves_every_builtin_format() {
        let registry = CodecRegistry::with_defaults();
        for format in [
            StorageFormat::ArrowStream,
            StorageFormat::ArrowFile,
            StorageFormat::Parquet,
            StorageFormat::Csv,
            StorageFormat::Json,
        ] {
            assert!(registry.get(format).is_ok());
        }
    }

    #[test]
    fn unregistered_lookup_is_storage_params_invalid() {
        let registry = CodecRegistry::new();
        let err = registry.get(StorageFormat::Csv).unwrap_err();
        assert!(err.is_kind(StorageErrorKind::StorageParamsInvalid));
    }
}
