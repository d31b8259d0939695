//! `StorageCopy` -- a named concrete copy of a dataset in a specific
//! bucket/format/path. External identifier, immutable within a
//! pipeline. See spec.md §3 and the GLOSSARY.

use crate::path::StoragePath;
use serde::{Deserialize, Serialize};

/// Recognised codec keys (case-insensitive in [`crate::codec::CodecRegistry::get`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageFormat {
    ArrowStream,
    ArrowFile,
    Parquet,
    Csv,
    Json,
}

impl StorageFormat {
    pub fn key(self) -> &'static str {
        match self {
            Self::ArrowStream => "ARROW_STREAM",
            Self::ArrowFile => "ARROW_FILE",
            Self::Parquet => "PARQUET",
            Self::Csv => "CSV",
            Self::Json => "JSON",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        match key.to_ascii_uppercase().as_str() {
            "ARROW_STREAM" => Some(Self::ArrowStream),
            "ARROW_FILE" => Some(Self::ArrowFile),
            "PARQUET" => Some(Self::Parquet),
            "CSV" => Some(Self::Csv),
            "JSON" => Some(Self::Json),
            _ => None,
        }
    }
}

/// A named, formatted dataset copy in a bucket/filesystem.
#[derive(Debug, Clone)]
pub struct StorageCopy {
    pub bucket_key: String,
    pub storage_path: StoragePath,
    pub storage_format: StorageFormat,
}

impl StorageCopy {
    pub fn new(bucket_key: impl Into<String>, storage_path: StoragePath, storage_format: StorageFormat) -> Self {
        Self {
            bucket_key: bucket_key.into(),
            storage_path,
            storage_format,
        }
    }

    /// `{storage_path}/chunk-0.{extension}`. Reserved for future
    /// multi-chunk layouts (spec.md §3/§6).
    pub fn chunk_path(&self, extension: &str) -> StoragePath {
        self.storage_path.join(&format!("chunk-0.{extension}"))
    }
}
