//! Arrow IPC codecs: `ARROW_STREAM` (no footer, sequential) and
//! `ARROW_FILE` (footer-indexed, seekable) per spec.md §4.6.

use crate::codec::{corrupt_decode, invalid_encode, Codec};
use arrow_array::RecordBatch;
use arrow_ipc::reader::{FileReader, StreamReader};
use arrow_ipc::writer::{FileWriter, StreamWriter};
use arrow_schema::SchemaRef;
use std::io::Cursor;
use trac_core::{Buffer, StorageError, StorageFormat};

pub struct ArrowStreamCodec;

impl Codec for ArrowStreamCodec {
    fn format(&self) -> StorageFormat {
        StorageFormat::ArrowStream
    }

    fn default_file_extension(&self) -> &'static str {
        "arrows"
    }

    fn decode(&self, bytes: &Buffer) -> Result<Vec<RecordBatch>, StorageError> {
        let cursor = Cursor::new(bytes.clone());
        let reader = StreamReader::try_new(cursor, None)
            .map_err(|e| corrupt_decode(StorageFormat::ArrowStream, e))?;
        reader
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| corrupt_decode(StorageFormat::ArrowStream, e))
    }

    fn encode(&self, schema: SchemaRef, batches: &[RecordBatch]) -> Result<Buffer, StorageError> {
        let mut out = Vec::new();
        {
            let mut writer = StreamWriter::try_new(&mut out, &schema)
                .map_err(|e| invalid_encode(StorageFormat::ArrowStream, e))?;
            for batch in batches {
                writer
                    .write(batch)
                    .map_err(|e| invalid_encode(StorageFormat::ArrowStream, e))?;
            }
            writer
                .finish()
                .map_err(|e| invalid_encode(StorageFormat::ArrowStream, e))?;
        }
        Ok(Buffer::from(out))
    }
}

pub struct ArrowFileCodec;

impl Codec for ArrowFileCodec {
    fn format(&self) -> StorageFormat {
        StorageFormat::ArrowFile
    }

    fn default_file_extension(&self) -> &'static str {
        "arrow"
    }

    fn decode(&self, bytes: &Buffer) -> Result<Vec<RecordBatch>, StorageError> {
        let cursor = Cursor::new(bytes.clone());
        let reader =
            FileReader::try_new(cursor, None).map_err(|e| corrupt_decode(StorageFormat::ArrowFile, e))?;
        reader
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| corrupt_decode(StorageFormat::ArrowFile, e))
    }

    fn encode(&self, schema: SchemaRef, batches: &[RecordBatch]) -> Result<Buffer, StorageError> {
        let mut out = Vec::new();
        {
            let mut writer = FileWriter::try_new(&mut out, &schema)
                .map_err(|e| invalid_encode(StorageFormat::ArrowFile, e))?;
            for batch in batches {
                writer
                    .write(batch)
                    .map_err(|e| invalid_encode(StorageFormat::ArrowFile, e))?;
            }
            writer
                .finish()
                .map_err(|e| invalid_encode(StorageFormat::ArrowFile, e))?;
        }
        Ok(Buffer::from(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_decode_of_garbage_is_data_corruption() {
        let codec = ArrowStreamCodec;
        let garbage = Buffer::from_static(b"not an arrow stream");
        let err = codec.decode(&garbage).unwrap_err();
        assert!(err.is_kind(trac_core::StorageErrorKind::DataCorruption));
    }

    #[test]
    fn file_decode_of_garbage_is_data_corruption() {
        let codec = ArrowFileCodec;
        let garbage = Buffer::from_static(b"not an arrow file");
        let err = codec.decode(&garbage).unwrap_err();
        assert!(err.is_kind(trac_core::StorageErrorKind::DataCorruption));
    }
}
