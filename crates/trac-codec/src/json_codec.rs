//! Newline-delimited JSON codec (spec.md §4.6). Like CSV, schema is
//! inferred from the buffer on decode.

use crate::codec::{corrupt_decode, invalid_encode, Codec};
use arrow_array::RecordBatch;
use arrow_json::reader::{infer_json_schema_from_seekable, ReaderBuilder};
use arrow_json::writer::LineDelimitedWriter;
use arrow_schema::SchemaRef;
use std::io::{BufReader, Cursor};
use std::sync::Arc;
use trac_core::{Buffer, StorageError, StorageFormat};

pub struct JsonCodec;

impl Codec for JsonCodec {
    fn format(&self) -> StorageFormat {
        StorageFormat::Json
    }

    fn default_file_extension(&self) -> &'static str {
        "jsonl"
    }

    fn decode(&self, bytes: &Buffer) -> Result<Vec<RecordBatch>, StorageError> {
        let (schema, _) = infer_json_schema_from_seekable(Cursor::new(bytes.clone()), None)
            .map_err(|e| corrupt_decode(StorageFormat::Json, e))?;

        let reader = ReaderBuilder::new(Arc::new(schema))
            .build(BufReader::new(Cursor::new(bytes.clone())))
            .map_err(|e| corrupt_decode(StorageFormat::Json, e))?;

        reader
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| corrupt_decode(StorageFormat::Json, e))
    }

    fn encode(&self, _schema: SchemaRef, batches: &[RecordBatch]) -> Result<Buffer, StorageError> {
        let mut out = Vec::new();
        {
            let mut writer = LineDelimitedWriter::new(&mut out);
            let refs: Vec<&RecordBatch> = batches.iter().collect();
            writer
                .write_batches(&refs)
                .map_err(|e| invalid_encode(StorageFormat::Json, e))?;
            writer
                .finish()
                .map_err(|e| invalid_encode(StorageFormat::Json, e))?;
        }
        Ok(Buffer::from(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_of_garbage_is_data_corruption() {
        let codec = JsonCodec;
        let garbage = Buffer::from_static(b"{not json");
        let err = codec.decode(&garbage).unwrap_err();
        assert!(err.is_kind(trac_core::StorageErrorKind::DataCorruption));
    }
}
