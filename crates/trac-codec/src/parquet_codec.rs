//! Parquet codec (spec.md §4.6). `parquet::arrow` reads directly from
//! a `bytes::Bytes` via its `ChunkReader` impl, matching our `Buffer`
//! type with no intermediate copy.

use crate::codec::{corrupt_decode, invalid_encode, Codec};
use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use trac_core::{Buffer, StorageError, StorageFormat};

pub struct ParquetCodec;

impl Codec for ParquetCodec {
    fn format(&self) -> StorageFormat {
        StorageFormat::Parquet
    }

    fn default_file_extension(&self) -> &'static str {
        "parquet"
    }

    fn decode(&self, bytes: &Buffer) -> Result<Vec<RecordBatch>, StorageError> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(bytes.clone())
            .map_err(|e| corrupt_decode(StorageFormat::Parquet, e))?;
        let reader = builder
            .build()
            .map_err(|e| corrupt_decode(StorageFormat::Parquet, e))?;
        reader
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| corrupt_decode(StorageFormat::Parquet, e))
    }

    fn encode(&self, schema: SchemaRef, batches: &[RecordBatch]) -> Result<Buffer, StorageError> {
        let mut out = Vec::new();
        {
            let mut writer = ArrowWriter::try_new(&mut out, schema, None)
                .map_err(|e| invalid_encode(StorageFormat::Parquet, e))?;
            for batch in batches {
                writer
                    .write(batch)
                    .map_err(|e| invalid_encode(StorageFormat::Parquet, e))?;
            }
            writer
                .close()
                .map_err(|e| invalid_encode(StorageFormat::Parquet, e))?;
        }
        Ok(Buffer::from(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_of_garbage_is_data_corruption() {
        let codec = ParquetCodec;
        let garbage = Buffer::from_static(b"not a parquet file");
        let err = codec.decode(&garbage).unwrap_err();
        assert!(err.is_kind(trac_core::StorageErrorKind::DataCorruption));
    }
}
