//! CSV codec (spec.md §4.6). Schema is inferred from the buffer on
//! decode, since `CSV` carries no schema of its own; callers that need
//! a fixed schema should prefer `ARROW_STREAM`/`PARQUET`.

use crate::codec::{corrupt_decode, invalid_encode, Codec};
use arrow_array::RecordBatch;
use arrow_csv::reader::Format;
use arrow_csv::{ReaderBuilder, Writer};
use arrow_schema::SchemaRef;
use std::io::Cursor;
use std::sync::Arc;
use trac_core::{Buffer, StorageError, StorageFormat};

pub struct CsvCodec;

impl Codec for CsvCodec {
    fn format(&self) -> StorageFormat {
        StorageFormat::Csv
    }

    fn default_file_extension(&self) -> &'static str {
        "csv"
    }

    fn decode(&self, bytes: &Buffer) -> Result<Vec<RecordBatch>, StorageError> {
        let format = Format::default().with_header(true);
        let (schema, _) = format
            .infer_schema(Cursor::new(bytes.clone()), None)
            .map_err(|e| corrupt_decode(StorageFormat::Csv, e))?;

        let reader = ReaderBuilder::new(Arc::new(schema))
            .with_format(format)
            .build(Cursor::new(bytes.clone()))
            .map_err(|e| corrupt_decode(StorageFormat::Csv, e))?;

        reader
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| corrupt_decode(StorageFormat::Csv, e))
    }

    fn encode(&self, _schema: SchemaRef, batches: &[RecordBatch]) -> Result<Buffer, StorageError> {
        let mut out = Vec::new();
        {
            let mut writer = Writer::new(&mut out);
            for batch in batches {
                writer
                    .write(batch)
                    .map_err(|e| invalid_encode(StorageFormat::Csv, e))?;
            }
        }
        Ok(Buffer::from(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_of_valid_csv_round_trips_row_count() {
        let codec = CsvCodec;
        let csv = Buffer::from_static(b"a,b\n1,2\n3,4\n");
        let batches = codec.decode(&csv).unwrap();
        let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total_rows, 2);
    }
}
