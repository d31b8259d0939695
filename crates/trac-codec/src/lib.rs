//! Codec registry and concrete encoders/decoders (spec.md §4.6).

mod arrow_ipc;
mod codec;
mod csv_codec;
mod json_codec;
mod parquet_codec;

pub use codec::{Codec, CodecRegistry};
