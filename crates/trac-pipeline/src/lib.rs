//! `DataPipeline`, `RangeSelector`, and the `DataStorage` facade
//! (spec.md §4.7/§4.8/§4.9).

mod decode;
mod encode;
mod range_selector;
mod stage;
mod storage;

pub use decode::DecodingPublisher;
pub use encode::{EncodeOutcome, EncodingSubscriber};
pub use range_selector::RangeSelector;
pub use stage::{DataPipeline, Stage, StageOutput};
pub use storage::DataStorage;
