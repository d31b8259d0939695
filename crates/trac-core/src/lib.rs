//! Core types and contracts shared across the TRAC storage stack:
//! path resolution, the classified error taxonomy, the owned buffer
//! type, the demand-driven publisher/subscriber machinery, and the
//! `ChunkedReader`/`WriteSubscriber` engines built on top of it.

pub mod backend_client;
pub mod buffer;
pub mod chunked_reader;
pub mod config;
pub mod context;
pub mod copy;
pub mod error;
pub mod path;
pub mod stage;
pub mod stat;
pub mod write_subscriber;

pub use backend_client::{BackendClient, BackendEvent, BackendSink};
pub use buffer::{Buffer, BufferAccounting, BufferBuilder};
pub use chunked_reader::{ChunkedReader, ChunkedReaderConfig};
pub use config::BucketConfig;
pub use context::ExecutionContext;
pub use copy::{StorageCopy, StorageFormat};
pub use error::{format_bytes, ErrorMapper, StorageError, StorageErrorKind};
pub use path::{PathResolver, StoragePath};
pub use stage::{DemandCounter, Publisher, Subscriber, Subscription, Terminal, VecPublisher};
pub use stat::{FileKind, FileStat};
pub use write_subscriber::{WriteOutcome, WriteSubscriber};
