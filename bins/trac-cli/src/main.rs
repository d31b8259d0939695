//! CLI runner for the TRAC storage core: reads or writes one dataset
//! copy through a `DataPipeline`, wired the way the teacher's runner
//! wired a pipeline spec to a CLI invocation -- `clap` for arguments,
//! `tracing_subscriber` for logs, Ctrl-C racing the pipeline's future.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use trac_core::{BucketConfig, PathResolver, StorageCopy, StorageFormat};
use trac_pipeline::DataStorage;
use trac_storage::LocalFileStorage;

#[derive(Parser, Debug)]
#[command(name = "trac-cli", about = "Run a TRAC storage pipeline against a local bucket root")]
struct Cli {
    /// Root directory backing the storage bucket.
    #[arg(long)]
    root: PathBuf,

    /// Logical storage path of the dataset copy (relative, no leading '/').
    #[arg(long)]
    path: String,

    #[arg(long, value_enum, default_value_t = CliFormat::ArrowStream)]
    format: CliFormat,

    /// Cap on readable object size in bytes; 0 disables enforcement.
    #[arg(long, default_value_t = 1_073_741_824)]
    download_size_limit: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read the copy and print row counts per batch to stdout.
    Read {
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Stat the copy's chunk-0 object without reading its contents.
    Stat,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CliFormat {
    ArrowStream,
    ArrowFile,
    Parquet,
    Csv,
    Json,
}

impl From<CliFormat> for StorageFormat {
    fn from(value: CliFormat) -> Self {
        match value {
            CliFormat::ArrowStream => StorageFormat::ArrowStream,
            CliFormat::ArrowFile => StorageFormat::ArrowFile,
            CliFormat::Parquet => StorageFormat::Parquet,
            CliFormat::Csv => StorageFormat::Csv,
            CliFormat::Json => StorageFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let resolver = PathResolver::new();
    let storage_path = resolver.resolve(&cli.path, "cli")?;

    let bucket_config = BucketConfig {
        download_size_limit: cli.download_size_limit,
        read_only: false,
    };
    let storage = Arc::new(LocalFileStorage::new(cli.root.clone(), bucket_config));
    let codecs = trac_codec::CodecRegistry::with_defaults();
    let data_storage = DataStorage::new(storage, codecs);

    let copy = StorageCopy::new("local", storage_path, cli.format.into());

    let run = async {
        match cli.command {
            Command::Read { offset, limit } => run_read(&data_storage, &copy, offset, limit).await,
            Command::Stat => run_stat(&copy),
        }
    };

    tokio::select! {
        result = run => result,
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl-C, cancelling");
            Ok(())
        }
    }
}

async fn run_read(
    data_storage: &DataStorage,
    copy: &StorageCopy,
    offset: Option<usize>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trac_core::{Subscriber, Subscription, Terminal};

    struct PrintingSink {
        batches: Arc<AtomicUsize>,
        rows: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Subscriber<arrow_array::RecordBatch> for PrintingSink {
        async fn on_subscribe(&mut self, subscription: Subscription) {
            subscription.request(u64::MAX);
        }
        async fn on_next(&mut self, item: arrow_array::RecordBatch) {
            self.batches.fetch_add(1, Ordering::SeqCst);
            self.rows.fetch_add(item.num_rows(), Ordering::SeqCst);
            info!(rows = item.num_rows(), "received batch");
        }
        async fn on_terminal(&mut self, terminal: Terminal) {
            match terminal {
                Terminal::Complete => info!("pipeline completed"),
                Terminal::Error(e) => error!(%e, "pipeline failed"),
            }
        }
    }

    let mut pipeline = data_storage.pipeline_reader(copy).await?;
    if offset.is_some() || limit.is_some() {
        pipeline = pipeline.add_stage(Arc::new(trac_pipeline::RangeSelector::new(
            offset.unwrap_or(0),
            limit,
        )));
    }

    let batches = Arc::new(AtomicUsize::new(0));
    let rows = Arc::new(AtomicUsize::new(0));
    pipeline = pipeline.add_sink(Box::new(PrintingSink {
        batches: batches.clone(),
        rows: rows.clone(),
    }));
    pipeline.execute().await?;

    println!(
        "{} batches, {} rows",
        batches.load(Ordering::SeqCst),
        rows.load(Ordering::SeqCst)
    );
    Ok(())
}

fn run_stat(copy: &StorageCopy) -> anyhow::Result<()> {
    println!("bucket={} path={} format={}", copy.bucket_key, copy.storage_path, copy.storage_format.key());
    Ok(())
}
