//! `Stage`/`DataPipeline`: chains `Publisher<RecordBatch>` operators
//! together, forwarding demand transparently by reusing the same
//! [`Subscription`] object end to end (spec.md §4.7).

use arrow_array::RecordBatch;
use async_trait::async_trait;
use std::sync::Arc;
use trac_core::{Publisher, StorageError, StorageErrorKind, Subscriber, Subscription, Terminal};

/// What a [`Stage`] produces for one input batch.
pub enum StageOutput {
    /// Emit these batches (zero or more) and keep going.
    Continue(Vec<RecordBatch>),
    /// Emit these batches, then terminate the stream successfully and
    /// cancel upstream -- used by [`crate::range_selector::RangeSelector`]
    /// once its limit is satisfied.
    Complete(Vec<RecordBatch>),
}

/// A transform applied to one batch at a time. Interior mutability
/// (e.g. an `AtomicUsize` row counter) is how a stage tracks state
/// across calls, since `apply` takes `&self` to stay composable behind
/// an `Arc` in a pipeline built from `add_stage`.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, batch: RecordBatch) -> Result<StageOutput, StorageError>;
}

struct StageAdapter {
    stage: Arc<dyn Stage>,
    downstream: Box<dyn Subscriber<RecordBatch>>,
    upstream: Option<Subscription>,
    done: bool,
}

#[async_trait]
impl Subscriber<RecordBatch> for StageAdapter {
    async fn on_subscribe(&mut self, subscription: Subscription) {
        self.upstream = Some(subscription.clone());
        self.downstream.on_subscribe(subscription).await;
    }

    async fn on_next(&mut self, item: RecordBatch) {
        if self.done {
            return;
        }
        match self.stage.apply(item) {
            Ok(StageOutput::Continue(batches)) => {
                for batch in batches {
                    self.downstream.on_next(batch).await;
                }
            }
            Ok(StageOutput::Complete(batches)) => {
                self.done = true;
                for batch in batches {
                    self.downstream.on_next(batch).await;
                }
                self.downstream.on_terminal(Terminal::Complete).await;
                if let Some(upstream) = &self.upstream {
                    upstream.cancel();
                }
            }
            Err(e) => {
                self.done = true;
                self.downstream.on_terminal(Terminal::Error(e)).await;
                if let Some(upstream) = &self.upstream {
                    upstream.cancel();
                }
            }
        }
    }

    async fn on_terminal(&mut self, terminal: Terminal) {
        if self.done {
            return;
        }
        self.done = true;
        self.downstream.on_terminal(terminal).await;
    }
}

struct PipelineStage {
    upstream: Box<dyn Publisher<RecordBatch>>,
    stage: Arc<dyn Stage>,
}

#[async_trait]
impl Publisher<RecordBatch> for PipelineStage {
    async fn subscribe(self: Box<Self>, downstream: Box<dyn Subscriber<RecordBatch>>) {
        let adapter = StageAdapter {
            stage: self.stage,
            downstream,
            upstream: None,
            done: false,
        };
        self.upstream.subscribe(Box::new(adapter)).await;
    }
}

/// Chains a decoded source through zero or more [`Stage`]s into a
/// sink, per spec.md §4.7's `add_stage`/`add_sink`/`execute`.
pub struct DataPipeline {
    source: Box<dyn Publisher<RecordBatch>>,
    sink: Option<Box<dyn Subscriber<RecordBatch>>>,
}

impl DataPipeline {
    pub fn new(source: Box<dyn Publisher<RecordBatch>>) -> Self {
        Self { source, sink: None }
    }

    pub fn add_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.source = Box::new(PipelineStage {
            upstream: self.source,
            stage,
        });
        self
    }

    pub fn add_sink(mut self, sink: Box<dyn Subscriber<RecordBatch>>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub async fn execute(self) -> Result<(), StorageError> {
        let sink = self.sink.ok_or_else(|| {
            StorageError::new(
                StorageErrorKind::StorageParamsInvalid,
                "execute",
                "",
                "pipeline has no sink configured",
            )
        })?;
        self.source.subscribe(sink).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;
    use tokio::sync::Mutex;
    use trac_core::VecPublisher;

    fn sample_batch(rows: usize) -> RecordBatch {
        use arrow_array::Int32Array;
        use arrow_schema::{DataType, Field, Schema};
        let schema = StdArc::new(Schema::new(vec![Field::new("v", DataType::Int32, false)]));
        let values: Vec<i32> = (0..rows as i32).collect();
        RecordBatch::try_new(schema, vec![StdArc::new(Int32Array::from(values))]).unwrap()
    }

    struct DoublingStage {
        calls: AtomicUsize,
    }

    impl Stage for DoublingStage {
        fn name(&self) -> &'static str {
            "doubling"
        }
        fn apply(&self, batch: RecordBatch) -> Result<StageOutput, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(StageOutput::Continue(vec![batch.clone(), batch]))
        }
    }

    struct CollectingSink {
        rows: StdArc<Mutex<usize>>,
    }

    #[async_trait]
    impl Subscriber<RecordBatch> for CollectingSink {
        async fn on_subscribe(&mut self, subscription: Subscription) {
            subscription.request(u64::MAX);
        }
        async fn on_next(&mut self, item: RecordBatch) {
            *self.rows.lock().await += item.num_rows();
        }
        async fn on_terminal(&mut self, _terminal: Terminal) {}
    }

    #[tokio::test]
    async fn stage_output_is_forwarded_to_sink() {
        let source = VecPublisher::new(vec![sample_batch(2), sample_batch(3)]);
        let rows = StdArc::new(Mutex::new(0));
        let pipeline = DataPipeline::new(Box::new(source))
            .add_stage(StdArc::new(DoublingStage {
                calls: AtomicUsize::new(0),
            }))
            .add_sink(Box::new(CollectingSink { rows: rows.clone() }));

        pipeline.execute().await.unwrap();

        assert_eq!(*rows.lock().await, (2 + 3) * 2);
    }
}
