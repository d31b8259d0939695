//! `RangeSelector`: applies a row `offset`/`limit` across batch
//! boundaries with zero-copy slicing, cancelling upstream and
//! completing downstream as soon as the limit is satisfied. See
//! spec.md §4.8.

use crate::stage::{Stage, StageOutput};
use arrow_array::RecordBatch;
use std::sync::atomic::{AtomicUsize, Ordering};
use trac_core::StorageError;

pub struct RangeSelector {
    offset: usize,
    limit: Option<usize>,
    rows_seen: AtomicUsize,
}

impl RangeSelector {
    pub fn new(offset: usize, limit: Option<usize>) -> Self {
        Self {
            offset,
            limit,
            rows_seen: AtomicUsize::new(0),
        }
    }
}

impl Stage for RangeSelector {
    fn name(&self) -> &'static str {
        "range_selector"
    }

    fn apply(&self, batch: RecordBatch) -> Result<StageOutput, StorageError> {
        let batch_rows = batch.num_rows();
        let seen_before = self.rows_seen.fetch_add(batch_rows, Ordering::SeqCst);
        let seen_after = seen_before + batch_rows;

        let window_end = self.limit.map(|limit| self.offset + limit);
        let range_start = self.offset.max(seen_before);
        let range_end = window_end.unwrap_or(seen_after).min(seen_after);

        let limit_satisfied = |end: usize| window_end.is_some_and(|w| end >= w);

        if range_start >= range_end {
            // Nothing in this batch falls in [offset, offset+limit).
            if limit_satisfied(seen_before) {
                return Ok(StageOutput::Complete(vec![]));
            }
            return Ok(StageOutput::Continue(vec![]));
        }

        let local_start = range_start - seen_before;
        let local_len = range_end - range_start;
        let sliced = batch.slice(local_start, local_len);

        if limit_satisfied(range_end) {
            Ok(StageOutput::Complete(vec![sliced]))
        } else {
            Ok(StageOutput::Continue(vec![sliced]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::Int32Array;
    use arrow_schema::{DataType, Field, Schema};
    use std::sync::Arc;

    fn batch_of(values: Vec<i32>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int32, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(values))]).unwrap()
    }

    fn emitted(output: StageOutput) -> (Vec<RecordBatch>, bool) {
        match output {
            StageOutput::Continue(b) => (b, false),
            StageOutput::Complete(b) => (b, true),
        }
    }

    #[test]
    fn selects_a_window_spanning_two_batches() {
        let selector = RangeSelector::new(3, Some(4)); // rows [3,7)
        let (first, done1) = emitted(selector.apply(batch_of(vec![0, 1, 2, 3, 4])).unwrap());
        assert!(!done1);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].num_rows(), 2); // rows 3,4

        let (second, done2) = emitted(selector.apply(batch_of(vec![5, 6, 7, 8, 9])).unwrap());
        assert!(done2);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].num_rows(), 2); // rows 5,6 -> window closes at 7
    }

    #[test]
    fn no_limit_passes_everything_after_offset() {
        let selector = RangeSelector::new(2, None);
        let (first, done) = emitted(selector.apply(batch_of(vec![0, 1, 2, 3])).unwrap());
        assert!(!done);
        assert_eq!(first[0].num_rows(), 2);
    }

    #[test]
    fn batch_entirely_before_offset_is_skipped() {
        let selector = RangeSelector::new(10, Some(1));
        let (batches, done) = emitted(selector.apply(batch_of(vec![0, 1, 2])).unwrap());
        assert!(batches.is_empty());
        assert!(!done);
    }
}
