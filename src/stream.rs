//! Async driver: feeds a replacing merge from ordered batch streams.

use std::{
    collections::VecDeque,
    pin::Pin,
    task::{Context, Poll},
};

use arrow::{error::ArrowError, record_batch::RecordBatch};
use futures_core::{ready, Stream};
use futures_util::StreamExt;

use crate::{
    chunk::{Chunk, Input},
    error::MergeError,
    merge::{ReplacingSortedMerge, Status},
    observability::{log_debug, log_warn},
};

/// Stream of merged chunks over one ordered batch stream per input.
///
/// Empty chunks are not yielded. The stream ends after the final chunk or
/// the first error.
pub struct ReplacingMergeStream<S> {
    merge: ReplacingSortedMerge,
    inputs: Vec<S>,
    /// Inputs to poll before the merge can make progress.
    pending: VecDeque<usize>,
    done: bool,
}

impl<S> ReplacingMergeStream<S>
where
    S: Stream<Item = Result<RecordBatch, ArrowError>> + Unpin,
{
    /// Wrap `merge`; `inputs` must hold one stream per merge input.
    pub fn new(merge: ReplacingSortedMerge, inputs: Vec<S>) -> Result<Self, MergeError> {
        if inputs.len() != merge.num_inputs() {
            return Err(MergeError::InputCountMismatch {
                expected: merge.num_inputs(),
                actual: inputs.len(),
            });
        }
        Ok(Self {
            pending: (0..inputs.len()).collect(),
            merge,
            inputs,
            done: false,
        })
    }

    /// The wrapped merge, e.g. to read its stats once the stream is drained.
    pub fn merge(&self) -> &ReplacingSortedMerge {
        &self.merge
    }

    fn fail(&mut self, err: MergeError) -> Poll<Option<Result<Chunk, MergeError>>> {
        self.done = true;
        Poll::Ready(Some(Err(err)))
    }
}

impl<S> Stream for ReplacingMergeStream<S>
where
    S: Stream<Item = Result<RecordBatch, ArrowError>> + Unpin,
{
    type Item = Result<Chunk, MergeError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        loop {
            while let Some(&source_index) = this.pending.front() {
                let input = match ready!(this.inputs[source_index].poll_next_unpin(cx)) {
                    Some(Ok(batch)) if batch.num_rows() == 0 => continue,
                    Some(Ok(batch)) => Some(Input::new(batch)),
                    Some(Err(error)) => {
                        log_warn!(
                            component = "stream",
                            event = "input_failed",
                            source = source_index,
                            error = %error,
                        );
                        return this.fail(MergeError::Source {
                            source_index,
                            error,
                        });
                    }
                    None => None,
                };
                this.pending.pop_front();
                if let Err(err) = this.merge.consume(source_index, input) {
                    return this.fail(err);
                }
            }

            match this.merge.merge() {
                Ok(Status::NeedInput(source_index)) => this.pending.push_back(source_index),
                Ok(Status::Chunk { chunk, is_final }) => {
                    if is_final {
                        this.done = true;
                        log_debug!(
                            component = "stream",
                            event = "stream_finished",
                            chunks = this.merge.stats().chunks,
                        );
                    }
                    if !chunk.is_empty() {
                        return Poll::Ready(Some(Ok(chunk)));
                    }
                    if is_final {
                        return Poll::Ready(None);
                    }
                }
                Err(err) => return this.fail(err),
            }
        }
    }
}
