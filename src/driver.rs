//! Synchronous driver over in-memory inputs.

use crate::{
    chunk::{Chunk, Input},
    error::MergeError,
    merge::{ReplacingSortedMerge, Status},
};

/// Run `merge` to completion over `inputs`, one `Vec` of sorted batches per input.
///
/// Empty batches are skipped. Returns every non-empty chunk in output order.
pub fn merge_batches(
    merge: &mut ReplacingSortedMerge,
    inputs: Vec<Vec<Input>>,
) -> Result<Vec<Chunk>, MergeError> {
    if inputs.len() != merge.num_inputs() {
        return Err(MergeError::InputCountMismatch {
            expected: merge.num_inputs(),
            actual: inputs.len(),
        });
    }
    let mut inputs: Vec<_> = inputs.into_iter().map(Vec::into_iter).collect();
    merge.initialize(inputs.iter_mut().map(next_input).collect())?;

    let mut chunks = Vec::new();
    loop {
        match merge.merge()? {
            Status::NeedInput(source_index) => {
                let input = next_input(&mut inputs[source_index]);
                merge.consume(source_index, input)?;
            }
            Status::Chunk { chunk, is_final } => {
                if !chunk.is_empty() {
                    chunks.push(chunk);
                }
                if is_final {
                    return Ok(chunks);
                }
            }
        }
    }
}

fn next_input(input: &mut impl Iterator<Item = Input>) -> Option<Input> {
    input.find(|input| input.batch.num_rows() > 0)
}
