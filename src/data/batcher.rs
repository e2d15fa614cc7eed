// ============================================================
// Layer 4 — Property/Value Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<PropSample>
// into device tensors. All sequences are pre-padded to fixed
// widths by the dataset, so batching is a flatten + reshape.

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::PropSample;
use crate::domain::errors::ShapeError;

/// A batch of training samples ready for the model forward pass.
/// All tensors have batch_size as their first dimension.
#[derive(Debug, Clone)]
pub struct PropBatch<B: Backend> {
    /// Molecule token sequences — shape: [batch_size, mol_len]
    pub molecules: Tensor<B, 2, Int>,

    /// Teacher-forced decoder inputs — shape: [batch_size, pair_len]
    pub decoder_inputs: Tensor<B, 2, Int>,

    /// Prediction targets — shape: [batch_size, pair_len]
    pub targets: Tensor<B, 2, Int>,
}

/// Holds the target device so tensors are created in the right place.
#[derive(Clone, Debug)]
pub struct PropBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> PropBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn stack(&self, rows: Vec<&Vec<i32>>) -> Tensor<B, 2, Int> {
        let batch_size = rows.len();
        let seq_len = rows[0].len();
        // Fixed-width sequences are an upstream invariant; a ragged
        // batch is a broken contract, not recoverable input.
        for row in &rows {
            if row.len() != seq_len {
                panic!("{}", ShapeError::LengthMismatch { expected: seq_len, actual: row.len() });
            }
        }
        let flat: Vec<i32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len])
    }
}

impl<B: Backend> Batcher<PropSample, PropBatch<B>> for PropBatcher<B> {
    fn batch(&self, items: Vec<PropSample>) -> PropBatch<B> {
        let molecules      = self.stack(items.iter().map(|s| &s.molecule).collect());
        let decoder_inputs = self.stack(items.iter().map(|s| &s.decoder_input).collect());
        let targets        = self.stack(items.iter().map(|s| &s.target).collect());
        PropBatch { molecules, decoder_inputs, targets }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type B = burn::backend::NdArray;

    #[test]
    fn test_batch_shapes() {
        let batcher = PropBatcher::<B>::new(Default::default());
        let sample = |offset: i32| PropSample {
            molecule:      vec![offset, offset + 1, 0],
            decoder_input: vec![1, 2, 100, 200],
            target:        vec![2, 100, 200, 3],
        };
        let batch = batcher.batch(vec![sample(5), sample(9)]);
        assert_eq!(batch.molecules.dims(), [2, 3]);
        assert_eq!(batch.decoder_inputs.dims(), [2, 4]);
        assert_eq!(batch.targets.dims(), [2, 4]);

        let mols: Vec<i64> = batch.molecules.into_data().to_vec().unwrap();
        assert_eq!(mols, vec![5, 6, 0, 9, 10, 0]);
    }
}
