// ============================================================
// Layer 5 — Sequence Loss
// ============================================================
// Label-smoothed cross-entropy over the full output
// distribution. PAD target positions carry zero weight; the
// smoothing mass is redistributed uniformly over non-true
// classes by Burn's loss implementation.
//
// Targets must lie in [0, vocab); anything else is a broken
// caller contract and fails inside the loss kernel rather than
// being coerced.
//
// Reference: Szegedy et al. (2016) label smoothing

use burn::{nn::loss::CrossEntropyLossConfig, prelude::*};

#[derive(Debug, Clone)]
pub struct SequenceLoss {
    pad_idx:   usize,
    smoothing: f32,
}

impl SequenceLoss {
    pub fn new(pad_idx: usize, smoothing: f32) -> Self {
        Self { pad_idx, smoothing }
    }

    /// logits: [batch, seq, vocab], targets: [batch, seq]
    /// → scalar mean loss over non-PAD positions
    pub fn forward<B: Backend>(
        &self,
        logits:  Tensor<B, 3>,
        targets: Tensor<B, 2, Int>,
    ) -> Tensor<B, 1> {
        let [batch_size, seq_len, vocab] = logits.dims();
        let flat_logits = logits.reshape([batch_size * seq_len, vocab]);
        let flat_targets = targets.reshape([batch_size * seq_len]);

        CrossEntropyLossConfig::new()
            .with_pad_tokens(Some(vec![self.pad_idx]))
            .with_smoothing(Some(self.smoothing))
            .init(&flat_logits.device())
            .forward(flat_logits, flat_targets)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type B = burn::backend::NdArray;

    #[test]
    fn test_loss_is_finite_and_positive() {
        let device = Default::default();
        let loss_fn = SequenceLoss::new(0, 0.1);

        let logits = Tensor::<B, 1>::from_floats(
            [
                0.5, -0.1, 0.2, 0.9, // pos 0
                0.1, 0.3, -0.7, 0.0, // pos 1
            ]
            .as_slice(),
            &device,
        )
        .reshape([1, 2, 4]);
        let targets = Tensor::<B, 1, Int>::from_ints([3, 1].as_slice(), &device).reshape([1, 2]);

        let loss: f32 = loss_fn.forward(logits, targets).into_scalar();
        assert!(loss.is_finite());
        assert!(loss > 0.0);
    }

    #[test]
    fn test_pad_positions_do_not_move_the_loss() {
        // Changing logits at a PAD target position must not change
        // the loss value.
        let device = Default::default();
        let loss_fn = SequenceLoss::new(0, 0.1);

        let targets = Tensor::<B, 1, Int>::from_ints([2, 0].as_slice(), &device).reshape([1, 2]);

        let base = [0.5f32, -0.1, 0.2, 0.9, 0.1, 0.3, -0.7, 0.0];
        let mut noisy = base;
        noisy[5] = 10.0; // logit under the PAD-labelled position

        let loss_a: f32 = loss_fn
            .forward(
                Tensor::<B, 1>::from_floats(base.as_slice(), &device).reshape([1, 2, 4]),
                targets.clone(),
            )
            .into_scalar();
        let loss_b: f32 = loss_fn
            .forward(
                Tensor::<B, 1>::from_floats(noisy.as_slice(), &device).reshape([1, 2, 4]),
                targets,
            )
            .into_scalar();
        assert!((loss_a - loss_b).abs() < 1e-6);
    }
}
