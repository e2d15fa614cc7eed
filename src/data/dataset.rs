// ============================================================
// Layer 4 — Sequence-Shift Dataset
// ============================================================
// Turns a molecule's full fact set into one bounded-length
// teacher-forced training triple per sample, with controlled
// randomness so the model learns order- and subset-invariance:
//
//   raw facts   SEP p1 v1 p2 v2 p3 v3 END PAD..
//       │  strip PAD and SEP/END framing
//       ▼
//   pairs       (p1 v1) (p2 v2) (p3 v3)
//       │  uniformly random permutation of PAIRS (pairs move
//       │  as units, a value never separates from its property)
//       ▼
//   truncate    first n_features pairs
//       │  re-frame and right-pad to exactly 2*n_features + 2
//       ▼
//   target      SEP p2 v2 p3 v3 p1 v1 END PAD..
//   decoder_in  START SEP p2 v2 p3 v3 p1 v1 END PAD..  (shifted)
//
// Re-sampling the same molecule yields a different permutation
// with high probability; this is data augmentation, not a
// persisted entity.

use burn::data::dataset::Dataset;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::tokenizer::{END_IDX, PAD_IDX, SEP_IDX, START_IDX};
use crate::domain::errors::ShapeError;
use crate::domain::fact::MoleculeFacts;

/// One fully built training sample. All three sequences already
/// have their final fixed width.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropSample {
    /// Molecule token sequence, padded to max_mol_len
    pub molecule: Vec<i32>,

    /// START-prefixed, right-shifted copy of `target`
    pub decoder_input: Vec<i32>,

    /// SEP-prefixed, END-suffixed, PAD-padded fact sequence
    pub target: Vec<i32>,
}

/// Strip PAD and the SEP/END framing from a raw fact sequence,
/// returning the flat list of 2k fact tokens.
fn unframe(raw: &[i32]) -> Result<Vec<i32>, ShapeError> {
    let unpadded: Vec<i32> = raw.iter().copied().filter(|&t| t != PAD_IDX as i32).collect();
    let inner: Vec<i32> = unpadded
        .into_iter()
        .filter(|&t| t != SEP_IDX as i32 && t != END_IDX as i32)
        .collect();
    if inner.len() % 2 != 0 {
        return Err(ShapeError::OddFactSequence { len: inner.len() });
    }
    Ok(inner)
}

/// Build one (decoder_input, target) pair from a raw framed fact
/// sequence. Both outputs have length exactly `2 * n_features + 2`
/// for ANY number of input facts, including zero.
pub fn build_shifted_example(
    raw_facts:  &[i32],
    n_features: usize,
    rng:        &mut impl Rng,
) -> Result<(Vec<i32>, Vec<i32>), ShapeError> {
    let flat = unframe(raw_facts)?;

    // Permute at PAIR granularity, then flatten back.
    let mut pairs: Vec<[i32; 2]> = flat.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
    pairs.shuffle(rng);

    // Truncate to the first n_features pairs; fewer is fine, the
    // padding below absorbs the deficit.
    pairs.truncate(n_features);

    let width = 2 * n_features + 2;
    let mut target = Vec::with_capacity(width);
    target.push(SEP_IDX as i32);
    for pair in &pairs {
        target.extend_from_slice(pair);
    }
    target.push(END_IDX as i32);
    while target.len() < width {
        target.push(PAD_IDX as i32);
    }

    let mut decoder_input = Vec::with_capacity(width);
    decoder_input.push(START_IDX as i32);
    decoder_input.extend_from_slice(&target[..width - 1]);

    Ok((decoder_input, target))
}

/// Burn dataset over prepared molecules. Every `get` draws a fresh
/// permutation/truncation, so repeated epochs see different
/// presentations of the same facts.
pub struct SequenceShiftDataset {
    records:    Vec<MoleculeFacts>,
    n_features: usize,
}

impl SequenceShiftDataset {
    pub fn new(records: Vec<MoleculeFacts>, n_features: usize) -> Self {
        Self { records, n_features }
    }

    /// Fixed width of every decoder_input/target this dataset emits.
    pub fn pair_seq_len(&self) -> usize {
        2 * self.n_features + 2
    }
}

impl Dataset<PropSample> for SequenceShiftDataset {
    fn get(&self, index: usize) -> Option<PropSample> {
        let record = self.records.get(index)?;
        let mut rng = rand::thread_rng();
        // A framed fact sequence is an upstream construction
        // invariant; an odd pair count cannot be produced by the
        // training pipeline and is fatal here.
        let (decoder_input, target) =
            build_shifted_example(&record.fact_tokens, self.n_features, &mut rng)
                .expect("framed fact sequence must hold whole (property, value) pairs");
        Some(PropSample {
            molecule: record.molecule_tokens.clone(),
            decoder_input,
            target,
        })
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    const SEP: i32 = SEP_IDX as i32;
    const END: i32 = END_IDX as i32;
    const PAD: i32 = PAD_IDX as i32;
    const START: i32 = START_IDX as i32;

    /// Framed fact sequence with k pairs: SEP p1 v1 .. pk vk END
    fn framed(pairs: &[(i32, i32)]) -> Vec<i32> {
        let mut seq = vec![SEP];
        for &(p, v) in pairs {
            seq.push(p);
            seq.push(v);
        }
        seq.push(END);
        seq
    }

    #[test]
    fn test_fixed_width_for_any_fact_count() {
        let mut rng = StdRng::seed_from_u64(7);
        for k in [0usize, 1, 3, 5, 9] {
            let pairs: Vec<(i32, i32)> = (0..k as i32).map(|i| (100 + i, 200 + i)).collect();
            let (dec, tgt) = build_shifted_example(&framed(&pairs), 5, &mut rng).unwrap();
            assert_eq!(dec.len(), 12, "decoder width for k={k}");
            assert_eq!(tgt.len(), 12, "target width for k={k}");
        }
    }

    #[test]
    fn test_three_facts_five_features_scenario() {
        let mut rng = StdRng::seed_from_u64(42);
        let pairs = [(100, 200), (101, 201), (102, 202)];
        let (dec, tgt) = build_shifted_example(&framed(&pairs), 5, &mut rng).unwrap();

        assert_eq!(tgt.len(), 12);
        assert_eq!(tgt[0], SEP);
        // 3 real pairs fill positions 1..7, END at 7, PAD thereafter
        assert_eq!(tgt[7], END);
        assert!(tgt[8..].iter().all(|&t| t == PAD));

        // decoder input is START followed by target minus its last token
        assert_eq!(dec[0], START);
        assert_eq!(&dec[1..], &tgt[..11]);
    }

    #[test]
    fn test_zero_facts_yields_framing_only() {
        let mut rng = StdRng::seed_from_u64(3);
        let (_, tgt) = build_shifted_example(&framed(&[]), 5, &mut rng).unwrap();
        assert_eq!(tgt[0], SEP);
        assert_eq!(tgt[1], END);
        assert!(tgt[2..].iter().all(|&t| t == PAD));
    }

    #[test]
    fn test_pairs_never_separated() {
        // Property i is always adjacent to its own value, whatever
        // permutation and truncation happened.
        let mut rng = StdRng::seed_from_u64(11);
        let pairs: Vec<(i32, i32)> = (0..8).map(|i| (100 + i, 200 + i)).collect();
        let raw = framed(&pairs);
        for _ in 0..50 {
            let (_, tgt) = build_shifted_example(&raw, 5, &mut rng).unwrap();
            let inner: Vec<i32> = tgt
                .iter()
                .copied()
                .filter(|&t| t != SEP && t != END && t != PAD)
                .collect();
            assert_eq!(inner.len() % 2, 0);
            for chunk in inner.chunks_exact(2) {
                assert_eq!(chunk[1] - chunk[0], 100, "pair split apart: {chunk:?}");
            }
        }
    }

    #[test]
    fn test_permutation_produces_distinct_orderings() {
        // Statistical property: with 6 pairs truncated to 5, fifty
        // samples produce at least two distinct orderings.
        let mut rng = StdRng::seed_from_u64(23);
        let pairs: Vec<(i32, i32)> = (0..6).map(|i| (100 + i, 200 + i)).collect();
        let raw = framed(&pairs);
        let mut seen: HashSet<Vec<i32>> = HashSet::new();
        for _ in 0..50 {
            let (_, tgt) = build_shifted_example(&raw, 5, &mut rng).unwrap();
            seen.insert(tgt);
        }
        assert!(seen.len() >= 2, "only {} distinct orderings", seen.len());
    }

    #[test]
    fn test_odd_sequence_is_shape_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let raw = vec![SEP, 100, 200, 101, END]; // dangling property token
        assert!(matches!(
            build_shifted_example(&raw, 5, &mut rng),
            Err(ShapeError::OddFactSequence { len: 3 })
        ));
    }

    #[test]
    fn test_dataset_emits_fixed_widths() {
        let records = vec![MoleculeFacts::new(
            "InChI=1S/test",
            vec![5, 9, 12, 0, 0],
            framed(&[(100, 200), (101, 201)]),
        )];
        let ds = SequenceShiftDataset::new(records, 5);
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.pair_seq_len(), 12);
        let sample = ds.get(0).unwrap();
        assert_eq!(sample.molecule, vec![5, 9, 12, 0, 0]);
        assert_eq!(sample.decoder_input.len(), 12);
        assert_eq!(sample.target.len(), 12);
    }
}
