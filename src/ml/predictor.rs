// ============================================================
// Layer 5 — Predictor
// ============================================================
// Loads an evaluation-ready model from a checkpoint and turns
// one forward pass into the probability that a property's value
// is positive for a molecule.
//
// Decoder input shapes:
//   no known facts       [START, SEP, property]
//   randomized context   [START, SEP, p1, v1, .., pk, vk, property]
//
// The final-position logits are restricted to the closed value
// token set before the softmax, so the returned probability is
// normalized over value outcomes only.

use anyhow::Result;
use burn::{prelude::*, tensor::activation::softmax};

use crate::data::tokenizer::{PropValTokenizer, PAD_IDX, SEP_IDX, START_IDX};
use crate::domain::errors::{PredictError, VocabularyError};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{MultitaskTransformer, MultitaskTransformerConfig};

type InferBackend = burn::backend::NdArray;
type InferDevice  = burn::backend::ndarray::NdArrayDevice;

pub struct Predictor {
    model:       MultitaskTransformer<InferBackend>,
    tokenizer:   PropValTokenizer,
    max_mol_len: usize,
    device:      InferDevice,
}

impl Predictor {
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager) -> Result<Self> {
        let device = InferDevice::default();
        let cfg = ckpt_manager.load_config()?;
        let tokenizer = ckpt_manager.load_tokenizer()?;
        let model_cfg = MultitaskTransformerConfig::new(
            tokenizer.vocab_size(), cfg.max_mol_len, cfg.d_model,
            cfg.num_heads, cfg.num_layers, cfg.d_ff, 0.0, PAD_IDX,
        );
        let model: MultitaskTransformer<InferBackend> = model_cfg.init(&device);
        let model = ckpt_manager.load_model(model, &device)?;
        tracing::info!("Model loaded from checkpoint");
        Ok(Self { model, tokenizer, max_mol_len: cfg.max_mol_len, device })
    }

    /// Build a predictor around an already constructed model.
    pub fn new(
        model:       MultitaskTransformer<InferBackend>,
        tokenizer:   PropValTokenizer,
        max_mol_len: usize,
    ) -> Self {
        Self { model, tokenizer, max_mol_len, device: InferDevice::default() }
    }

    pub fn tokenizer(&self) -> &PropValTokenizer {
        &self.tokenizer
    }

    /// One forward pass: probability that `property_token` is
    /// positive for the molecule, conditioned on the supplied
    /// (property, value) context pairs.
    pub fn positive_probability(
        &self,
        selfies:        &str,
        property_token: usize,
        context:        &[(usize, usize)],
    ) -> Result<f32, PredictError> {
        self.tokenizer.validate_property_token(property_token)?;

        let molecule = self.tokenizer.encode_padded(selfies, self.max_mol_len)?;
        let mol_len = molecule.len();

        let mut teach: Vec<i32> = vec![START_IDX as i32, SEP_IDX as i32];
        for &(prop, val) in context {
            self.tokenizer.validate_property_token(prop)?;
            if !self.tokenizer.is_value_token(val) {
                return Err(VocabularyError::OutOfRange {
                    token:      val,
                    vocab_size: self.tokenizer.vocab_size(),
                }
                .into());
            }
            teach.push(prop as i32);
            teach.push(val as i32);
        }
        teach.push(property_token as i32);
        let teach_len = teach.len();

        let molecule = Tensor::<InferBackend, 1, Int>::from_ints(molecule.as_slice(), &self.device)
            .reshape([1, mol_len]);
        let teach = Tensor::<InferBackend, 1, Int>::from_ints(teach.as_slice(), &self.device)
            .reshape([1, teach_len]);

        let logits = self.model.forward(molecule, teach);
        let [_, _, vocab] = logits.dims();

        // Restrict the final position to the closed value-token set.
        let value_indexes: Vec<usize> = self.tokenizer.value_indexes().into_values().collect();
        let positive_idx = self
            .tokenizer
            .value_id_to_token_idx(1)?;
        let one_index = value_indexes
            .iter()
            .position(|&v| v == positive_idx)
            .expect("positive value token missing from value_indexes");

        let value_idx_i32: Vec<i32> = value_indexes.iter().map(|&v| v as i32).collect();
        let last = logits
            .slice([0..1, (teach_len - 1)..teach_len, 0..vocab])
            .reshape([vocab]);
        let restricted = last.select(
            0,
            Tensor::<InferBackend, 1, Int>::from_ints(value_idx_i32.as_slice(), &self.device),
        );
        let probs: Vec<f32> = softmax(restricted, 0)
            .into_data()
            .to_vec()
            .expect("softmax output readable");

        Ok(probs[one_index])
    }
}
