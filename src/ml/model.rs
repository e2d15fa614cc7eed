// ============================================================
// Layer 5 — Multitask Transformer
// ============================================================
// Encoder-decoder sequence model over one shared vocabulary:
//
//   encoder  — bidirectional self-attention over molecule tokens
//              (key-padding mask only, no causal restriction)
//   decoder  — paired-causal self-attention over the teacher-
//              forced property/value sequence plus cross-attention
//              into the encoder output
//   head     — three-layer projection to the full vocabulary;
//              callers restrict to value tokens as needed
//
// Output logits at decoder position t depend only on molecule
// tokens and pair positions <= t, plus the same-pair exception
// encoded in the paired causal mask. With dropout disabled the
// forward pass is exactly deterministic.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
        PositionalEncoding, PositionalEncodingConfig,
    },
    prelude::*,
    tensor::activation::gelu,
};

use crate::ml::masking;

#[derive(Config, Debug)]
pub struct MultitaskTransformerConfig {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    pub dropout:     f64,
    pub pad_idx:     usize,
}

impl MultitaskTransformerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MultitaskTransformer<B> {
        let embedding = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let positional_encoding = PositionalEncodingConfig::new(self.d_model)
            .with_max_sequence_size(self.max_seq_len)
            .init(device);
        let encoder_layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let decoder_layers: Vec<DecoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_decoder_block(device))
            .collect();
        let decoder_norm = LayerNormConfig::new(self.d_model).init(device);
        let head    = self.build_head(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        MultitaskTransformer {
            embedding, positional_encoding,
            encoder_layers, decoder_layers,
            decoder_norm, head, dropout,
            pad_idx: self.pad_idx,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        EncoderBlock {
            self_attn,
            ffn_linear1: LinearConfig::new(self.d_model, self.d_ff).init(device),
            ffn_linear2: LinearConfig::new(self.d_ff, self.d_model).init(device),
            norm1:   LayerNormConfig::new(self.d_model).init(device),
            norm2:   LayerNormConfig::new(self.d_model).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }

    fn build_decoder_block<B: Backend>(&self, device: &B::Device) -> DecoderBlock<B> {
        let attn = |cfg: &Self| {
            MultiHeadAttentionConfig::new(cfg.d_model, cfg.num_heads)
                .with_dropout(cfg.dropout)
                .init(device)
        };
        DecoderBlock {
            self_attn:  attn(self),
            cross_attn: attn(self),
            ffn_linear1: LinearConfig::new(self.d_model, self.d_ff).init(device),
            ffn_linear2: LinearConfig::new(self.d_ff, self.d_model).init(device),
            norm1:   LayerNormConfig::new(self.d_model).init(device),
            norm2:   LayerNormConfig::new(self.d_model).init(device),
            norm3:   LayerNormConfig::new(self.d_model).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }

    fn build_head<B: Backend>(&self, device: &B::Device) -> ProjectionHead<B> {
        ProjectionHead {
            linear1: LinearConfig::new(self.d_model, self.vocab_size).init(device),
            linear2: LinearConfig::new(self.vocab_size, self.vocab_size).init(device),
            linear3: LinearConfig::new(self.vocab_size, self.vocab_size).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_output = self
            .self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_pad(pad_mask))
            .context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self
            .ffn_linear2
            .forward(gelu(self.ffn_linear1.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub cross_attn:  MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub norm3:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn forward(
        &self,
        x:          Tensor<B, 3>,
        memory:     Tensor<B, 3>,
        tgt_mask:   Tensor<B, 3, Bool>,
        memory_pad: Tensor<B, 2, Bool>,
    ) -> Tensor<B, 3> {
        let self_out = self
            .self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_attn(tgt_mask))
            .context;
        let x = self.norm1.forward(x + self.dropout.forward(self_out));

        let cross_out = self
            .cross_attn
            .forward(MhaInput::new(x.clone(), memory.clone(), memory).mask_pad(memory_pad))
            .context;
        let x = self.norm2.forward(x + self.dropout.forward(cross_out));

        let ffn_out = self
            .ffn_linear2
            .forward(gelu(self.ffn_linear1.forward(x.clone())));
        self.norm3.forward(x + self.dropout.forward(ffn_out))
    }
}

/// Feed-forward stack projecting decoder state to the vocabulary.
#[derive(Module, Debug)]
pub struct ProjectionHead<B: Backend> {
    pub linear1: Linear<B>,
    pub linear2: Linear<B>,
    pub linear3: Linear<B>,
}

impl<B: Backend> ProjectionHead<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = gelu(self.linear1.forward(x));
        let x = gelu(self.linear2.forward(x));
        self.linear3.forward(x)
    }
}

#[derive(Module, Debug)]
pub struct MultitaskTransformer<B: Backend> {
    pub embedding:           Embedding<B>,
    pub positional_encoding: PositionalEncoding<B>,
    pub encoder_layers:      Vec<EncoderBlock<B>>,
    pub decoder_layers:      Vec<DecoderBlock<B>>,
    pub decoder_norm:        LayerNorm<B>,
    pub head:                ProjectionHead<B>,
    pub dropout:             Dropout,
    pub pad_idx:             usize,
}

impl<B: Backend> MultitaskTransformer<B> {
    /// molecule: [batch, mol_len], teach_forcing: [batch, pair_len]
    /// → logits over the full vocabulary: [batch, pair_len, vocab]
    pub fn forward(
        &self,
        molecule:      Tensor<B, 2, Int>,
        teach_forcing: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [batch_size, _mol_len] = molecule.dims();
        let [_, pair_len] = teach_forcing.dims();
        let device = molecule.device();

        // Key-padding mask over PAD positions; molecule context is
        // fully bidirectional, so no causal restriction here.
        let pad_mask = molecule.clone().equal_elem(self.pad_idx as i32);

        let mut enc = self
            .dropout
            .forward(self.positional_encoding.forward(self.embedding.forward(molecule)));
        for layer in &self.encoder_layers {
            enc = layer.forward(enc, pad_mask.clone());
        }

        let tgt_mask = masking::to_attn_bool(
            masking::paired_causal_mask::<B>(pair_len, &device),
            batch_size,
        );

        let mut dec = self
            .dropout
            .forward(self.positional_encoding.forward(self.embedding.forward(teach_forcing)));
        for layer in &self.decoder_layers {
            dec = layer.forward(dec, enc.clone(), tgt_mask.clone(), pad_mask.clone());
        }
        let dec = self.decoder_norm.forward(dec);

        self.head.forward(dec)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::activation::softmax;

    use crate::data::tokenizer::{PropValTokenizer, PAD_IDX, SEP_IDX, START_IDX};

    type B = burn::backend::NdArray;

    fn test_tokenizer() -> PropValTokenizer {
        // 4 specials + 20 symbols puts the property block at 24..44
        // and the two value tokens at 44, 45 (vocab size 46).
        let alphabet: Vec<String> = (0..20).map(|i| format!("[S{i}]")).collect();
        PropValTokenizer::new(alphabet, 20, 2)
    }

    fn tiny_model(vocab_size: usize) -> MultitaskTransformer<B> {
        let device = Default::default();
        MultitaskTransformerConfig::new(vocab_size, 16, 16, 2, 1, 32, 0.0, PAD_IDX).init(&device)
    }

    #[test]
    fn test_prior_prediction_scenario() {
        // Molecule [5, 9, 12, 0, 0] with PAD=0, property token 37,
        // empty known-fact set: decoder input [START, SEP, 37].
        let tokenizer = test_tokenizer();
        let model = tiny_model(tokenizer.vocab_size());
        let device = Default::default();

        let molecule = Tensor::<B, 1, Int>::from_ints([5, 9, 12, 0, 0].as_slice(), &device)
            .reshape([1, 5]);
        let teach = Tensor::<B, 1, Int>::from_ints(
            [START_IDX as i32, SEP_IDX as i32, 37].as_slice(),
            &device,
        )
        .reshape([1, 3]);

        let logits = model.forward(molecule, teach);
        let [_, seq, vocab] = logits.dims();
        assert_eq!(seq, 3);
        assert_eq!(vocab, 46);

        // Restrict the final-position logits to the closed value set
        // and softmax: the probability mass must sum to 1.
        let value_idx: Vec<i32> = tokenizer.value_indexes().values().map(|&v| v as i32).collect();
        let last = logits.slice([0..1, 2..3, 0..vocab]).reshape([vocab]);
        let restricted = last.select(
            0,
            Tensor::<B, 1, Int>::from_ints(value_idx.as_slice(), &device),
        );
        let probs: Vec<f32> = softmax(restricted, 0).into_data().to_vec().unwrap();
        assert_eq!(probs.len(), 2);
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-5, "probabilities sum to {total}");
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_forward_is_deterministic_without_dropout() {
        let tokenizer = test_tokenizer();
        let model = tiny_model(tokenizer.vocab_size());
        let device = Default::default();

        let molecule = Tensor::<B, 1, Int>::from_ints([5, 9, 12, 0, 0].as_slice(), &device)
            .reshape([1, 5]);
        let teach =
            Tensor::<B, 1, Int>::from_ints([1, 2, 37].as_slice(), &device).reshape([1, 3]);

        let a: Vec<f32> = model
            .forward(molecule.clone(), teach.clone())
            .into_data()
            .to_vec()
            .unwrap();
        let b: Vec<f32> = model.forward(molecule, teach).into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }
}
