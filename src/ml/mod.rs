// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn framework specific code lives here. No other layer
// imports from burn directly except the data pipeline's
// Dataset/Batcher impls.
//
// What's in this layer:
//
//   masking.rs   — causal, paired-causal, and joint block
//                  attention masks as pure functions
//
//   model.rs     — the multitask encoder-decoder transformer:
//                  shared embedding, sinusoidal positions,
//                  bidirectional molecule encoder, paired-causal
//                  fact decoder, vocabulary projection head
//
//   loss.rs      — label-smoothed cross-entropy ignoring PAD
//
//   schedule.rs  — Noam warmup/decay learning rate keyed to
//                  model width
//
//   trainer.rs   — epoch loop with validation, best-checkpoint
//                  bookkeeping, and cooperative shutdown
//
//   predictor.rs — checkpoint loading and the value-token
//                  restricted forward pass used at serving time

/// Attention mask generation (pure functions)
pub mod masking;

/// Multitask encoder-decoder transformer architecture
pub mod model;

/// Label-smoothed sequence loss
pub mod loss;

/// Noam learning-rate schedule
pub mod schedule;

/// Full training loop
pub mod trainer;

/// Inference engine over a loaded checkpoint
pub mod predictor;
