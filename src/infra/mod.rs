// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by multiple layers:
//
//   checkpoint.rs       — one checkpoint identity: model weights
//                         (CompactRecorder), architecture config,
//                         and the tokenizer, loaded as a unit
//
//   tokenizer_store.rs  — builds a tokenizer from the property
//                         store corpus or loads a saved one
//
//   prediction_cache.rs — durable (inchi, property_token) → value
//                         cache with a uniqueness constraint and
//                         idempotent inserts
//
//   metrics.rs          — epoch metrics CSV logger
//
//   shutdown.rs         — cooperative cancellation token for the
//                         training loop

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer construction and persistence
pub mod tokenizer_store;

/// Durable prediction cache
pub mod prediction_cache;

/// Training metrics CSV logger
pub mod metrics;

/// Cancellation token observed at batch/epoch boundaries
pub mod shutdown;
