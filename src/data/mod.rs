// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the relational property store all the way to
// GPU-ready tensor batches.
//
// The pipeline flows in this order:
//
//   SQLite property store
//       │
//       ▼
//   PropValTokenizer      → SELFIES strings to token indices
//       │
//       ▼
//   SequenceShiftDataset  → one randomly-augmented training
//       │                   triple per sample
//       ▼
//   PropValBatcher        → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader            → feeds batches to the training loop
//
// Each module is responsible for exactly one step.

/// Closed-vocabulary SELFIES + property/value tokenizer
pub mod tokenizer;

/// Implements Burn's Dataset trait; builds the shifted triples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;

/// Read-only SQLite store of known facts and molecule encodings
pub mod property_store;
