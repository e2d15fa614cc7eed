// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Typed errors shared across the data, ml, infra, and
// application layers.
//
// How each class is handled:
//   - Conversion/Vocabulary errors on one training molecule skip
//     that molecule with a logged warning; at serving time they
//     surface to the caller as a typed failure, never a default
//     prediction.
//   - Shape errors are programming-contract violations and are
//     treated as fatal.
//   - Cache conflicts only occur when the idempotent insert could
//     not resolve a duplicate write.

use thiserror::Error;

/// A molecule string could not be canonicalized or tokenized.
#[derive(Debug, Clone, Error)]
pub enum ConversionError {
    #[error("no canonical SMILES known for inchi '{0}'")]
    UnknownInchi(String),

    #[error("no SELFIES encoding known for smiles '{0}'")]
    UnknownSmiles(String),

    #[error("malformed SELFIES string '{string}' at byte {position}")]
    MalformedSelfies { string: String, position: usize },

    #[error("SELFIES symbol '{0}' is not in the vocabulary")]
    UnknownSymbol(String),

    #[error("molecule lookup failed: {0}")]
    Lookup(String),
}

/// A token id fell outside its declared vocabulary range.
#[derive(Debug, Clone, Error)]
pub enum VocabularyError {
    #[error("token {token} outside vocabulary of size {vocab_size}")]
    OutOfRange { token: usize, vocab_size: usize },

    #[error("token {token} is not a property token (property block is {start}..{end})")]
    NotAProperty { token: usize, start: usize, end: usize },

    #[error("value id {0} has no vocabulary slot")]
    UnknownValueId(usize),
}

/// A fixed-length sequence invariant was violated. Fatal: these
/// indicate a broken caller contract, not bad input data.
#[derive(Debug, Clone, Error)]
pub enum ShapeError {
    #[error("fact sequence holds {len} tokens, expected whole (property, value) pairs")]
    OddFactSequence { len: usize },

    #[error("expected sequence of length {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Failures of the durable prediction cache.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("prediction cache storage failure: {0}")]
    Storage(String),

    #[error("cache row for ({inchi}, {property_token}) was not resolved by the idempotent insert")]
    Conflict { inchi: String, property_token: usize },
}

/// Training-loop level failures.
#[derive(Debug, Clone, Error)]
pub enum TrainingError {
    #[error("training interrupted by shutdown request during epoch {epoch}")]
    Interrupted { epoch: usize },
}

/// Everything the prediction service can report to a caller.
#[derive(Debug, Clone, Error)]
pub enum PredictError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Vocabulary(#[from] VocabularyError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("property store query failed: {0}")]
    Store(String),
}
