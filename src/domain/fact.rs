// ============================================================
// Layer 3 — Fact Domain Types
// ============================================================
// A "fact" is one measured property of a molecule together with
// its outcome token: (property_token, value_token).
//
// A molecule owns a set of such facts. The set is semantically
// unordered, but it is stored as a flat alternating token
// sequence framed by SEP ... END so that the decoder can consume
// it as one teacher-forced sequence.

use serde::{Deserialize, Serialize};

/// One known property/value fact for a molecule, as read from the
/// relational property store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyFact {
    /// Vocabulary index identifying WHICH property was measured
    pub property_token: usize,

    /// Vocabulary index of the measured outcome (e.g. inactive/active)
    pub value_token: usize,

    /// Property category label, kept for filtering and traceability
    pub category: String,

    /// Name of the data source the measurement came from
    pub source: String,
}

impl PropertyFact {
    pub fn new(
        property_token: usize,
        value_token:    usize,
        category:       impl Into<String>,
        source:         impl Into<String>,
    ) -> Self {
        Self {
            property_token,
            value_token,
            category: category.into(),
            source:   source.into(),
        }
    }
}

/// One molecule prepared for training: its padded structural token
/// sequence plus the flat framed fact sequence `SEP p1 v1 .. pk vk END`.
///
/// The fact sequence here is the RAW sequence; the random
/// permutation/truncation into a fixed-width training triple happens
/// per sample in the dataset, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoleculeFacts {
    /// InChI identity string, kept for traceability
    pub inchi: String,

    /// SELFIES token indices, right-padded with PAD to the
    /// configured maximum molecule length
    pub molecule_tokens: Vec<i32>,

    /// Flat alternating property/value token sequence framed by
    /// SEP ... END. May be just [SEP, END] for a molecule with no
    /// known facts.
    pub fact_tokens: Vec<i32>,
}

impl MoleculeFacts {
    pub fn new(inchi: impl Into<String>, molecule_tokens: Vec<i32>, fact_tokens: Vec<i32>) -> Self {
        Self { inchi: inchi.into(), molecule_tokens, fact_tokens }
    }

    /// Number of (property, value) pairs inside the framed sequence.
    pub fn fact_count(&self) -> usize {
        self.fact_tokens.len().saturating_sub(2) / 2
    }
}
