// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Builds the closed vocabulary from the property store corpus,
// or loads a previously saved tokenizer so that training and
// inference agree on the exact same layout.
//
// Build rules:
//   - SELFIES alphabet: every distinct symbol across the corpus,
//     sorted for a deterministic layout
//   - property block: sized to cover the property tokens the ETL
//     wrote into the store (they are global vocabulary indices,
//     so the block must span up to the largest one)
//   - value block: binary outcomes

use std::collections::BTreeSet;

use anyhow::{bail, Result};

use crate::data::property_store::PropertyStore;
use crate::data::tokenizer::{split_selfies, PropValTokenizer, NUM_SPECIAL_TOKENS};
use crate::domain::traits::{Persistable, PropertySource};

/// Binary value outcomes: 0 = negative, 1 = positive.
const NUM_VALUE_TOKENS: usize = 2;

pub struct TokenizerStore {
    dir: std::path::PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: std::path::PathBuf::from(dir.into()).join("tokenizer") }
    }

    /// Load an existing tokenizer or build one from the store.
    pub fn load_or_build(&self, store: &PropertyStore) -> Result<PropValTokenizer> {
        if self.dir.join("tokenizer.json").exists() {
            tracing::info!("Loading existing tokenizer from '{}'", self.dir.display());
            PropValTokenizer::load(&self.dir)
        } else {
            let tokenizer = build_from_store(store)?;
            tracing::info!(
                "Built tokenizer: vocab_size={}, saving to '{}'",
                tokenizer.vocab_size(),
                self.dir.display()
            );
            tokenizer.save(&self.dir)?;
            Ok(tokenizer)
        }
    }
}

/// Scan the corpus for the SELFIES alphabet and size the property
/// block to cover every property token the store knows about.
pub fn build_from_store(store: &PropertyStore) -> Result<PropValTokenizer> {
    let mut symbols: BTreeSet<String> = BTreeSet::new();
    for row in store.training_rows()? {
        match split_selfies(&row.selfies) {
            Ok(parts) => symbols.extend(parts.into_iter().map(str::to_string)),
            Err(e) => tracing::warn!("Skipping malformed SELFIES for '{}': {e}", row.inchi),
        }
    }

    let alphabet: Vec<String> = symbols.into_iter().collect();
    let property_offset = NUM_SPECIAL_TOKENS + alphabet.len();

    let tokens = store.all_property_tokens()?;
    let max_token = match tokens.iter().max() {
        Some(&max) => max,
        None => bail!("property store holds no property tokens; cannot size the vocabulary"),
    };
    if max_token < property_offset {
        bail!(
            "stored property tokens end at {max_token}, below the property block start \
             {property_offset}; the store was tokenized with a different vocabulary layout"
        );
    }
    let num_properties = max_token + 1 - property_offset;

    Ok(PropValTokenizer::new(alphabet, num_properties, NUM_VALUE_TOKENS))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::property_store::testing::seeded_store;

    #[test]
    fn test_build_covers_stored_property_tokens() {
        // One symbol in the corpus → property block starts at 5;
        // stored tokens 7 and 9 force num_properties = 5.
        let store = seeded_store("InChI=1S/CH4/h1H4", "C", "[C]", &[(7, 10), (9, 11)]);
        let tokenizer = build_from_store(&store).unwrap();
        assert_eq!(tokenizer.property_offset(), 5);
        assert!(tokenizer.is_property_token(7));
        assert!(tokenizer.is_property_token(9));
        assert_eq!(tokenizer.value_offset(), 10);
    }

    #[test]
    fn test_build_rejects_incompatible_layout() {
        // Stored property token below the computed property offset
        // means the store was written with a different vocabulary.
        let store = seeded_store("InChI=1S/CH4/h1H4", "C", "[C]", &[(2, 10)]);
        assert!(build_from_store(&store).is_err());
    }
}
