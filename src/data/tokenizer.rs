// ============================================================
// Layer 4 — Property/Value Tokenizer
// ============================================================
// One closed, integer-indexed vocabulary partitioned into four
// blocks:
//
//   [ specials | SELFIES alphabet | property tokens | value tokens ]
//     0..4       4..4+A             P..P+NP            V..V+NV
//
// The special indices are stable constants shared by the
// tokenizer, the model, and the dataset. Property tokens stored
// in the relational store are GLOBAL vocabulary indices, exactly
// as the ETL step wrote them.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{ConversionError, VocabularyError};
use crate::domain::traits::Persistable;

/// Padding token, also used to right-pad molecule sequences.
pub const PAD_IDX: usize = 0;
/// Decoder start marker fed as the first teacher-forcing token.
pub const START_IDX: usize = 1;
/// Separator framing the start of a fact sequence.
pub const SEP_IDX: usize = 2;
/// End-of-facts marker.
pub const END_IDX: usize = 3;
/// Ids 0..4 are always reserved for the specials above.
pub const NUM_SPECIAL_TOKENS: usize = 4;

/// Serialized form written to tokenizer.json. The in-memory
/// reverse lookup table is rebuilt on load.
#[derive(Debug, Serialize, Deserialize)]
struct TokenizerFile {
    alphabet:       Vec<String>,
    num_properties: usize,
    num_values:     usize,
}

/// Tokenizer over molecule SELFIES symbols plus the closed set of
/// property and value tokens.
#[derive(Debug, Clone)]
pub struct PropValTokenizer {
    /// SELFIES symbol → global vocabulary index
    symbol_to_id: HashMap<String, usize>,

    /// Ordered SELFIES alphabet; index i maps to vocabulary
    /// index NUM_SPECIAL_TOKENS + i
    alphabet: Vec<String>,

    /// Number of property-identifier tokens
    num_properties: usize,

    /// Number of value tokens (2 for binary outcomes)
    num_values: usize,
}

impl PropValTokenizer {
    pub fn new(alphabet: Vec<String>, num_properties: usize, num_values: usize) -> Self {
        let symbol_to_id = alphabet
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), NUM_SPECIAL_TOKENS + i))
            .collect();
        Self { symbol_to_id, alphabet, num_properties, num_values }
    }

    // ─── Vocabulary layout ────────────────────────────────────────────────────

    pub fn vocab_size(&self) -> usize {
        NUM_SPECIAL_TOKENS + self.alphabet.len() + self.num_properties + self.num_values
    }

    /// First vocabulary index of the property block.
    pub fn property_offset(&self) -> usize {
        NUM_SPECIAL_TOKENS + self.alphabet.len()
    }

    /// First vocabulary index of the value block.
    pub fn value_offset(&self) -> usize {
        self.property_offset() + self.num_properties
    }

    pub fn is_property_token(&self, token: usize) -> bool {
        (self.property_offset()..self.value_offset()).contains(&token)
    }

    pub fn is_value_token(&self, token: usize) -> bool {
        (self.value_offset()..self.vocab_size()).contains(&token)
    }

    /// Fail unless `token` lies inside the property block.
    pub fn validate_property_token(&self, token: usize) -> Result<(), VocabularyError> {
        if self.is_property_token(token) {
            Ok(())
        } else {
            Err(VocabularyError::NotAProperty {
                token,
                start: self.property_offset(),
                end:   self.value_offset(),
            })
        }
    }

    /// Ordered mapping from value-token id (0, 1, ..) to its
    /// vocabulary index. BTreeMap keeps the iteration order stable,
    /// which the prediction head relies on when it restricts logits
    /// to this set.
    pub fn value_indexes(&self) -> BTreeMap<usize, usize> {
        (0..self.num_values).map(|bit| (bit, self.value_offset() + bit)).collect()
    }

    /// Vocabulary index of one value-token id (e.g. bit 1 = "positive").
    pub fn value_id_to_token_idx(&self, bit: usize) -> Result<usize, VocabularyError> {
        if bit < self.num_values {
            Ok(self.value_offset() + bit)
        } else {
            Err(VocabularyError::UnknownValueId(bit))
        }
    }

    // ─── Encoding / decoding ──────────────────────────────────────────────────

    /// Tokenize a SELFIES string into vocabulary indices.
    pub fn encode(&self, selfies: &str) -> Result<Vec<usize>, ConversionError> {
        let mut ids = Vec::new();
        for symbol in split_selfies(selfies)? {
            match self.symbol_to_id.get(symbol) {
                Some(&id) => ids.push(id),
                None => return Err(ConversionError::UnknownSymbol(symbol.to_string())),
            }
        }
        Ok(ids)
    }

    /// Tokenize and right-pad with PAD to exactly `max_len` tokens.
    /// Molecules longer than `max_len` are truncated.
    pub fn encode_padded(&self, selfies: &str, max_len: usize) -> Result<Vec<i32>, ConversionError> {
        let mut ids: Vec<i32> = self.encode(selfies)?.iter().map(|&x| x as i32).collect();
        ids.truncate(max_len);
        while ids.len() < max_len {
            ids.push(PAD_IDX as i32);
        }
        Ok(ids)
    }

    /// Render token indices back to a readable string, mainly for
    /// logging and debugging.
    pub fn decode(&self, tokens: &[usize]) -> String {
        tokens
            .iter()
            .map(|&t| match t {
                PAD_IDX   => "<pad>".to_string(),
                START_IDX => "<start>".to_string(),
                SEP_IDX   => "<sep>".to_string(),
                END_IDX   => "<end>".to_string(),
                t if t < self.property_offset() => {
                    self.alphabet[t - NUM_SPECIAL_TOKENS].clone()
                }
                t if t < self.value_offset() => format!("<prop:{t}>"),
                t if t < self.vocab_size()   => format!("<val:{}>", t - self.value_offset()),
                t => format!("<invalid:{t}>"),
            })
            .collect()
    }
}

// ─── Persistence ──────────────────────────────────────────────────────────────
// The tokenizer is saved inside the checkpoint directory so that a
// checkpoint is loadable as one unit: weights + the vocabulary
// needed to interpret them.
impl Persistable for PropValTokenizer {
    fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create tokenizer dir '{}'", dir.display()))?;
        let file = TokenizerFile {
            alphabet:       self.alphabet.clone(),
            num_properties: self.num_properties,
            num_values:     self.num_values,
        };
        let path = dir.join("tokenizer.json");
        fs::write(&path, serde_json::to_string_pretty(&file)?)
            .with_context(|| format!("cannot write '{}'", path.display()))?;
        tracing::debug!("Saved tokenizer ({} symbols) to '{}'", self.alphabet.len(), path.display());
        Ok(())
    }

    fn load(dir: &Path) -> Result<Self> {
        let path = dir.join("tokenizer.json");
        let json = fs::read_to_string(&path)
            .with_context(|| format!("cannot read tokenizer from '{}'", path.display()))?;
        let file: TokenizerFile = serde_json::from_str(&json)?;
        Ok(Self::new(file.alphabet, file.num_properties, file.num_values))
    }
}

/// Split a SELFIES string into its bracketed symbols.
/// `[C][=C][Branch1]` → ["[C]", "[=C]", "[Branch1]"].
/// Anything outside brackets is malformed input.
pub fn split_selfies(selfies: &str) -> Result<Vec<&str>, ConversionError> {
    let bytes = selfies.as_bytes();
    let mut symbols = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'[' {
            return Err(ConversionError::MalformedSelfies {
                string:   selfies.to_string(),
                position: i,
            });
        }
        let close = bytes[i..]
            .iter()
            .position(|&b| b == b']')
            .ok_or_else(|| ConversionError::MalformedSelfies {
                string:   selfies.to_string(),
                position: i,
            })?;
        symbols.push(&selfies[i..i + close + 1]);
        i += close + 1;
    }
    Ok(symbols)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_tokenizer() -> PropValTokenizer {
        let alphabet = vec!["[C]".to_string(), "[N]".to_string(), "[=C]".to_string()];
        PropValTokenizer::new(alphabet, 10, 2)
    }

    #[test]
    fn test_vocab_layout() {
        let tok = tiny_tokenizer();
        // 4 specials + 3 symbols + 10 properties + 2 values
        assert_eq!(tok.vocab_size(), 19);
        assert_eq!(tok.property_offset(), 7);
        assert_eq!(tok.value_offset(), 17);
        assert!(tok.is_property_token(7));
        assert!(tok.is_property_token(16));
        assert!(!tok.is_property_token(17));
        assert!(tok.is_value_token(18));
    }

    #[test]
    fn test_value_indexes_ordered() {
        let tok = tiny_tokenizer();
        let idx: Vec<(usize, usize)> = tok.value_indexes().into_iter().collect();
        assert_eq!(idx, vec![(0, 17), (1, 18)]);
        assert_eq!(tok.value_id_to_token_idx(1).unwrap(), 18);
        assert!(tok.value_id_to_token_idx(2).is_err());
    }

    #[test]
    fn test_encode_roundtrip() {
        let tok = tiny_tokenizer();
        let ids = tok.encode("[C][=C][N]").unwrap();
        assert_eq!(ids, vec![4, 6, 5]);
        assert_eq!(tok.decode(&ids), "[C][=C][N]");
    }

    #[test]
    fn test_encode_padded_fixed_width() {
        let tok = tiny_tokenizer();
        let ids = tok.encode_padded("[C][N]", 5).unwrap();
        assert_eq!(ids, vec![4, 5, 0, 0, 0]);
    }

    #[test]
    fn test_unknown_symbol_is_typed_error() {
        let tok = tiny_tokenizer();
        assert!(matches!(
            tok.encode("[C][Xx]"),
            Err(ConversionError::UnknownSymbol(_))
        ));
    }

    #[test]
    fn test_malformed_selfies() {
        assert!(matches!(
            split_selfies("C[N]"),
            Err(ConversionError::MalformedSelfies { position: 0, .. })
        ));
        assert!(split_selfies("[C][N").is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tok = tiny_tokenizer();
        let dir = std::env::temp_dir().join(format!("moltask-tok-{}", std::process::id()));
        tok.save(&dir).unwrap();
        let loaded = PropValTokenizer::load(&dir).unwrap();
        assert_eq!(loaded.vocab_size(), tok.vocab_size());
        assert_eq!(loaded.encode("[C][N]").unwrap(), tok.encode("[C][N]").unwrap());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_validate_property_token() {
        let tok = tiny_tokenizer();
        assert!(tok.validate_property_token(8).is_ok());
        assert!(matches!(
            tok.validate_property_token(2),
            Err(VocabularyError::NotAProperty { .. })
        ));
    }
}
