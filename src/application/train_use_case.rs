// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Open the property store        (Layer 4 - data)
//   Step 2: Load or build the tokenizer    (Layer 6 - infra)
//   Step 3: Prepare per-molecule records   (Layer 4 - data)
//   Step 4: Split train/validation         (Layer 4 - data)
//   Step 5: Build datasets                 (Layer 4 - data)
//   Step 6: Save config + tokenizer        (Layer 6 - infra)
//   Step 7: Run training loop              (Layer 5 - ml)
//
// A molecule that fails tokenization, or a fact whose tokens fall
// outside their vocabulary blocks, is skipped with a warning;
// a single bad row must not abort the run.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::SequenceShiftDataset,
    property_store::PropertyStore,
    splitter::split_train_val,
    tokenizer::{PropValTokenizer, END_IDX, SEP_IDX},
};
use crate::domain::fact::MoleculeFacts;
use crate::infra::{checkpoint::CheckpointManager, shutdown::ShutdownToken, tokenizer_store::TokenizerStore};
use crate::ml::trainer::run_training;

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a run. Serialized to train_config.json
// in the checkpoint dir so inference can rebuild the architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub db_path:         String,
    pub checkpoint_dir:  String,
    pub max_mol_len:     usize,
    pub n_features:      usize,
    pub batch_size:      usize,
    pub epochs:          usize,
    pub warmup_steps:    usize,
    pub min_lr:          f64,
    pub max_lr:          f64,
    pub d_model:         usize,
    pub num_heads:       usize,
    pub num_layers:      usize,
    pub d_ff:            usize,
    pub dropout:         f64,
    pub label_smoothing: f32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            db_path:         "data/moltask.sqlite".to_string(),
            checkpoint_dir:  "checkpoints".to_string(),
            max_mol_len:     120,
            n_features:      5,
            batch_size:      32,
            epochs:          10,
            warmup_steps:    4000,
            min_lr:          1e-6,
            max_lr:          1e-3,
            d_model:         512,
            num_heads:       4,
            num_layers:      4,
            d_ff:            512,
            dropout:         0.1,
            label_smoothing: 0.1,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end. The shutdown
    /// token is observed by the loop at batch/epoch boundaries.
    pub fn execute(&self, shutdown: ShutdownToken) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Open the property store ───────────────────────────────────
        tracing::info!("Opening property store '{}'", cfg.db_path);
        let store = PropertyStore::open(&cfg.db_path)?;

        // ── Step 2: Load or build the tokenizer ───────────────────────────────
        let tokenizer = TokenizerStore::new(&cfg.checkpoint_dir).load_or_build(&store)?;

        // ── Step 3: Prepare per-molecule records ──────────────────────────────
        let records = prepare_records(&store, &tokenizer, cfg)?;
        tracing::info!("Prepared {} training molecules", records.len());

        // ── Step 4: Train / validation split (80/20) ──────────────────────────
        let (train_records, val_records) = split_train_val(records, 0.8);
        tracing::info!(
            "Split: {} train, {} validation",
            train_records.len(),
            val_records.len()
        );

        // ── Step 5: Build datasets ────────────────────────────────────────────
        let train_dataset = SequenceShiftDataset::new(train_records, cfg.n_features);
        let val_dataset   = SequenceShiftDataset::new(val_records, cfg.n_features);

        // ── Step 6: Save config + tokenizer for inference ─────────────────────
        // Written before the loop so an interrupted run still leaves
        // a loadable checkpoint identity behind.
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir);
        ckpt_manager.save_config(cfg)?;
        ckpt_manager.save_tokenizer(&tokenizer)?;

        // ── Step 7: Run training loop ─────────────────────────────────────────
        run_training(
            cfg,
            tokenizer.vocab_size(),
            train_dataset,
            val_dataset,
            ckpt_manager,
            shutdown,
        )?;

        Ok(())
    }
}

/// Tokenize every stored molecule and frame its fact sequence.
/// Bad rows are skipped with a warning, never fatal.
fn prepare_records(
    store:     &PropertyStore,
    tokenizer: &PropValTokenizer,
    cfg:       &TrainConfig,
) -> Result<Vec<MoleculeFacts>> {
    let mut records = Vec::new();
    let mut skipped_molecules = 0usize;
    let mut skipped_facts = 0usize;

    for row in store.training_rows()? {
        let molecule_tokens = match tokenizer.encode_padded(&row.selfies, cfg.max_mol_len) {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!("Skipping molecule '{}': {e}", row.inchi);
                skipped_molecules += 1;
                continue;
            }
        };

        let mut fact_tokens: Vec<i32> = vec![SEP_IDX as i32];
        for &(prop, val) in &row.facts {
            let (prop, val) = (prop as usize, val as usize);
            if !tokenizer.is_property_token(prop) || !tokenizer.is_value_token(val) {
                tracing::warn!(
                    "Skipping fact ({prop}, {val}) of '{}': token outside vocabulary block",
                    row.inchi
                );
                skipped_facts += 1;
                continue;
            }
            fact_tokens.push(prop as i32);
            fact_tokens.push(val as i32);
        }
        fact_tokens.push(END_IDX as i32);

        records.push(MoleculeFacts::new(row.inchi, molecule_tokens, fact_tokens));
    }

    if skipped_molecules + skipped_facts > 0 {
        tracing::warn!(
            "Skipped {skipped_molecules} molecules and {skipped_facts} facts during preparation"
        );
    }
    Ok(records)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::property_store::testing::seeded_store;

    #[test]
    fn test_prepare_records_frames_facts() {
        // Alphabet {[C]} puts properties at 5.., values sized by the
        // tokenizer below.
        let store = seeded_store("InChI=1S/CH4/h1H4", "C", "[C]", &[(6, 11), (7, 12)]);
        let tokenizer = PropValTokenizer::new(vec!["[C]".to_string()], 6, 2);
        assert_eq!(tokenizer.value_offset(), 11);

        let cfg = TrainConfig { max_mol_len: 4, ..TrainConfig::default() };
        let records = prepare_records(&store, &tokenizer, &cfg).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].molecule_tokens, vec![4, 0, 0, 0]);
        assert_eq!(records[0].fact_tokens, vec![2, 6, 11, 7, 12, 3]);
        assert_eq!(records[0].fact_count(), 2);
    }

    #[test]
    fn test_out_of_range_fact_is_skipped_not_fatal() {
        let store = seeded_store("InChI=1S/CH4/h1H4", "C", "[C]", &[(6, 11), (99, 1)]);
        let tokenizer = PropValTokenizer::new(vec!["[C]".to_string()], 6, 2);
        let cfg = TrainConfig { max_mol_len: 4, ..TrainConfig::default() };
        let records = prepare_records(&store, &tokenizer, &cfg).unwrap();
        assert_eq!(records[0].fact_count(), 1);
    }
}
