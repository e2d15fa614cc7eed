// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model state using Burn's CompactRecorder.
// A checkpoint directory is ONE logical identity:
//
//   checkpoints/
//     model_epoch_N.mpk.gz   ← weights of the best epoch so far
//     latest_epoch.json      ← which epoch the pointer names
//     train_config.json      ← architecture + run hyperparameters
//     tokenizer/
//       tokenizer.json       ← vocabulary needed to interpret
//                              the weights
//
// Weights and tokenizer are saved and loaded together; a model
// without its vocabulary is not a usable artifact.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::tokenizer::PropValTokenizer;
use crate::domain::traits::Persistable;
use crate::ml::model::MultitaskTransformer;

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<String>) -> Self {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    /// Save model weights for a given epoch and update the
    /// latest-epoch pointer.
    pub fn save_model<B: AutodiffBackend>(
        &self,
        model: &MultitaskTransformer<B>,
        epoch: usize,
    ) -> Result<()> {
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("failed to save checkpoint to '{}'", path.display()))?;

        let latest_path = self.dir.join("latest_epoch.json");
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| "failed to write latest_epoch.json")?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load weights from the epoch named by the latest pointer into
    /// an architecture-matching model instance.
    pub fn load_model<B: Backend>(
        &self,
        model:  MultitaskTransformer<B>,
        device: &B::Device,
    ) -> Result<MultitaskTransformer<B>> {
        let epoch = self.latest_epoch()?;
        let path  = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display()
                )
            })?;

        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("cannot write config to '{}'", path.display()))?;
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "cannot read config from '{}'. Run 'train' before inference.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save_tokenizer(&self, tokenizer: &PropValTokenizer) -> Result<()> {
        tokenizer.save(&self.dir.join("tokenizer"))
    }

    pub fn load_tokenizer(&self) -> Result<PropValTokenizer> {
        PropValTokenizer::load(&self.dir.join("tokenizer"))
    }

    fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join("latest_epoch.json");
        let s = fs::read_to_string(&path)
            .with_context(|| "cannot find 'latest_epoch.json'. Run 'train' first.")?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tokenizer::{PAD_IDX, SEP_IDX, START_IDX};
    use crate::ml::model::MultitaskTransformerConfig;

    type TrainB = burn::backend::Autodiff<burn::backend::NdArray>;
    type InferB = burn::backend::NdArray;

    fn temp_checkpoint_dir(tag: &str) -> String {
        std::env::temp_dir()
            .join(format!("moltask-ckpt-{tag}-{}", std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_checkpoint_roundtrip_reproduces_logits() {
        let dir = temp_checkpoint_dir("roundtrip");
        let ckpt = CheckpointManager::new(dir.clone());
        let device = Default::default();

        let model_cfg = MultitaskTransformerConfig::new(30, 16, 16, 2, 1, 32, 0.0, PAD_IDX);
        let model: MultitaskTransformer<TrainB> = model_cfg.init(&device);

        let molecule = Tensor::<InferB, 1, Int>::from_ints([5, 9, 12, 0, 0].as_slice(), &device)
            .reshape([1, 5]);
        let teach = Tensor::<InferB, 1, Int>::from_ints(
            [START_IDX as i32, SEP_IDX as i32, 25].as_slice(),
            &device,
        )
        .reshape([1, 3]);

        use burn::module::AutodiffModule;
        let before: Vec<f32> = model
            .valid()
            .forward(molecule.clone(), teach.clone())
            .into_data()
            .to_vec()
            .unwrap();

        ckpt.save_model(&model, 1).unwrap();

        let fresh: MultitaskTransformer<InferB> = model_cfg.init(&device);
        let restored = ckpt.load_model(fresh, &device).unwrap();
        let after: Vec<f32> = restored
            .forward(molecule, teach)
            .into_data()
            .to_vec()
            .unwrap();

        assert_eq!(before, after);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = temp_checkpoint_dir("config");
        let ckpt = CheckpointManager::new(dir.clone());
        let cfg = TrainConfig::default();
        ckpt.save_config(&cfg).unwrap();
        let loaded = ckpt.load_config().unwrap();
        assert_eq!(loaded.d_model, cfg.d_model);
        assert_eq!(loaded.n_features, cfg.n_features);
        std::fs::remove_dir_all(&dir).ok();
    }
}
