// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Full train + validation loop using Burn's DataLoader and Adam,
// with the Noam schedule driving the per-step learning rate.
//
// Backend split:
//   - Training uses Autodiff<NdArray> for gradients
//   - model.valid() returns the model on the inner backend,
//     with dropout disabled for deterministic evaluation
//
// Cooperative shutdown: the ShutdownToken is observed after each
// completed batch and at every epoch boundary. The in-flight step
// always finishes, metrics already decided for the step are
// flushed, and the loop returns TrainingError::Interrupted.
//
// Reference: Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::PropBatcher, dataset::SequenceShiftDataset, tokenizer::PAD_IDX};
use crate::domain::errors::TrainingError;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::infra::shutdown::ShutdownToken;
use crate::ml::loss::SequenceLoss;
use crate::ml::model::{MultitaskTransformer, MultitaskTransformerConfig};
use crate::ml::schedule::NoamSchedule;

type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;
type ValidBackend = burn::backend::NdArray;

pub fn run_training(
    cfg:           &TrainConfig,
    vocab_size:    usize,
    train_dataset: SequenceShiftDataset,
    val_dataset:   SequenceShiftDataset,
    ckpt_manager:  CheckpointManager,
    shutdown:      ShutdownToken,
) -> Result<()> {
    let device = burn::backend::ndarray::NdArrayDevice::default();

    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = MultitaskTransformerConfig::new(
        vocab_size, cfg.max_mol_len, cfg.d_model,
        cfg.num_heads, cfg.num_layers, cfg.d_ff, cfg.dropout, PAD_IDX,
    );
    let mut model: MultitaskTransformer<TrainBackend> = model_cfg.init(&device);
    tracing::info!(
        "Model ready: {} layers, d_model={}, vocab={}",
        cfg.num_layers, cfg.d_model, vocab_size
    );

    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();
    let mut schedule = NoamSchedule::new(cfg.d_model, cfg.warmup_steps, cfg.min_lr, cfg.max_lr);
    let loss_fn = SequenceLoss::new(PAD_IDX, cfg.label_smoothing);
    let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_batcher = PropBatcher::<TrainBackend>::new(device.clone());
    let train_loader  = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(42)
        .num_workers(1)
        .build(train_dataset);

    let val_batcher = PropBatcher::<ValidBackend>::new(device.clone());
    let val_loader  = DataLoaderBuilder::new(val_batcher)
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(val_dataset);

    let mut best_val_loss = f64::INFINITY;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        if shutdown.is_stop_requested() {
            tracing::warn!("Shutdown requested at epoch boundary, stopping before epoch {epoch}");
            return Err(TrainingError::Interrupted { epoch }.into());
        }

        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;
        let mut lr = 0.0f64;
        let mut interrupted = false;

        for batch in train_loader.iter() {
            let logits = model.forward(batch.molecules, batch.decoder_inputs);
            let loss = loss_fn.forward(logits, batch.targets);

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            train_loss_sum += loss_val;
            train_batches  += 1;

            lr = schedule.next_lr();
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);

            // The current step is complete; safe to stop here.
            if shutdown.is_stop_requested() {
                interrupted = true;
                break;
            }
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::INFINITY };

        if interrupted {
            // Flush what was already decided for this step, then stop.
            metrics.log(&EpochMetrics::new(epoch, avg_train_loss, f64::INFINITY, lr))?;
            tracing::warn!(
                "Shutdown requested; stopped after {} completed batches of epoch {}",
                train_batches, epoch
            );
            return Err(TrainingError::Interrupted { epoch }.into());
        }

        // ── Validation phase (dropout disabled) ───────────────────────────────
        let model_valid = model.valid();
        let mut val_loss_sum = 0.0f64;
        let mut val_batches  = 0usize;

        for batch in val_loader.iter() {
            let logits = model_valid.forward(batch.molecules, batch.decoder_inputs);
            let batch_loss: f64 = loss_fn
                .forward(logits, batch.targets)
                .into_scalar()
                .elem::<f64>();
            val_loss_sum += batch_loss;
            val_batches  += 1;
        }

        let avg_val_loss = if val_batches > 0 {
            val_loss_sum / val_batches as f64
        } else { f64::INFINITY };

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | lr={:.2e}",
            epoch, cfg.epochs, avg_train_loss, avg_val_loss, lr,
        );
        metrics.log(&EpochMetrics::new(epoch, avg_train_loss, avg_val_loss, lr))?;

        // ── Best-checkpoint bookkeeping ───────────────────────────────────────
        // Only an improving epoch overwrites the saved model; the
        // latest-epoch pointer always names the best epoch so far.
        if avg_val_loss < best_val_loss {
            best_val_loss = avg_val_loss;
            ckpt_manager.save_model(&model, epoch)?;
            tracing::info!("Checkpoint saved for epoch {} (val_loss={:.4})", epoch, avg_val_loss);
        }
    }

    tracing::info!("Training complete");
    Ok(())
}
