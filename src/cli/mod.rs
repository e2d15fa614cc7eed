// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. All business logic is
// delegated to Layer 2 (application); this layer only routes,
// wires shutdown signals, and prints results.

pub mod commands;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, InferArgs, PredictArgs, ServeArgs, TrainArgs};

use crate::application::predict_use_case::PredictService;
use crate::application::serve_use_case::run_server;
use crate::application::train_use_case::TrainUseCase;
use crate::data::property_store::PropertyStore;
use crate::domain::errors::TrainingError;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::prediction_cache::PredictionCache;
use crate::infra::shutdown::ShutdownToken;
use crate::ml::predictor::Predictor;

#[derive(Parser, Debug)]
#[command(
    name = "moltask",
    version = "0.1.0",
    about = "Train a multitask molecular property transformer, then predict or serve."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => Self::run_train(args),
            Commands::Predict(args) => Self::run_predict(args),
            Commands::Serve(args)   => Self::run_serve(args),
        }
    }

    /// Handles the `train` subcommand. Ctrl-C requests a
    /// cooperative stop; the loop finishes its current step and
    /// keeps the best checkpoint saved so far.
    fn run_train(args: TrainArgs) -> Result<()> {
        tracing::info!("Starting training against '{}'", args.db_path);

        let shutdown = ShutdownToken::new();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let signal_token = shutdown.clone();
        let _signal_task = runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl-C received, requesting graceful stop");
                signal_token.request_stop();
            }
        });

        let use_case = TrainUseCase::new(args.into());
        match use_case.execute(shutdown) {
            Ok(()) => {
                println!("Training complete. Checkpoint saved.");
                Ok(())
            }
            Err(e) => match e.downcast_ref::<TrainingError>() {
                Some(TrainingError::Interrupted { epoch }) => {
                    println!(
                        "Training interrupted during epoch {epoch}; \
                         the best checkpoint so far is preserved."
                    );
                    Ok(())
                }
                None => Err(e),
            },
        }
    }

    /// Handles the `predict` subcommand: one query through the
    /// same cached service the HTTP endpoint uses.
    fn run_predict(args: PredictArgs) -> Result<()> {
        let service = build_service(&args.infer)?;
        let value = service.predict(&args.inchi, args.property_token)?;
        println!("positive_prediction: {value:.6}");
        Ok(())
    }

    /// Handles the `serve` subcommand.
    fn run_serve(args: ServeArgs) -> Result<()> {
        let addr = args
            .addr
            .parse()
            .with_context(|| format!("invalid listen address '{}'", args.addr))?;
        let service = Arc::new(build_service(&args.infer)?);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(run_server(addr, service))
    }
}

fn build_service(args: &InferArgs) -> Result<PredictService> {
    let ckpt_manager = CheckpointManager::new(&args.checkpoint_dir);
    let predictor = Predictor::from_checkpoint(&ckpt_manager)?;
    let store = PropertyStore::open(&args.db_path)?;
    let cache = PredictionCache::open(&args.cache_path)?;
    Ok(PredictService::new(predictor, store, cache, args.into()))
}
