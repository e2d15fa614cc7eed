// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands: `train`, `predict`, and `serve`, with all
// their configurable flags. clap's derive macros generate help
// text, error messages, and type conversion.

use clap::{Args, Subcommand};

use crate::application::predict_use_case::PredictOptions;
use crate::application::train_use_case::TrainConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the multitask property model on the property store
    Train(TrainArgs),

    /// Predict one (molecule, property) probability from a checkpoint
    Predict(PredictArgs),

    /// Serve predictions over HTTP
    Serve(ServeArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// SQLite property store produced by the ETL step
    #[arg(long, default_value = "data/moltask.sqlite")]
    pub db_path: String,

    /// Directory for model checkpoints, config, and tokenizer
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Maximum molecule token sequence length (PAD-padded)
    #[arg(long, default_value_t = 120)]
    pub max_mol_len: usize,

    /// Number of (property, value) pairs per training target;
    /// targets are always 2 * n_features + 2 tokens wide
    #[arg(long, default_value_t = 5)]
    pub n_features: usize,

    /// Samples processed together in one forward pass
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Warmup steps of the Noam learning-rate schedule
    #[arg(long, default_value_t = 4000)]
    pub warmup_steps: usize,

    /// Lower clamp on the learning rate
    #[arg(long, default_value_t = 1e-6)]
    pub min_lr: f64,

    /// Upper clamp on the learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub max_lr: f64,

    /// Hidden dimension of the transformer
    #[arg(long, default_value_t = 512)]
    pub d_model: usize,

    /// Number of attention heads; d_model must divide evenly
    #[arg(long, default_value_t = 4)]
    pub num_heads: usize,

    /// Number of stacked encoder and decoder layers
    #[arg(long, default_value_t = 4)]
    pub num_layers: usize,

    /// Inner dimension of the feed-forward networks
    #[arg(long, default_value_t = 512)]
    pub d_ff: usize,

    /// Dropout probability during training
    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Label smoothing mass redistributed over non-true classes
    #[arg(long, default_value_t = 0.1)]
    pub label_smoothing: f32,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            db_path:         a.db_path,
            checkpoint_dir:  a.checkpoint_dir,
            max_mol_len:     a.max_mol_len,
            n_features:      a.n_features,
            batch_size:      a.batch_size,
            epochs:          a.epochs,
            warmup_steps:    a.warmup_steps,
            min_lr:          a.min_lr,
            max_lr:          a.max_lr,
            d_model:         a.d_model,
            num_heads:       a.num_heads,
            num_layers:      a.num_layers,
            d_ff:            a.d_ff,
            dropout:         a.dropout,
            label_smoothing: a.label_smoothing,
        }
    }
}

/// Arguments shared by every inference path.
#[derive(Args, Debug)]
pub struct InferArgs {
    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// SQLite property store (known facts + molecule encodings)
    #[arg(long, default_value = "data/moltask.sqlite")]
    pub db_path: String,

    /// SQLite file holding the durable prediction cache
    #[arg(long, default_value = "predictions.sqlite")]
    pub cache_path: String,

    /// RNG seed for reproducible randomized-context draws
    #[arg(long, default_value_t = 137)]
    pub seed: u64,

    /// Stochastic passes to average when context_pairs > 0
    #[arg(long, default_value_t = 1)]
    pub rand_draws: usize,

    /// Known facts fed to the decoder per draw; 0 = prior query only
    #[arg(long, default_value_t = 0)]
    pub context_pairs: usize,
}

impl From<&InferArgs> for PredictOptions {
    fn from(a: &InferArgs) -> Self {
        PredictOptions {
            seed:          a.seed,
            rand_draws:    a.rand_draws,
            context_pairs: a.context_pairs,
        }
    }
}

/// All arguments for the `predict` command.
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Molecule identity as an InChI string
    #[arg(long)]
    pub inchi: String,

    /// Property token to predict (a global vocabulary index)
    #[arg(long)]
    pub property_token: usize,

    #[command(flatten)]
    pub infer: InferArgs,
}

/// All arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the HTTP listener on
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: String,

    #[command(flatten)]
    pub infer: InferArgs,
}
