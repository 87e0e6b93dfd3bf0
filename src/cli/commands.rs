// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `test`, and their flags.
// Anything else is rejected by clap with a usage error.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;
use crate::domain::checkpoint::CheckpointKind;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the UNet, validating and checkpointing as it goes
    Train(TrainArgs),

    /// Segment one image with a trained checkpoint
    Test(TestArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Resume from a saved checkpoint instead of starting fresh
    #[arg(long)]
    pub load: bool,

    /// Which checkpoint --load restores (best or final)
    #[arg(long, default_value = "best")]
    pub checkpoint: CheckpointKind,

    /// JSON file with a full TrainConfig; overrides the flags below
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Root with train/, val/ and test/ sample directories
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// Directory for checkpoints, metrics.csv and train_config.json
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Side length images and masks are resized to
    #[arg(long, default_value_t = 256)]
    pub image_size: usize,

    /// 1 (grayscale), 3 (RGB) or 4 (RGBA)
    #[arg(long, default_value_t = 3)]
    pub in_channels: usize,

    #[arg(long, default_value_t = 2)]
    pub num_classes: usize,

    /// Width of the first encoder block; deeper blocks double it
    #[arg(long, default_value_t = 64)]
    pub base_channels: usize,

    /// Dropout after each encoder block (0 disables it)
    #[arg(long, default_value_t = 0.0)]
    pub dropout: f64,

    #[arg(long, default_value_t = 4)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    /// Validate every N epochs
    #[arg(long, default_value_t = 1)]
    pub val_freq: usize,

    /// Log training progress every N steps
    #[arg(long, default_value_t = 10)]
    pub print_freq: usize,

    /// Share of train/ held out for validation when val/ is absent
    #[arg(long, default_value_t = 0.2)]
    pub val_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:       a.data_dir,
            checkpoint_dir: a.checkpoint_dir,
            image_size:     a.image_size,
            in_channels:    a.in_channels,
            num_classes:    a.num_classes,
            base_channels:  a.base_channels,
            dropout:        a.dropout,
            batch_size:     a.batch_size,
            n_epochs:       a.epochs,
            lr:             a.lr,
            val_freq:       a.val_freq,
            print_freq:     a.print_freq,
            val_fraction:   a.val_fraction,
            seed:           a.seed,
            num_workers:    a.num_workers,
            ..TrainConfig::default()
        }
    }
}

/// All arguments for the `test` command
#[derive(Args, Debug)]
pub struct TestArgs {
    /// Directory the training run wrote its checkpoints to
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Which checkpoint to segment with (best or final)
    #[arg(long, default_value = "best")]
    pub checkpoint: CheckpointKind,

    /// Image to segment; defaults to the first image of the test split
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Write the predicted class map here as a grayscale PNG
    #[arg(long)]
    pub output: Option<PathBuf>,
}
