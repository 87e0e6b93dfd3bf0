// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and delegates everything else to Layer 2 (application).
//
//   1. `train` — trains the UNet, optionally resuming a checkpoint
//   2. `test`  — segments one image with a trained checkpoint

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, TestArgs, TrainArgs};

use crate::application::train_use_case::TrainConfig;

#[derive(Parser, Debug)]
#[command(
    name = "unet-seg",
    version = "0.1.0",
    about = "Train a UNet for image segmentation, then segment images with it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the use case. The CLI layer only routes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Test(args)  => run_test(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let resume = args.load.then_some(args.checkpoint);
    let config = match args.config.clone() {
        Some(path) => {
            tracing::info!("Reading config from '{}'", path.display());
            TrainConfig::from_json_file(&path)?
        }
        None => TrainConfig::from(args),
    };

    tracing::info!("Starting training on samples in: {}", config.data_dir);
    TrainUseCase::new(config, resume).execute()?;

    println!("Training complete. Checkpoints saved.");
    Ok(())
}

fn run_test(args: TestArgs) -> Result<()> {
    use crate::application::test_use_case::TestUseCase;

    let use_case   = TestUseCase::new(args.checkpoint_dir.clone(), args.checkpoint)?;
    let prediction = use_case.run(args.image.as_deref(), args.output.as_deref())?;

    println!(
        "Segmented {}x{} pixels into {} classes.",
        prediction.width, prediction.height, prediction.num_classes
    );
    Ok(())
}
