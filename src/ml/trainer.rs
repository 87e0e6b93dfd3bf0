// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch loop with periodic validation and checkpointing.
//
//   for epoch in resume_from_epoch..n_epochs:
//     train pass      forward → loss → backward → optimizer step
//     every val_freq  validate on model.valid() (no autodiff, no dropout)
//                     val_loss < min_val_loss → save "best"
//     append metrics row
//   save "final"
//
// Key Burn points:
//   - Training runs on the Autodiff backend
//   - model.valid() returns the same weights on the inner
//     backend, so the validation loader/criterion use it too
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{SegBatch, SegBatcher},
    dataset::{SegDataset, SegItem},
};
use crate::domain::checkpoint::{CheckpointKind, CheckpointMeta};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{is_improvement, EpochMetrics, MetricsLogger},
};
use crate::ml::{
    criterion::{CriterionConfig, PixelCrossEntropy},
    model::UNet,
    TrainBackend,
};

/// What a finished run leaves behind besides the files on disk.
pub struct TrainOutcome {
    pub min_val_loss: f64,
    /// 0-based epoch of the last best checkpoint written by this run
    pub best_epoch:   Option<usize>,
    pub epochs_run:   usize,
}

/// Build the model and Adam optimizer on the default device, optionally
/// restore them from a checkpoint, then train. `train_config.json` is
/// written once the restore has succeeded.
pub fn run_training(
    cfg:           &TrainConfig,
    train_dataset: SegDataset,
    val_dataset:   SegDataset,
    ckpt:          &CheckpointManager,
    resume:        Option<CheckpointKind>,
) -> Result<TrainOutcome> {
    let device = <TrainBackend as Backend>::Device::default();
    tracing::info!("Using device: {:?}", device);

    let mut run_cfg = cfg.clone();
    let mut model: UNet<TrainBackend> = cfg.unet_config().init(&device);
    let mut optim = AdamConfig::new().init::<TrainBackend, UNet<TrainBackend>>();

    if let Some(kind) = resume {
        if !ckpt.exists(kind) {
            anyhow::bail!("No {kind} checkpoint in '{}' to resume from", ckpt.dir().display());
        }
        model = ckpt.load_model(kind, model, &device)?;
        optim = ckpt.load_optimizer(kind, optim, &device)?;
        let meta = ckpt.load_meta(kind)?;
        run_cfg.resume_from_epoch = meta.resume_epoch();
        if let Some(loss) = meta.val_loss {
            run_cfg.min_val_loss = loss;
        }
        tracing::info!(
            "Resuming from {kind} checkpoint: epoch {}, min val loss {:.6}",
            run_cfg.resume_from_epoch + 1,
            run_cfg.min_val_loss
        );
    }

    // Inference rebuilds the network from this file
    ckpt.save_config(cfg)?;

    let metrics = MetricsLogger::new(ckpt.dir())?;
    train(
        model,
        optim,
        &run_cfg.criterion_config(),
        train_dataset,
        val_dataset,
        &run_cfg,
        ckpt,
        &metrics,
        &device,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn train<B, O>(
    mut model:     UNet<B>,
    mut optim:     O,
    criterion:     &CriterionConfig,
    train_dataset: SegDataset,
    val_dataset:   SegDataset,
    cfg:           &TrainConfig,
    ckpt:          &CheckpointManager,
    metrics:       &MetricsLogger,
    device:        &B::Device,
) -> Result<TrainOutcome>
where
    B: AutodiffBackend,
    O: Optimizer<UNet<B>, B>,
{
    let batcher = SegBatcher::new(cfg.in_channels, cfg.image_size);
    let batch_size = cfg.batch_size.max(1);
    let print_freq = cfg.print_freq.max(1);
    let val_freq   = cfg.val_freq.max(1);

    // ── Training loader (AutodiffBackend) ─────────────────────────────────────
    let train_loader = DataLoaderBuilder::<B, SegItem, SegBatch<B>>::new(batcher.clone())
        .batch_size(batch_size)
        .shuffle(cfg.seed)
        .num_workers(cfg.num_workers)
        .set_device(device.clone())
        .build(train_dataset);

    // ── Validation loader (InnerBackend — no autodiff overhead) ───────────────
    let val_loader = DataLoaderBuilder::<B::InnerBackend, SegItem, SegBatch<B::InnerBackend>>::new(batcher)
        .batch_size(batch_size)
        .num_workers(cfg.num_workers)
        .set_device(device.clone())
        .build(val_dataset);

    let train_criterion: PixelCrossEntropy<B> = criterion.init(device);
    let val_criterion: PixelCrossEntropy<B::InnerBackend> = criterion.init(device);

    let n_batches = train_loader.num_items().div_ceil(batch_size);
    let mut min_val_loss = cfg.min_val_loss;
    let mut best_epoch   = None;
    let mut epochs_run   = 0usize;

    if cfg.resume_from_epoch >= cfg.n_epochs {
        tracing::warn!(
            "Resume epoch {} is past n_epochs {}; nothing to train",
            cfg.resume_from_epoch + 1,
            cfg.n_epochs
        );
    }

    for epoch in cfg.resume_from_epoch..cfg.n_epochs {
        tracing::info!("TRAINING: Epoch {}/{}", epoch + 1, cfg.n_epochs);

        // ── Training phase ────────────────────────────────────────────────────
        let mut running_loss = 0.0f64;
        let mut steps        = 0usize;

        for batch in train_loader.iter() {
            let (loss, _) = model.forward_loss(batch.images, batch.masks, &train_criterion);
            running_loss += loss.clone().into_scalar().elem::<f64>();
            steps        += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(cfg.lr, model, grads);

            if steps % print_freq == 0 {
                tracing::debug!(
                    "Training: step {steps}/{n_batches}, running loss {:.6}",
                    running_loss / steps as f64
                );
            }
        }

        let train_loss = mean_loss(running_loss, steps);
        tracing::info!("Epoch done! Loss = {train_loss}");

        // ── Validation phase ──────────────────────────────────────────────────
        let mut val_loss = None;
        let mut saved    = false;

        if epoch % val_freq == 0 {
            tracing::info!("VALIDATION");
            let loss = validate(&model.valid(), val_loader.as_ref(), &val_criterion, print_freq);
            tracing::info!("Validation loss: {loss}");

            if is_improvement(loss, min_val_loss) {
                ckpt.save(CheckpointKind::Best, &model, &optim, CheckpointMeta::new(epoch, Some(loss)))?;
                tracing::info!("Saved best model at epoch {} (val loss {loss:.6})", epoch + 1);
                min_val_loss = loss;
                best_epoch   = Some(epoch);
                saved        = true;
            } else {
                tracing::info!("Skipped saving.");
            }
            val_loss = Some(loss);
        }

        metrics.log(&EpochMetrics::new(epoch + 1, train_loss, val_loss, saved))?;
        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={}",
            epoch + 1,
            cfg.n_epochs,
            train_loss,
            val_loss.map(|v| format!("{v:.4}")).unwrap_or_else(|| "-".to_string()),
        );
        epochs_run += 1;
    }

    let last_epoch = cfg.n_epochs.saturating_sub(1).max(cfg.resume_from_epoch);
    ckpt.save(
        CheckpointKind::Final,
        &model,
        &optim,
        CheckpointMeta::new(last_epoch, Some(min_val_loss).filter(|v| v.is_finite())),
    )?;
    tracing::info!("Saved final model to '{}'", ckpt.dir().display());

    Ok(TrainOutcome { min_val_loss, best_epoch, epochs_run })
}

/// Mean loss over a no-gradient pass through `loader`.
/// Returns NaN when the loader yields no batches.
pub fn validate<B: Backend>(
    model:      &UNet<B>,
    loader:     &dyn DataLoader<B, SegBatch<B>>,
    criterion:  &PixelCrossEntropy<B>,
    print_freq: usize,
) -> f64 {
    let mut val_loss = 0.0f64;
    let mut steps    = 0usize;

    for batch in loader.iter() {
        let logits = model.forward(batch.images);
        val_loss += criterion.forward(logits, batch.masks).into_scalar().elem::<f64>();
        steps    += 1;

        if steps % print_freq.max(1) == 0 {
            tracing::debug!("Validation: step {steps}");
        }
    }

    mean_loss(val_loss, steps)
}

fn mean_loss(sum: f64, steps: usize) -> f64 {
    if steps > 0 { sum / steps as f64 } else { f64::NAN }
}
