// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Validate the configuration (and, on resume, match it
//           against the config saved with the checkpoint)
//   Step 2: List train / val samples       (Layer 4 - data)
//   Step 3: Decode images and masks        (Layer 4 - data)
//   Step 4: Run training loop              (Layer 5 - ml)
//
// The training loop writes train_config.json after any restore.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::data::{
    dataset::SegDataset,
    loader::SampleDirLoader,
    preprocessor::Preprocessor,
    splitter::split_train_val,
};
use crate::domain::{checkpoint::CheckpointKind, sample::Split, traits::SampleSource};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{criterion::CriterionConfig, model::UNetConfig, trainer::run_training};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters and paths for a run. Serialisable so it
// can be read from a JSON file, saved next to the checkpoints,
// and reloaded to rebuild the model for inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub data_dir:          String,
    pub checkpoint_dir:    String,
    /// Images and masks are resized to image_size × image_size
    pub image_size:        usize,
    pub in_channels:       usize,
    pub num_classes:       usize,
    pub base_channels:     usize,
    pub dropout:           f64,
    pub class_weights:     Option<Vec<f32>>,
    pub batch_size:        usize,
    pub n_epochs:          usize,
    pub lr:                f64,
    /// Validate on epochs where epoch % val_freq == 0 (0-based)
    pub val_freq:          usize,
    /// Log training progress every print_freq steps
    pub print_freq:        usize,
    /// Held-out fraction when the data root has no val/ split
    pub val_fraction:      f64,
    pub seed:              u64,
    pub num_workers:       usize,
    pub resume_from_epoch: usize,
    /// Only validation losses below this are saved as "best"
    pub min_val_loss:      f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:          "data".to_string(),
            checkpoint_dir:    "checkpoints".to_string(),
            image_size:        256,
            in_channels:       3,
            num_classes:       2,
            base_channels:     64,
            dropout:           0.0,
            class_weights:     None,
            batch_size:        4,
            n_epochs:          10,
            lr:                1e-4,
            val_freq:          1,
            print_freq:        10,
            val_fraction:      0.2,
            seed:              42,
            num_workers:       1,
            resume_from_epoch: 0,
            min_val_loss:      1000.0,
        }
    }
}

impl TrainConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }

    pub fn unet_config(&self) -> UNetConfig {
        UNetConfig::new(self.in_channels, self.num_classes)
            .with_base_channels(self.base_channels)
            .with_dropout(self.dropout)
    }

    pub fn criterion_config(&self) -> CriterionConfig {
        CriterionConfig::new(self.class_weights.clone())
    }

    pub fn preprocessor(&self) -> Preprocessor {
        Preprocessor::new(self.image_size, self.in_channels, self.num_classes)
    }

    /// Reject configurations that would fail later inside Burn.
    pub fn validate(&self) -> Result<()> {
        if ![1, 3, 4].contains(&self.in_channels) {
            anyhow::bail!("in_channels must be 1, 3 or 4, got {}", self.in_channels);
        }
        // Masks are 8-bit images holding class indices
        if self.num_classes == 0 || self.num_classes > 256 {
            anyhow::bail!("num_classes must be in 1..=256, got {}", self.num_classes);
        }
        if self.base_channels == 0 || self.batch_size == 0 {
            anyhow::bail!("base_channels and batch_size must be positive");
        }
        if self.val_freq == 0 || self.print_freq == 0 {
            anyhow::bail!("val_freq and print_freq must be positive");
        }
        if !(0.0..1.0).contains(&self.dropout) {
            anyhow::bail!("dropout must be in [0, 1), got {}", self.dropout);
        }
        if !(0.0..1.0).contains(&self.val_fraction) {
            anyhow::bail!("val_fraction must be in [0, 1), got {}", self.val_fraction);
        }
        if self.lr.is_nan() || self.lr <= 0.0 {
            anyhow::bail!("lr must be positive, got {}", self.lr);
        }
        if let Some(w) = &self.class_weights {
            if w.len() != self.num_classes {
                anyhow::bail!("class_weights has {} entries for {} classes", w.len(), self.num_classes);
            }
        }
        let min = self.unet_config().min_input_size();
        if self.image_size < min {
            anyhow::bail!("image_size {} is too small for the network (minimum {min})", self.image_size);
        }
        Ok(())
    }

    /// Fail unless `saved` describes the same network and input size,
    /// so checkpoint weights always match the persisted config.
    pub fn check_same_architecture(&self, saved: &TrainConfig) -> Result<()> {
        let fields = [
            ("in_channels",   self.in_channels,   saved.in_channels),
            ("num_classes",   self.num_classes,   saved.num_classes),
            ("base_channels", self.base_channels, saved.base_channels),
            ("image_size",    self.image_size,    saved.image_size),
        ];
        for (name, requested, stored) in fields {
            if requested != stored {
                anyhow::bail!(
                    "{name} is {requested} but the checkpoint was trained with {stored}"
                );
            }
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
    /// Checkpoint to restore model/optimizer/epoch from, if any
    resume: Option<CheckpointKind>,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig, resume: Option<CheckpointKind>) -> Self {
        Self { config, resume }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Validate ─────────────────────────────────────────────────
        cfg.validate()?;
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir);
        if let Some(kind) = self.resume {
            let saved = ckpt
                .load_config()
                .with_context(|| format!("Cannot resume from {kind} checkpoint"))?;
            cfg.check_same_architecture(&saved)?;
        }

        // ── Step 2: List samples ─────────────────────────────────────────────
        // Use val/ when present, otherwise hold out part of train/
        tracing::info!("Loading samples from '{}'", cfg.data_dir);
        let source = SampleDirLoader::new(&cfg.data_dir);
        let train_samples = source.list(Split::Train)?;

        let (train_samples, val_samples) = if source.has_split(Split::Val) {
            (train_samples, source.list(Split::Val)?)
        } else {
            tracing::info!("No val split; holding out {:.0}% of train", cfg.val_fraction * 100.0);
            split_train_val(train_samples, 1.0 - cfg.val_fraction, cfg.seed)
        };

        if train_samples.is_empty() {
            anyhow::bail!("No training samples found under '{}'", cfg.data_dir);
        }
        if val_samples.is_empty() {
            tracing::warn!("Validation set is empty; no best checkpoint will be saved");
        }
        tracing::info!(
            "Split: {} train, {} validation",
            train_samples.len(),
            val_samples.len()
        );

        // ── Step 3: Decode ───────────────────────────────────────────────────
        let preprocessor  = cfg.preprocessor();
        let train_dataset = SegDataset::load(&train_samples, &preprocessor)?;
        let val_dataset   = SegDataset::load(&val_samples, &preprocessor)?;

        // ── Step 4: Run training loop (Layer 5) ──────────────────────────────
        let outcome = run_training(cfg, train_dataset, val_dataset, &ckpt, self.resume)?;

        match outcome.best_epoch {
            Some(epoch) => tracing::info!(
                "Best validation loss {:.6} at epoch {}",
                outcome.min_val_loss,
                epoch + 1
            ),
            None => tracing::info!("No new best checkpoint in this run"),
        }
        tracing::info!("Training complete! {} epochs run", outcome.epochs_run);
        Ok(())
    }
}
