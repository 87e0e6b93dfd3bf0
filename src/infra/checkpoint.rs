// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores training state with Burn's CompactRecorder.
//
// Each checkpoint kind (best / final) writes three files:
//
//   checkpoints/
//     best_model.mpk      ← UNet weights
//     best_optim.mpk      ← optimizer state (Adam moments)
//     best_meta.json      ← { "epoch": 4, "val_loss": 0.31 }
//     final_model.mpk
//     final_optim.mpk
//     final_meta.json
//     train_config.json   ← architecture + hyperparameters
//
// The config is stored separately because the model has to be
// rebuilt with the same architecture before weights can be
// loaded into it.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    optim::Optimizer,
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use std::{fs, path::{Path, PathBuf}};

use crate::application::train_use_case::TrainConfig;
use crate::domain::checkpoint::{CheckpointKind, CheckpointMeta};
use crate::ml::model::UNet;

const CONFIG_FILE: &str = "train_config.json";

/// Manages checkpoint files inside one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", self.dir.display()))
    }

    // Recorder adds the .mpk extension itself
    fn model_path(&self, kind: CheckpointKind) -> PathBuf {
        self.dir.join(format!("{}_model", kind.prefix()))
    }

    fn optim_path(&self, kind: CheckpointKind) -> PathBuf {
        self.dir.join(format!("{}_optim", kind.prefix()))
    }

    fn meta_path(&self, kind: CheckpointKind) -> PathBuf {
        self.dir.join(format!("{}_meta.json", kind.prefix()))
    }

    /// True once weights and meta for `kind` are on disk.
    pub fn exists(&self, kind: CheckpointKind) -> bool {
        self.model_path(kind).with_extension("mpk").is_file() && self.meta_path(kind).is_file()
    }

    /// Save model, optimizer state and meta for one checkpoint kind.
    pub fn save<B, O>(
        &self,
        kind:  CheckpointKind,
        model: &UNet<B>,
        optim: &O,
        meta:  CheckpointMeta,
    ) -> Result<()>
    where
        B: AutodiffBackend,
        O: Optimizer<UNet<B>, B>,
    {
        self.ensure_dir()?;
        self.save_model(kind, model)?;

        let path = self.optim_path(kind);
        <CompactRecorder as Recorder<B>>::record(&CompactRecorder::new(), optim.to_record(), path.clone())
            .with_context(|| format!("Failed to save optimizer state to '{}'", path.display()))?;

        let meta_path = self.meta_path(kind);
        fs::write(&meta_path, serde_json::to_string_pretty(&meta)?)
            .with_context(|| format!("Failed to write '{}'", meta_path.display()))?;

        tracing::debug!("Saved {kind} checkpoint (epoch {})", meta.epoch);
        Ok(())
    }

    /// Save model weights only.
    pub fn save_model<B: Backend>(&self, kind: CheckpointKind, model: &UNet<B>) -> Result<()> {
        self.ensure_dir()?;
        let path = self.model_path(kind);
        <CompactRecorder as Recorder<B>>::record(&CompactRecorder::new(), model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;
        Ok(())
    }

    /// Load weights into a freshly built model of the same architecture.
    pub fn load_model<B: Backend>(
        &self,
        kind:   CheckpointKind,
        model:  UNet<B>,
        device: &B::Device,
    ) -> Result<UNet<B>> {
        let path = self.model_path(kind);
        tracing::info!("Loading {kind} weights from '{}'", path.display());

        let record = <CompactRecorder as Recorder<B>>::load(&CompactRecorder::new(), path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;
        Ok(model.load_record(record))
    }

    /// Restore optimizer state saved alongside `kind`.
    pub fn load_optimizer<B, O>(
        &self,
        kind:   CheckpointKind,
        optim:  O,
        device: &B::Device,
    ) -> Result<O>
    where
        B: AutodiffBackend,
        O: Optimizer<UNet<B>, B>,
    {
        let path = self.optim_path(kind);
        let record = <CompactRecorder as Recorder<B>>::load(&CompactRecorder::new(), path.clone(), device)
            .with_context(|| format!("Cannot load optimizer state '{}'", path.display()))?;
        Ok(optim.load_record(record))
    }

    pub fn load_meta(&self, kind: CheckpointKind) -> Result<CheckpointMeta> {
        let path = self.meta_path(kind);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed checkpoint meta '{}'", path.display()))
    }

    /// Persist the training configuration so `test` can rebuild the model.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        self.ensure_dir()?;
        let path = self.dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        TrainConfig::from_json_file(&path).with_context(|| {
            format!("Make sure you have run 'train' with checkpoint dir '{}'", self.dir.display())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::UNetConfig;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::AdamConfig;

    type TestBackend = Autodiff<NdArray>;

    fn tiny_model(device: &<TestBackend as Backend>::Device) -> UNet<TestBackend> {
        UNetConfig::new(1, 2).with_base_channels(1).init(device)
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let tmp    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let ckpt   = CheckpointManager::new(tmp.path().join("ckpt"));

        let model = tiny_model(&device);
        let optim = AdamConfig::new().init::<TestBackend, UNet<TestBackend>>();
        assert!(!ckpt.exists(CheckpointKind::Best));

        ckpt.save(CheckpointKind::Best, &model, &optim, CheckpointMeta::new(3, Some(0.5)))
            .unwrap();
        assert!(ckpt.exists(CheckpointKind::Best));
        assert!(!ckpt.exists(CheckpointKind::Final));

        let meta = ckpt.load_meta(CheckpointKind::Best).unwrap();
        assert_eq!(meta, CheckpointMeta::new(3, Some(0.5)));

        // Weights come back into a model on the inference backend
        let fresh: UNet<NdArray> = UNetConfig::new(1, 2).with_base_channels(1).init(&device);
        let loaded = ckpt.load_model(CheckpointKind::Best, fresh, &device).unwrap();
        let expected: Vec<f32> = model.output.weight.val().into_data().to_vec().unwrap();
        let actual:   Vec<f32> = loaded.output.weight.val().into_data().to_vec().unwrap();
        for (a, e) in actual.iter().zip(expected.iter()) {
            // CompactRecorder stores half precision
            assert!((a - e).abs() < 1e-2);
        }

        let optim = AdamConfig::new().init::<TestBackend, UNet<TestBackend>>();
        assert!(ckpt.load_optimizer(CheckpointKind::Best, optim, &device).is_ok());
    }

    #[test]
    fn test_missing_checkpoint_is_error() {
        let tmp    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let ckpt   = CheckpointManager::new(tmp.path());
        assert!(ckpt.load_model(CheckpointKind::Final, tiny_model(&device), &device).is_err());
        assert!(ckpt.load_meta(CheckpointKind::Final).is_err());
    }

    #[test]
    fn test_config_roundtrip() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path());
        let cfg  = TrainConfig { num_classes: 5, ..TrainConfig::default() };
        ckpt.save_config(&cfg).unwrap();
        assert_eq!(ckpt.load_config().unwrap().num_classes, 5);
    }
}
