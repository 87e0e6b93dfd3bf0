// ============================================================
// Layer 2 — TestUseCase
// ============================================================
// Segments a single image with a trained checkpoint:
//
//   1. Rebuild the UNet from train_config.json and load weights
//   2. Pick the image: --image, or the first image of the test split
//   3. Forward pass → per-pixel scores [H, W, K] and class map
//   4. Log the result; optionally write the class map as a PNG

use anyhow::{Context, Result};
use burn::prelude::Backend;
use std::path::{Path, PathBuf};

use crate::data::loader::SampleDirLoader;
use crate::domain::{checkpoint::CheckpointKind, sample::Split, traits::SampleSource};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    inferencer::{Prediction, Segmenter},
    InferBackend,
};

pub struct TestUseCase {
    ckpt:      CheckpointManager,
    segmenter: Segmenter<InferBackend>,
}

impl TestUseCase {
    pub fn new(checkpoint_dir: impl Into<PathBuf>, kind: CheckpointKind) -> Result<Self> {
        let ckpt      = CheckpointManager::new(checkpoint_dir);
        let device    = <InferBackend as Backend>::Device::default();
        let segmenter = Segmenter::from_checkpoint(&ckpt, kind, device)?;
        Ok(Self { ckpt, segmenter })
    }

    /// Segment `image`, or the first test image when None. Writes the
    /// class map (at the source image's resolution) to `output` if given.
    pub fn run(&self, image: Option<&Path>, output: Option<&Path>) -> Result<Prediction> {
        let path = match image {
            Some(p) => p.to_path_buf(),
            None    => self.first_test_image()?,
        };
        tracing::info!("Segmenting '{}'", path.display());

        let img = image::open(&path)
            .with_context(|| format!("Cannot open image '{}'", path.display()))?;
        let prediction = self.segmenter.predict(&img)?;

        tracing::info!(
            "Scores [H, W, K] = [{}, {}, {}]",
            prediction.height,
            prediction.width,
            prediction.num_classes
        );
        let total = (prediction.height * prediction.width).max(1);
        let stats = prediction.score_stats();
        for (class, count) in prediction.class_histogram().iter().enumerate() {
            let s = stats[class];
            tracing::info!(
                "class {class}: {count} px ({:.1}%), score min {:.4} mean {:.4} max {:.4}",
                *count as f64 * 100.0 / total as f64,
                s.min,
                s.mean,
                s.max
            );
        }
        tracing::debug!("Scores: {:?}", prediction.scores);

        if let Some(out) = output {
            let mask = prediction.to_mask_image(img.width(), img.height())?;
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            mask.save(out)
                .with_context(|| format!("Cannot write mask to '{}'", out.display()))?;
            tracing::info!("Wrote class map to '{}'", out.display());
        }

        Ok(prediction)
    }

    fn first_test_image(&self) -> Result<PathBuf> {
        let cfg    = self.ckpt.load_config()?;
        let source = SampleDirLoader::new(&cfg.data_dir);
        source
            .list(Split::Test)?
            .into_iter()
            .next()
            .map(|s| s.image)
            .ok_or_else(|| anyhow::anyhow!("No test images under '{}'", cfg.data_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainConfig;
    use crate::domain::checkpoint::CheckpointMeta;
    use crate::ml::{model::UNet, TrainBackend};
    use burn::optim::AdamConfig;
    use image::{GrayImage, Luma};
    use std::fs;

    fn write_checkpoint(root: &Path) -> TrainConfig {
        let cfg = TrainConfig {
            data_dir:       root.join("data").to_string_lossy().into_owned(),
            checkpoint_dir: root.join("ckpt").to_string_lossy().into_owned(),
            image_size:     188,
            in_channels:    1,
            num_classes:    3,
            base_channels:  1,
            ..TrainConfig::default()
        };
        let ckpt   = CheckpointManager::new(&cfg.checkpoint_dir);
        let device = Default::default();
        let model: UNet<TrainBackend> = cfg.unet_config().init(&device);
        let optim = AdamConfig::new().init::<TrainBackend, UNet<TrainBackend>>();
        ckpt.save_config(&cfg).unwrap();
        ckpt.save(CheckpointKind::Final, &model, &optim, CheckpointMeta::new(0, None)).unwrap();
        cfg
    }

    #[test]
    fn test_segments_first_test_image_and_writes_mask() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = write_checkpoint(tmp.path());

        let images = Path::new(&cfg.data_dir).join("test/images");
        fs::create_dir_all(&images).unwrap();
        GrayImage::from_pixel(60, 30, Luma([128])).save(images.join("x.png")).unwrap();

        let use_case = TestUseCase::new(&cfg.checkpoint_dir, CheckpointKind::Final).unwrap();
        let out  = tmp.path().join("out/mask.png");
        let pred = use_case.run(None, Some(&out)).unwrap();

        assert_eq!(pred.num_classes, 3);
        assert_eq!(pred.score_stats().len(), 3);
        let mask = image::open(&out).unwrap().to_luma8();
        assert_eq!(mask.dimensions(), (60, 30));
        assert!(mask.pixels().all(|p| p[0] < 3));
    }

    #[test]
    fn test_missing_test_split_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = write_checkpoint(tmp.path());
        let use_case = TestUseCase::new(&cfg.checkpoint_dir, CheckpointKind::Final).unwrap();
        assert!(use_case.run(None, None).is_err());
    }

    #[test]
    fn test_missing_checkpoint_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(TestUseCase::new(tmp.path(), CheckpointKind::Best).is_err());
    }
}
