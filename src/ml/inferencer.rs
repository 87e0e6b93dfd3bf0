// ============================================================
// Layer 5 — Segmenter (Inference)
// ============================================================
// Rebuilds the UNet from train_config.json, loads a checkpoint
// and turns one image into per-pixel class scores and a class
// map.
use anyhow::Result;
use burn::{prelude::*, tensor::TensorData};
use image::{imageops::FilterType, DynamicImage, GrayImage};

use crate::data::preprocessor::Preprocessor;
use crate::domain::checkpoint::CheckpointKind;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::UNet;

pub struct Segmenter<B: Backend> {
    model:        UNet<B>,
    preprocessor: Preprocessor,
    num_classes:  usize,
    device:       B::Device,
}

/// Output of one forward pass over a single image.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub height:      usize,
    pub width:       usize,
    pub num_classes: usize,
    /// Class scores in HWC order: scores[(y * width + x) * num_classes + k]
    pub scores:      Vec<f32>,
    /// Arg-max class per pixel, row-major
    pub class_map:   Vec<u8>,
}

/// Summary of one class's scores across the image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreStats {
    pub min:  f32,
    pub mean: f32,
    pub max:  f32,
}

impl Prediction {
    /// Number of pixels assigned to each class
    pub fn class_histogram(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_classes];
        for &c in &self.class_map {
            counts[c as usize] += 1;
        }
        counts
    }

    /// Min, mean and max score of each class over all pixels
    pub fn score_stats(&self) -> Vec<ScoreStats> {
        let k = self.num_classes.max(1);
        (0..self.num_classes)
            .map(|class| {
                let mut stats = ScoreStats { min: f32::INFINITY, mean: 0.0, max: f32::NEG_INFINITY };
                let mut sum   = 0.0f64;
                let mut n     = 0usize;
                for &v in self.scores.iter().skip(class).step_by(k) {
                    stats.min = stats.min.min(v);
                    stats.max = stats.max.max(v);
                    sum += v as f64;
                    n   += 1;
                }
                stats.mean = if n > 0 { (sum / n as f64) as f32 } else { f32::NAN };
                stats
            })
            .collect()
    }

    /// Class map as a grayscale mask (pixel value = class index),
    /// resized with nearest-neighbour to `width × height`.
    pub fn to_mask_image(&self, width: u32, height: u32) -> Result<GrayImage> {
        let mask = GrayImage::from_raw(self.width as u32, self.height as u32, self.class_map.clone())
            .ok_or_else(|| anyhow::anyhow!("class map does not match {}x{}", self.width, self.height))?;
        if (width, height) == mask.dimensions() {
            return Ok(mask);
        }
        Ok(image::imageops::resize(&mask, width, height, FilterType::Nearest))
    }
}

impl<B: Backend> Segmenter<B> {
    pub fn new(model: UNet<B>, preprocessor: Preprocessor, num_classes: usize, device: B::Device) -> Self {
        Self { model, preprocessor, num_classes, device }
    }

    pub fn from_checkpoint(ckpt: &CheckpointManager, kind: CheckpointKind, device: B::Device) -> Result<Self> {
        let cfg = ckpt.load_config()?;
        cfg.validate()?;
        let model: UNet<B> = cfg.unet_config().init(&device);
        let model = ckpt.load_model(kind, model, &device)?;
        tracing::info!("Model loaded from {kind} checkpoint");
        Ok(Self::new(model, cfg.preprocessor(), cfg.num_classes, device))
    }

    pub fn predict(&self, image: &DynamicImage) -> Result<Prediction> {
        let side     = self.preprocessor.image_size();
        let channels = self.preprocessor.in_channels();
        let chw      = self.preprocessor.image_to_chw(image)?;

        let input = Tensor::<B, 4>::from_data(
            TensorData::new(chw, [1, channels, side, side]),
            &self.device,
        );
        let logits = self.model.forward(input); // [1, K, H, W]
        let [_, classes, height, width] = logits.dims();
        if classes != self.num_classes {
            anyhow::bail!("model produced {classes} classes, expected {}", self.num_classes);
        }

        let class_map: Vec<u8> = logits
            .clone()
            .argmax(1)
            .reshape([height * width])
            .into_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .map_err(|e| anyhow::anyhow!("Cannot read class map: {e:?}"))?
            .into_iter()
            .map(|c| c as u8)
            .collect();

        // squeeze + permute to [H, W, K]
        let scores: Vec<f32> = logits
            .reshape([classes, height, width])
            .permute([1, 2, 0])
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Cannot read scores: {e:?}"))?;

        Ok(Prediction { height, width, num_classes: classes, scores, class_map })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::UNetConfig;
    use burn::backend::NdArray;
    use image::{Luma, Rgb, RgbImage};

    type TestBackend = NdArray;

    #[test]
    fn test_predict_shapes_and_histogram() {
        let device = Default::default();
        let model: UNet<TestBackend> = UNetConfig::new(3, 3).with_base_channels(1).init(&device);
        let seg = Segmenter::new(model, Preprocessor::new(188, 3, 3), 3, device);

        let img  = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 40, Rgb([90, 10, 200])));
        let pred = seg.predict(&img).unwrap();

        assert_eq!((pred.height, pred.width), (188, 188));
        assert_eq!(pred.scores.len(), 188 * 188 * 3);
        assert_eq!(pred.class_map.len(), 188 * 188);
        assert!(pred.class_map.iter().all(|&c| c < 3));
        assert_eq!(pred.class_histogram().iter().sum::<usize>(), 188 * 188);
    }

    #[test]
    fn test_mask_image_resized_back() {
        let pred = Prediction {
            height: 2,
            width: 2,
            num_classes: 2,
            scores: vec![0.0; 8],
            class_map: vec![0, 1, 1, 0],
        };
        let mask = pred.to_mask_image(4, 4).unwrap();
        assert_eq!(mask.dimensions(), (4, 4));
        assert_eq!(mask.get_pixel(0, 0), &Luma([0]));
        assert_eq!(mask.get_pixel(3, 0), &Luma([1]));
        assert_eq!(pred.class_histogram(), vec![2, 2]);
    }

    #[test]
    fn test_score_stats_cover_every_pixel() {
        let pred = Prediction {
            height: 1,
            width: 3,
            num_classes: 2,
            // HWC: pixel0 (1, -1), pixel1 (3, 0), pixel2 (2, 4)
            scores: vec![1.0, -1.0, 3.0, 0.0, 2.0, 4.0],
            class_map: vec![0, 0, 1],
        };
        let stats = pred.score_stats();
        assert_eq!(stats[0], ScoreStats { min: 1.0, mean: 2.0, max: 3.0 });
        assert_eq!(stats[1], ScoreStats { min: -1.0, mean: 1.0, max: 4.0 });
    }
}
