// ============================================================
// Layer 4 — Image / Mask Preprocessor
// ============================================================
// Turns files on disk into flat buffers the batcher can stack.
//
//   image → resize (triangle filter) → CHW f32 in [0, 1]
//   mask  → luma8 → resize (nearest)  → HW class indices
//
// Masks must be resized with nearest-neighbour sampling; any
// interpolating filter would invent class indices that sit
// between two real labels.

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, GrayImage};
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    image_size:  usize,
    in_channels: usize,
    num_classes: usize,
}

impl Preprocessor {
    pub fn new(image_size: usize, in_channels: usize, num_classes: usize) -> Self {
        Self { image_size, in_channels, num_classes }
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Decode an image file into a CHW buffer of length
    /// `in_channels * image_size * image_size`.
    pub fn load_image(&self, path: &Path) -> Result<Vec<f32>> {
        let img = image::open(path)
            .with_context(|| format!("Cannot open image '{}'", path.display()))?;
        self.image_to_chw(&img)
    }

    pub fn image_to_chw(&self, img: &DynamicImage) -> Result<Vec<f32>> {
        let side = self.image_size as u32;
        let resized = img.resize_exact(side, side, FilterType::Triangle);

        // Interleaved HWC bytes for the requested channel count
        let raw: Vec<u8> = match self.in_channels {
            1 => resized.to_luma8().into_raw(),
            3 => resized.to_rgb8().into_raw(),
            4 => resized.to_rgba8().into_raw(),
            n => anyhow::bail!("unsupported channel count {n}, expected 1, 3 or 4"),
        };

        let c      = self.in_channels;
        let pixels = self.image_size * self.image_size;
        let mut chw = vec![0.0f32; c * pixels];
        for (i, px) in raw.chunks_exact(c).enumerate() {
            for (ch, &v) in px.iter().enumerate() {
                chw[ch * pixels + i] = v as f32 / 255.0;
            }
        }
        Ok(chw)
    }

    /// Decode a mask file into `image_size * image_size` class indices.
    pub fn load_mask(&self, path: &Path) -> Result<Vec<i32>> {
        let img = image::open(path)
            .with_context(|| format!("Cannot open mask '{}'", path.display()))?;
        self.mask_to_classes(&img.to_luma8())
            .with_context(|| format!("Invalid mask '{}'", path.display()))
    }

    pub fn mask_to_classes(&self, mask: &GrayImage) -> Result<Vec<i32>> {
        let side = self.image_size as u32;
        let resized = image::imageops::resize(mask, side, side, FilterType::Nearest);

        let mut classes = Vec::with_capacity(self.image_size * self.image_size);
        for &v in resized.as_raw() {
            if v as usize >= self.num_classes {
                anyhow::bail!(
                    "mask value {v} is not a class index (num_classes = {})",
                    self.num_classes
                );
            }
            classes.push(v as i32);
        }
        Ok(classes)
    }
}
